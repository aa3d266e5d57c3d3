//! Engine configuration types
//!
//! This module defines the small set of knobs the engine exposes. Pattern
//! libraries are not configured here; they are passed to the engine directly.

use crate::types::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the lifecycle engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of spaces that make up one nesting level in a line body
    #[serde(default = "default_indent_width")]
    pub indent_width: usize,

    /// Run the application-lifecycle machine
    #[serde(default = "default_true")]
    pub track_app_lifecycle: bool,

    /// Run the match-lifecycle machine
    #[serde(default = "default_true")]
    pub track_match_lifecycle: bool,

    /// Log a warning when a line's timestamp goes backwards
    #[serde(default = "default_true")]
    pub warn_on_clock_regression: bool,
}

fn default_indent_width() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            indent_width: default_indent_width(),
            track_app_lifecycle: true,
            track_match_lifecycle: true,
            warn_on_clock_regression: true,
        }
    }
}

impl EngineConfig {
    /// Create a new engine configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the indentation unit
    pub fn with_indent_width(mut self, width: usize) -> Self {
        self.indent_width = width;
        self
    }

    /// Builder method: enable or disable the application-lifecycle machine
    pub fn with_app_lifecycle(mut self, enabled: bool) -> Self {
        self.track_app_lifecycle = enabled;
        self
    }

    /// Builder method: enable or disable the match-lifecycle machine
    pub fn with_match_lifecycle(mut self, enabled: bool) -> Self {
        self.track_match_lifecycle = enabled;
        self
    }

    /// Builder method: enable or disable clock regression warnings
    pub fn with_clock_regression_warnings(mut self, enabled: bool) -> Self {
        self.warn_on_clock_regression = enabled;
        self
    }

    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.indent_width == 0 {
            return Err(EngineError::InvalidConfig(
                "indent_width must be at least 1".to_string(),
            ));
        }

        if !self.track_app_lifecycle && !self.track_match_lifecycle {
            return Err(EngineError::InvalidConfig(
                "at least one lifecycle machine must be enabled".to_string(),
            ));
        }

        Ok(())
    }
}
