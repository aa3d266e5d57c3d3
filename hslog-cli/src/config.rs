//! Configuration loading and parsing

use anyhow::{Context, Result};
use hslog_engine::{AppState, EngineConfig, FeatureDef, MatchState, PatternLibrary};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub patterns: PatternsConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Report destination, stdout when absent
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PatternsConfig {
    /// TOML file replacing the built-in feature tables
    pub file: Option<PathBuf>,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .engine
        .validate()
        .with_context(|| format!("Invalid [engine] section in {:?}", path))?;

    Ok(config)
}

/// Feature tables as written in a pattern file
///
/// ```toml
/// [[app]]
/// state = "AWAKE"
/// sequence_type = "LoadingScreen.OnSceneLoaded"
/// level = 0
/// parameters = [
///     { key = { literal = "prevMode" }, value = { literal = "STARTUP" } },
/// ]
/// ```
///
/// A family left empty keeps its built-in table.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PatternFile {
    #[serde(default)]
    pub app: Vec<FeatureDef<AppState>>,
    #[serde(default, rename = "match")]
    pub game: Vec<FeatureDef<MatchState>>,
}

/// Compiled libraries for both machines
#[derive(Debug, Clone)]
pub struct Libraries {
    pub app: PatternLibrary<AppState>,
    pub game: PatternLibrary<MatchState>,
}

impl Libraries {
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            app: PatternLibrary::app_lifecycle()
                .context("Built-in app lifecycle table is invalid")?,
            game: PatternLibrary::match_lifecycle()
                .context("Built-in match lifecycle table is invalid")?,
        })
    }
}

impl PatternFile {
    /// Compile both tables, falling back to the built-in table for an empty family
    pub fn into_libraries(self) -> Result<Libraries> {
        let app = if self.app.is_empty() {
            PatternLibrary::app_lifecycle()
        } else {
            PatternLibrary::compile(self.app)
        }
        .context("Invalid [[app]] feature table")?;

        let game = if self.game.is_empty() {
            PatternLibrary::match_lifecycle()
        } else {
            PatternLibrary::compile(self.game)
        }
        .context("Invalid [[match]] feature table")?;

        Ok(Libraries { app, game })
    }
}

/// Load and compile a pattern file
pub fn load_patterns(path: &Path) -> Result<Libraries> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read pattern file: {:?}", path))?;

    let file: PatternFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse pattern file: {:?}", path))?;

    log::info!(
        "Loaded pattern file {:?}: {} app feature(s), {} match feature(s)",
        path,
        file.app.len(),
        file.game.len()
    );

    file.into_libraries()
        .with_context(|| format!("Failed to compile pattern file: {:?}", path))
}
