//! Feature Matcher
//!
//! Stateless predicate deciding whether one [`Line`] satisfies one
//! [`Pattern`], and extracting regex captures when it does.

use crate::patterns::Pattern;
use crate::types::{CaptureSite, Line};

/// Captures pulled from a single matched line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    /// Capture groups keyed by where they came from, in descriptor order
    pub captures: Vec<(CaptureSite, Vec<String>)>,
}

/// Feature matcher - matches parsed lines against patterns
pub struct FeatureMatcher;

impl FeatureMatcher {
    /// Match a line against a pattern (children are not considered)
    ///
    /// # Returns
    /// * `Some(MatchResult)` if every constraint of the pattern holds
    /// * `None` otherwise
    pub fn matches(line: &Line, pattern: &Pattern) -> Option<MatchResult> {
        if line.sequence_type != pattern.sequence_type || line.level != pattern.level {
            return None;
        }

        if let Some(body_type) = pattern.body_type {
            if line.body_type != Some(body_type) {
                return None;
            }
        }

        let mut result = MatchResult::default();

        if let Some(command_matcher) = &pattern.command {
            let command = line.command.as_deref()?;
            let groups = command_matcher.captures(command)?;
            if !groups.is_empty() {
                result.captures.push((CaptureSite::Command, groups));
            }
        }

        // First-available assignment: each descriptor binds the earliest
        // actual parameter not yet taken by a previous descriptor.
        let mut consumed = vec![false; line.parameters.len()];
        for (descriptor_index, descriptor) in pattern.parameters.iter().enumerate() {
            let (actual_index, groups) =
                line.parameters
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| !consumed[*index])
                    .find_map(|(index, parameter)| {
                        let mut groups = descriptor.key.captures(&parameter.key)?;
                        groups.extend(descriptor.value.captures(&parameter.value)?);
                        Some((index, groups))
                    })?;

            consumed[actual_index] = true;
            if !groups.is_empty() {
                result
                    .captures
                    .push((CaptureSite::Parameter(descriptor_index), groups));
            }
        }

        Some(result)
    }

    /// Convenience predicate when captures are not needed
    pub fn is_match(line: &Line, pattern: &Pattern) -> bool {
        Self::matches(line, pattern).is_some()
    }
}
