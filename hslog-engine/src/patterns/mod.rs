//! Pattern library
//!
//! This module contains the declarative feature descriptors and the two
//! built-in feature tables (application lifecycle and match lifecycle).

pub mod feature;
pub mod library;

// Re-export key types for convenience
pub use feature::{
    lit, pat, Feature, FeatureDef, Matcher, MatcherDef, ParameterDef, ParameterMatcher, Pattern,
    PatternDef,
};
pub use library::{app_lifecycle_defs, match_lifecycle_defs, LibraryStats, PatternLibrary};
