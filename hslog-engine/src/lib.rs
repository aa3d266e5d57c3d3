//! Hearthstone Log Lifecycle Engine
//!
//! A reusable library that turns the client's textual debug log into a
//! stream of typed lifecycle events.
//!
//! # Architecture
//!
//! ```text
//! raw line -> LineParser -> Line -> StateMachine (FeatureMatcher + PatternLibrary) -> StateEvent
//! ```
//!
//! - [`LineParser`] turns one raw line into a structured [`Line`]
//! - [`PatternLibrary`] holds declarative features for one state family
//! - [`FeatureMatcher`] checks a single line against a single pattern
//! - [`StateMachine`] tracks multi-line blocks and emits events on completion
//! - [`LifecycleEngine`] runs the application and match machines side by side
//!
//! The library does NOT:
//! - Watch log files or locate the client's log directory
//! - Aggregate events into match records
//! - Produce reports
//!
//! Those live in the application layer (hslog-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use hslog_engine::{EngineConfig, LifecycleEngine, LifecycleEvent};
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let config = EngineConfig::new().with_indent_width(2);
//! let mut engine = LifecycleEngine::with_config(config).unwrap();
//!
//! let file = File::open("Power.log").unwrap();
//! for event in engine.replay(BufReader::new(file)) {
//!     match event {
//!         Ok(LifecycleEvent::Match(event)) => {
//!             println!("{} at {}: {:?}", event.state, event.timestamp, event.first_value());
//!         }
//!         Ok(LifecycleEvent::App(event)) => println!("app is now {}", event.state),
//!         Err(e) => eprintln!("Read error: {}", e),
//!     }
//! }
//! ```

pub mod config;
pub mod engine;
pub mod machine;
pub mod matcher;
pub mod parser;
pub mod patterns;
pub mod types;

// Re-export main types for convenience
pub use config::EngineConfig;
pub use engine::{EngineStats, EventStream, LifecycleEngine};
pub use machine::StateMachine;
pub use matcher::{FeatureMatcher, MatchResult};
pub use parser::{parse_line, LineParser};
pub use patterns::{FeatureDef, LibraryStats, MatcherDef, PatternDef, PatternLibrary};
pub use types::{
    AppState, BodyType, Capture, CaptureSite, EngineError, LifecycleEvent, Line,
    LineParseError, MatchState, Parameter, Result, Severity, StateEvent, StateTag, Timestamp,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: ensure we can create an engine
        let engine = LifecycleEngine::new().unwrap();
        assert_eq!(engine.stats(), EngineStats::default());
        assert!(!VERSION.is_empty());
    }
}
