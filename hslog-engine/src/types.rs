//! Core types for the log lifecycle engine
//!
//! This module defines the structured form of a log line, the closed state
//! enumerations produced by the two pattern families, and the events the
//! engine emits. Lines are transient; events are immutable and owned by
//! whoever receives them.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used throughout the engine (time of day from the line prefix)
pub type Timestamp = NaiveTime;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Severity marker at the start of every log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Map the single-character marker (`D`, `I`, `W`, `E`) to a severity
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            'D' => Some(Severity::Debug),
            'I' => Some(Severity::Info),
            'W' => Some(Severity::Warning),
            'E' => Some(Severity::Error),
            _ => None,
        }
    }
}

/// Classification of the free-text body that follows the origin tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyType {
    /// Bare text only, no top-level `key=value` pair
    Command,
    /// One or more `key=value` pairs and no leading bare text
    Parameter,
    /// Leading bare text followed by one or more `key=value` pairs
    CommandWithParameter,
}

impl fmt::Display for BodyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyType::Command => write!(f, "command"),
            BodyType::Parameter => write!(f, "parameter"),
            BodyType::CommandWithParameter => write!(f, "commandWithParameter"),
        }
    }
}

/// A single `key=value` pair extracted from a line body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

impl Parameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One parsed log record
///
/// Produced by [`crate::LineParser`] and consumed by the state machines.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Time of day from the line prefix
    pub timestamp: Timestamp,
    /// Severity marker
    pub severity: Severity,
    /// Nesting depth (0 = top-level statement)
    pub level: usize,
    /// Origin tag without the trailing `()`, e.g. `GameState.DebugPrintPower`
    pub sequence_type: String,
    /// Body classification, `None` when the line carries no body at all
    pub body_type: Option<BodyType>,
    /// Bare leading text, when present
    pub command: Option<String>,
    /// Parameters in the order they appear; keys may repeat
    pub parameters: Vec<Parameter>,
}

impl Line {
    /// Look up the first parameter with the given key
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|parameter| parameter.key == key)
            .map(|parameter| parameter.value.as_str())
    }

    pub fn is_top_level(&self) -> bool {
        self.level == 0
    }
}

/// Common bound for the closed state enumerations of a pattern family
pub trait StateTag: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Short name of the family, used in log output
    const FAMILY: &'static str;
}

/// Coarse phase of the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppState {
    /// Client finished starting up and reached the login scene
    Awake,
    /// Battlegrounds was selected from the game-mode screen
    ModeSelected,
    /// Leaving the Battlegrounds lobby for gameplay
    MatchStarted,
    /// Gameplay scene destroyed
    MatchEnded,
    /// Host box destroyed (client closing or switching away)
    Destroyed,
}

impl AppState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::Awake => "AWAKE",
            AppState::ModeSelected => "MODE_SELECTED",
            AppState::MatchStarted => "MATCH_STARTED",
            AppState::MatchEnded => "MATCH_ENDED",
            AppState::Destroyed => "DESTROYED",
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateTag for AppState {
    const FAMILY: &'static str = "app";
}

/// Phase within a single match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchState {
    GameStart,
    /// Hero candidates offered to the player
    HeroCandidates,
    /// Hero actually picked by the player
    HeroChosen,
    /// An opponent hero was revealed while the match is running
    OpponentRevealed,
    /// A leaderboard place was assigned to a hero
    Ranking,
    GameOver,
}

impl MatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchState::GameStart => "GAME_START",
            MatchState::HeroCandidates => "HERO_CANDIDATES",
            MatchState::HeroChosen => "HERO_CHOSEN",
            MatchState::OpponentRevealed => "OPPONENT_REVEALED",
            MatchState::Ranking => "RANKING",
            MatchState::GameOver => "GAME_OVER",
        }
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateTag for MatchState {
    const FAMILY: &'static str = "match";
}

/// Where inside a matched line a capture came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureSite {
    /// The command matcher
    Command,
    /// The parameter descriptor at this position
    Parameter(usize),
}

/// Regex capture groups pulled from one line of a matched block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capture {
    /// Position of the contributing line inside its block (0 = root line)
    pub line: usize,
    pub site: CaptureSite,
    /// Capture groups in order (key groups first, then value groups)
    pub values: Vec<String>,
}

/// The engine's output unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateEvent<S> {
    pub state: S,
    /// Timestamp of the root line of the matched block
    pub timestamp: Timestamp,
    /// Sequence number of the root line in the fed stream (1-based)
    pub line_number: u64,
    pub captures: Vec<Capture>,
}

impl<S> StateEvent<S> {
    /// All captured values, in block line order
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.captures
            .iter()
            .flat_map(|capture| capture.values.iter().map(String::as_str))
    }

    pub fn first_value(&self) -> Option<&str> {
        self.values().next()
    }
}

/// An event from either of the two lifecycle machines
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "machine", rename_all = "lowercase")]
pub enum LifecycleEvent {
    App(StateEvent<AppState>),
    Match(StateEvent<MatchState>),
}

impl LifecycleEvent {
    pub fn line_number(&self) -> u64 {
        match self {
            LifecycleEvent::App(event) => event.line_number,
            LifecycleEvent::Match(event) => event.line_number,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            LifecycleEvent::App(event) => event.timestamp,
            LifecycleEvent::Match(event) => event.timestamp,
        }
    }

    /// Serialized name of the state carried by this event
    pub fn state_name(&self) -> &'static str {
        match self {
            LifecycleEvent::App(event) => event.state.as_str(),
            LifecycleEvent::Match(event) => event.state.as_str(),
        }
    }

    pub fn captures(&self) -> &[Capture] {
        match self {
            LifecycleEvent::App(event) => &event.captures,
            LifecycleEvent::Match(event) => &event.captures,
        }
    }

    /// Get the family name of the machine that produced this event
    pub fn family(&self) -> &'static str {
        match self {
            LifecycleEvent::App(_) => AppState::FAMILY,
            LifecycleEvent::Match(_) => MatchState::FAMILY,
        }
    }
}

/// Reasons a raw line could not be turned into a [`Line`]
///
/// Always recoverable: the caller skips the line and continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineParseError {
    #[error("Empty line")]
    Empty,

    #[error("Unrecognized line shape: {0}")]
    UnrecognizedShape(String),

    #[error("Unknown severity marker '{0}'")]
    UnknownSeverity(char),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Missing body separator after origin tag: {0}")]
    MissingSeparator(String),
}

/// Errors raised while building the engine
///
/// These are configuration-time failures; per-line processing never errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid feature definition: {0}")]
    InvalidFeature(String),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
