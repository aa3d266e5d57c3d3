//! Lifecycle engine
//!
//! This module provides the primary interface for the library. The
//! [`LifecycleEngine`] owns one [`LineParser`] and the two lifecycle
//! [`StateMachine`]s, numbers incoming lines and merges the events of both
//! machines into one ordered stream.

use crate::config::EngineConfig;
use crate::machine::StateMachine;
use crate::parser::LineParser;
use crate::patterns::PatternLibrary;
use crate::types::{
    AppState, EngineError, LifecycleEvent, Line, LineParseError, MatchState, Result, StateEvent,
    Timestamp,
};
use chrono::Duration;
use serde::Serialize;
use std::collections::VecDeque;
use std::io::{self, BufRead};

/// Counters collected while lines are fed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Raw lines seen, blank ones included
    pub lines: u64,
    /// Non-blank lines the parser rejected
    pub parse_failures: u64,
    /// Nested lines seen before any top-level line
    pub orphans: u64,
    pub app_events: u64,
    pub match_events: u64,
}

impl EngineStats {
    pub fn events(&self) -> u64 {
        self.app_events + self.match_events
    }
}

/// The main engine struct - entry point for turning log lines into lifecycle events
#[derive(Debug, Clone)]
pub struct LifecycleEngine {
    config: EngineConfig,
    parser: LineParser,
    app: Option<StateMachine<AppState>>,
    game: Option<StateMachine<MatchState>>,
    /// Number of the last line fed (1-based)
    line_number: u64,
    last_timestamp: Option<Timestamp>,
    /// A level-0 line has been seen since start or the last reset
    has_context: bool,
    stats: EngineStats,
}

impl LifecycleEngine {
    /// Create an engine with the default configuration and built-in libraries
    pub fn new() -> Result<Self> {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with the built-in libraries
    ///
    /// # Arguments
    /// * `config` - Engine configuration, validated before use
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        Self::with_libraries(
            config,
            PatternLibrary::app_lifecycle()?,
            PatternLibrary::match_lifecycle()?,
        )
    }

    /// Create an engine from caller-supplied libraries
    ///
    /// Machines disabled in `config` are not built and their library is dropped.
    ///
    /// # Returns
    /// * `Err(EngineError::InvalidConfig)` if the configuration is unusable
    pub fn with_libraries(
        config: EngineConfig,
        app: PatternLibrary<AppState>,
        game: PatternLibrary<MatchState>,
    ) -> Result<Self> {
        config.validate()?;

        log::info!(
            "Lifecycle engine ready: app features={} match features={} indent={}",
            if config.track_app_lifecycle { app.len() } else { 0 },
            if config.track_match_lifecycle { game.len() } else { 0 },
            config.indent_width
        );

        Ok(Self {
            parser: LineParser::from_config(&config),
            app: config.track_app_lifecycle.then(|| StateMachine::new(app)),
            game: config.track_match_lifecycle.then(|| StateMachine::new(game)),
            config,
            line_number: 0,
            last_timestamp: None,
            has_context: false,
            stats: EngineStats::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Number of the last line fed, 0 before the first one
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Parse and feed one raw line
    ///
    /// Lines the parser rejects still take a line number, so event line
    /// numbers always point into the source text.
    pub fn process(&mut self, raw: &str) -> Vec<LifecycleEvent> {
        self.line_number += 1;
        self.stats.lines += 1;

        match self.parser.parse(raw) {
            Ok(line) => self.dispatch(&line),
            Err(LineParseError::Empty) => Vec::new(),
            Err(e) => {
                log::debug!("Skipping line {}: {}", self.line_number, e);
                self.stats.parse_failures += 1;
                Vec::new()
            }
        }
    }

    /// Feed an already parsed line
    pub fn feed(&mut self, line: &Line) -> Vec<LifecycleEvent> {
        self.line_number += 1;
        self.stats.lines += 1;
        self.dispatch(line)
    }

    /// Force-close every open block and return the resulting events
    ///
    /// Calling it twice in a row yields nothing the second time.
    pub fn flush(&mut self) -> Vec<LifecycleEvent> {
        let app = self.app.as_mut().map(StateMachine::flush).unwrap_or_default();
        let game = self.game.as_mut().map(StateMachine::flush).unwrap_or_default();
        self.merge(app, game)
    }

    /// Return both machines to Idle
    ///
    /// Partial captures are discarded. Line numbering continues and
    /// statistics are kept.
    pub fn reset(&mut self) {
        log::debug!("Resetting lifecycle engine at line {}", self.line_number);
        if let Some(app) = self.app.as_mut() {
            app.reset();
        }
        if let Some(game) = self.game.as_mut() {
            game.reset();
        }
        self.last_timestamp = None;
        self.has_context = false;
    }

    /// Replay a whole source, flushing at the end
    ///
    /// # Example
    /// ```no_run
    /// use hslog_engine::LifecycleEngine;
    /// use std::fs::File;
    /// use std::io::BufReader;
    ///
    /// let mut engine = LifecycleEngine::new().unwrap();
    /// let file = File::open("Power.log").unwrap();
    ///
    /// for event in engine.replay(BufReader::new(file)) {
    ///     match event {
    ///         Ok(event) => println!("{} at line {}", event.state_name(), event.line_number()),
    ///         Err(e) => eprintln!("Error: {}", e),
    ///     }
    /// }
    /// ```
    pub fn replay<R: BufRead>(&mut self, reader: R) -> EventStream<'_, io::Lines<R>> {
        self.replay_lines(reader.lines())
    }

    /// Replay from any source of lines, flushing at the end
    pub fn replay_lines<I>(&mut self, lines: I) -> EventStream<'_, I>
    where
        I: Iterator<Item = io::Result<String>>,
    {
        EventStream::new(self, lines)
    }

    fn dispatch(&mut self, line: &Line) -> Vec<LifecycleEvent> {
        self.check_clock(line.timestamp);

        if line.is_top_level() {
            self.has_context = true;
        } else if !self.has_context {
            log::debug!(
                "Orphan level {} line {} ({}) ignored",
                line.level,
                self.line_number,
                line.sequence_type
            );
            self.stats.orphans += 1;
            return Vec::new();
        }

        let line_number = self.line_number;
        let app = match self.app.as_mut() {
            Some(machine) => machine.feed(line, line_number),
            None => Vec::new(),
        };
        let game = match self.game.as_mut() {
            Some(machine) => machine.feed(line, line_number),
            None => Vec::new(),
        };

        self.merge(app, game)
    }

    fn merge(
        &mut self,
        app: Vec<StateEvent<AppState>>,
        game: Vec<StateEvent<MatchState>>,
    ) -> Vec<LifecycleEvent> {
        self.stats.app_events += app.len() as u64;
        self.stats.match_events += game.len() as u64;

        let mut events: Vec<LifecycleEvent> = app
            .into_iter()
            .map(LifecycleEvent::App)
            .chain(game.into_iter().map(LifecycleEvent::Match))
            .collect();

        // Stable: on equal root lines app events come first
        events.sort_by_key(LifecycleEvent::line_number);
        events
    }

    fn check_clock(&mut self, timestamp: Timestamp) {
        if let Some(previous) = self.last_timestamp {
            if self.config.warn_on_clock_regression && timestamp < previous {
                // A jump back of more than half a day is the midnight wrap
                if previous - timestamp < Duration::hours(12) {
                    log::warn!(
                        "Clock went backwards at line {}: {} after {}",
                        self.line_number,
                        timestamp,
                        previous
                    );
                }
            }
        }
        self.last_timestamp = Some(timestamp);
    }
}

/// Iterator that replays lines through the engine
///
/// Events completed by one line are queued and handed out in order; when
/// the source is exhausted the engine is flushed once.
pub struct EventStream<'a, I>
where
    I: Iterator<Item = io::Result<String>>,
{
    engine: &'a mut LifecycleEngine,
    lines: I,
    pending_events: VecDeque<LifecycleEvent>,
    flushed: bool,
}

impl<'a, I> EventStream<'a, I>
where
    I: Iterator<Item = io::Result<String>>,
{
    fn new(engine: &'a mut LifecycleEngine, lines: I) -> Self {
        Self {
            engine,
            lines,
            pending_events: VecDeque::new(),
            flushed: false,
        }
    }

    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }
}

impl<'a, I> Iterator for EventStream<'a, I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = Result<LifecycleEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending_events.pop_front() {
                return Some(Ok(event));
            }

            if self.flushed {
                return None;
            }

            match self.lines.next() {
                Some(Ok(raw)) => self.pending_events.extend(self.engine.process(&raw)),
                Some(Err(e)) => return Some(Err(EngineError::IoError(e))),
                None => {
                    self.flushed = true;
                    self.pending_events.extend(self.engine.flush());
                }
            }
        }
    }
}
