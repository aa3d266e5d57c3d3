//! Session tracking
//!
//! Folds the engine's lifecycle events into per-match records: which heroes
//! were offered, which one was picked, the leaderboard places seen along the
//! way and how the match ended.

use chrono::Duration;
use hslog_engine::{AppState, LifecycleEvent, MatchState, StateEvent, Timestamp};
use serde::Serialize;
use std::collections::BTreeMap;

/// How a match record was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOutcome {
    /// Still running when the record was taken
    InProgress,
    /// The game reached its final state
    Completed,
    /// Gameplay ended, the client closed, or a new game began before completion
    Abandoned,
}

/// Everything learned about one match
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub started_at: Timestamp,
    /// Source line of the game start
    pub start_line: u64,
    pub candidates: Vec<String>,
    pub hero: Option<String>,
    /// Opponent heroes in reveal order, without duplicates
    pub opponents: Vec<String>,
    /// Latest leaderboard place seen per hero
    pub placements: BTreeMap<String, u32>,
    /// Latest leaderboard place of the chosen hero
    pub final_placement: Option<u32>,
    pub ended_at: Option<Timestamp>,
    pub outcome: MatchOutcome,
}

impl MatchRecord {
    fn new(event: &StateEvent<MatchState>) -> Self {
        Self {
            started_at: event.timestamp,
            start_line: event.line_number,
            candidates: Vec::new(),
            hero: None,
            opponents: Vec::new(),
            placements: BTreeMap::new(),
            final_placement: None,
            ended_at: None,
            outcome: MatchOutcome::InProgress,
        }
    }

    /// Wall-clock length of the match, allowing for one midnight wrap
    pub fn duration(&self) -> Option<Duration> {
        let ended_at = self.ended_at?;
        let elapsed = ended_at - self.started_at;
        if elapsed < Duration::zero() {
            Some(elapsed + Duration::days(1))
        } else {
            Some(elapsed)
        }
    }

    fn record_placement(&mut self, hero: &str, place: u32) {
        self.placements.insert(hero.to_string(), place);
        if self.hero.as_deref() == Some(hero) {
            self.final_placement = Some(place);
        }
    }

    fn close(mut self, outcome: MatchOutcome, at: Timestamp) -> Self {
        self.outcome = outcome;
        self.ended_at = Some(at);
        self
    }
}

/// Tracks the application phase and builds match records from events
#[derive(Debug, Default)]
pub struct SessionTracker {
    app_state: Option<AppState>,
    current: Option<MatchRecord>,
    finished: Vec<MatchRecord>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest application phase seen
    pub fn app_state(&self) -> Option<AppState> {
        self.app_state
    }

    /// The match currently being recorded
    pub fn current(&self) -> Option<&MatchRecord> {
        self.current.as_ref()
    }

    pub fn finished(&self) -> &[MatchRecord] {
        &self.finished
    }

    pub fn observe(&mut self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::App(event) => self.observe_app(event),
            LifecycleEvent::Match(event) => self.observe_match(event),
        }
    }

    /// All records, the open one included with outcome `InProgress`
    pub fn finish(mut self) -> Vec<MatchRecord> {
        self.finished.extend(self.current.take());
        self.finished
    }

    fn observe_app(&mut self, event: &StateEvent<AppState>) {
        self.app_state = Some(event.state);

        if matches!(event.state, AppState::MatchEnded | AppState::Destroyed) {
            self.close_current(MatchOutcome::Abandoned, event.timestamp);
        }
    }

    fn observe_match(&mut self, event: &StateEvent<MatchState>) {
        if event.state == MatchState::GameStart {
            self.close_current(MatchOutcome::Abandoned, event.timestamp);
            log::debug!("Match started at line {}", event.line_number);
            self.current = Some(MatchRecord::new(event));
            return;
        }

        let Some(record) = self.current.as_mut() else {
            log::debug!(
                "{} at line {} outside of a match, ignored",
                event.state,
                event.line_number
            );
            return;
        };

        match event.state {
            MatchState::GameStart => {}
            MatchState::HeroCandidates => {
                record.candidates = event.values().map(str::to_string).collect();
            }
            MatchState::HeroChosen => {
                record.hero = event.first_value().map(str::to_string);
                if let Some(hero) = &record.hero {
                    record.final_placement = record.placements.get(hero).copied();
                }
            }
            MatchState::OpponentRevealed => {
                if let Some(name) = event.first_value() {
                    let is_new = record.hero.as_deref() != Some(name)
                        && !record.opponents.iter().any(|opponent| opponent == name);
                    if is_new {
                        record.opponents.push(name.to_string());
                    }
                }
            }
            MatchState::Ranking => {
                let mut values = event.values();
                match (values.next(), values.next().and_then(|place| place.parse::<u32>().ok())) {
                    (Some(hero), Some(place)) => record.record_placement(hero, place),
                    _ => log::warn!("Malformed ranking at line {}", event.line_number),
                }
            }
            MatchState::GameOver => {
                self.close_current(MatchOutcome::Completed, event.timestamp);
            }
        }
    }

    fn close_current(&mut self, outcome: MatchOutcome, at: Timestamp) {
        if let Some(record) = self.current.take() {
            log::debug!("Match from line {} closed as {:?}", record.start_line, outcome);
            self.finished.push(record.close(outcome, at));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hslog_engine::{Capture, CaptureSite};

    fn at(h: u32, m: u32, s: u32) -> Timestamp {
        Timestamp::from_hms_opt(h, m, s).unwrap()
    }

    fn match_event(state: MatchState, line: u64, values: &[&str]) -> LifecycleEvent {
        LifecycleEvent::Match(StateEvent {
            state,
            timestamp: at(21, 0, line as u32 % 60),
            line_number: line,
            captures: values
                .iter()
                .enumerate()
                .map(|(index, value)| Capture {
                    line: index,
                    site: CaptureSite::Parameter(0),
                    values: vec![value.to_string()],
                })
                .collect(),
        })
    }

    fn app_event(state: AppState, line: u64) -> LifecycleEvent {
        LifecycleEvent::App(StateEvent {
            state,
            timestamp: at(21, 30, 0),
            line_number: line,
            captures: Vec::new(),
        })
    }

    #[test]
    fn test_completed_match_record() {
        let mut tracker = SessionTracker::new();
        for event in [
            app_event(AppState::MatchStarted, 1),
            match_event(MatchState::GameStart, 2, &[]),
            match_event(MatchState::HeroCandidates, 3, &["Ragnaros", "Sire Denathrius"]),
            match_event(MatchState::HeroChosen, 8, &["Sire Denathrius"]),
            match_event(MatchState::OpponentRevealed, 10, &["The Lich King"]),
            match_event(MatchState::OpponentRevealed, 11, &["The Lich King"]),
            match_event(MatchState::Ranking, 20, &["The Lich King", "8"]),
            match_event(MatchState::Ranking, 21, &["Sire Denathrius", "3"]),
            match_event(MatchState::Ranking, 22, &["Sire Denathrius", "2"]),
            match_event(MatchState::GameOver, 30, &[]),
            app_event(AppState::MatchEnded, 31),
        ] {
            tracker.observe(&event);
        }

        assert_eq!(tracker.app_state(), Some(AppState::MatchEnded));
        let records = tracker.finish();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.outcome, MatchOutcome::Completed);
        assert_eq!(record.start_line, 2);
        assert_eq!(record.candidates, vec!["Ragnaros", "Sire Denathrius"]);
        assert_eq!(record.hero.as_deref(), Some("Sire Denathrius"));
        assert_eq!(record.opponents, vec!["The Lich King"]);
        assert_eq!(record.placements.get("The Lich King"), Some(&8));
        assert_eq!(record.final_placement, Some(2));
        assert_eq!(record.ended_at, Some(at(21, 0, 30)));
    }

    #[test]
    fn test_new_game_abandons_previous_one() {
        let mut tracker = SessionTracker::new();
        tracker.observe(&match_event(MatchState::GameStart, 1, &[]));
        tracker.observe(&match_event(MatchState::GameStart, 5, &[]));

        assert_eq!(tracker.finished().len(), 1);
        assert_eq!(tracker.finished()[0].outcome, MatchOutcome::Abandoned);
        assert_eq!(tracker.current().map(|record| record.start_line), Some(5));
    }

    #[test]
    fn test_client_closing_abandons_match() {
        let mut tracker = SessionTracker::new();
        tracker.observe(&match_event(MatchState::GameStart, 1, &[]));
        tracker.observe(&app_event(AppState::Destroyed, 2));

        let records = tracker.finish();
        assert_eq!(records[0].outcome, MatchOutcome::Abandoned);
    }

    #[test]
    fn test_open_match_is_reported_in_progress() {
        let mut tracker = SessionTracker::new();
        tracker.observe(&match_event(MatchState::GameStart, 1, &[]));

        let records = tracker.finish();
        assert_eq!(records[0].outcome, MatchOutcome::InProgress);
        assert!(records[0].ended_at.is_none());
        assert!(records[0].duration().is_none());
    }

    #[test]
    fn test_events_outside_a_match_are_ignored() {
        let mut tracker = SessionTracker::new();
        tracker.observe(&match_event(MatchState::HeroChosen, 1, &["Nobody"]));
        tracker.observe(&match_event(MatchState::GameOver, 2, &[]));

        assert!(tracker.finish().is_empty());
    }

    #[test]
    fn test_duration_across_midnight() {
        let mut tracker = SessionTracker::new();
        tracker.observe(&LifecycleEvent::Match(StateEvent {
            state: MatchState::GameStart,
            timestamp: at(23, 50, 0),
            line_number: 1,
            captures: Vec::new(),
        }));
        tracker.observe(&LifecycleEvent::Match(StateEvent {
            state: MatchState::GameOver,
            timestamp: at(0, 10, 0),
            line_number: 2,
            captures: Vec::new(),
        }));

        let records = tracker.finish();
        assert_eq!(records[0].duration(), Some(Duration::minutes(20)));
    }
}
