//! Report generation
//!
//! Renders the results of one or more replayed files as plain text or as a
//! single JSON document.

use crate::events::format_event;
use crate::state::{MatchOutcome, MatchRecord};
use anyhow::Result;
use hslog_engine::{AppState, EngineStats, LifecycleEvent};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

/// Results for a single log file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub stats: EngineStats,
    pub final_app_state: Option<AppState>,
    pub matches: Vec<MatchRecord>,
    pub events: Vec<LifecycleEvent>,
}

/// Results for a whole run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub version: &'static str,
    pub files: Vec<FileReport>,
}

impl Report {
    pub fn new(files: Vec<FileReport>) -> Self {
        Self {
            version: hslog_engine::VERSION,
            files,
        }
    }

    pub fn write_json<W: Write>(&self, out: &mut W) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, self)?;
        writeln!(out)?;
        Ok(())
    }

    pub fn write_txt<W: Write>(&self, out: &mut W) -> Result<()> {
        for file in &self.files {
            write_file_txt(file, out)?;
        }
        Ok(())
    }
}

fn write_file_txt<W: Write>(file: &FileReport, out: &mut W) -> Result<()> {
    writeln!(out, "═══════════════════════════════════════════════")?;
    writeln!(out, "  {}", file.path.display())?;
    writeln!(out, "═══════════════════════════════════════════════")?;

    writeln!(out, "\nEvents ({}):", file.events.len())?;
    for event in &file.events {
        writeln!(out, "  {}", format_event(event))?;
    }

    writeln!(out, "\nMatches ({}):", file.matches.len())?;
    for (index, record) in file.matches.iter().enumerate() {
        write_match_txt(index + 1, record, out)?;
    }

    let stats = &file.stats;
    writeln!(out, "\nSummary:")?;
    writeln!(out, "  Lines:          {}", stats.lines)?;
    writeln!(out, "  Parse failures: {}", stats.parse_failures)?;
    writeln!(out, "  Orphan lines:   {}", stats.orphans)?;
    writeln!(out, "  App events:     {}", stats.app_events)?;
    writeln!(out, "  Match events:   {}", stats.match_events)?;
    if let Some(state) = file.final_app_state {
        writeln!(out, "  Final phase:    {}", state)?;
    }
    writeln!(out)?;

    Ok(())
}

fn write_match_txt<W: Write>(number: usize, record: &MatchRecord, out: &mut W) -> Result<()> {
    let outcome = match record.outcome {
        MatchOutcome::InProgress => "in progress",
        MatchOutcome::Completed => "completed",
        MatchOutcome::Abandoned => "abandoned",
    };

    writeln!(
        out,
        "  #{} started {} (line {}), {}",
        number,
        record.started_at.format("%H:%M:%S"),
        record.start_line,
        outcome
    )?;
    if !record.candidates.is_empty() {
        writeln!(out, "     offered:  {}", record.candidates.join(", "))?;
    }
    if let Some(hero) = &record.hero {
        writeln!(out, "     hero:     {}", hero)?;
    }
    if !record.opponents.is_empty() {
        writeln!(out, "     opponents: {}", record.opponents.join(", "))?;
    }
    if let Some(place) = record.final_placement {
        writeln!(out, "     placement: #{}", place)?;
    }
    if let Some(duration) = record.duration() {
        writeln!(
            out,
            "     duration: {}m {:02}s",
            duration.num_minutes(),
            duration.num_seconds() % 60
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SessionTracker;
    use hslog_engine::LifecycleEngine;

    const LOG: &str = "\
D 21:05:01.1034761 GameState.DebugPrintPower() - CREATE_GAME
D 21:05:45.4912836 GameState.SendChoices() - id=1 ChoiceType=MULLIGAN
D 21:05:45.4912836 GameState.SendChoices() -   m_chosenEntities[0]=[entityName=Sire Denathrius id=78 zone=HAND zonePos=2 cardId=TB_BaconShop_HERO_76 player=3]
D 21:21:10.0045120 GameState.DebugPrintPower() - TAG_CHANGE Entity=[entityName=Sire Denathrius id=78 zone=PLAY zonePos=0 cardId=TB_BaconShop_HERO_76 player=3] tag=PLAYER_LEADERBOARD_PLACE value=2
D 21:21:43.7370339 GameState.DebugPrintPower() - TAG_CHANGE Entity=GameEntity tag=STATE value=COMPLETE
";

    fn report() -> Report {
        let mut engine = LifecycleEngine::new().unwrap();
        let mut tracker = SessionTracker::new();
        let mut events = Vec::new();
        for raw in LOG.lines() {
            events.extend(engine.process(raw));
        }
        events.extend(engine.flush());
        for event in &events {
            tracker.observe(event);
        }

        Report::new(vec![FileReport {
            path: PathBuf::from("Power.log"),
            stats: engine.stats(),
            final_app_state: tracker.app_state(),
            matches: tracker.finish(),
            events,
        }])
    }

    #[test]
    fn test_txt_report() {
        let mut out = Vec::new();
        report().write_txt(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Events (4):"));
        assert!(text.contains("hero:     Sire Denathrius"));
        assert!(text.contains("placement: #2"));
        assert!(text.contains("completed"));
        assert!(text.contains("duration: 16m 42s"));
    }

    #[test]
    fn test_json_report() {
        let mut out = Vec::new();
        report().write_json(&mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        let file = &value["files"][0];
        assert_eq!(file["stats"]["match_events"], 4);
        assert_eq!(file["matches"][0]["outcome"], "completed");
        assert_eq!(file["matches"][0]["final_placement"], 2);
        assert_eq!(file["events"][1]["state"], "HERO_CHOSEN");
    }
}
