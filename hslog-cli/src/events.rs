//! Event formatting for the text report

use hslog_engine::{LifecycleEvent, MatchState};

/// Human-readable summary of an event's captures
pub fn describe(event: &LifecycleEvent) -> String {
    match event {
        LifecycleEvent::App(_) => String::new(),
        LifecycleEvent::Match(event) => {
            let values: Vec<&str> = event.values().collect();
            match (event.state, values.as_slice()) {
                (MatchState::Ranking, [hero, place, ..]) => format!("{} -> #{}", hero, place),
                (MatchState::HeroCandidates, names) => format!("offered: {}", names.join(", ")),
                (MatchState::HeroChosen | MatchState::OpponentRevealed, [name, ..]) => {
                    name.to_string()
                }
                (_, values) => values.join(", "),
            }
        }
    }
}

/// One line of the event listing
pub fn format_event(event: &LifecycleEvent) -> String {
    let line = format!(
        "{} line {:>7}  {:<5} {:<17}",
        event.timestamp().format("%H:%M:%S%.3f"),
        event.line_number(),
        event.family(),
        event.state_name()
    );

    let detail = describe(event);
    if detail.is_empty() {
        line.trim_end().to_string()
    } else {
        format!("{} {}", line, detail)
    }
}
