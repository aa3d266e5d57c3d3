//! State Engine
//!
//! A [`StateMachine`] walks one [`PatternLibrary`] over an ordered stream of
//! lines. Every feature in the library has its own tracker, so several
//! multi-line blocks can be open at once.
//!
//! Per tracker:
//! - **Idle**: level-0 lines are tried against the feature's root pattern.
//! - **Root matched**: a root without children emits at once; otherwise the
//!   tracker opens a block and awaits children.
//! - **Awaiting children**: child-level lines advance a cursor through the
//!   ordered child list. The first line nothing accepts completes the block,
//!   which is emitted with whatever children were consumed, zero included.
//!   Level-0 lines and lines nested deeper than any open child expects are
//!   never accepted. The closing line is then re-tried from Idle.
//!
//! Within one `feed`, completed blocks are emitted before new root matches,
//! so the output is ordered by root line number.

use crate::matcher::{FeatureMatcher, MatchResult};
use crate::patterns::{Feature, Pattern, PatternLibrary};
use crate::types::{Capture, Line, StateEvent, StateTag, Timestamp};

#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Position of this frame's pattern in its parent's children (unused for the root)
    index: usize,
    /// Child to try next
    cursor: usize,
    /// The child at `cursor` has already matched at least once
    cursor_matched: bool,
}

impl Frame {
    fn new(index: usize) -> Self {
        Self {
            index,
            cursor: 0,
            cursor_matched: false,
        }
    }
}

enum Step {
    /// The line belongs to the block
    Consumed,
    /// The block is complete; the line was not consumed
    Closed,
}

/// A block whose root matched and which is awaiting child lines
#[derive(Debug, Clone)]
struct OpenBlock {
    timestamp: Timestamp,
    line_number: u64,
    captures: Vec<Capture>,
    /// One frame per open nesting level, root first
    frames: Vec<Frame>,
    /// Child lines consumed so far
    consumed: usize,
    /// Lines fed since the root line
    followers: usize,
}

impl OpenBlock {
    fn open(line: &Line, line_number: u64, root_match: MatchResult) -> Self {
        let mut block = Self {
            timestamp: line.timestamp,
            line_number,
            captures: Vec::new(),
            frames: vec![Frame::new(0)],
            consumed: 0,
            followers: 0,
        };
        block.record(0, root_match);
        block
    }

    fn record(&mut self, line: usize, result: MatchResult) {
        self.captures.extend(
            result
                .captures
                .into_iter()
                .map(|(site, values)| Capture { line, site, values }),
        );
    }

    fn advance(&mut self, root: &Pattern, line: &Line) -> Step {
        self.followers += 1;

        if line.level == 0 {
            return Step::Closed;
        }

        if line.level > self.frames.len() {
            log::trace!(
                "Level {} line closes block opened at line {}",
                line.level,
                self.line_number
            );
            return Step::Closed;
        }

        self.frames.truncate(line.level);
        let parent = pattern_at(root, &self.frames);
        let Some(frame) = self.frames.last_mut() else {
            return Step::Closed;
        };

        let mut index = frame.cursor;
        while let Some(child) = parent.children.get(index) {
            if let Some(result) = FeatureMatcher::matches(line, child) {
                if parent.child_repeats(index) {
                    frame.cursor = index;
                    frame.cursor_matched = true;
                } else {
                    frame.cursor = index + 1;
                    frame.cursor_matched = false;
                }

                if child.has_children() {
                    self.frames.push(Frame::new(index));
                }

                self.consumed += 1;
                self.record(self.consumed, result);
                return Step::Consumed;
            }

            let can_step_over = child.optional || (index == frame.cursor && frame.cursor_matched);
            if !can_step_over {
                break;
            }
            index += 1;
        }

        Step::Closed
    }

    fn finish<S>(self, state: S) -> StateEvent<S> {
        StateEvent {
            state,
            timestamp: self.timestamp,
            line_number: self.line_number,
            captures: self.captures,
        }
    }
}

/// Resolve the pattern owning the innermost frame
fn pattern_at<'a>(root: &'a Pattern, frames: &[Frame]) -> &'a Pattern {
    frames
        .iter()
        .skip(1)
        .fold(root, |pattern, frame| &pattern.children[frame.index])
}

/// Whether another feature with the same origin tag claims this line as its root
fn has_competing_root<S>(features: &[Feature<S>], index: usize, line: &Line) -> bool {
    let open_root = &features[index].root;
    features.iter().enumerate().any(|(other, feature)| {
        other != index
            && feature.root.sequence_type == open_root.sequence_type
            && feature.root.level == open_root.level
            && FeatureMatcher::is_match(line, &feature.root)
    })
}

/// Line-at-a-time matcher over one pattern library
///
/// Not synchronized: lines must be fed sequentially.
#[derive(Debug, Clone)]
pub struct StateMachine<S> {
    library: PatternLibrary<S>,
    /// One slot per feature, parallel to `library.features()`
    open: Vec<Option<OpenBlock>>,
}

impl<S: StateTag> StateMachine<S> {
    pub fn new(library: PatternLibrary<S>) -> Self {
        let open = vec![None; library.len()];
        Self { library, open }
    }

    pub fn library(&self) -> &PatternLibrary<S> {
        &self.library
    }

    /// Number of blocks currently awaiting children
    pub fn open_blocks(&self) -> usize {
        self.open.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_idle(&self) -> bool {
        self.open_blocks() == 0
    }

    /// Feed the next line of the stream
    ///
    /// # Arguments
    /// * `line` - Parsed line
    /// * `line_number` - Position of the line in the stream, carried into events
    ///
    /// # Returns
    /// Events completed by this line, ordered by root line number
    pub fn feed(&mut self, line: &Line, line_number: u64) -> Vec<StateEvent<S>> {
        let features = self.library.features();
        let mut events = Vec::new();

        for (index, slot) in self.open.iter_mut().enumerate() {
            let Some(block) = slot.as_mut() else {
                continue;
            };
            let feature = &features[index];

            if line.level == 0
                && block.followers == 0
                && has_competing_root(features, index, line)
            {
                log::debug!(
                    "[{}] {} abandoned: line {} starts a competing {} block",
                    S::FAMILY,
                    feature.state,
                    block.line_number,
                    line.sequence_type
                );
                *slot = None;
                continue;
            }

            if let Step::Closed = block.advance(&feature.root, line) {
                if let Some(block) = slot.take() {
                    log::debug!(
                        "[{}] {} completed with {} child line(s)",
                        S::FAMILY,
                        feature.state,
                        block.consumed
                    );
                    events.push(block.finish(feature.state));
                }
            }
        }

        if line.level != 0 {
            return events;
        }

        for (index, feature) in features.iter().enumerate() {
            if self.open[index].is_some() {
                continue;
            }
            let Some(result) = FeatureMatcher::matches(line, &feature.root) else {
                continue;
            };

            let block = OpenBlock::open(line, line_number, result);
            if feature.root.has_children() {
                log::trace!("[{}] {} opened at line {}", S::FAMILY, feature.state, line_number);
                self.open[index] = Some(block);
            } else {
                log::debug!("[{}] {} matched at line {}", S::FAMILY, feature.state, line_number);
                events.push(block.finish(feature.state));
            }
        }

        events
    }

    /// Close every open block as complete with the children seen so far
    ///
    /// Calling it again without an intervening `feed` yields nothing.
    pub fn flush(&mut self) -> Vec<StateEvent<S>> {
        let features = self.library.features();
        let mut events: Vec<StateEvent<S>> = self
            .open
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| {
                let block = slot.take()?;
                log::debug!(
                    "[{}] {} flushed with {} child line(s)",
                    S::FAMILY,
                    features[index].state,
                    block.consumed
                );
                Some(block.finish(features[index].state))
            })
            .collect();

        events.sort_by_key(|event| event.line_number);
        events
    }

    /// Return to Idle, discarding partial captures
    pub fn reset(&mut self) {
        for slot in &mut self.open {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    use crate::patterns::{lit, pat, FeatureDef, PatternDef};
    use crate::types::{AppState, BodyType, CaptureSite, MatchState};

    const CHOICES: &str = "GameState.DebugPrintEntityChoices";

    fn machine() -> StateMachine<MatchState> {
        StateMachine::new(PatternLibrary::match_lifecycle().unwrap())
    }

    fn feed_all<S: StateTag>(machine: &mut StateMachine<S>, lines: &[&str]) -> Vec<StateEvent<S>> {
        lines
            .iter()
            .enumerate()
            .flat_map(|(index, raw)| {
                let line = parse_line(raw).unwrap();
                machine.feed(&line, index as u64 + 1)
            })
            .collect()
    }

    const CHOICES_ROOT: &str = "D 18:41:53.5389622 GameState.DebugPrintEntityChoices() - id=1 Player=P TaskList=6 ChoiceType=MULLIGAN CountMin=1 CountMax=1";
    const ENTITY_0: &str = "D 18:41:53.5389622 GameState.DebugPrintEntityChoices() -   Entities[0]=[entityName=Ragnaros id=77 zone=HAND zonePos=1 cardId=TB_BaconShop_HERO_11 player=3]";
    const ENTITY_1: &str = "D 18:41:53.5389622 GameState.DebugPrintEntityChoices() -   Entities[1]=[entityName=Sire Denathrius id=78 zone=HAND zonePos=2 cardId=TB_BaconShop_HERO_76 player=3]";
    const NEXT_TOP_LEVEL: &str = "D 18:41:54.0000000 GameState.DebugPrintPower() - BLOCK_END";

    #[test]
    fn test_root_without_children_emits_immediately() {
        let mut machine = machine();
        let events = feed_all(
            &mut machine,
            &["D 21:22:49.3084520 GameState.DebugPrintPower() - CREATE_GAME"],
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, MatchState::GameStart);
        assert_eq!(events[0].line_number, 1);
        assert!(events[0].captures.is_empty());
        assert!(machine.is_idle());
    }

    #[test]
    fn test_children_are_collected_until_top_level_line() {
        let mut machine = machine();

        let events = feed_all(&mut machine, &[CHOICES_ROOT, ENTITY_0, ENTITY_1]);
        assert!(events.is_empty());
        assert_eq!(machine.open_blocks(), 1);

        let line = parse_line(NEXT_TOP_LEVEL).unwrap();
        let events = machine.feed(&line, 4);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, MatchState::HeroCandidates);
        assert_eq!(events[0].line_number, 1);
        assert_eq!(events[0].values().collect::<Vec<_>>(), vec!["Ragnaros", "Sire Denathrius"]);
        assert_eq!(events[0].captures[0].line, 1);
        assert_eq!(events[0].captures[1].line, 2);
        assert_eq!(events[0].captures[1].site, CaptureSite::Parameter(0));
    }

    #[test]
    fn test_optional_child_may_precede_repeated_children() {
        let mut machine = machine();
        let events = feed_all(
            &mut machine,
            &[
                CHOICES_ROOT,
                "D 18:41:53.5389622 GameState.DebugPrintEntityChoices() -   Source=GameEntity",
                ENTITY_0,
                ENTITY_1,
                NEXT_TOP_LEVEL,
            ],
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].values().collect::<Vec<_>>(), vec!["Ragnaros", "Sire Denathrius"]);
    }

    #[test]
    fn test_failing_child_closes_block_with_zero_children() {
        let mut machine = machine();
        let events = feed_all(
            &mut machine,
            &[
                CHOICES_ROOT,
                "D 18:41:53.5389622 GameState.DebugPrintEntityChoices() -   Unexpected=thing",
            ],
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, MatchState::HeroCandidates);
        assert_eq!(events[0].values().count(), 0);
        assert!(machine.is_idle());

        // Later children no longer attach to the closed block
        let events = feed_all(&mut machine, &[ENTITY_0]);
        assert!(events.is_empty());
        assert!(machine.is_idle());
    }

    #[test]
    fn test_closing_line_is_reprocessed_from_idle() {
        let mut machine = machine();
        let events = feed_all(
            &mut machine,
            &[
                CHOICES_ROOT,
                ENTITY_0,
                "D 18:41:55.0000000 GameState.DebugPrintPower() - TAG_CHANGE Entity=GameEntity tag=STATE value=COMPLETE",
            ],
        );

        let states: Vec<_> = events.iter().map(|event| event.state).collect();
        assert_eq!(states, vec![MatchState::HeroCandidates, MatchState::GameOver]);
        assert_eq!(events[0].line_number, 1);
        assert_eq!(events[1].line_number, 3);
    }

    #[test]
    fn test_flush_closes_open_blocks_once() {
        let mut machine = machine();
        feed_all(&mut machine, &[CHOICES_ROOT, ENTITY_0]);

        let events = machine.flush();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].first_value(), Some("Ragnaros"));

        assert!(machine.flush().is_empty());
    }

    #[test]
    fn test_reset_discards_partial_block() {
        let mut machine = machine();
        feed_all(&mut machine, &[CHOICES_ROOT, ENTITY_0]);

        machine.reset();
        assert!(machine.is_idle());
        assert!(machine.flush().is_empty());
    }

    #[test]
    fn test_orphan_child_lines_are_ignored() {
        let mut machine = machine();
        let events = feed_all(&mut machine, &[ENTITY_0, ENTITY_1]);

        assert!(events.is_empty());
        assert!(machine.is_idle());
    }

    fn competing_library() -> PatternLibrary<AppState> {
        PatternLibrary::compile(vec![
            FeatureDef::new(
                AppState::Awake,
                PatternDef::new("Host.Report", 0)
                    .param(lit("kind"), lit("a"))
                    .child(PatternDef::new("Host.Report", 1).param(lit("item"), pat("(.+)"))),
            ),
            FeatureDef::new(
                AppState::Destroyed,
                PatternDef::new("Host.Report", 0).param(lit("kind"), lit("b")),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_competing_root_abandons_fresh_block() {
        let mut machine = StateMachine::new(competing_library());
        let events = feed_all(
            &mut machine,
            &["D 10:00:00 Host.Report() - kind=a", "D 10:00:01 Host.Report() - kind=b"],
        );

        let states: Vec<_> = events.iter().map(|event| event.state).collect();
        assert_eq!(states, vec![AppState::Destroyed]);
        assert!(machine.is_idle());
    }

    #[test]
    fn test_competing_root_after_children_still_emits() {
        let mut machine = StateMachine::new(competing_library());
        let events = feed_all(
            &mut machine,
            &[
                "D 10:00:00 Host.Report() - kind=a",
                "D 10:00:00 Host.Report() -   item=one",
                "D 10:00:01 Host.Report() - kind=b",
            ],
        );

        let states: Vec<_> = events.iter().map(|event| event.state).collect();
        assert_eq!(states, vec![AppState::Awake, AppState::Destroyed]);
        assert_eq!(events[0].first_value(), Some("one"));
    }

    #[test]
    fn test_unrelated_top_level_line_does_not_abandon() {
        let mut machine = StateMachine::new(competing_library());
        let events = feed_all(
            &mut machine,
            &["D 10:00:00 Host.Report() - kind=a", "D 10:00:01 Other.Thing() - x=1"],
        );

        let states: Vec<_> = events.iter().map(|event| event.state).collect();
        assert_eq!(states, vec![AppState::Awake]);
    }

    fn tree_library() -> PatternLibrary<MatchState> {
        PatternLibrary::compile(vec![FeatureDef::new(
            MatchState::GameStart,
            PatternDef::new("Tree.Dump", 0)
                .body(BodyType::Command)
                .command(lit("ROOT"))
                .child(
                    PatternDef::new("Tree.Dump", 1)
                        .param(lit("branch"), pat("(.+)"))
                        .child(PatternDef::new("Tree.Dump", 2).param(lit("leaf"), pat("(.+)"))),
                ),
        )])
        .unwrap()
    }

    #[test]
    fn test_nested_children() {
        let mut machine = StateMachine::new(tree_library());

        let mut events = feed_all(
            &mut machine,
            &[
                "D 10:00:00 Tree.Dump() - ROOT",
                "D 10:00:00 Tree.Dump() -   branch=a",
                "D 10:00:00 Tree.Dump() -     leaf=a1",
                "D 10:00:00 Tree.Dump() -     leaf=a2",
                "D 10:00:00 Tree.Dump() -   branch=b",
                "D 10:00:00 Tree.Dump() -     leaf=b1",
            ],
        );
        assert!(events.is_empty());

        events.extend(machine.flush());
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].values().collect::<Vec<_>>(),
            vec!["a", "a1", "a2", "b", "b1"]
        );
    }

    #[test]
    fn test_line_deeper_than_open_children_closes_block() {
        let mut machine = StateMachine::new(tree_library());

        let events = feed_all(
            &mut machine,
            &[
                "D 10:00:00 Tree.Dump() - ROOT",
                "D 10:00:00 Tree.Dump() -   branch=a",
                "D 10:00:00 Tree.Dump() -     leaf=a1",
                "D 10:00:00 Tree.Dump() -       detail=deep",
                "D 10:00:00 Tree.Dump() -     leaf=a2",
            ],
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].line_number, 1);
        assert_eq!(events[0].values().collect::<Vec<_>>(), vec!["a", "a1"]);
        assert!(machine.is_idle());
        assert!(machine.flush().is_empty());
    }

    #[test]
    fn test_deeper_line_after_root_closes_block_with_zero_children() {
        let mut machine = machine();

        let events = feed_all(
            &mut machine,
            &[
                CHOICES_ROOT,
                "D 18:41:53.5389622 GameState.DebugPrintEntityChoices() -     Unexpected=deeper",
            ],
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, MatchState::HeroCandidates);
        assert_eq!(events[0].line_number, 1);
        assert_eq!(events[0].values().count(), 0);
        assert!(machine.is_idle());

        let late = "D 18:41:53.5389622 GameState.DebugPrintEntityChoices() -   \
                    Entities[0]=[entityName=Late id=77 zone=HAND zonePos=1 cardId=TB_BaconShop_HERO_11 player=3]";
        let events = feed_all(&mut machine, &[late]);
        assert!(events.is_empty());
        assert!(machine.flush().is_empty());
    }

    #[test]
    fn test_non_repeating_child_matches_once() {
        let library = PatternLibrary::compile(vec![FeatureDef::new(
            MatchState::HeroChosen,
            PatternDef::new("Pick.Send", 0)
                .body(BodyType::Command)
                .command(lit("START"))
                .child(PatternDef::new("Pick.Send", 1).param(lit("header"), pat("(.+)")))
                .child(PatternDef::new("Pick.Send", 1).param(lit("item"), pat("(.+)"))),
        )])
        .unwrap();
        let mut machine = StateMachine::new(library);

        let events = feed_all(
            &mut machine,
            &[
                "D 10:00:00 Pick.Send() - START",
                "D 10:00:00 Pick.Send() -   header=h",
                "D 10:00:00 Pick.Send() -   header=again",
            ],
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].values().collect::<Vec<_>>(), vec!["h"]);
    }
}
