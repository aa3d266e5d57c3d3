//! Built-in feature tables and the compiled library
//!
//! The tables below are literal data. Each entry quotes the log line it is
//! meant to recognize.

use super::feature::{lit, pat, Feature, FeatureDef, Pattern, PatternDef};
use crate::types::{AppState, BodyType, MatchState, Result};

const LOADING_SCREEN_LOADED: &str = "LoadingScreen.OnSceneLoaded";
const LOADING_SCREEN_PRE_UNLOAD: &str = "LoadingScreen.OnScenePreUnload";
const GAMEPLAY_DESTROY: &str = "Gameplay.OnDestroy";
const BOX_DESTROY: &str = "Box.OnDestroy";
const DEBUG_PRINT_POWER: &str = "GameState.DebugPrintPower";
const DEBUG_PRINT_CHOICES: &str = "GameState.DebugPrintEntityChoices";
const SEND_CHOICES: &str = "GameState.SendChoices";

/// Application-lifecycle feature table
pub fn app_lifecycle_defs() -> Vec<FeatureDef<AppState>> {
    vec![
        // D 20:58:07.5700000 LoadingScreen.OnSceneLoaded() - prevMode=STARTUP currMode=LOGIN
        FeatureDef::new(
            AppState::Awake,
            PatternDef::new(LOADING_SCREEN_LOADED, 0)
                .body(BodyType::Parameter)
                .param(lit("prevMode"), lit("STARTUP"))
                .param(lit("currMode"), lit("LOGIN")),
        ),
        // D 21:03:58.8552226 LoadingScreen.OnSceneLoaded() - prevMode=GAME_MODE currMode=BACON
        FeatureDef::new(
            AppState::ModeSelected,
            PatternDef::new(LOADING_SCREEN_LOADED, 0)
                .body(BodyType::Parameter)
                .param(lit("prevMode"), lit("GAME_MODE"))
                .param(lit("currMode"), lit("BACON")),
        ),
        // D 21:04:58.5488393 LoadingScreen.OnScenePreUnload() - prevMode=BACON nextMode=GAMEPLAY m_phase=INVALID
        FeatureDef::new(
            AppState::MatchStarted,
            PatternDef::new(LOADING_SCREEN_PRE_UNLOAD, 0)
                .body(BodyType::Parameter)
                .param(lit("prevMode"), lit("BACON"))
                .param(lit("nextMode"), lit("GAMEPLAY")),
        ),
        // D 21:09:21.4353961 Gameplay.OnDestroy()
        FeatureDef::new(AppState::MatchEnded, PatternDef::new(GAMEPLAY_DESTROY, 0)),
        // D 21:09:57.0464718 Box.OnDestroy()
        FeatureDef::new(AppState::Destroyed, PatternDef::new(BOX_DESTROY, 0)),
    ]
}

/// Match-lifecycle feature table
pub fn match_lifecycle_defs() -> Vec<FeatureDef<MatchState>> {
    vec![
        // D 21:22:49.3084520 GameState.DebugPrintPower() - CREATE_GAME
        FeatureDef::new(
            MatchState::GameStart,
            PatternDef::new(DEBUG_PRINT_POWER, 0)
                .body(BodyType::Command)
                .command(lit("CREATE_GAME")),
        ),
        // D 18:41:53.5389622 GameState.DebugPrintEntityChoices() - id=1 Player=Name#51810 TaskList=6 ChoiceType=MULLIGAN CountMin=1 CountMax=1
        // D 18:41:53.5389622 GameState.DebugPrintEntityChoices() -   Source=GameEntity
        // D 18:41:53.5389622 GameState.DebugPrintEntityChoices() -   Entities[0]=[entityName=... id=77 zone=HAND zonePos=1 cardId=TB_BaconShop_HERO_60 player=3]
        FeatureDef::new(
            MatchState::HeroCandidates,
            PatternDef::new(DEBUG_PRINT_CHOICES, 0)
                .body(BodyType::Parameter)
                .param(lit("id"), pat(r"\d+"))
                .param(lit("Player"), pat(".+"))
                .param(lit("TaskList"), pat(r"\d+"))
                .param(lit("ChoiceType"), lit("MULLIGAN"))
                .param(lit("CountMin"), pat(r"\d+"))
                .param(lit("CountMax"), pat(r"\d+"))
                .child(
                    PatternDef::new(DEBUG_PRINT_CHOICES, 1)
                        .body(BodyType::Parameter)
                        .param(lit("Source"), pat(".+"))
                        .optional(),
                )
                .child(
                    PatternDef::new(DEBUG_PRINT_CHOICES, 1)
                        .body(BodyType::Parameter)
                        .param(
                            pat(r"Entities\[\d+\]"),
                            pat(r"\[entityName=(.+?) id=\d+ .*zone=HAND.*\]"),
                        )
                        .repeated(),
                ),
        ),
        // D 21:10:08.4912836 GameState.SendChoices() - id=2 ChoiceType=MULLIGAN
        // D 21:10:08.4912836 GameState.SendChoices() -   m_chosenEntities[0]=[entityName=... id=88 zone=HAND zonePos=2 cardId=TB_BaconShop_HERO_43 player=6]
        FeatureDef::new(
            MatchState::HeroChosen,
            PatternDef::new(SEND_CHOICES, 0)
                .body(BodyType::Parameter)
                .param(lit("id"), pat(r"\d+"))
                .param(lit("ChoiceType"), lit("MULLIGAN"))
                .child(
                    PatternDef::new(SEND_CHOICES, 1)
                        .body(BodyType::Parameter)
                        .param(
                            pat(r"m_chosenEntities\[\d+\]"),
                            pat(r"\[entityName=(.+?) id=\d+ zone=HAND.*\]"),
                        )
                        .repeated(),
                ),
        ),
        // D 21:12:40.1029384 GameState.DebugPrintPower() - FULL_ENTITY - Updating [entityName=... id=141 zone=SETASIDE zonePos=0 cardId=TB_BaconShop_HERO_22 player=16] CardID=TB_BaconShop_HERO_22
        // Top-level only: reveals nested under BLOCK_START are not seen.
        FeatureDef::new(
            MatchState::OpponentRevealed,
            PatternDef::new(DEBUG_PRINT_POWER, 0)
                .body(BodyType::CommandWithParameter)
                .command(pat(
                    r"FULL_ENTITY - Updating \[entityName=(.+?) id=\d+ zone=SETASIDE zonePos=0 cardId=TB_BaconShop_HERO_\w+ player=\d+\]",
                ))
                .param(lit("CardID"), pat(r"TB_BaconShop_HERO_\w+")),
        ),
        // D 21:34:58.4100975 GameState.DebugPrintPower() - TAG_CHANGE Entity=[entityName=... id=74 zone=PLAY zonePos=0 cardId=TB_BaconShop_HERO_35 player=1] tag=PLAYER_LEADERBOARD_PLACE value=3
        FeatureDef::new(
            MatchState::Ranking,
            PatternDef::new(DEBUG_PRINT_POWER, 0)
                .body(BodyType::CommandWithParameter)
                .command(lit("TAG_CHANGE"))
                .param(lit("Entity"), pat(r"\[entityName=(.+?) id=\d+ .*zone=PLAY.*\]"))
                .param(lit("tag"), lit("PLAYER_LEADERBOARD_PLACE"))
                .param(lit("value"), pat(r"(\d+)")),
        ),
        // D 21:21:43.7370339 GameState.DebugPrintPower() - TAG_CHANGE Entity=GameEntity tag=STATE value=COMPLETE
        FeatureDef::new(
            MatchState::GameOver,
            PatternDef::new(DEBUG_PRINT_POWER, 0)
                .body(BodyType::CommandWithParameter)
                .command(lit("TAG_CHANGE"))
                .param(lit("Entity"), lit("GameEntity"))
                .param(lit("tag"), lit("STATE"))
                .param(lit("value"), lit("COMPLETE")),
        ),
    ]
}

/// Statistics about a compiled library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LibraryStats {
    pub num_features: usize,
    /// Every pattern node, roots and children
    pub num_patterns: usize,
}

/// A validated, immutable set of features for one state family
#[derive(Debug, Clone)]
pub struct PatternLibrary<S> {
    features: Vec<Feature<S>>,
}

impl<S> PatternLibrary<S> {
    /// Compile and validate a table of definitions
    ///
    /// Fails on the first invalid definition; a library is never partially loaded.
    pub fn compile(defs: impl IntoIterator<Item = FeatureDef<S>>) -> Result<Self> {
        let features = defs
            .into_iter()
            .map(FeatureDef::compile)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { features })
    }

    pub fn features(&self) -> &[Feature<S>] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn stats(&self) -> LibraryStats {
        LibraryStats {
            num_features: self.features.len(),
            num_patterns: self
                .features
                .iter()
                .map(|feature| count_patterns(&feature.root))
                .sum(),
        }
    }
}

fn count_patterns(pattern: &Pattern) -> usize {
    1 + pattern.children.iter().map(count_patterns).sum::<usize>()
}

impl PatternLibrary<AppState> {
    /// The built-in application-lifecycle library
    pub fn app_lifecycle() -> Result<Self> {
        Self::compile(app_lifecycle_defs())
    }
}

impl PatternLibrary<MatchState> {
    /// The built-in match-lifecycle library
    pub fn match_lifecycle() -> Result<Self> {
        Self::compile(match_lifecycle_defs())
    }
}
