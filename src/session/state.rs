//! Session state and its transitions.
//!
//! [`Session`] is a plain value: every transition takes the rules, the
//! catalog and a random source explicitly, so the whole state machine can
//! be driven synchronously and deterministically. Concurrency, timers and
//! the score sink live in [`SessionController`](super::SessionController),
//! which is the only component that mutates a live session.
//!
//! Countdowns are stored as whole ticks rather than fractional seconds so
//! that repeated 0.1 s decrements never drift.

use std::collections::BTreeSet;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::GameRules;
use crate::content::{Catalog, Scenario, pick_reflex_challenge, pick_scenario};

use super::sink::ScoreRecord;

// ============================================================================
// Status & profile
// ============================================================================

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    /// No game in progress.
    Menu,
    /// A game is running and accepts input.
    Playing,
    /// The player cleared the last level.
    Won,
    /// HP reached zero.
    Lost,
}

impl GameStatus {
    /// Returns whether the status is `Won` or `Lost`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }

    /// Lower-case label used in logs, events and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Menu => "menu",
            Self::Playing => "playing",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The logged-in player a session is started for.
///
/// Owned by the profile provider; a session only copies from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Stable player identifier.
    pub id: String,
    /// Display name.
    pub username: String,
    /// Shop items the player owns.
    #[serde(default)]
    pub owned_items: BTreeSet<String>,
}

// ============================================================================
// Transition outcomes
// ============================================================================

/// Which branch an answer took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Correct; a new scenario was drawn for the next level.
    NextScenario,
    /// Correct; the reflex mini-game started for the next level.
    ReflexStarted,
    /// Wrong; HP was lost and a scenario was redrawn for the same level.
    Retry,
    /// Correct on the last level.
    Won,
    /// Wrong and HP reached zero.
    Lost,
}

/// Feedback returned to the caller after an answer, whatever the branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerFeedback {
    /// Whether the claim matched the scenario's ground truth.
    pub is_correct: bool,
    /// Explanation of the scenario that was answered.
    pub explanation: String,
    /// Branch taken.
    pub outcome: AnswerOutcome,
}

/// Result of resolving a reflex round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflexOutcome {
    /// Command reproduced in time; bonus awarded.
    Cleared,
    /// Failed or expired; HP lost, play continues.
    Failed,
    /// Failed or expired and HP reached zero.
    Lost,
}

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Countdown still running.
    Counting,
    /// Countdown expired, penalty applied, play continues.
    Expired,
    /// Countdown expired and HP reached zero.
    Lost,
}

// ============================================================================
// Session
// ============================================================================

/// One player's game run.
#[derive(Debug, Clone)]
pub struct Session {
    session_id: Option<Uuid>,
    player_id: String,
    player_name: String,
    level: u32,
    max_level: u32,
    score: u32,
    money: u32,
    hp: u32,
    inventory: BTreeSet<String>,
    current_scenario: Option<Scenario>,
    reflex_active: bool,
    reflex_challenge: Option<String>,
    decision_ticks: u32,
    reflex_ticks: u32,
    status: GameStatus,
}

impl Session {
    /// A session sitting in the menu, before any game has started.
    #[must_use]
    pub fn idle(rules: &GameRules) -> Self {
        Self {
            session_id: None,
            player_id: String::new(),
            player_name: String::new(),
            level: 1,
            max_level: rules.max_level,
            score: 0,
            money: 0,
            hp: rules.starting_hp,
            inventory: BTreeSet::new(),
            current_scenario: None,
            reflex_active: false,
            reflex_challenge: None,
            decision_ticks: rules.decision_ticks(),
            reflex_ticks: rules.reflex_ticks(),
            status: GameStatus::Menu,
        }
    }

    /// Starts a fresh game at level 1 for `profile`.
    pub fn start<R: Rng + ?Sized>(
        profile: &PlayerProfile,
        rules: &GameRules,
        catalog: &Catalog,
        rng: &mut R,
    ) -> Self {
        let scenario = pick_scenario(catalog, 1, rng).clone();
        Self {
            session_id: Some(Uuid::new_v4()),
            player_id: profile.id.clone(),
            player_name: profile.username.clone(),
            inventory: profile.owned_items.clone(),
            current_scenario: Some(scenario),
            status: GameStatus::Playing,
            ..Self::idle(rules)
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Judges the player's claim about the current scenario.
    ///
    /// Returns `None` (no effect) unless the session is playing with a
    /// scenario on screen and no reflex round in progress.
    pub fn answer<R: Rng + ?Sized>(
        &mut self,
        claim_is_scam: bool,
        rules: &GameRules,
        catalog: &Catalog,
        rng: &mut R,
    ) -> Option<AnswerFeedback> {
        if self.status != GameStatus::Playing || self.reflex_active {
            return None;
        }
        let scenario = self.current_scenario.as_ref()?;
        let is_correct = scenario.is_scam == claim_is_scam;
        let explanation = scenario.explanation.clone();

        let outcome = if is_correct {
            self.score = self.score.saturating_add(rules.correct_score);
            self.money = self.money.saturating_add(rules.correct_money);
            if self.level >= self.max_level {
                self.finish(GameStatus::Won);
                AnswerOutcome::Won
            } else {
                self.level += 1;
                self.decision_ticks = rules.decision_ticks();
                if rng.random::<f64>() < rules.reflex_chance {
                    self.begin_reflex(rules, catalog, rng);
                    AnswerOutcome::ReflexStarted
                } else {
                    self.current_scenario = Some(pick_scenario(catalog, self.level, rng).clone());
                    AnswerOutcome::NextScenario
                }
            }
        } else if self.damage(rules.wrong_answer_penalty) {
            AnswerOutcome::Lost
        } else {
            self.decision_ticks = rules.decision_ticks();
            self.current_scenario = Some(pick_scenario(catalog, self.level, rng).clone());
            AnswerOutcome::Retry
        };

        Some(AnswerFeedback {
            is_correct,
            explanation,
            outcome,
        })
    }

    /// Resolves the running reflex round.
    ///
    /// Returns `None` (no effect) when no reflex round is active.
    pub fn complete_reflex<R: Rng + ?Sized>(
        &mut self,
        success: bool,
        rules: &GameRules,
        catalog: &Catalog,
        rng: &mut R,
    ) -> Option<ReflexOutcome> {
        if self.status != GameStatus::Playing || !self.reflex_active {
            return None;
        }
        if success {
            self.score = self.score.saturating_add(rules.reflex_bonus);
        } else if self.damage(rules.reflex_penalty) {
            return Some(ReflexOutcome::Lost);
        }

        self.reflex_active = false;
        self.reflex_challenge = None;
        self.reflex_ticks = rules.reflex_ticks();
        self.decision_ticks = rules.decision_ticks();
        self.current_scenario = Some(pick_scenario(catalog, self.level, rng).clone());

        Some(if success {
            ReflexOutcome::Cleared
        } else {
            ReflexOutcome::Failed
        })
    }

    /// Advances the decision countdown by one tick.
    ///
    /// Returns `None` when the decision countdown is not running.
    /// Expiry costs HP only; the scenario and level stay as they are.
    pub fn tick_decision(&mut self, rules: &GameRules) -> Option<TickOutcome> {
        if self.status != GameStatus::Playing || self.reflex_active {
            return None;
        }
        self.decision_ticks = self.decision_ticks.saturating_sub(1);
        if self.decision_ticks > 0 {
            return Some(TickOutcome::Counting);
        }
        if self.damage(rules.timeout_penalty) {
            return Some(TickOutcome::Lost);
        }
        self.decision_ticks = rules.decision_ticks();
        Some(TickOutcome::Expired)
    }

    /// Advances the reflex countdown by one tick.
    ///
    /// Returns `None` when no reflex round is active. Expiry is a failed
    /// round.
    pub fn tick_reflex<R: Rng + ?Sized>(
        &mut self,
        rules: &GameRules,
        catalog: &Catalog,
        rng: &mut R,
    ) -> Option<TickOutcome> {
        if self.status != GameStatus::Playing || !self.reflex_active {
            return None;
        }
        self.reflex_ticks = self.reflex_ticks.saturating_sub(1);
        if self.reflex_ticks > 0 {
            return Some(TickOutcome::Counting);
        }
        match self.complete_reflex(false, rules, catalog, rng) {
            Some(ReflexOutcome::Lost) => Some(TickOutcome::Lost),
            _ => Some(TickOutcome::Expired),
        }
    }

    /// Leaves the game for the menu, from any status.
    pub fn end(&mut self) {
        self.status = GameStatus::Menu;
        self.current_scenario = None;
        self.reflex_active = false;
        self.reflex_challenge = None;
    }

    fn begin_reflex<R: Rng + ?Sized>(&mut self, rules: &GameRules, catalog: &Catalog, rng: &mut R) {
        self.current_scenario = None;
        self.reflex_active = true;
        self.reflex_challenge = Some(pick_reflex_challenge(catalog, self.level, rng).to_string());
        self.reflex_ticks = rules.reflex_ticks();
    }

    /// Applies an HP penalty; returns `true` if it ended the game.
    fn damage(&mut self, amount: u32) -> bool {
        self.hp = self.hp.saturating_sub(amount);
        if self.hp == 0 {
            self.finish(GameStatus::Lost);
            true
        } else {
            false
        }
    }

    fn finish(&mut self, status: GameStatus) {
        self.status = status;
        self.current_scenario = None;
        self.reflex_active = false;
        self.reflex_challenge = None;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Correlation id, assigned at start.
    #[must_use]
    pub const fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Player identifier.
    #[must_use]
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Player display name.
    #[must_use]
    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    /// Current level.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Accumulated score.
    #[must_use]
    pub const fn score(&self) -> u32 {
        self.score
    }

    /// Accumulated money.
    #[must_use]
    pub const fn money(&self) -> u32 {
        self.money
    }

    /// Remaining HP.
    #[must_use]
    pub const fn hp(&self) -> u32 {
        self.hp
    }

    /// Items the player brought into the session.
    #[must_use]
    pub const fn inventory(&self) -> &BTreeSet<String> {
        &self.inventory
    }

    /// The scenario awaiting an answer.
    #[must_use]
    pub const fn current_scenario(&self) -> Option<&Scenario> {
        self.current_scenario.as_ref()
    }

    /// Whether a reflex round is running.
    #[must_use]
    pub const fn reflex_active(&self) -> bool {
        self.reflex_active
    }

    /// The command to retype during a reflex round.
    #[must_use]
    pub fn reflex_challenge(&self) -> Option<&str> {
        self.reflex_challenge.as_deref()
    }

    /// Ticks left on the decision countdown.
    #[must_use]
    pub const fn decision_ticks(&self) -> u32 {
        self.decision_ticks
    }

    /// Ticks left on the reflex countdown.
    #[must_use]
    pub const fn reflex_ticks(&self) -> u32 {
        self.reflex_ticks
    }

    /// Lifecycle status.
    #[must_use]
    pub const fn status(&self) -> GameStatus {
        self.status
    }

    /// The record handed to the score sink.
    #[must_use]
    pub fn score_record(&self) -> ScoreRecord {
        ScoreRecord {
            session_id: self.session_id,
            player_id: self.player_id.clone(),
            score: self.score,
            money: self.money,
            level: self.level,
            status: self.status,
        }
    }

    /// A read-only copy for observers.
    #[must_use]
    pub fn snapshot(&self, rules: &GameRules) -> SessionSnapshot {
        let decision_time_remaining = rules.ticks_to_secs(self.decision_ticks);
        let full = rules.decision_time.as_secs_f64();
        SessionSnapshot {
            session_id: self.session_id,
            player_id: self.player_id.clone(),
            player_name: self.player_name.clone(),
            level: self.level,
            max_level: self.max_level,
            score: self.score,
            money: self.money,
            hp: self.hp,
            inventory: self.inventory.iter().cloned().collect(),
            current_scenario: self.current_scenario.clone(),
            reflex_active: self.reflex_active,
            reflex_challenge: self.reflex_challenge.clone(),
            reflex_time_remaining: rules.ticks_to_secs(self.reflex_ticks),
            decision_time_remaining,
            time_percentage: if full > 0.0 {
                decision_time_remaining / full * 100.0
            } else {
                0.0
            },
            status: self.status,
        }
    }
}

/// Serializable view of a session at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Correlation id, `None` before the first start.
    pub session_id: Option<Uuid>,
    /// Player identifier.
    pub player_id: String,
    /// Player display name.
    pub player_name: String,
    /// Current level.
    pub level: u32,
    /// Last playable level.
    pub max_level: u32,
    /// Accumulated score.
    pub score: u32,
    /// Accumulated money.
    pub money: u32,
    /// Remaining HP.
    pub hp: u32,
    /// Items carried into the session.
    pub inventory: Vec<String>,
    /// Scenario awaiting an answer.
    pub current_scenario: Option<Scenario>,
    /// Whether a reflex round is running.
    pub reflex_active: bool,
    /// Command to retype during a reflex round.
    pub reflex_challenge: Option<String>,
    /// Seconds left on the reflex countdown.
    pub reflex_time_remaining: f64,
    /// Seconds left on the decision countdown.
    pub decision_time_remaining: f64,
    /// Decision countdown left, as a percentage of the full countdown.
    pub time_percentage: f64,
    /// Lifecycle status.
    pub status: GameStatus,
}
