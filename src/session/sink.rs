//! Score persistence.
//!
//! The session hands its final score to a [`ScoreSink`] at most once. Sinks
//! are asynchronous and may fail; the controller logs failures and carries
//! on, so a broken sink never blocks the game.

use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::error::SinkError;

use super::state::GameStatus;

/// The final result of a session, as submitted to a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreRecord {
    /// Session the score belongs to.
    pub session_id: Option<Uuid>,
    /// Player identifier.
    pub player_id: String,
    /// Final score.
    pub score: u32,
    /// Final money.
    pub money: u32,
    /// Level reached.
    pub level: u32,
    /// Status at submission time.
    pub status: GameStatus,
}

/// What the sink reported back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SubmitOutcome {
    /// Whether the score beat the player's previous best.
    pub is_new_best: bool,
}

/// Destination for final scores.
#[async_trait]
pub trait ScoreSink: Send + Sync {
    /// Records a final score.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the score could not be recorded.
    async fn submit(&self, record: ScoreRecord) -> Result<SubmitOutcome, SinkError>;
}

/// Best score and money per player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlayerBest {
    /// Highest score seen.
    pub score: u32,
    /// Money earned in the best-scoring session.
    pub money: u32,
    /// Level reached in the best-scoring session.
    pub level: u32,
}

/// In-process sink keeping each player's best score.
#[derive(Default)]
pub struct MemoryScoreSink {
    best: DashMap<String, PlayerBest>,
    submissions: DashMap<String, u32>,
}

impl fmt::Debug for MemoryScoreSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryScoreSink")
            .field("players", &self.best.len())
            .finish_non_exhaustive()
    }
}

impl MemoryScoreSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The best result recorded for `player_id`.
    #[must_use]
    pub fn best(&self, player_id: &str) -> Option<PlayerBest> {
        self.best.get(player_id).map(|entry| *entry)
    }

    /// How many records were submitted for `player_id`.
    #[must_use]
    pub fn submissions(&self, player_id: &str) -> u32 {
        self.submissions.get(player_id).map_or(0, |n| *n)
    }

}

#[async_trait]
impl ScoreSink for MemoryScoreSink {
    async fn submit(&self, record: ScoreRecord) -> Result<SubmitOutcome, SinkError> {
        if record.player_id.is_empty() {
            return Err(SinkError::Rejected("record has no player id".to_string()));
        }
        *self
            .submissions
            .entry(record.player_id.clone())
            .or_insert(0) += 1;

        let candidate = PlayerBest {
            score: record.score,
            money: record.money,
            level: record.level,
        };
        let mut is_new_best = false;
        self.best
            .entry(record.player_id)
            .and_modify(|best| {
                if candidate.score > best.score {
                    *best = candidate;
                    is_new_best = true;
                }
            })
            .or_insert_with(|| {
                is_new_best = true;
                candidate
            });
        Ok(SubmitOutcome { is_new_best })
    }
}
