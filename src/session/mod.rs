//! Game sessions.
//!
//! # Architecture
//!
//! - [`state`]: the [`Session`] value and its pure transitions
//! - [`timer`]: cancellable periodic countdown tasks
//! - [`sink`]: where final scores go
//! - [`controller`]: the single writer tying the three together

pub mod controller;
pub mod sink;
pub mod state;
pub mod timer;

pub use controller::{SessionController, SessionResult};
pub use sink::{MemoryScoreSink, PlayerBest, ScoreRecord, ScoreSink, SubmitOutcome};
pub use state::{
    AnswerFeedback, AnswerOutcome, GameStatus, PlayerProfile, ReflexOutcome, Session,
    SessionSnapshot, TickOutcome,
};
pub use timer::{CountdownTimer, TimerKind};
