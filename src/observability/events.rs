//! Structured game event stream.
//!
//! Discrete, typed events emitted by the session controller. Events are
//! serialized as newline-delimited JSON (JSONL) with a monotonically
//! increasing sequence number for ordering.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a game session.
///
/// Each variant is tagged with `"type"` when serialized to JSON so consumers
/// can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum GameEvent {
    /// A session entered `playing`.
    SessionStarted {
        /// When the session started.
        timestamp: DateTime<Utc>,
        /// Session correlation id.
        session_id: Uuid,
        /// Player identifier.
        player_id: String,
        /// First scenario shown.
        scenario_id: String,
    },

    /// An answer was judged.
    AnswerJudged {
        /// When the answer was judged.
        timestamp: DateTime<Utc>,
        /// Session correlation id.
        session_id: Uuid,
        /// Scenario that was answered.
        scenario_id: String,
        /// Level the answer was given on.
        level: u32,
        /// Whether the player was right.
        correct: bool,
        /// HP after the answer.
        hp: u32,
        /// Score after the answer.
        score: u32,
    },

    /// A reflex round began.
    ReflexStarted {
        /// When the round began.
        timestamp: DateTime<Utc>,
        /// Session correlation id.
        session_id: Uuid,
        /// Level of the round.
        level: u32,
        /// Command to retype.
        command: String,
    },

    /// A reflex round was resolved, by input or expiry.
    ReflexResolved {
        /// When the round ended.
        timestamp: DateTime<Utc>,
        /// Session correlation id.
        session_id: Uuid,
        /// `"cleared"`, `"failed"` or `"lost"`.
        outcome: String,
        /// Whether the countdown ran out.
        expired: bool,
        /// HP after the round.
        hp: u32,
    },

    /// The decision countdown ran out.
    DecisionTimedOut {
        /// When the countdown expired.
        timestamp: DateTime<Utc>,
        /// Session correlation id.
        session_id: Uuid,
        /// Level at expiry.
        level: u32,
        /// HP after the penalty.
        hp: u32,
    },

    /// A session left `playing` for good (won, lost or ended).
    SessionFinished {
        /// When the session finished.
        timestamp: DateTime<Utc>,
        /// Session correlation id.
        session_id: Uuid,
        /// `"won"`, `"lost"` or `"ended"`.
        status: String,
        /// Final level.
        level: u32,
        /// Final score.
        score: u32,
        /// Final money.
        money: u32,
    },

    /// The score sink acknowledged or rejected a submission.
    ScoreSubmitted {
        /// When the sink answered.
        timestamp: DateTime<Utc>,
        /// Session correlation id.
        session_id: Option<Uuid>,
        /// Submitted score.
        score: u32,
        /// Whether the sink recorded it.
        accepted: bool,
        /// Whether it beat the previous best.
        is_new_best: bool,
    },
}

impl GameEvent {
    /// The `"type"` tag of this event.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "SessionStarted",
            Self::AnswerJudged { .. } => "AnswerJudged",
            Self::ReflexStarted { .. } => "ReflexStarted",
            Self::ReflexResolved { .. } => "ReflexResolved",
            Self::DecisionTimedOut { .. } => "DecisionTimedOut",
            Self::SessionFinished { .. } => "SessionFinished",
            Self::ScoreSubmitted { .. } => "ScoreSubmitted",
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: GameEvent,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) increments the sequence counter,
/// serializes the event as a single JSON line, and flushes the writer.
/// Serialization or I/O failures are dropped; the event stream never
/// interrupts a game.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: GameEvent) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}
