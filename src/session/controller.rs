//! Session controller.
//!
//! Owns the live [`Session`] behind a single mutex and is the only writer.
//! User actions and countdown ticks all funnel through the same lock, so
//! whichever reaches a terminal status first wins and the other becomes a
//! no-op. The lock is never held across an `.await` or a write: game events
//! are queued under the lock and written once it is released, and score
//! submission runs after the guard is dropped.
//!
//! Timer tasks hold a `Weak` reference and the arm epoch they were spawned
//! under. Every re-arm bumps the epoch, so a tick that raced with a
//! cancellation sees a stale epoch under the lock and does nothing.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GameRules;
use crate::content::Catalog;
use crate::error::ConfigError;
use crate::observability::metrics;
use crate::observability::{EventEmitter, GameEvent};

use super::sink::{ScoreRecord, ScoreSink};
use super::state::{
    AnswerFeedback, AnswerOutcome, GameStatus, PlayerProfile, ReflexOutcome, Session,
    SessionSnapshot, TickOutcome,
};
use super::timer::{CountdownTimer, TimerKind};

/// Acknowledged result of a session's score submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionResult {
    /// Session the result belongs to.
    pub session_id: Option<Uuid>,
    /// Submitted score.
    pub score: u32,
    /// Submitted money.
    pub money: u32,
    /// Level reached.
    pub level: u32,
    /// Whether the sink reported a new personal best.
    pub is_new_best: bool,
}

/// Where the current session's score submission stands.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Submission {
    /// Nothing was handed to the sink.
    Idle,
    /// The sink has the record and has not answered.
    Pending,
    /// The sink answered; `None` if it failed.
    Settled(Option<SessionResult>),
}

struct Inner {
    session: Session,
    rng: Box<dyn RngCore + Send>,
    epoch: u64,
    decision_timer: Option<CountdownTimer>,
    reflex_timer: Option<CountdownTimer>,
    /// Set once the session's end has been handled (terminal or `end()`).
    finished: bool,
    last_profile: Option<PlayerProfile>,
    /// Events committed under the lock, written after it is released.
    outbox: Vec<GameEvent>,
}

/// Drives one player's sessions.
///
/// Construct it, wrap it in an [`Arc`], and call the operations from within
/// a tokio runtime; starting a session spawns the countdown tasks.
pub struct SessionController {
    rules: GameRules,
    catalog: Arc<Catalog>,
    sink: Arc<dyn ScoreSink>,
    events: Arc<EventEmitter>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<SessionSnapshot>,
    submission_tx: watch::Sender<Submission>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("rules", &self.rules)
            .field("status", &self.state_tx.borrow().status)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Creates a controller in the menu.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `rules` fail validation.
    pub fn new(
        catalog: Arc<Catalog>,
        rules: GameRules,
        sink: Arc<dyn ScoreSink>,
    ) -> Result<Self, ConfigError> {
        rules.validate()?;
        let session = Session::idle(&rules);
        let (state_tx, _) = watch::channel(session.snapshot(&rules));
        let (submission_tx, _) = watch::channel(Submission::Idle);
        Ok(Self {
            inner: Mutex::new(Inner {
                session,
                rng: Box::new(StdRng::from_os_rng()),
                epoch: 0,
                decision_timer: None,
                reflex_timer: None,
                finished: true,
                last_profile: None,
                outbox: Vec::new(),
            }),
            rules,
            catalog,
            sink,
            events: Arc::new(EventEmitter::noop()),
            state_tx,
            submission_tx,
            cancel: CancellationToken::new(),
        })
    }

    /// Replaces the random source (e.g. a seeded `StdRng`).
    #[must_use]
    pub fn with_rng(self, rng: impl RngCore + Send + 'static) -> Self {
        self.lock().rng = Box::new(rng);
        self
    }

    /// Sends game events to `events`.
    #[must_use]
    pub fn with_events(mut self, events: Arc<EventEmitter>) -> Self {
        self.events = events;
        self
    }

    /// The rules this controller plays by.
    #[must_use]
    pub const fn rules(&self) -> &GameRules {
        &self.rules
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Starts a fresh session for `profile`.
    ///
    /// Returns `false` and does nothing without a profile. Any timers left
    /// from a previous session are cancelled first.
    pub fn start(self: &Arc<Self>, profile: Option<&PlayerProfile>) -> bool {
        let Some(profile) = profile else {
            debug!("start ignored: no player profile");
            return false;
        };

        let events = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            Self::disarm(inner);

            inner.session = Session::start(profile, &self.rules, &self.catalog, &mut *inner.rng);
            inner.finished = false;
            inner.last_profile = Some(profile.clone());
            self.submission_tx.send_replace(Submission::Idle);

            let session_id = inner.session.session_id().unwrap_or_default();
            let scenario_id = inner
                .session
                .current_scenario()
                .map(|s| s.id.clone())
                .unwrap_or_default();
            info!(%session_id, player = %profile.id, scenario = %scenario_id, "session started");
            metrics::record_session_started();
            inner.outbox.push(GameEvent::SessionStarted {
                timestamp: Utc::now(),
                session_id,
                player_id: profile.id.clone(),
                scenario_id,
            });

            self.arm(inner);
            self.publish(inner)
        };
        self.flush(events);
        true
    }

    /// Starts again with the profile of the last session.
    ///
    /// Returns `false` if no session was ever started.
    pub fn play_again(self: &Arc<Self>) -> bool {
        let profile = self.lock().last_profile.clone();
        self.start(profile.as_ref())
    }

    /// Answers the current scenario.
    ///
    /// Returns `None` when no scenario is awaiting an answer.
    pub async fn answer(self: &Arc<Self>, claim_is_scam: bool) -> Option<AnswerFeedback> {
        let (feedback, pending, events) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let scenario_id = inner.session.current_scenario()?.id.clone();
            let level = inner.session.level();
            let feedback = inner.session.answer(
                claim_is_scam,
                &self.rules,
                &self.catalog,
                &mut *inner.rng,
            )?;

            let session_id = inner.session.session_id().unwrap_or_default();
            debug!(
                %session_id,
                scenario = %scenario_id,
                level,
                correct = feedback.is_correct,
                outcome = ?feedback.outcome,
                "answer judged"
            );
            metrics::record_answer(feedback.is_correct);
            inner.outbox.push(GameEvent::AnswerJudged {
                timestamp: Utc::now(),
                session_id,
                scenario_id,
                level,
                correct: feedback.is_correct,
                hp: inner.session.hp(),
                score: inner.session.score(),
            });
            if feedback.outcome == AnswerOutcome::ReflexStarted {
                Self::queue_reflex_started(inner);
            }

            self.arm(inner);
            let pending = self.settle(inner);
            (feedback, pending, self.publish(inner))
        };

        self.flush(events);
        if let Some(record) = pending {
            self.submit(record).await;
        }
        Some(feedback)
    }

    /// Resolves the running reflex round.
    ///
    /// Returns `None` when no reflex round is active.
    pub async fn complete_reflex(self: &Arc<Self>, success: bool) -> Option<ReflexOutcome> {
        let (outcome, pending, events) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let outcome = self.resolve_reflex(inner, success)?;
            let pending = self.settle(inner);
            (outcome, pending, self.publish(inner))
        };

        self.flush(events);
        if let Some(record) = pending {
            self.submit(record).await;
        }
        Some(outcome)
    }

    /// Checks typed text against the reflex command.
    ///
    /// An exact match clears the round. Anything else is ignored and the
    /// player may keep typing until the countdown runs out.
    pub async fn submit_reflex_input(self: &Arc<Self>, text: &str) -> Option<ReflexOutcome> {
        let (outcome, events) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            if inner.session.reflex_challenge() != Some(text) {
                return None;
            }
            let outcome = self.resolve_reflex(inner, true)?;
            (outcome, self.publish(inner))
        };
        self.flush(events);
        Some(outcome)
    }

    /// Leaves the game for the menu. Allowed at any time.
    ///
    /// A session abandoned while playing submits its score if it is above
    /// zero and nothing was submitted yet.
    pub async fn end(self: &Arc<Self>) {
        let (pending, events) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let was_playing = inner.session.status() == GameStatus::Playing;
            let record = inner.session.score_record();
            Self::disarm(inner);
            inner.session.end();

            let mut pending = None;
            if !inner.finished {
                inner.finished = true;
                Self::queue_finished(inner, "ended");
                if was_playing && record.score > 0 {
                    self.submission_tx.send_replace(Submission::Pending);
                    pending = Some(record);
                }
            }
            (pending, self.publish(inner))
        };

        self.flush(events);
        if let Some(record) = pending {
            self.submit(record).await;
        }
    }

    /// A copy of the current session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state_tx.borrow().clone()
    }

    /// A receiver that observes every committed change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_tx.subscribe()
    }

    /// The acknowledged score submission of the current session, if the
    /// sink has already answered.
    #[must_use]
    pub fn result(&self) -> Option<SessionResult> {
        match &*self.submission_tx.borrow() {
            Submission::Settled(result) => result.clone(),
            Submission::Idle | Submission::Pending => None,
        }
    }

    /// Waits until the current session's submission, if any, has been
    /// answered by the sink, then returns [`result`](Self::result).
    ///
    /// Returns immediately when nothing is in flight.
    pub async fn wait_result(&self) -> Option<SessionResult> {
        let mut rx = self.submission_tx.subscribe();
        let settled = rx.wait_for(|s| *s != Submission::Pending).await.ok()?;
        match &*settled {
            Submission::Settled(result) => result.clone(),
            Submission::Idle | Submission::Pending => None,
        }
    }

    /// Stops all countdowns for good.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        Self::disarm(&mut self.lock());
        debug!("session controller shut down");
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies a reflex result and re-arms timers.
    fn resolve_reflex(self: &Arc<Self>, inner: &mut Inner, success: bool) -> Option<ReflexOutcome> {
        let outcome =
            inner
                .session
                .complete_reflex(success, &self.rules, &self.catalog, &mut *inner.rng)?;
        Self::queue_reflex(inner, outcome, false);
        self.arm(inner);
        Some(outcome)
    }

    /// Handles one countdown tick.
    async fn on_tick(self: &Arc<Self>, kind: TimerKind, epoch: u64) -> ControlFlow<()> {
        let (flow, pending, events) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            if inner.epoch != epoch {
                return ControlFlow::Break(());
            }
            let outcome = match kind {
                TimerKind::Decision => inner.session.tick_decision(&self.rules),
                TimerKind::Reflex => {
                    let before = inner.session.hp();
                    let outcome =
                        inner
                            .session
                            .tick_reflex(&self.rules, &self.catalog, &mut *inner.rng);
                    if matches!(outcome, Some(TickOutcome::Expired | TickOutcome::Lost)) {
                        debug!(hp_before = before, "reflex countdown expired");
                    }
                    outcome
                }
            };

            let flow = match outcome {
                None => return ControlFlow::Break(()),
                Some(TickOutcome::Counting) => ControlFlow::Continue(()),
                Some(expired) => {
                    metrics::record_timeout(kind.as_str());
                    match kind {
                        TimerKind::Decision => {
                            let session_id = inner.session.session_id().unwrap_or_default();
                            info!(%session_id, hp = inner.session.hp(), "decision countdown expired");
                            inner.outbox.push(GameEvent::DecisionTimedOut {
                                timestamp: Utc::now(),
                                session_id,
                                level: inner.session.level(),
                                hp: inner.session.hp(),
                            });
                        }
                        TimerKind::Reflex => {
                            let outcome = if expired == TickOutcome::Lost {
                                ReflexOutcome::Lost
                            } else {
                                ReflexOutcome::Failed
                            };
                            Self::queue_reflex(inner, outcome, true);
                            // The decision countdown takes over.
                            self.arm(inner);
                        }
                    }
                    if inner.session.status() == GameStatus::Playing && kind == TimerKind::Decision {
                        ControlFlow::Continue(())
                    } else {
                        ControlFlow::Break(())
                    }
                }
            };

            let pending = self.settle(inner);
            (flow, pending, self.publish(inner))
        };

        self.flush(events);
        if let Some(record) = pending {
            self.submit(record).await;
        }
        flow
    }

    /// Cancels both countdowns and invalidates in-flight ticks.
    fn disarm(inner: &mut Inner) {
        inner.epoch = inner.epoch.wrapping_add(1);
        inner.decision_timer = None;
        inner.reflex_timer = None;
    }

    /// Re-arms whichever countdown governs the current state.
    fn arm(self: &Arc<Self>, inner: &mut Inner) {
        Self::disarm(inner);
        if self.cancel.is_cancelled() || inner.session.status() != GameStatus::Playing {
            return;
        }
        if inner.session.reflex_active() {
            inner.reflex_timer = Some(self.spawn_timer(TimerKind::Reflex, inner.epoch));
        } else {
            inner.decision_timer = Some(self.spawn_timer(TimerKind::Decision, inner.epoch));
        }
    }

    fn spawn_timer(self: &Arc<Self>, kind: TimerKind, epoch: u64) -> CountdownTimer {
        let weak = Arc::downgrade(self);
        CountdownTimer::spawn(kind, self.rules.tick, self.cancel.child_token(), move || {
            let controller = weak.upgrade();
            async move {
                match controller {
                    Some(controller) => controller.on_tick(kind, epoch).await,
                    None => ControlFlow::Break(()),
                }
            }
        })
    }

    /// Handles a fresh terminal status exactly once; returns the record to
    /// submit.
    fn settle(&self, inner: &mut Inner) -> Option<ScoreRecord> {
        let status = inner.session.status();
        if !status.is_terminal() || inner.finished {
            return None;
        }
        inner.finished = true;
        Self::disarm(inner);
        Self::queue_finished(inner, status.as_str());
        self.submission_tx.send_replace(Submission::Pending);
        Some(inner.session.score_record())
    }

    fn queue_finished(inner: &mut Inner, status: &'static str) {
        let session = &inner.session;
        let session_id = session.session_id().unwrap_or_default();
        info!(
            %session_id,
            status,
            level = session.level(),
            score = session.score(),
            money = session.money(),
            "session finished"
        );
        metrics::record_session_finished(status);
        let event = GameEvent::SessionFinished {
            timestamp: Utc::now(),
            session_id,
            status: status.to_string(),
            level: session.level(),
            score: session.score(),
            money: session.money(),
        };
        inner.outbox.push(event);
    }

    fn queue_reflex(inner: &mut Inner, outcome: ReflexOutcome, expired: bool) {
        let label = match outcome {
            ReflexOutcome::Cleared => "cleared",
            ReflexOutcome::Failed => "failed",
            ReflexOutcome::Lost => "lost",
        };
        let session_id = inner.session.session_id().unwrap_or_default();
        debug!(%session_id, outcome = label, expired, "reflex round resolved");
        metrics::record_reflex(label);
        let event = GameEvent::ReflexResolved {
            timestamp: Utc::now(),
            session_id,
            outcome: label.to_string(),
            expired,
            hp: inner.session.hp(),
        };
        inner.outbox.push(event);
    }

    fn queue_reflex_started(inner: &mut Inner) {
        let command = inner.session.reflex_challenge().unwrap_or_default().to_string();
        let session_id = inner.session.session_id().unwrap_or_default();
        debug!(%session_id, command, "reflex round started");
        let event = GameEvent::ReflexStarted {
            timestamp: Utc::now(),
            session_id,
            level: inner.session.level(),
            command,
        };
        inner.outbox.push(event);
    }

    /// Publishes the committed state to observers and hands back the events
    /// queued by the transition.
    fn publish(&self, inner: &mut Inner) -> Vec<GameEvent> {
        let snapshot = inner.session.snapshot(&self.rules);
        metrics::set_progress(snapshot.level, snapshot.hp);
        self.state_tx.send_replace(snapshot);
        std::mem::take(&mut inner.outbox)
    }

    /// Writes queued events. Call without holding the session lock.
    fn flush(&self, events: Vec<GameEvent>) {
        for event in events {
            self.events.emit(event);
        }
    }

    /// Hands a final score to the sink. Failures are logged, never raised.
    async fn submit(&self, record: ScoreRecord) {
        let session_id = record.session_id;
        let (score, money, level) = (record.score, record.money, record.level);
        let result = match self.sink.submit(record).await {
            Ok(outcome) => {
                info!(
                    session_id = ?session_id,
                    score,
                    is_new_best = outcome.is_new_best,
                    "score submitted"
                );
                metrics::record_score_submission(true);
                self.events.emit(GameEvent::ScoreSubmitted {
                    timestamp: Utc::now(),
                    session_id,
                    score,
                    accepted: true,
                    is_new_best: outcome.is_new_best,
                });
                Some(SessionResult {
                    session_id,
                    score,
                    money,
                    level,
                    is_new_best: outcome.is_new_best,
                })
            }
            Err(e) => {
                warn!(session_id = ?session_id, error = %e, "score submission failed");
                metrics::record_score_submission(false);
                self.events.emit(GameEvent::ScoreSubmitted {
                    timestamp: Utc::now(),
                    session_id,
                    score,
                    accepted: false,
                    is_new_best: false,
                });
                None
            }
        };

        // A newer session owns the submission state now.
        let inner = self.lock();
        if inner.session.session_id() == session_id {
            self.submission_tx.send_replace(Submission::Settled(result));
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
