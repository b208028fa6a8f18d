//! Session controller flows driven through the public library API with
//! paused tokio time.

mod common;

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Notify;

use scamdrill::config::{CatalogLoader, GameRules, LoaderOptions};
use scamdrill::content::Catalog;
use scamdrill::error::SinkError;
use scamdrill::observability::EventEmitter;
use scamdrill::session::{
    AnswerOutcome, GameStatus, MemoryScoreSink, PlayerProfile, ReflexOutcome, ScoreRecord,
    ScoreSink, SessionController, SubmitOutcome,
};

// ============================================================================
// Harness
// ============================================================================

fn one_scam_catalog() -> Arc<Catalog> {
    CatalogLoader::new(LoaderOptions::default())
        .load_str(common::ONE_SCAM_CATALOG, Path::new("one-scam.yaml"))
        .unwrap()
        .catalog
}

fn profile() -> PlayerProfile {
    PlayerProfile {
        id: "p-42".to_string(),
        username: "sam".to_string(),
        owned_items: Default::default(),
    }
}

fn calm(max_level: u32) -> GameRules {
    GameRules {
        max_level,
        reflex_chance: 0.0,
        ..GameRules::default()
    }
}

/// Counts submissions and remembers the last record.
#[derive(Default)]
struct CountingSink {
    calls: AtomicU32,
    last: Mutex<Option<ScoreRecord>>,
}

#[async_trait]
impl ScoreSink for CountingSink {
    async fn submit(&self, record: ScoreRecord) -> Result<SubmitOutcome, SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(record);
        Ok(SubmitOutcome { is_new_best: true })
    }
}

/// Always unavailable.
struct FailingSink {
    calls: AtomicU32,
}

#[async_trait]
impl ScoreSink for FailingSink {
    async fn submit(&self, _record: ScoreRecord) -> Result<SubmitOutcome, SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Unavailable("leaderboard offline".to_string()))
    }
}

/// Takes its time before acknowledging, like a remote leaderboard.
struct DelayedSink {
    delay: Duration,
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl ScoreSink for DelayedSink {
    async fn submit(&self, _record: ScoreRecord) -> Result<SubmitOutcome, SinkError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        tokio::time::sleep(self.delay).await;
        Ok(SubmitOutcome { is_new_best: true })
    }
}

#[derive(Clone, Default)]
struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl SharedWriter {
    fn events(&self) -> Vec<serde_json::Value> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn controller_with(rules: GameRules, sink: Arc<dyn ScoreSink>) -> Arc<SessionController> {
    Arc::new(
        SessionController::new(one_scam_catalog(), rules, sink)
            .unwrap()
            .with_rng(StdRng::seed_from_u64(3)),
    )
}

// ============================================================================
// Whole games
// ============================================================================

#[tokio::test(start_paused = true)]
async fn perfect_run_wins_and_submits_once() {
    let sink = Arc::new(CountingSink::default());
    let ctrl = controller_with(calm(3), sink.clone());
    assert!(ctrl.start(Some(&profile())));

    for expected_level in [2, 3] {
        let fb = ctrl.answer(true).await.unwrap();
        assert!(fb.is_correct);
        assert_eq!(fb.outcome, AnswerOutcome::NextScenario);
        assert_eq!(ctrl.snapshot().level, expected_level);
    }
    let fb = ctrl.answer(true).await.unwrap();
    assert_eq!(fb.outcome, AnswerOutcome::Won);

    let snap = ctrl.snapshot();
    assert_eq!(snap.status, GameStatus::Won);
    assert_eq!(snap.level, 3);
    assert_eq!(snap.score, 300);
    assert_eq!(snap.money, 150);
    assert!(snap.current_scenario.is_none());

    // Nothing answers once the game is over, and ending does not resubmit.
    assert!(ctrl.answer(true).await.is_none());
    ctrl.end().await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    let record = sink.last.lock().unwrap().clone().unwrap();
    assert_eq!(record.status, GameStatus::Won);
    assert_eq!(record.player_id, "p-42");
    assert_eq!(record.score, 300);
}

#[tokio::test(start_paused = true)]
async fn wrong_answers_lose_the_game() {
    let sink = Arc::new(MemoryScoreSink::new());
    let ctrl = controller_with(calm(10), sink.clone());
    ctrl.start(Some(&profile()));

    for hp in [75, 50, 25] {
        let fb = ctrl.answer(false).await.unwrap();
        assert!(!fb.is_correct);
        assert_eq!(fb.outcome, AnswerOutcome::Retry);
        assert_eq!(ctrl.snapshot().hp, hp);
    }
    let fb = ctrl.answer(false).await.unwrap();
    assert_eq!(fb.outcome, AnswerOutcome::Lost);
    assert_eq!(ctrl.snapshot().status, GameStatus::Lost);
    assert_eq!(ctrl.snapshot().hp, 0);

    // A zero score on a terminal status still reaches the sink.
    assert_eq!(sink.submissions("p-42"), 1);
    let result = ctrl.result().unwrap();
    assert_eq!(result.score, 0);
    assert_eq!(result.session_id, ctrl.snapshot().session_id);
}

#[tokio::test(start_paused = true)]
async fn idle_player_times_out() {
    let sink = Arc::new(CountingSink::default());
    let rules = GameRules {
        starting_hp: 30,
        decision_time: Duration::from_secs(1),
        ..calm(10)
    };
    let ctrl = controller_with(rules, sink.clone());
    ctrl.start(Some(&profile()));
    let mut rx = ctrl.subscribe();

    while rx.borrow_and_update().status == GameStatus::Playing {
        rx.changed().await.unwrap();
    }
    assert_eq!(ctrl.snapshot().status, GameStatus::Lost);
    assert_eq!(ctrl.snapshot().hp, 0);

    // Let the timer task finish its submission.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    assert!(ctrl.result().is_some());

    // No further countdown fires after the loss.
    let before = ctrl.snapshot();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(ctrl.snapshot(), before);
}

#[tokio::test(start_paused = true)]
async fn ending_mid_game_submits_positive_score() {
    let sink = Arc::new(CountingSink::default());
    let ctrl = controller_with(calm(10), sink.clone());
    ctrl.start(Some(&profile()));
    ctrl.answer(true).await.unwrap();

    ctrl.end().await;
    assert_eq!(ctrl.snapshot().status, GameStatus::Menu);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);

    let hp = ctrl.snapshot().hp;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(ctrl.snapshot().hp, hp, "countdown kept running after end");

    // Ending again is a no-op.
    ctrl.end().await;
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Reflex rounds
// ============================================================================

#[tokio::test(start_paused = true)]
async fn reflex_round_cleared_by_typing() {
    let sink = Arc::new(CountingSink::default());
    let rules = GameRules {
        reflex_chance: 1.0,
        ..GameRules::default()
    };
    let ctrl = controller_with(rules, sink);
    ctrl.start(Some(&profile()));

    let fb = ctrl.answer(true).await.unwrap();
    assert_eq!(fb.outcome, AnswerOutcome::ReflexStarted);
    let snap = ctrl.snapshot();
    assert!(snap.reflex_active);
    assert!(snap.current_scenario.is_none());
    assert_eq!(snap.reflex_challenge.as_deref(), Some("rm -rf malware"));

    assert!(ctrl.submit_reflex_input("rm -rf").await.is_none());
    assert!(ctrl.submit_reflex_input("RM -RF MALWARE").await.is_none());
    assert!(ctrl.snapshot().reflex_active);

    let outcome = ctrl.submit_reflex_input("rm -rf malware").await;
    assert_eq!(outcome, Some(ReflexOutcome::Cleared));
    let snap = ctrl.snapshot();
    assert!(!snap.reflex_active);
    assert_eq!(snap.score, 150);
    assert_eq!(snap.level, 2);
    assert!(snap.current_scenario.is_some());
}

#[tokio::test(start_paused = true)]
async fn reflex_round_expires() {
    let sink = Arc::new(CountingSink::default());
    let rules = GameRules {
        reflex_chance: 1.0,
        ..GameRules::default()
    };
    let ctrl = controller_with(rules, sink);
    ctrl.start(Some(&profile()));
    ctrl.answer(true).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5_050)).await;
    let snap = ctrl.snapshot();
    assert!(!snap.reflex_active);
    assert_eq!(snap.hp, 85);
    assert_eq!(snap.status, GameStatus::Playing);
    assert!(snap.current_scenario.is_some());
    assert!(
        (snap.decision_time_remaining - 20.0).abs() < 0.5,
        "decision countdown should restart, got {}",
        snap.decision_time_remaining
    );

    // A late completion finds nothing to resolve.
    assert!(ctrl.complete_reflex(true).await.is_none());
}

// ============================================================================
// Sink behaviour
// ============================================================================

#[tokio::test(start_paused = true)]
async fn failing_sink_never_breaks_the_game() {
    let sink = Arc::new(FailingSink {
        calls: AtomicU32::new(0),
    });
    let ctrl = controller_with(calm(1), sink.clone());
    ctrl.start(Some(&profile()));

    let fb = ctrl.answer(true).await.unwrap();
    assert_eq!(fb.outcome, AnswerOutcome::Won);
    assert_eq!(ctrl.snapshot().status, GameStatus::Won);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    assert!(ctrl.result().is_none());
    assert!(ctrl.wait_result().await.is_none());

    // The controller stays usable.
    assert!(ctrl.play_again());
    assert_eq!(ctrl.snapshot().status, GameStatus::Playing);
    assert_eq!(ctrl.snapshot().score, 0);
}

/// Rules under which an idle player loses on the first decision timeout.
fn sudden_death() -> GameRules {
    GameRules {
        starting_hp: 10,
        decision_time: Duration::from_millis(300),
        ..calm(10)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn result_waits_for_slow_sink_after_timer_loss() {
    let gate = Arc::new(Notify::new());
    let sink = Arc::new(DelayedSink {
        delay: Duration::from_millis(50),
        gate: Some(gate.clone()),
    });
    let ctrl = controller_with(sudden_death(), sink);
    ctrl.start(Some(&profile()));

    let mut rx = ctrl.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.status == GameStatus::Lost),
    )
    .await
    .unwrap()
    .unwrap();

    // The sink is still holding the record.
    assert!(ctrl.result().is_none());
    let waiter = tokio::spawn({
        let ctrl = ctrl.clone();
        async move { ctrl.wait_result().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!waiter.is_finished());

    gate.notify_one();
    let result = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(result.is_new_best);
    assert_eq!(result.score, 0);
    assert_eq!(result.session_id, ctrl.snapshot().session_id);
    assert_eq!(ctrl.result(), Some(result));
    ctrl.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delayed_sink_result_is_seen_by_waiter() {
    let sink = Arc::new(DelayedSink {
        delay: Duration::from_millis(400),
        gate: None,
    });
    let ctrl = controller_with(sudden_death(), sink);
    ctrl.start(Some(&profile()));

    let mut rx = ctrl.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.status.is_terminal()),
    )
    .await
    .unwrap()
    .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), ctrl.wait_result())
        .await
        .unwrap();
    assert!(result.is_some_and(|r| r.is_new_best));
    ctrl.shutdown();
}

#[tokio::test(start_paused = true)]
async fn answer_and_expiry_race_submits_once() {
    let sink = Arc::new(CountingSink::default());
    let rules = GameRules {
        starting_hp: 10,
        decision_time: Duration::from_millis(500),
        ..calm(10)
    };
    let ctrl = controller_with(rules, sink.clone());
    ctrl.start(Some(&profile()));

    // The fatal tick and the fatal answer land on the same instant; only
    // one of them ends the game.
    tokio::time::sleep(Duration::from_millis(500)).await;
    if let Some(fb) = ctrl.answer(false).await {
        assert_eq!(fb.outcome, AnswerOutcome::Lost);
    }
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(ctrl.snapshot().status, GameStatus::Lost);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn restart_discards_previous_result() {
    let sink = Arc::new(MemoryScoreSink::new());
    let ctrl = controller_with(calm(1), sink.clone());
    ctrl.start(Some(&profile()));
    ctrl.answer(true).await.unwrap();
    assert!(ctrl.result().unwrap().is_new_best);

    ctrl.play_again();
    assert!(ctrl.result().is_none());
    ctrl.answer(true).await.unwrap();
    // Same score again is not a new best.
    assert!(!ctrl.result().unwrap().is_new_best);
    assert_eq!(sink.submissions("p-42"), 2);
}

// ============================================================================
// Lifecycle and events
// ============================================================================

#[tokio::test(start_paused = true)]
async fn shutdown_stops_timers() {
    let sink = Arc::new(CountingSink::default());
    let ctrl = controller_with(calm(10), sink.clone());
    ctrl.start(Some(&profile()));
    ctrl.shutdown();

    tokio::time::sleep(Duration::from_secs(120)).await;
    let snap = ctrl.snapshot();
    assert_eq!(snap.hp, 100);
    assert_eq!(snap.status, GameStatus::Playing);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn events_trace_a_session() {
    let writer = SharedWriter::default();
    let events = Arc::new(EventEmitter::new(Box::new(writer.clone())));
    let rules = GameRules {
        decision_time: Duration::from_secs(1),
        ..calm(2)
    };
    let ctrl = Arc::new(
        SessionController::new(one_scam_catalog(), rules, Arc::new(MemoryScoreSink::new()))
            .unwrap()
            .with_rng(StdRng::seed_from_u64(3))
            .with_events(events.clone()),
    );

    ctrl.start(Some(&profile()));
    tokio::time::sleep(Duration::from_millis(1_050)).await;
    ctrl.answer(true).await.unwrap();
    ctrl.answer(true).await.unwrap();

    let kinds: Vec<String> = writer
        .events()
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        kinds,
        [
            "SessionStarted",
            "DecisionTimedOut",
            "AnswerJudged",
            "AnswerJudged",
            "SessionFinished",
            "ScoreSubmitted",
        ]
    );

    let all = writer.events();
    assert_eq!(all[1]["hp"], 90);
    assert_eq!(all[4]["status"], "won");
    assert_eq!(all[5]["accepted"], true);
    let sequences: Vec<u64> = all.iter().map(|e| e["sequence"].as_u64().unwrap()).collect();
    assert_eq!(sequences, (0..6).collect::<Vec<_>>());
    assert_eq!(events.event_count(), 6);
}
