//! Periodic countdown tasks.
//!
//! A [`CountdownTimer`] spawns a task that invokes a callback once per
//! tick until the callback breaks or the timer is cancelled. Dropping the
//! timer cancels it, so replacing a timer in place is enough to stop the
//! previous one.

use std::fmt;
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Which countdown a timer drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerKind {
    /// Time left to answer the current scenario.
    Decision,
    /// Time left to retype the reflex command.
    Reflex,
}

impl TimerKind {
    /// Lower-case label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Reflex => "reflex",
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a running countdown task.
///
/// The task is detached; dropping the handle cancels it.
#[derive(Debug)]
pub struct CountdownTimer {
    cancel: CancellationToken,
}

impl CountdownTimer {
    /// Spawns a task that calls `on_tick` every `period`, starting one
    /// period from now.
    ///
    /// The task stops when `on_tick` returns `ControlFlow::Break`, when
    /// `cancel` is cancelled, or when the timer is dropped.
    pub fn spawn<F, Fut>(
        kind: TimerKind,
        period: Duration,
        cancel: CancellationToken,
        mut on_tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send,
    {
        let token = cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        debug!(timer = %kind, "countdown cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        if on_tick().await.is_break() {
                            debug!(timer = %kind, "countdown finished");
                            break;
                        }
                    }
                }
            }
        });
        Self { cancel }
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting(
        count: &Arc<AtomicU32>,
        stop_at: u32,
    ) -> impl FnMut() -> std::future::Ready<ControlFlow<()>> + Send + 'static {
        let count = Arc::clone(count);
        move || {
            let n = count.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if n >= stop_at {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_period() {
        let count = Arc::new(AtomicU32::new(0));
        let timer = CountdownTimer::spawn(
            TimerKind::Decision,
            Duration::from_millis(100),
            CancellationToken::new(),
            counting(&count, u32::MAX),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 10);
        drop(timer);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_stops_task() {
        let count = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let _timer = CountdownTimer::spawn(
            TimerKind::Reflex,
            Duration::from_millis(100),
            cancel.clone(),
            counting(&count, 3),
        );
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let count = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let timer = CountdownTimer::spawn(
            TimerKind::Decision,
            Duration::from_millis(100),
            cancel.clone(),
            counting(&count, u32::MAX),
        );
        tokio::time::sleep(Duration::from_millis(250)).await;
        drop(timer);
        assert!(cancel.is_cancelled());

        let seen = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_token_cancels() {
        let count = Arc::new(AtomicU32::new(0));
        let parent = CancellationToken::new();
        let _timer = CountdownTimer::spawn(
            TimerKind::Reflex,
            Duration::from_millis(100),
            parent.child_token(),
            counting(&count, u32::MAX),
        );
        parent.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(TimerKind::Decision.to_string(), "decision");
        assert_eq!(TimerKind::Reflex.as_str(), "reflex");
    }
}
