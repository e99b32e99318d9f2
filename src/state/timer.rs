//! Cancellable single-fire timers bound to a session.
//!
//! A fired timer only acts after re-locking its conversation and finding its
//! own token still installed on the session. Aborting the task is cleanup; the
//! token comparison is what makes a stale timer a no-op.

use std::{fmt, future::Future, time::Duration};

use serde::Serialize;
use tokio::task::AbortHandle;
use uuid::Uuid;

/// Identity of one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TimerToken(Uuid);

impl TimerToken {
    /// Allocate a fresh token.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimerToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the timer is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Deadline for answering the open question.
    AnswerDeadline,
    /// Pause between the feedback and the next question.
    Advance,
}

/// A scheduled task owned by a session.
///
/// Dropping an armed timer aborts its task.
#[derive(Debug)]
pub struct QuestionTimer {
    token: TimerToken,
    kind: TimerKind,
    handle: Option<AbortHandle>,
}

impl QuestionTimer {
    /// Spawn `fire` after `delay`; the future receives nothing and must check
    /// the token itself.
    pub fn arm<F>(token: TimerToken, kind: TimerKind, delay: Duration, fire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire.await;
        });

        Self {
            token,
            kind,
            handle: Some(task.abort_handle()),
        }
    }

    /// Token the fired task will present.
    pub fn token(&self) -> TimerToken {
        self.token
    }

    /// What the timer is waiting for.
    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    /// Cancel the timer; a task that already woke up will find its token gone.
    pub fn cancel(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Consume the timer from inside its own task without aborting it.
    pub fn expire(mut self) {
        self.handle = None;
    }
}

impl Drop for QuestionTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    fn counting_timer(counter: &Arc<AtomicUsize>, delay: Duration) -> QuestionTimer {
        let counter = counter.clone();
        QuestionTimer::arm(
            TimerToken::new(),
            TimerKind::AnswerDeadline,
            delay,
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn armed_timer_fires_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let timer = counting_timer(&counter, Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        timer.expire();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let counter = Arc::new(AtomicUsize::new(0));
        let timer = counting_timer(&counter, Duration::from_secs(5));

        timer.cancel();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_timer_never_fires() {
        let counter = Arc::new(AtomicUsize::new(0));
        drop(counting_timer(&counter, Duration::from_secs(5)));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(TimerToken::new(), TimerToken::new());
    }
}
