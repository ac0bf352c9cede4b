//! Submission lifecycle: `Idle → Submitting → Delayed → Timeout`.
//!
//! Entering `Submitting` arms two timers. The delay timer moves
//! `Submitting → Delayed`, the timeout timer moves `Delayed → Timeout`.
//! `completed` cancels both and returns to `Idle`.
//!
//! Stores are published from the status read at publication time, one
//! publisher at a time, so a late timer cannot overwrite a newer status.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::store::Store;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FetchStatus {
    #[default]
    Idle,
    Submitting,
    Delayed,
    Timeout,
}

#[derive(Default)]
struct Timers {
    status: FetchStatus,
    delay: Option<JoinHandle<()>>,
    timeout: Option<JoinHandle<()>>,
}

impl Timers {
    fn cancel(&mut self) {
        if let Some(handle) = self.delay.take() {
            handle.abort();
        }
        if let Some(handle) = self.timeout.take() {
            handle.abort();
        }
    }
}

/// Cloneable handle; clones share state, timers and stores.
#[derive(Clone)]
pub struct SubmitLifecycle {
    state: Arc<Mutex<Timers>>,
    publishing: Arc<ReentrantMutex<()>>,
    delay_after: Duration,
    timeout_after: Duration,
    pub submitting: Store<bool>,
    pub delayed: Store<bool>,
    pub timeout: Store<bool>,
}

impl SubmitLifecycle {
    pub fn new(delay_after: Duration, timeout_after: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(Timers::default())),
            publishing: Arc::new(ReentrantMutex::new(())),
            delay_after,
            timeout_after,
            submitting: Store::new(false),
            delayed: Store::new(false),
            timeout: Store::new(false),
        }
    }

    pub fn status(&self) -> FetchStatus {
        self.state.lock().status
    }

    /// True while a request is in flight and has not timed out.
    pub fn is_submitting(&self) -> bool {
        matches!(
            self.status(),
            FetchStatus::Submitting | FetchStatus::Delayed
        )
    }

    /// Enters `Submitting` (or stays `Delayed`) and re-arms both timers.
    /// Must be called inside a tokio runtime.
    pub fn submitting(&self) {
        let status = {
            let mut state = self.state.lock();
            state.cancel();
            if state.status != FetchStatus::Delayed {
                state.status = FetchStatus::Submitting;
            }
            state.delay = Some(self.arm(self.delay_after, FetchStatus::Submitting, FetchStatus::Delayed));
            state.timeout = Some(self.arm(self.timeout_after, FetchStatus::Delayed, FetchStatus::Timeout));
            state.status
        };
        debug!(?status, "submission started");
        self.publish_current();
    }

    /// Cancels the timers and returns to `Idle`.
    pub fn completed(&self) {
        {
            let mut state = self.state.lock();
            state.cancel();
            state.status = FetchStatus::Idle;
        }
        debug!("submission completed");
        self.publish_current();
    }

    fn arm(&self, after: Duration, from: FetchStatus, to: FetchStatus) -> JoinHandle<()> {
        let lifecycle = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            lifecycle.advance(from, to);
        })
    }

    fn advance(&self, from: FetchStatus, to: FetchStatus) {
        let advanced = {
            let mut state = self.state.lock();
            if state.status == from {
                state.status = to;
                true
            } else {
                false
            }
        };
        if advanced {
            debug!(?to, "submission state advanced");
            self.publish_current();
        }
    }

    fn publish_current(&self) {
        let _publishing = self.publishing.lock();
        let status = self.status();
        self.submitting
            .set_if_changed(status >= FetchStatus::Submitting);
        self.delayed.set_if_changed(status >= FetchStatus::Delayed);
        self.timeout.set_if_changed(status >= FetchStatus::Timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifecycle() -> SubmitLifecycle {
        SubmitLifecycle::new(Duration::from_millis(500), Duration::from_millis(8000))
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn walks_through_delayed_and_timeout() {
        let lc = lifecycle();
        lc.submitting();
        assert_eq!(lc.status(), FetchStatus::Submitting);
        assert!(lc.submitting.get());
        assert!(!lc.delayed.get());

        advance(501).await;
        assert_eq!(lc.status(), FetchStatus::Delayed);
        assert!(lc.delayed.get());
        assert!(lc.is_submitting());

        advance(7600).await;
        assert_eq!(lc.status(), FetchStatus::Timeout);
        assert!(lc.timeout.get());
        assert!(!lc.is_submitting());

        lc.completed();
        assert_eq!(lc.status(), FetchStatus::Idle);
        assert!(!lc.submitting.get());
        assert!(!lc.delayed.get());
        assert!(!lc.timeout.get());
    }

    #[tokio::test(start_paused = true)]
    async fn completion_cancels_pending_timers() {
        let lc = lifecycle();
        lc.submitting();
        advance(100).await;
        lc.completed();
        advance(10_000).await;
        assert_eq!(lc.status(), FetchStatus::Idle);
        assert!(!lc.delayed.get());
    }

    #[test]
    fn late_publication_reflects_the_current_status() {
        let lc = lifecycle();
        // A timer moved the status but has not published yet.
        lc.state.lock().status = FetchStatus::Delayed;
        lc.completed();
        lc.publish_current();
        assert_eq!(lc.status(), FetchStatus::Idle);
        assert!(!lc.submitting.get());
        assert!(!lc.delayed.get());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_timers_never_leave_stale_flags() {
        let lc = SubmitLifecycle::new(Duration::ZERO, Duration::from_millis(1));
        for _ in 0..200 {
            lc.submitting();
            tokio::task::yield_now().await;
            lc.completed();
            tokio::time::sleep(Duration::from_millis(2)).await;
            assert_eq!(lc.status(), FetchStatus::Idle);
            assert!(!lc.delayed.get());
            assert!(!lc.timeout.get());
        }
    }

    #[test]
    fn subscribers_may_read_the_status() {
        let lc = lifecycle();
        let observer = lc.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        lc.submitting.subscribe(move |_| sink.lock().push(observer.status()));
        lc.state.lock().status = FetchStatus::Submitting;
        lc.publish_current();
        lc.completed();
        assert_eq!(*seen.lock(), vec![FetchStatus::Submitting, FetchStatus::Idle]);
    }

    #[tokio::test(start_paused = true)]
    async fn re_entering_while_delayed_stays_delayed() {
        let lc = lifecycle();
        lc.submitting();
        advance(600).await;
        assert_eq!(lc.status(), FetchStatus::Delayed);

        lc.submitting();
        assert_eq!(lc.status(), FetchStatus::Delayed);
        assert!(lc.delayed.get());
    }
}
