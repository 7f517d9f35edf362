//! Request-scoped cancellation and deadlines
//!
//! Every resource operation receives a Context as its first parameter. It
//! carries the cancellation signal for the request and an optional deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time;

/// Context carries the cancellation signal and deadline of one request
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                done_tx,
            }),
        }
    }

    /// Derives a context that is cancelled when `timeout` elapses or when
    /// this context is cancelled, whichever comes first. The deadline never
    /// extends past this context's own. Must be called from within a tokio
    /// runtime.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let requested = Instant::now() + timeout;
        let deadline = self
            .inner
            .deadline
            .map_or(requested, |parent| parent.min(requested));

        let mut parent_done = self.done();
        let (done_tx, _) = watch::channel(self.is_cancelled());
        let inner = Arc::new(ContextInner {
            deadline: Some(deadline),
            done_tx,
        });

        // Weak so a dropped child is freed before its deadline
        let child = Arc::downgrade(&inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep_until(deadline.into()) => {}
                parent_gone = async { parent_done.wait_for(|done| *done).await.is_err() } => {
                    // Parent dropped without cancelling, only the deadline is left
                    if parent_gone {
                        time::sleep_until(deadline.into()).await;
                    }
                }
            }
            if let Some(inner) = child.upgrade() {
                inner.done_tx.send_replace(true);
            }
        });

        Self { inner }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done_tx.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Returns a receiver that flips to `true` when work done on behalf of
    /// this context should stop
    pub fn done(&self) -> watch::Receiver<bool> {
        self.inner.done_tx.subscribe()
    }

    pub fn cancel(&self) {
        self.inner.done_tx.send_replace(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
