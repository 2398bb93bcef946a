//! Call-scoped cancellation and deadlines.
//!
//! A [`Context`] is passed to every client call. Derived contexts inherit the
//! parent's deadline and cancellation, so cancelling a parent ends every call
//! made with a context derived from it.
//!
//! # Example
//!
//! ```ignore
//! let (ctx, cancel) = Context::background().with_cancel();
//! let ctx = ctx.with_timeout(Duration::from_secs(5));
//!
//! tokio::spawn(async move {
//!     shutdown.await;
//!     cancel.cancel();
//! });
//!
//! client.query(&ctx, &mut hero, &vars).await?;
//! ```

use std::fmt;
use std::future::{pending, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Cancellation and deadline for one or more calls.
#[derive(Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    signal: Option<Arc<Signal>>,
}

struct Signal {
    cancelled: watch::Receiver<bool>,
    parent: Option<Arc<Signal>>,
}

impl Signal {
    fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow() || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }

    fn wait(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let mut rx = self.cancelled.clone();
            let own = async move {
                // A dropped handle can no longer cancel.
                if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                    pending::<()>().await;
                }
            };
            match &self.parent {
                Some(parent) => {
                    tokio::select! {
                        () = own => {}
                        () = parent.wait() => {}
                    }
                }
                None => own.await,
            }
        })
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a context that expires after `timeout`. A timeout too large
    /// to represent adds no deadline.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// Derives a context that expires at `deadline`, or earlier if this one
    /// already does.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
            signal: self.signal.clone(),
        }
    }

    /// Derives a cancellable context.
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            deadline: self.deadline,
            signal: Some(Arc::new(Signal {
                cancelled: rx,
                parent: self.signal.clone(),
            })),
        };
        (ctx, CancelHandle { tx: Arc::new(tx) })
    }

    /// The effective deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true once this context or an ancestor is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(|s| s.is_cancelled())
    }

    /// Completes when this context or an ancestor is cancelled. Never
    /// completes for an uncancellable context.
    pub async fn cancelled(&self) {
        match &self.signal {
            Some(signal) => signal.wait().await,
            None => pending().await,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Cancels the context returned alongside it by [`Context::with_cancel`].
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Cancels the context and everything derived from it. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &*self.tx.borrow())
            .finish()
    }
}
