//! One-shot deadlines owned by actor loops.
//!
//! A `Deadline` is plain state: `arm` sets it, `cancel` clears it, and the
//! owning loop awaits `wait()` inside its `select!`. The loop disarms the
//! deadline when it fires, so a cancelled timer can never call back into
//! state that has moved on.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Arm (or re-arm) the deadline `after` from now.
    pub fn arm(&mut self, after: Duration) {
        self.at = Some(Instant::now() + after);
    }

    pub fn cancel(&mut self) {
        self.at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    /// Resolves when the deadline passes; never resolves while disarmed.
    ///
    /// The returned future owns a copy of the instant, so it does not
    /// borrow the deadline across an await point.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let at = self.at;
        async move {
            match at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        }
    }
}
