//! In-flight request tracking for graceful shutdown.
//!
//! # Responsibilities
//! - Count requests currently being handled
//! - Let shutdown wait until the count drains to zero
//! - Publish the count as a gauge

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use tokio::sync::Notify;

use crate::observability::metrics;

/// Tracks requests in flight across all connections.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    active: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new request. Returns a guard that decrements on drop.
    pub fn track(&self) -> InFlightGuard {
        let count = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_in_flight(count);
        InFlightGuard {
            tracker: self.clone(),
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Resolve once no request is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a drop in between is not missed.
            notified.as_mut().enable();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Guard for one in-flight request.
/// Decrements the count when dropped, including when the request future is
/// abandoned.
#[derive(Debug)]
pub struct InFlightGuard {
    tracker: InFlightTracker,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let remaining = self.tracker.active.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_in_flight(remaining);
        if remaining == 0 {
            self.tracker.idle.notify_waiters();
        }
    }
}

/// Middleware holding a guard for the duration of each request.
pub async fn track_in_flight(
    State(tracker): State<InFlightTracker>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let _guard = tracker.track();
    next.run(request).await
}
