//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Fold config → Validate → Metrics exporter → Bind → Serve
//!
//! One-shot (oneshot.rs):
//!     Fold config → Validate → In-process PUT token + GET → stdout
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain in-flight (≤ grace) → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger config reload
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, listener last (traffic only when ready)
//! - A bad config never binds a socket
//! - Shutdown has timeout: in-flight requests are abandoned after the grace
//!   period

pub mod oneshot;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use oneshot::{fetch, FetchError, FetchOutcome};
pub use shutdown::Shutdown;
pub use startup::{bind, run_persistent, StartupError};
