//! Resilience testing subsystem.
//!
//! # Data Flow
//! ```text
//! Resolved override (or global [latency])
//!     → latency.rs (sample a delay, sleep in the request's own task)
//!     → faults.rs (decide whether a forced status fires)
//! ```
//!
//! # Design Decisions
//! - Injection is per request; no shared state, so a slow path never
//!   delays another
//! - Deterministic unless a probability is configured

pub mod faults;
pub mod latency;

pub use faults::FaultRoll;
pub use latency::LatencyInjector;
