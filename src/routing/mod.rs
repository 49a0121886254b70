//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path, headers)
//!     → context.rs (normalize path, collect headers)
//!     → router.rs
//!         token path?        → issue session token
//!         authenticate       → 401 on missing/unknown/expired token
//!         catalog lookup     → 404 on miss
//!         overrides.rs       → most specific override (disable, latency, fault)
//!         value provider     → MockResponse
//! ```
//!
//! # Design Decisions
//! - Router built per configuration, immutable at runtime
//! - No regex in hot path (exact map, then prefix scan)
//! - Deterministic: same input always matches same entry
//! - Errors are typed and mapped to statuses at the HTTP edge

pub mod context;
pub mod error;
pub mod matcher;
pub mod overrides;
pub mod router;

pub use context::RequestContext;
pub use error::RouteError;
pub use router::{MetadataRouter, MockResponse};
