//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, catch-all handler)
//!     → inflight.rs (count the request for shutdown draining)
//!     → request.rs (RequestContext from method, path, headers)
//!     → [routing::MetadataRouter]
//!     → response.rs (MockResponse / RouteError into HTTP)
//!     → Send to client
//! ```

pub mod inflight;
pub mod request;
pub mod response;
pub mod server;

pub use inflight::InFlightTracker;
pub use request::X_REQUEST_ID;
pub use server::MockServer;
