//! Mock EC2 instance metadata service (IMDS) library.

pub mod catalog;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod token;

pub use config::MockConfig;
pub use http::MockServer;
pub use lifecycle::Shutdown;
