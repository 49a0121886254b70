//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults ─┐
//! override file ─────┤  (TOML tables, lowest precedence first)
//! config file ───────┤
//! CLI flags ─────────┘
//!     → loader.rs (deep merge, deserialize once)
//!     → validation.rs (semantic checks, catalog build)
//!     → MockConfig (validated, immutable)
//!     → shared via Arc by the router
//!
//! On reload (file change or SIGHUP):
//!     watcher.rs re-folds the same sources
//!     → validation.rs validates
//!     → router rebuilt and swapped atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load, ConfigError, ConfigLayer, ConfigSources, FlagOverrides, LayerSource};
pub use schema::{
    CustomEndpoint, ImdsConfig, LatencyRange, MetadataValues, MockConfig, PathOverride,
    ServerConfig,
};
pub use validation::ValidationError;
