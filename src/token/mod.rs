//! Session token (IMDSv2) subsystem.
//!
//! # Data Flow
//! ```text
//! PUT /latest/api/token  (X-aws-ec2-metadata-token-ttl-seconds: N)
//!     → parse_ttl (1..=max, else 400)
//!     → TokenManager::issue (fresh id, insert_new into TokenStore)
//!     → token returned in body and X-aws-ec2-metadata-token
//!
//! GET <path>  (X-aws-ec2-metadata-token: id)
//!     → TokenManager::validate → Valid | Expired | Unknown
//!     → router answers 401 unless Valid
//!
//! sweeper.rs: periodic remove_expired until shutdown
//! ```
//!
//! # Design Decisions
//! - Tokens are multi-use within their TTL; validation never consumes or
//!   extends them
//! - The store sits behind a trait and is injected, so it outlives router
//!   rebuilds on config reload
//! - Hop limit is recorded but never decremented in a single-host mock

pub mod store;
pub mod sweeper;

use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::observability::metrics;

pub use store::{MemoryTokenStore, TokenStore};
pub use sweeper::TokenSweeper;

/// Largest TTL the real service accepts, in seconds.
pub const MAX_TTL_SECS: u64 = 21_600;

/// An issued session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: String,
    pub issued_at: Instant,
    pub ttl: Duration,
    pub hop_limit: u8,
}

impl Token {
    pub fn expires_at(&self) -> Instant {
        self.issued_at + self.ttl
    }

    /// A token is expired strictly after `issued_at + ttl`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at()
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.expires_at().saturating_duration_since(now)
    }
}

/// Outcome of validating a token id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid(Token),
    Expired,
    Unknown,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }

    /// Label used in logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Validation::Valid(_) => "valid",
            Validation::Expired => "expired",
            Validation::Unknown => "unknown",
        }
    }
}

/// Rejected token request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssueError {
    #[error("missing token TTL header")]
    MissingTtl,
    #[error("token TTL '{0}' is not an integer")]
    InvalidTtl(String),
    #[error("token TTL {ttl} is outside 1..={max}")]
    TtlOutOfRange { ttl: u64, max: u64 },
}

/// Parse the TTL header of a token request.
pub fn parse_ttl(header: Option<&str>, max_secs: u64) -> Result<u64, IssueError> {
    let raw = header.map(str::trim).ok_or(IssueError::MissingTtl)?;
    let ttl = raw
        .parse::<u64>()
        .map_err(|_| IssueError::InvalidTtl(raw.to_string()))?;
    if ttl == 0 || ttl > max_secs {
        return Err(IssueError::TtlOutOfRange { ttl, max: max_secs });
    }
    Ok(ttl)
}

/// Issues and validates session tokens against an injected store.
#[derive(Debug, Clone)]
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Manager backed by a fresh [`MemoryTokenStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()))
    }

    /// Issue a token valid for `ttl_secs` from now.
    pub fn issue(&self, ttl_secs: u64, hop_limit: u8) -> Token {
        self.issue_at(ttl_secs, hop_limit, Instant::now())
    }

    /// Issue a token valid for `ttl_secs` from `now`.
    pub fn issue_at(&self, ttl_secs: u64, hop_limit: u8, now: Instant) -> Token {
        let mut token = Token {
            id: new_token_id(),
            issued_at: now,
            ttl: Duration::from_secs(ttl_secs),
            hop_limit,
        };

        // The store decides uniqueness.
        while let Err(mut taken) = self.store.insert_new(token.clone()) {
            tracing::warn!("Token id collision, regenerating");
            taken.id = new_token_id();
            token = taken;
        }

        metrics::record_token_issued(self.store.len());
        tracing::debug!(ttl_secs, hop_limit, "Issued session token");
        token
    }

    /// Validate a token id now.
    pub fn validate(&self, id: &str) -> Validation {
        self.validate_at(id, Instant::now())
    }

    /// Validate a token id against a caller-supplied clock.
    pub fn validate_at(&self, id: &str, now: Instant) -> Validation {
        match self.store.get(id) {
            None => Validation::Unknown,
            Some(token) if token.is_expired_at(now) => Validation::Expired,
            Some(token) => Validation::Valid(token),
        }
    }

    /// Remove expired tokens. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let removed = self.store.remove_expired(now);
        metrics::record_active_tokens(self.store.len());
        removed
    }

    /// Number of tokens held, expired ones included until swept.
    pub fn active(&self) -> usize {
        self.store.len()
    }
}

fn new_token_id() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
