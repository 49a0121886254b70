//! Session token storage.

use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::token::Token;

/// Storage for issued tokens.
///
/// Implementations must make `insert_new` atomic: two concurrent inserts of
/// the same id can never both succeed.
pub trait TokenStore: Send + Sync + std::fmt::Debug {
    /// Store a token under its id. Hands the token back if the id is taken.
    fn insert_new(&self, token: Token) -> Result<(), Token>;

    /// Look up a token by id.
    fn get(&self, id: &str) -> Option<Token>;

    /// Drop every token expired at `now`. Returns how many were removed.
    fn remove_expired(&self, now: Instant) -> usize;

    /// Number of stored tokens, expired ones included until swept.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: DashMap<String, Token>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn insert_new(&self, token: Token) -> Result<(), Token> {
        match self.tokens.entry(token.id.clone()) {
            Entry::Occupied(_) => Err(token),
            Entry::Vacant(slot) => {
                slot.insert(token);
                Ok(())
            }
        }
    }

    fn get(&self, id: &str) -> Option<Token> {
        self.tokens.get(id).map(|r| r.value().clone())
    }

    fn remove_expired(&self, now: Instant) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, token| !token.is_expired_at(now));
        before.saturating_sub(self.tokens.len())
    }

    fn len(&self) -> usize {
        self.tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn token(id: &str, ttl_secs: u64, issued_at: Instant) -> Token {
        Token {
            id: id.to_string(),
            issued_at,
            ttl: Duration::from_secs(ttl_secs),
            hop_limit: 1,
        }
    }

    #[test]
    fn test_insert_rejects_duplicate_ids() {
        let store = MemoryTokenStore::new();
        let now = Instant::now();

        assert!(store.insert_new(token("abc", 60, now)).is_ok());
        let rejected = store.insert_new(token("abc", 120, now)).unwrap_err();
        assert_eq!(rejected.ttl, Duration::from_secs(120));

        // The original survives untouched.
        assert_eq!(store.get("abc").unwrap().ttl, Duration::from_secs(60));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_expired() {
        let store = MemoryTokenStore::new();
        let now = Instant::now();
        store.insert_new(token("short", 1, now)).unwrap();
        store.insert_new(token("long", 600, now)).unwrap();

        assert_eq!(store.remove_expired(now), 0);
        assert_eq!(store.remove_expired(now + Duration::from_secs(2)), 1);
        assert!(store.get("short").is_none());
        assert!(store.get("long").is_some());
    }
}
