//! Per-path override resolution.

use std::collections::BTreeMap;

use crate::config::PathOverride;

/// Overrides keyed by normalized path. An override applies to its path and
/// everything below it; the most specific one wins.
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    entries: BTreeMap<String, PathOverride>,
}

impl OverrideTable {
    pub fn new(entries: BTreeMap<String, PathOverride>) -> Self {
        Self { entries }
    }

    /// Find the override governing `path`, with the key it was declared at.
    pub fn resolve(&self, path: &str) -> Option<(&str, &PathOverride)> {
        if self.entries.is_empty() {
            return None;
        }

        let mut candidate = path;
        loop {
            if let Some((key, ov)) = self.entries.get_key_value(candidate) {
                return Some((key.as_str(), ov));
            }
            match candidate.rfind('/') {
                Some(idx) => candidate = &candidate[..idx],
                None if !candidate.is_empty() => candidate = "",
                None => return None,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
