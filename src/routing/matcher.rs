//! Metadata path normalization and matching.
//!
//! # Responsibilities
//! - Normalize request paths into catalog keys
//! - Alias dated API versions to `latest`
//! - Match segment prefixes (directories, prefix endpoints, overrides)
//!
//! # Design Decisions
//! - Keys have no leading or trailing `/` and no empty segments
//! - Matching is case-sensitive, like the real service
//! - Prefixes only match on segment boundaries: `a/b` matches `a/b/c`,
//!   never `a/bc`

/// API versions the real service accepts as aliases of `latest`.
pub const API_VERSIONS: &[&str] = &[
    "1.0",
    "2007-01-19",
    "2007-03-01",
    "2007-08-29",
    "2007-10-10",
    "2007-12-15",
    "2008-02-01",
    "2008-09-01",
    "2009-04-04",
    "2011-01-01",
    "2011-05-01",
    "2012-01-12",
    "2014-02-25",
    "2014-11-05",
    "2015-10-20",
    "2016-04-19",
    "2016-06-30",
    "2016-09-02",
    "2018-03-28",
    "2018-08-17",
    "2018-09-24",
    "2019-10-01",
    "2020-10-27",
    "2021-01-03",
    "2021-03-23",
    "2021-07-15",
    "2022-09-24",
    "2023-11-17",
];

/// Normalize a request path into a catalog key.
///
/// ```text
/// "/latest/meta-data/"          -> "latest/meta-data"
/// "//latest//meta-data/ami-id"  -> "latest/meta-data/ami-id"
/// "/2021-07-15/meta-data/mac"   -> "latest/meta-data/mac"
/// "/"                           -> ""
/// ```
pub fn normalize_path(raw: &str) -> String {
    let mut segments = raw.split('/').filter(|s| !s.is_empty()).peekable();

    let mut out = String::with_capacity(raw.len());
    if let Some(first) = segments.peek() {
        if API_VERSIONS.contains(first) {
            segments.next();
            out.push_str("latest");
        }
    }

    for segment in segments {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

/// Matches normalized paths on a segment prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new matcher. The prefix is normalized.
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: normalize_path(prefix.as_ref()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the rest of `path` below the prefix, or `None` if the path is
    /// not the prefix itself or a descendant of it.
    ///
    /// The empty prefix matches everything.
    pub fn remainder<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.prefix.is_empty() {
            return Some(path);
        }
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some(rest)
        } else {
            rest.strip_prefix('/')
        }
    }

    /// Returns true if `path` is the prefix or below it.
    pub fn matches(&self, path: &str) -> bool {
        self.remainder(path).is_some()
    }
}
