//! Endpoint definitions.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::value::Value;
use crate::config::MockConfig;
use crate::routing::context::RequestContext;

/// Top-level metadata category an endpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    MetaData,
    Dynamic,
    UserData,
    Tags,
}

impl Category {
    /// Category of a normalized path, `None` outside the known roots.
    pub fn for_path(path: &str) -> Option<Self> {
        let mut segments = path.split('/');
        if segments.next() != Some("latest") {
            return None;
        }
        match segments.next()? {
            "meta-data" => {
                if segments.next() == Some("tags") {
                    Some(Category::Tags)
                } else {
                    Some(Category::MetaData)
                }
            }
            "dynamic" => Some(Category::Dynamic),
            "user-data" => Some(Category::UserData),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::MetaData => "meta-data",
            Category::Dynamic => "dynamic",
            Category::UserData => "user-data",
            Category::Tags => "tags",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which API generation may read an endpoint.
///
/// `V2` endpoints require a session token even when the server does not
/// enforce tokens globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    #[default]
    V1,
    V2,
}

/// Serialization of an endpoint's value. Fixed per path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Text,
    Json,
    Xml,
}

impl ContentType {
    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Text => "text/plain",
            ContentType::Json => "application/json",
            ContentType::Xml => "text/xml",
        }
    }
}

/// How a request path is matched against an endpoint path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matching {
    /// Only the path itself.
    Exact,
    /// The path and everything below it; the provider sees the rest of the
    /// path as [`ValueContext::remainder`].
    Prefix,
}

/// Inputs available to a value provider.
pub struct ValueContext<'a> {
    pub request: &'a RequestContext,
    pub config: &'a MockConfig,
    /// Part of the request path below a prefix endpoint, empty otherwise.
    pub remainder: &'a str,
    /// When the server started; used for delayed notices.
    pub started_at: Instant,
    pub now: DateTime<Utc>,
}

/// Computes a value per request. `None` means nothing to serve (404).
pub type ProviderFn = fn(&ValueContext<'_>) -> Option<Value>;

/// Source of an endpoint's value.
#[derive(Clone)]
pub enum ValueProvider {
    Fixed(Value),
    Computed(ProviderFn),
}

impl ValueProvider {
    pub fn provide(&self, ctx: &ValueContext<'_>) -> Option<Value> {
        match self {
            ValueProvider::Fixed(value) => Some(value.clone()),
            ValueProvider::Computed(f) => f(ctx),
        }
    }
}

impl fmt::Debug for ValueProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueProvider::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            ValueProvider::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// One entry of the catalog. Immutable once the catalog is built.
#[derive(Debug, Clone)]
pub struct EndpointSpec {
    pub path: String,
    pub category: Category,
    pub schema: SchemaVersion,
    pub content_type: ContentType,
    pub matching: Matching,
    pub provider: ValueProvider,
}

impl EndpointSpec {
    /// A v1 text endpoint at an exact path. The category comes from the
    /// path; see [`Category::for_path`].
    pub fn new(path: impl Into<String>, provider: ValueProvider) -> Self {
        let path = path.into();
        Self {
            category: Category::for_path(&path).unwrap_or(Category::MetaData),
            path,
            schema: SchemaVersion::V1,
            content_type: ContentType::Text,
            matching: Matching::Exact,
            provider,
        }
    }

    pub fn computed(path: impl Into<String>, f: ProviderFn) -> Self {
        Self::new(path, ValueProvider::Computed(f))
    }

    pub fn json(mut self) -> Self {
        self.content_type = ContentType::Json;
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn v2(mut self) -> Self {
        self.schema = SchemaVersion::V2;
        self
    }

    pub fn schema(mut self, schema: SchemaVersion) -> Self {
        self.schema = schema;
        self
    }

    pub fn prefix(mut self) -> Self {
        self.matching = Matching::Prefix;
        self
    }

    pub fn requires_token(&self) -> bool {
        self.schema == SchemaVersion::V2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_for_path() {
        assert_eq!(Category::for_path("latest/meta-data/ami-id"), Some(Category::MetaData));
        assert_eq!(
            Category::for_path("latest/meta-data/tags/instance/Name"),
            Some(Category::Tags)
        );
        assert_eq!(
            Category::for_path("latest/dynamic/instance-identity/document"),
            Some(Category::Dynamic)
        );
        assert_eq!(Category::for_path("latest/user-data"), Some(Category::UserData));
        assert_eq!(Category::for_path("latest/api/token"), None);
        assert_eq!(Category::for_path("other/meta-data"), None);
    }
}
