//! Endpoint catalog subsystem.
//!
//! # Data Flow
//! ```text
//! MockConfig
//!     → builtin.rs (built-in tree, paths laid out from config)
//!     → [[endpoints]] custom entries
//!     → Catalog (BTreeMap keyed by normalized path, checked for conflicts)
//!
//! Request path (normalized)
//!     → exact leaf?         → Leaf { spec, remainder: "" }
//!     → prefix endpoint?    → Leaf { spec, remainder }   (longest wins)
//!     → directory of keys?  → Directory(children)
//!     → NotFound
//! ```
//!
//! # Design Decisions
//! - The catalog is rebuilt with the config and never mutated
//! - Values are computed per request, so a config swap changes what is
//!   served without touching endpoint identity
//! - A path is either a leaf or a directory, never both

pub mod builtin;
pub mod endpoint;
pub mod value;

use std::collections::BTreeMap;

pub use endpoint::{
    Category, ContentType, EndpointSpec, Matching, ProviderFn, SchemaVersion, ValueContext,
    ValueProvider,
};
pub use value::Value;

use crate::config::MockConfig;
use crate::routing::matcher::{normalize_path, PathPrefixMatcher};

/// Error building the catalog from configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("endpoint path '{0}' is outside latest/meta-data, latest/dynamic and latest/user-data")]
    OutsideRoots(String),

    #[error("endpoint path '{0}' is declared more than once")]
    Duplicate(String),

    #[error("endpoint path '{leaf}' is a leaf but '{child}' lies below it")]
    Conflict { leaf: String, child: String },
}

/// Result of a catalog lookup.
#[derive(Debug)]
pub enum Lookup<'a> {
    Leaf {
        spec: &'a EndpointSpec,
        /// Path below a prefix endpoint; empty for exact matches.
        remainder: String,
    },
    /// Immediate children of a directory, sorted. Subdirectories and prefix
    /// endpoints end with `/`.
    Directory(Vec<String>),
    NotFound,
}

impl Lookup<'_> {
    pub fn spec(&self) -> Option<&EndpointSpec> {
        match self {
            Lookup::Leaf { spec, .. } => Some(spec),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, Lookup::NotFound)
    }
}

/// Immutable tree of metadata endpoints.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: BTreeMap<String, EndpointSpec>,
    /// Prefix endpoints, longest first.
    prefixes: Vec<PathPrefixMatcher>,
}

impl Catalog {
    /// Build the catalog for a configuration: the built-in tree plus custom
    /// endpoints. A custom endpoint may replace a built-in one.
    pub fn from_config(config: &MockConfig) -> Result<Self, CatalogError> {
        let mut entries = BTreeMap::new();
        for spec in builtin::endpoints(config) {
            entries.insert(spec.path.clone(), spec);
        }

        let mut custom_seen = std::collections::HashSet::new();
        for custom in &config.endpoints {
            let path = normalize_path(&custom.path);
            let category =
                Category::for_path(&path).ok_or_else(|| CatalogError::OutsideRoots(path.clone()))?;
            if !custom_seen.insert(path.clone()) {
                return Err(CatalogError::Duplicate(path));
            }

            let mut spec = EndpointSpec::new(
                path.clone(),
                ValueProvider::Fixed(Value::from(custom.value.clone())),
            )
            .content_type(custom.content_type)
            .schema(custom.schema);
            spec.category = category;

            if entries.insert(path.clone(), spec).is_some() {
                tracing::debug!(path = %path, "Custom endpoint replaces built-in entry");
            }
        }

        Self::from_entries(entries)
    }

    #[cfg(test)]
    fn from_specs(specs: Vec<EndpointSpec>) -> Result<Self, CatalogError> {
        let mut entries = BTreeMap::new();
        for spec in specs {
            let path = spec.path.clone();
            if entries.insert(path.clone(), spec).is_some() {
                return Err(CatalogError::Duplicate(path));
            }
        }
        Self::from_entries(entries)
    }

    fn from_entries(entries: BTreeMap<String, EndpointSpec>) -> Result<Self, CatalogError> {
        for key in entries.keys() {
            let below = format!("{key}/");
            if let Some((child, _)) = entries.range(below.clone()..).next() {
                if child.starts_with(&below) {
                    return Err(CatalogError::Conflict {
                        leaf: key.clone(),
                        child: child.clone(),
                    });
                }
            }
        }

        let mut prefixes: Vec<PathPrefixMatcher> = entries
            .values()
            .filter(|spec| spec.matching == Matching::Prefix)
            .map(|spec| PathPrefixMatcher::new(&spec.path))
            .collect();
        prefixes.sort_by(|a, b| b.prefix().len().cmp(&a.prefix().len()));

        Ok(Self { entries, prefixes })
    }

    /// Resolve a normalized path.
    pub fn lookup(&self, path: &str) -> Lookup<'_> {
        if let Some(spec) = self.entries.get(path) {
            return Lookup::Leaf {
                spec,
                remainder: String::new(),
            };
        }

        for matcher in &self.prefixes {
            if let Some(rest) = matcher.remainder(path) {
                if let Some(spec) = self.entries.get(matcher.prefix()) {
                    return Lookup::Leaf {
                        spec,
                        remainder: rest.to_string(),
                    };
                }
            }
        }

        let children = self.children(path);
        if children.is_empty() {
            Lookup::NotFound
        } else {
            Lookup::Directory(children)
        }
    }

    /// True if the path is a leaf, lies below a prefix endpoint, or is a
    /// directory.
    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_found()
    }

    pub fn get(&self, path: &str) -> Option<&EndpointSpec> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointSpec> {
        self.entries.values()
    }

    fn children(&self, dir: &str) -> Vec<String> {
        let start = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        let mut out: Vec<String> = Vec::new();
        for (key, spec) in self.entries.range(start.clone()..) {
            let Some(rest) = key.strip_prefix(start.as_str()) else {
                break;
            };
            let child = match rest.split_once('/') {
                Some((head, _)) => format!("{head}/"),
                None if spec.matching == Matching::Prefix => format!("{rest}/"),
                None => rest.to_string(),
            };
            if !out.contains(&child) {
                out.push(child);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(path: &str, value: &str) -> EndpointSpec {
        EndpointSpec::new(path, ValueProvider::Fixed(Value::text(value)))
    }

    #[test]
    fn test_exact_lookup() {
        let catalog = Catalog::from_config(&MockConfig::default()).unwrap();
        match catalog.lookup("latest/meta-data/instance-id") {
            Lookup::Leaf { spec, remainder } => {
                assert_eq!(spec.path, "latest/meta-data/instance-id");
                assert_eq!(spec.category, Category::MetaData);
                assert!(remainder.is_empty());
            }
            other => panic!("expected leaf, got {other:?}"),
        }
    }

    #[test]
    fn test_directory_listing() {
        let catalog = Catalog::from_config(&MockConfig::default()).unwrap();
        let Lookup::Directory(children) = catalog.lookup("latest/meta-data/placement") else {
            panic!("expected directory");
        };
        assert_eq!(
            children,
            vec!["availability-zone", "availability-zone-id", "region"]
        );

        let Lookup::Directory(children) = catalog.lookup("latest/meta-data") else {
            panic!("expected directory");
        };
        assert!(children.contains(&"instance-id".to_string()));
        assert!(children.contains(&"network/".to_string()));
        assert!(children.contains(&"tags/".to_string()));

        let Lookup::Directory(children) = catalog.lookup("") else {
            panic!("expected root directory");
        };
        assert_eq!(children, vec!["latest/"]);
    }

    #[test]
    fn test_mac_tree_uses_configured_mac() {
        let mut config = MockConfig::default();
        config.metadata.mac = "02:00:00:00:00:01".into();
        let catalog = Catalog::from_config(&config).unwrap();

        let Lookup::Directory(children) =
            catalog.lookup("latest/meta-data/network/interfaces/macs")
        else {
            panic!("expected directory");
        };
        assert_eq!(children, vec!["02:00:00:00:00:01/"]);
        assert!(catalog
            .get("latest/meta-data/network/interfaces/macs/02:00:00:00:00:01/vpc-id")
            .is_some());
    }

    #[test]
    fn test_prefix_endpoint_receives_remainder() {
        let catalog = Catalog::from_config(&MockConfig::default()).unwrap();
        match catalog.lookup("latest/meta-data/tags/instance/Name") {
            Lookup::Leaf { spec, remainder } => {
                assert_eq!(spec.category, Category::Tags);
                assert_eq!(spec.schema, SchemaVersion::V2);
                assert_eq!(remainder, "Name");
            }
            other => panic!("expected prefix leaf, got {other:?}"),
        }

        let Lookup::Directory(children) = catalog.lookup("latest/meta-data/tags") else {
            panic!("expected directory");
        };
        assert_eq!(children, vec!["instance/"]);
    }

    #[test]
    fn test_unknown_path() {
        let catalog = Catalog::from_config(&MockConfig::default()).unwrap();
        assert!(matches!(catalog.lookup("latest/meta-data/nope"), Lookup::NotFound));
        assert!(matches!(catalog.lookup("latest/meta-data/instance-idx"), Lookup::NotFound));
        assert!(!catalog.contains("latest/api/token"));
    }

    #[test]
    fn test_optional_trees_follow_config() {
        let catalog = Catalog::from_config(&MockConfig::default()).unwrap();
        assert!(!catalog.contains("latest/meta-data/spot/instance-action"));

        let mut config = MockConfig::default();
        config.spot.enabled = true;
        config.autoscaling.enabled = true;
        config.metadata.tags_enabled = false;
        let catalog = Catalog::from_config(&config).unwrap();
        assert!(catalog.contains("latest/meta-data/spot/instance-action"));
        assert!(catalog.contains("latest/meta-data/autoscaling/target-lifecycle-state"));
        assert!(!catalog.contains("latest/meta-data/tags/instance"));
    }

    #[test]
    fn test_leaf_directory_conflict() {
        let err = Catalog::from_specs(vec![
            fixed("latest/meta-data/a", "1"),
            fixed("latest/meta-data/a/b", "2"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            CatalogError::Conflict {
                leaf: "latest/meta-data/a".into(),
                child: "latest/meta-data/a/b".into(),
            }
        );
    }

    #[test]
    fn test_sibling_with_shared_stem_is_not_a_conflict() {
        let catalog = Catalog::from_specs(vec![
            fixed("latest/meta-data/a", "1"),
            fixed("latest/meta-data/a-b", "2"),
        ])
        .unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_custom_endpoints() {
        let mut config = MockConfig::default();
        config.endpoints.push(crate::config::CustomEndpoint {
            path: "/latest/meta-data/custom/flag/".into(),
            value: serde_json::json!("on"),
            content_type: ContentType::Text,
            schema: SchemaVersion::V1,
        });
        let catalog = Catalog::from_config(&config).unwrap();
        assert!(catalog.get("latest/meta-data/custom/flag").is_some());

        config.endpoints.push(config.endpoints[0].clone());
        assert_eq!(
            Catalog::from_config(&config).unwrap_err(),
            CatalogError::Duplicate("latest/meta-data/custom/flag".into())
        );
    }

    #[test]
    fn test_custom_endpoint_outside_roots() {
        let mut config = MockConfig::default();
        config.endpoints.push(crate::config::CustomEndpoint {
            path: "latest/api/token".into(),
            value: serde_json::json!("x"),
            content_type: ContentType::Text,
            schema: SchemaVersion::V1,
        });
        assert_eq!(
            Catalog::from_config(&config).unwrap_err(),
            CatalogError::OutsideRoots("latest/api/token".into())
        );
    }
}
