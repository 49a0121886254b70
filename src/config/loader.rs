//! Configuration loading: layers, folding and flags.
//!
//! Each source becomes a [`ConfigLayer`] (a TOML table). Layers are folded
//! lowest precedence first with a deep merge, and the folded table is
//! deserialized once into [`MockConfig`]:
//!
//! ```text
//! defaults → override file → config file → CLI flags
//! ```
//!
//! Tables merge key by key; scalars and arrays from a later layer replace
//! earlier ones. Free-form maps such as `metadata.tags` are leaves too: a
//! later layer that sets one replaces it whole.

use std::fs;
use std::path::{Path, PathBuf};

use toml::{Table, Value};

use crate::config::schema::{LatencyRange, MockConfig};
use crate::config::validation::{validate_config, ValidationError};
use crate::routing::matcher::normalize_path;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(#[source] toml::de::Error),

    #[error("failed to encode default configuration: {0}")]
    Defaults(#[from] toml::ser::Error),

    #[error("invalid value for --{flag}: {reason}")]
    Flag { flag: &'static str, reason: String },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where a layer came from, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LayerSource {
    Defaults,
    OverrideFile,
    ConfigFile,
    Flags,
}

/// One partial configuration.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub source: LayerSource,
    pub table: Table,
}

impl ConfigLayer {
    pub fn new(source: LayerSource, mut table: Table) -> Self {
        normalize_override_keys(&mut table);
        Self { source, table }
    }

    /// Layer holding every field of `config`.
    pub fn defaults(config: &MockConfig) -> Result<Self, ConfigError> {
        let table = match Value::try_from(config)? {
            Value::Table(table) => table,
            _ => Table::new(),
        };
        Ok(Self::new(LayerSource::Defaults, table))
    }

    /// Layer from a full configuration file.
    pub fn config_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::new(LayerSource::ConfigFile, read_table(path)?))
    }

    /// Layer from a per-path override file, whose top-level tables are
    /// metadata paths.
    pub fn override_file(path: &Path) -> Result<Self, ConfigError> {
        let overrides = read_table(path)?;
        let mut table = Table::new();
        table.insert("overrides".to_string(), Value::Table(overrides));
        Ok(Self::new(LayerSource::OverrideFile, table))
    }
}

fn read_table(path: &Path) -> Result<Table, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    content.parse::<Table>().map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Override paths from different layers must meet under the same key.
fn normalize_override_keys(table: &mut Table) {
    if let Some(Value::Table(overrides)) = table.remove("overrides") {
        let normalized: Table = overrides
            .into_iter()
            .map(|(path, value)| (normalize_path(&path), value))
            .collect();
        table.insert("overrides".to_string(), Value::Table(normalized));
    }
}

/// Tables whose keys are data rather than schema fields.
const REPLACED_MAPS: &[&[&str]] = &[&["metadata", "tags"]];

fn merge_tables(base: &mut Table, overlay: &Table) {
    merge_at(base, overlay, &mut Vec::new());
}

fn merge_at<'a>(base: &mut Table, overlay: &'a Table, path: &mut Vec<&'a str>) {
    for (key, value) in overlay {
        path.push(key.as_str());
        let replaced = REPLACED_MAPS.iter().any(|map| *map == path.as_slice());
        match (base.get_mut(key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) if !replaced => {
                merge_at(existing, incoming, path);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
        path.pop();
    }
}

/// Fold layers left to right into one configuration. Does not validate.
pub fn fold_layers(layers: &[ConfigLayer]) -> Result<MockConfig, ConfigError> {
    let mut merged = Table::new();
    for layer in layers {
        merge_tables(&mut merged, &layer.table);
    }
    Value::Table(merged).try_into().map_err(ConfigError::Invalid)
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct FlagOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Require session tokens on every path.
    pub imdsv2: bool,
    /// `N` or `MIN..MAX` milliseconds.
    pub latency: Option<String>,
    pub instance_id: Option<String>,
    /// `PATH=STATUS` entries.
    pub force_status: Vec<String>,
    pub grace_period_secs: Option<u64>,
    pub watch: bool,
}

impl FlagOverrides {
    pub fn to_layer(&self) -> Result<ConfigLayer, ConfigError> {
        let mut table = Table::new();

        if let Some(host) = &self.host {
            set(&mut table, &["server", "host"], Value::String(host.clone()));
        }
        if let Some(port) = self.port {
            set(&mut table, &["server", "port"], Value::Integer(i64::from(port)));
        }
        if let Some(secs) = self.grace_period_secs {
            set(&mut table, &["server", "grace_period_secs"], integer("grace-period-secs", secs)?);
        }
        if self.watch {
            set(&mut table, &["server", "watch_config"], Value::Boolean(true));
        }
        if self.imdsv2 {
            set(&mut table, &["imds", "v2_required"], Value::Boolean(true));
        }
        if let Some(spec) = &self.latency {
            let range: LatencyRange = spec.parse().map_err(|reason| ConfigError::Flag {
                flag: "latency-ms",
                reason,
            })?;
            set(&mut table, &["latency", "min_ms"], integer("latency-ms", range.min_ms)?);
            set(&mut table, &["latency", "max_ms"], integer("latency-ms", range.max_ms)?);
        }
        if let Some(id) = &self.instance_id {
            set(&mut table, &["metadata", "instance_id"], Value::String(id.clone()));
        }
        for entry in &self.force_status {
            let (path, status) = parse_force_status(entry)?;
            set(
                &mut table,
                &["overrides", path.as_str(), "status"],
                Value::Integer(i64::from(status)),
            );
        }

        Ok(ConfigLayer::new(LayerSource::Flags, table))
    }
}

fn integer(flag: &'static str, value: u64) -> Result<Value, ConfigError> {
    i64::try_from(value)
        .map(Value::Integer)
        .map_err(|_| ConfigError::Flag {
            flag,
            reason: format!("{value} is too large"),
        })
}

fn parse_force_status(entry: &str) -> Result<(String, u16), ConfigError> {
    let flag_error = |reason: String| ConfigError::Flag {
        flag: "force-status",
        reason,
    };
    let (path, status) = entry
        .rsplit_once('=')
        .ok_or_else(|| flag_error(format!("'{entry}' is not PATH=STATUS")))?;
    let status = status
        .trim()
        .parse::<u16>()
        .map_err(|e| flag_error(format!("'{status}' is not a status code: {e}")))?;
    Ok((normalize_path(path), status))
}

fn set(table: &mut Table, keys: &[&str], value: Value) {
    let Some((last, parents)) = keys.split_last() else {
        return;
    };
    let mut current = table;
    for key in parents {
        let entry = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        if !entry.is_table() {
            *entry = Value::Table(Table::new());
        }
        current = match entry {
            Value::Table(t) => t,
            _ => return,
        };
    }
    current.insert(last.to_string(), value);
}

/// Every input the effective configuration is built from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub defaults: MockConfig,
    pub config_file: Option<PathBuf>,
    pub overrides_file: Option<PathBuf>,
    pub flags: FlagOverrides,
}

impl ConfigSources {
    /// Layers in fold order, lowest precedence first.
    pub fn layers(&self) -> Result<Vec<ConfigLayer>, ConfigError> {
        let mut layers = vec![ConfigLayer::defaults(&self.defaults)?];
        if let Some(path) = &self.overrides_file {
            layers.push(ConfigLayer::override_file(path)?);
        }
        if let Some(path) = &self.config_file {
            layers.push(ConfigLayer::config_file(path)?);
        }
        layers.push(self.flags.to_layer()?);
        Ok(layers)
    }

    /// Fold and validate.
    pub fn load(&self) -> Result<MockConfig, ConfigError> {
        let config = fold_layers(&self.layers()?)?;
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Files whose changes should trigger a reload.
    pub fn files(&self) -> Vec<&Path> {
        self.config_file
            .iter()
            .chain(self.overrides_file.iter())
            .map(PathBuf::as_path)
            .collect()
    }
}

/// Build the effective configuration from defaults, an optional config file,
/// optional flags and an optional per-path override file.
pub fn load(
    defaults: &MockConfig,
    config_file: Option<&Path>,
    flags: Option<&FlagOverrides>,
    overrides_file: Option<&Path>,
) -> Result<MockConfig, ConfigError> {
    ConfigSources {
        defaults: defaults.clone(),
        config_file: config_file.map(Path::to_path_buf),
        overrides_file: overrides_file.map(Path::to_path_buf),
        flags: flags.cloned().unwrap_or_default(),
    }
    .load()
}
