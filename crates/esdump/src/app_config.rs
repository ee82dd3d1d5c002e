//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! 🧠 Knowledge graph:
//! - [`AppConfig`] is the raw, stringly, user-facing shape. Layers, lowest first:
//!   TOML file, `ESDUMP_*` env vars, then whatever the CLI flags set.
//! - [`AppConfig::resolve`] turns it into [`MigrationConfig`]: typed, validated,
//!   immutable. Every configuration error is raised there, before any network I/O.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backends::common_config::DEFAULT_MAX_REQUEST_SIZE_BYTES;
use crate::backends::{CommonSinkConfig, CommonSourceConfig};
use crate::endpoint::Endpoint;
use crate::error::{DumpError, Result};
use crate::planner::dates::parse_date_str;
use crate::transforms::Projection;

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
///
/// Every field is optional or defaulted so each layer can fill in only what it knows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 📡 source connection url, `http[s]://[user:pass@]host:port/index[/type]`
    #[serde(default)]
    pub input: Option<String>,
    /// 🚰 destination connection url, same shape
    #[serde(default)]
    pub output: Option<String>,
    /// 🎯 `mapping`, `data`, or nothing at all for both
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub date_field: Option<String>,
    /// 📅 `YYYY-MM-DD` or RFC 3339, read in `zone`
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default = "default_zone")]
    pub zone: String,
    /// ⏱️ window size, humantime style: `24h`, `240h`, `30m`
    #[serde(default = "default_step")]
    pub step: String,
    /// 📄 page size for each scroll round-trip
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub descending: bool,
    /// ✂️ comma-separated field lists
    #[serde(default)]
    pub includes: Option<String>,
    #[serde(default)]
    pub excludes: Option<String>,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_zone() -> String {
    "UTC".to_string()
}

fn default_step() -> String {
    "24h".to_string()
}

fn default_limit() -> usize {
    1000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            kind: None,
            date_field: None,
            start: None,
            end: None,
            zone: default_zone(),
            step: default_step(),
            limit: default_limit(),
            descending: false,
            includes: None,
            excludes: None,
            runtime: RuntimeConfig::default(),
        }
    }
}

/// 🔧 The knobs most people never touch, in their own `[runtime]` apartment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// ⏱️ ceiling for mapping, existence, count and sorted-first calls
    pub metadata_timeout: String,
    pub scroll_keep_alive: String,
    pub max_request_size_bytes: usize,
    /// 🔄 refresh the destination after the data phase
    pub refresh: bool,
    /// 📊 draw the progress bar
    pub progress: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            metadata_timeout: "10s".to_string(),
            scroll_keep_alive: "1m".to_string(),
            max_request_size_bytes: DEFAULT_MAX_REQUEST_SIZE_BYTES,
            refresh: true,
            progress: true,
        }
    }
}

/// 🎯 Which phases run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationKind {
    Mapping,
    Data,
    #[default]
    Both,
}

impl MigrationKind {
    pub fn includes_mapping(self) -> bool {
        matches!(self, MigrationKind::Mapping | MigrationKind::Both)
    }

    pub fn includes_data(self) -> bool {
        matches!(self, MigrationKind::Data | MigrationKind::Both)
    }
}

/// 🔃 Oldest window first, or newest window first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// 📦 The validated, immutable configuration of one run.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub source: Endpoint,
    pub destination: Endpoint,
    pub kind: MigrationKind,
    /// 📎 always `Some` when `kind` includes data
    pub date_field: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// ⏱️ strictly positive
    pub window_size: TimeDelta,
    pub page_size: usize,
    pub direction: Direction,
    pub zone: Tz,
    pub projection: Projection,
    pub source_config: CommonSourceConfig,
    pub sink_config: CommonSinkConfig,
    pub refresh: bool,
    pub show_progress: bool,
}

impl AppConfig {
    /// 🔒 Validate everything and produce the run's [`MigrationConfig`].
    ///
    /// 💀 `Configuration` for a bad url, kind, zone, date, duration or page size,
    /// a missing date field when data is migrated, or a user range with `start >= end`.
    pub fn resolve(&self) -> Result<MigrationConfig> {
        let source = Endpoint::resolve(required(&self.input, "input")?)?;
        let destination = Endpoint::resolve(required(&self.output, "output")?)?;

        let kind = match self.kind.as_deref().map(str::trim) {
            None | Some("") | Some("both") => MigrationKind::Both,
            Some("mapping") => MigrationKind::Mapping,
            Some("data") => MigrationKind::Data,
            Some(other) => {
                return Err(DumpError::config(format!(
                    "unknown migration kind '{other}', expected 'mapping', 'data' or nothing for both"
                )));
            }
        };

        let date_field = self
            .date_field
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        if kind.includes_data() && date_field.is_none() {
            return Err(DumpError::config("a date field is required to migrate data"));
        }

        let zone: Tz = self
            .zone
            .trim()
            .parse()
            .map_err(|_| DumpError::config(format!("unknown time zone '{}'", self.zone)))?;
        let start = parse_bound(&self.start, "start", zone)?;
        let end = parse_bound(&self.end, "end", zone)?;
        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                return Err(DumpError::config(format!(
                    "start {start} should be before end {end}"
                )));
            }
        }

        let window_size = TimeDelta::from_std(parse_duration(&self.step, "step")?)
            .map_err(|e| DumpError::config(format!("step '{}' is too large: {e}", self.step)))?;
        if window_size <= TimeDelta::zero() {
            return Err(DumpError::config(format!("step '{}' should be positive", self.step)));
        }
        if self.limit == 0 {
            return Err(DumpError::config("limit should be at least 1"));
        }

        let projection = Projection::from_sets(
            self.includes.as_deref().and_then(Projection::parse_field_list),
            self.excludes.as_deref().and_then(Projection::parse_field_list),
        );

        let metadata_timeout = parse_duration(&self.runtime.metadata_timeout, "runtime.metadata_timeout")?;
        let source_config = CommonSourceConfig {
            metadata_timeout,
            scroll_keep_alive: parse_duration(&self.runtime.scroll_keep_alive, "runtime.scroll_keep_alive")?,
        };
        let sink_config = CommonSinkConfig {
            metadata_timeout,
            max_request_size_bytes: self.runtime.max_request_size_bytes.max(1),
        };

        Ok(MigrationConfig {
            source,
            destination,
            kind,
            date_field,
            start,
            end,
            window_size,
            page_size: self.limit,
            direction: if self.descending {
                Direction::Descending
            } else {
                Direction::Ascending
            },
            zone,
            projection,
            source_config,
            sink_config,
            refresh: self.runtime.refresh,
            show_progress: self.runtime.progress,
        })
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DumpError::config(format!("'{name}' connection url is required")))
}

fn parse_bound(raw: &Option<String>, name: &str, zone: Tz) -> Result<Option<DateTime<Utc>>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date_str(value, zone)
            .map(Some)
            .ok_or_else(|| DumpError::config(format!("invalid {name} date '{value}'"))),
    }
}

fn parse_duration(raw: &str, name: &str) -> Result<Duration> {
    humantime::parse_duration(raw.trim())
        .map_err(|e| DumpError::config(format!("invalid {name} duration '{raw}': {e}")))
}

/// 🚀 Load the config: file, then env vars, then flags. And the sheer power of hoping.
///
/// 📐 Layering (later wins): TOML file (if given), `ESDUMP_*` env vars
/// (`ESDUMP_RUNTIME__REFRESH=false` reaches into `[runtime]`), then `overrides`,
/// which is whatever the CLI flags actually set.
pub fn load_config<T: Serialize>(config_file_name: Option<&Path>, overrides: T) -> Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {}",
        config_file_name.map(|p| p.display().to_string()).unwrap_or_else(|| "<no file>".to_string())
    );

    let config = Figment::new();
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };
    let config = config
        .merge(Env::prefixed("ESDUMP_").split("__"))
        .merge(Serialized::defaults(overrides));

    config.extract().map_err(|e| {
        let origin = match config_file_name {
            Some(path) => format!("file '{}', ESDUMP_* env vars and flags", path.display()),
            None => "ESDUMP_* env vars and flags".to_string(),
        };
        DumpError::config(format!("could not assemble configuration from {origin}: {e}"))
    })
}
