//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::DEFAULT_SEPARATOR;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "tiercache";
const ENV_PREFIX: &str = "TIERCACHE";
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;
const DEFAULT_DEMO_SLUG: &str = "getUser";
const DEFAULT_DEMO_CONCURRENCY: usize = 6;
const DEFAULT_DEMO_LATENCY_MS: u64 = 100;

/// Command-line arguments for the tiercache binary.
#[derive(Debug, Parser)]
#[command(name = "tiercache", version, about = "Multi-tier read-through cache orchestrator")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TIERCACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Provision one value through the configured tiers with concurrent callers.
    Demo(DemoArgs),
    /// Print the cache key generated for a slug and its parameters.
    Key(KeyArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct RuntimeOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the separator used by the default key generator.
    #[arg(long = "key-separator", value_name = "SEPARATOR")]
    pub key_separator: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,

    /// Resource slug to provision.
    #[arg(long, default_value = DEFAULT_DEMO_SLUG)]
    pub slug: String,

    /// Number of concurrent callers issuing the same request.
    #[arg(long, default_value_t = DEFAULT_DEMO_CONCURRENCY)]
    pub concurrency: usize,

    /// Artificial latency of the demo computation.
    #[arg(long = "latency-ms", default_value_t = DEFAULT_DEMO_LATENCY_MS)]
    pub latency_ms: u64,

    /// Request parameters, in order.
    #[arg(value_name = "PARAM", default_values_t = ["2".to_string(), "3".to_string()])]
    pub params: Vec<String>,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            overrides: RuntimeOverrides::default(),
            slug: DEFAULT_DEMO_SLUG.to_string(),
            concurrency: DEFAULT_DEMO_CONCURRENCY,
            latency_ms: DEFAULT_DEMO_LATENCY_MS,
            params: vec!["2".to_string(), "3".to_string()],
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct KeyArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,

    /// Resource slug.
    #[arg(value_name = "SLUG")]
    pub slug: String,

    /// Request parameters, in order.
    #[arg(value_name = "PARAM")]
    pub params: Vec<String>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub keys: KeySettings,
    /// Tier definitions; position in this list is the tier index.
    pub tiers: Vec<TierSettings>,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct KeySettings {
    pub separator: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierSettings {
    Memory {
        capacity: NonZeroUsize,
        ttl: Option<Duration>,
    },
    Sharded,
    Directory {
        path: PathBuf,
    },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: String, reason: String },
}

impl LoadError {
    fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Demo(args)) => raw.apply_overrides(&args.overrides),
        Some(Command::Key(args)) => raw.apply_overrides(&args.overrides),
        None => raw.apply_overrides(&RuntimeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    keys: RawKeySettings,
    tiers: Option<Vec<RawTierSettings>>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &RuntimeOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(separator) = overrides.key_separator.as_ref() {
            self.keys.separator = Some(separator.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            keys,
            tiers,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            keys: build_key_settings(keys)?,
            tiers: build_tier_settings(tiers)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_key_settings(keys: RawKeySettings) -> Result<KeySettings, LoadError> {
    let separator = keys
        .separator
        .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string());
    if separator.is_empty() {
        return Err(LoadError::invalid(
            "keys.separator",
            "separator must not be empty",
        ));
    }

    Ok(KeySettings { separator })
}

fn build_tier_settings(
    tiers: Option<Vec<RawTierSettings>>,
) -> Result<Vec<TierSettings>, LoadError> {
    let Some(tiers) = tiers else {
        return Ok(vec![TierSettings::Memory {
            capacity: NonZeroUsize::new(DEFAULT_MEMORY_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            ttl: None,
        }]);
    };

    tiers
        .into_iter()
        .enumerate()
        .map(|(index, tier)| build_tier(index, tier))
        .collect()
}

fn build_tier(index: usize, tier: RawTierSettings) -> Result<TierSettings, LoadError> {
    let kind = tier
        .kind
        .ok_or_else(|| LoadError::invalid(format!("tiers[{index}].kind"), "kind is required"))?;

    match kind.trim().to_ascii_lowercase().as_str() {
        "memory" => {
            let capacity_value = tier.capacity.unwrap_or(DEFAULT_MEMORY_CAPACITY);
            let capacity = NonZeroUsize::new(capacity_value).ok_or_else(|| {
                LoadError::invalid(
                    format!("tiers[{index}].capacity"),
                    "must be greater than zero",
                )
            })?;
            let ttl = match tier.ttl_seconds {
                Some(0) => {
                    return Err(LoadError::invalid(
                        format!("tiers[{index}].ttl_seconds"),
                        "must be greater than zero",
                    ));
                }
                Some(seconds) => Some(Duration::from_secs(seconds)),
                None => None,
            };
            Ok(TierSettings::Memory { capacity, ttl })
        }
        "sharded" => Ok(TierSettings::Sharded),
        "directory" => {
            let path = tier.path.ok_or_else(|| {
                LoadError::invalid(
                    format!("tiers[{index}].path"),
                    "directory tiers require a path",
                )
            })?;
            if path.as_os_str().is_empty() {
                return Err(LoadError::invalid(
                    format!("tiers[{index}].path"),
                    "path must not be empty",
                ));
            }
            Ok(TierSettings::Directory { path })
        }
        other => Err(LoadError::invalid(
            format!("tiers[{index}].kind"),
            format!("unknown tier kind `{other}` (expected memory, sharded or directory)"),
        )),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawKeySettings {
    separator: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTierSettings {
    kind: Option<String>,
    capacity: Option<usize>,
    ttl_seconds: Option<u64>,
    path: Option<PathBuf>,
}
