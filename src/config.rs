//! Layered settings: built-in defaults, an optional TOML file, `PULSEDASH_*`
//! environment variables, then command-line overrides.
//!
//! ```toml
//! ws_url = "ws://localhost:8000/ws/metrics"
//! api_url = "http://localhost:8000"
//! token = "..."
//! handshake = "both"          # message | query | both
//! metrics = ["cpu", "memory"]
//! range = "5m"                # 5m | 15m | 60m
//!
//! [reconnect]
//! base_delay = "1s"
//! max_delay = "10s"
//! max_retries = 5
//!
//! [history]
//! interval = "30s"
//! stale_time = "30s"
//! timeout = "10s"
//! ```
//!
//! Nested keys use a double underscore in the environment, for example
//! `PULSEDASH_RECONNECT__MAX_RETRIES=8`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat, Map};
use serde::Deserialize;
use url::Url;

use crate::data::{duration, MetricKind, Selection, TimeRange};
use crate::stream::{HandshakeMode, ReconnectPolicy, StreamConfig, StreamEndpoint};

const DEFAULTS: &str = r#"
ws_url = "ws://localhost:8000/ws/metrics"
api_url = "http://localhost:8000"
handshake = "both"
metrics = ["cpu", "memory"]
range = "5m"
connect_timeout = "10s"
log_file = "pulsedash.log"
log_level = "info"

[reconnect]
base_delay = "1s"
max_delay = "10s"
max_retries = 5

[history]
interval = "30s"
stale_time = "30s"
timeout = "10s"
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub ws_url: String,
    pub api_url: String,
    #[serde(default)]
    pub token: Option<String>,
    pub handshake: HandshakeMode,
    pub metrics: Vec<MetricKind>,
    pub range: TimeRange,
    #[serde(deserialize_with = "duration::deserialize")]
    pub connect_timeout: Duration,
    pub log_file: PathBuf,
    /// Fallback filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub reconnect: ReconnectSettings,
    pub history: HistorySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectSettings {
    #[serde(deserialize_with = "duration::deserialize")]
    pub base_delay: Duration,
    #[serde(deserialize_with = "duration::deserialize")]
    pub max_delay: Duration,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistorySettings {
    #[serde(deserialize_with = "duration::deserialize")]
    pub interval: Duration,
    #[serde(deserialize_with = "duration::deserialize")]
    pub stale_time: Duration,
    #[serde(deserialize_with = "duration::deserialize")]
    pub timeout: Duration,
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub ws_url: Option<String>,
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub handshake: Option<String>,
    pub metrics: Option<Vec<String>>,
    pub range: Option<String>,
    pub max_retries: Option<u32>,
    pub base_delay: Option<String>,
    pub max_delay: Option<String>,
    pub refresh: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    /// Load settings from every layer.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        Self::load_with_env(path, overrides, None)
    }

    /// Like [`Settings::load`], reading the environment layer from `env`
    /// instead of the process environment when given.
    fn load_with_env(
        path: Option<&Path>,
        overrides: &Overrides,
        env: Option<Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder().add_source(File::from_str(DEFAULTS, FileFormat::Toml));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("PULSEDASH")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("metrics")
                .try_parsing(true)
                .source(env),
        );

        let log_file = overrides
            .log_file
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());

        builder = builder
            .set_override_option("ws_url", overrides.ws_url.clone())?
            .set_override_option("api_url", overrides.api_url.clone())?
            .set_override_option("token", overrides.token.clone())?
            .set_override_option("handshake", overrides.handshake.clone())?
            .set_override_option("metrics", overrides.metrics.clone())?
            .set_override_option("range", overrides.range.clone())?
            .set_override_option("reconnect.max_retries", overrides.max_retries.map(i64::from))?
            .set_override_option("reconnect.base_delay", overrides.base_delay.clone())?
            .set_override_option("reconnect.max_delay", overrides.max_delay.clone())?
            .set_override_option("history.interval", overrides.refresh.clone())?
            .set_override_option("log_file", log_file)?;

        let settings: Settings = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.metrics.is_empty() {
            bail!("At least one metric must be selected");
        }
        if self.reconnect.base_delay > self.reconnect.max_delay {
            bail!(
                "reconnect.base_delay ({}) exceeds reconnect.max_delay ({})",
                duration::format_duration(self.reconnect.base_delay),
                duration::format_duration(self.reconnect.max_delay)
            );
        }
        if self.history.interval.is_zero() {
            bail!("history.interval must be greater than zero");
        }
        self.ws_endpoint()?;
        Ok(())
    }

    /// The configured token, treating blank as absent.
    pub fn token(&self) -> Option<String> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    pub fn selection(&self) -> Selection {
        Selection::new(self.metrics.iter().copied()).unwrap_or_default()
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.reconnect.base_delay,
            self.reconnect.max_delay,
            self.reconnect.max_retries,
        )
    }

    fn ws_endpoint(&self) -> Result<StreamEndpoint> {
        let url = Url::parse(&self.ws_url)
            .with_context(|| format!("Invalid ws_url: {}", self.ws_url))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            bail!("ws_url must use ws:// or wss://, got {}", self.ws_url);
        }
        Ok(StreamEndpoint::new(url, self.handshake))
    }

    pub fn stream_config(&self) -> Result<StreamConfig> {
        Ok(StreamConfig {
            endpoint: self.ws_endpoint()?,
            policy: self.reconnect_policy(),
        })
    }
}
