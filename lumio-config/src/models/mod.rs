//! Typed configuration for the playback engine.
//!
//! Every section is `#[serde(default)]` so a config file only has to name
//! what it changes. Durations are written as humantime strings ("30s",
//! "100ms") in both TOML and JSON.

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use url::Url;

use lumio_core::adapter::AdapterOptions;
use lumio_core::policy::SkipPolicy;
use lumio_core::session::SessionOptions;
use lumio_core::store::RestStoreOptions;

use crate::error::ConfigError;

mod duration_string {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer
            .serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// Source that produced the engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EngineConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Minimum-engagement gate and completion tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Absolute watch-time floor before forward seeking unlocks.
    pub min_watch_seconds: u32,
    /// Fractional alternative to the floor; the smaller of the two wins,
    /// so short videos cannot lock the user out for longer than they run.
    pub min_watch_fraction: f64,
    /// Forward slack absorbed before a seek counts as a skip attempt.
    pub seek_tolerance_seconds: u32,
    /// Distance from the nominal end that still counts as finished.
    pub completion_slack_seconds: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let policy = SkipPolicy::default();
        Self {
            min_watch_seconds: policy.min_watch_seconds,
            min_watch_fraction: policy.min_watch_fraction,
            seek_tolerance_seconds: policy.seek_tolerance_seconds,
            completion_slack_seconds: policy.completion_slack_seconds,
        }
    }
}

/// Sampling and flush cadence.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Cadence of the shared position-sampling/flush-decision tick. Fast
    /// enough for a responsive skip-lock countdown, slow enough to avoid
    /// excess writes.
    #[serde(with = "duration_string")]
    pub sample_interval: Duration,
    /// Minimum spacing between durable writes outside the urgent paths.
    #[serde(with = "duration_string")]
    pub min_save_interval: Duration,
    /// Budget for settling writes when the player view unmounts.
    #[serde(with = "duration_string")]
    pub teardown_timeout: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        let options = SessionOptions::default();
        Self {
            sample_interval: options.sample_interval,
            min_save_interval: options.min_save_interval,
            teardown_timeout: options.teardown_timeout,
        }
    }
}

/// Embedded-player tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Backoff between readiness polls while the vendor script loads.
    #[serde(with = "duration_string")]
    pub poll_interval: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poll_interval: AdapterOptions::default().poll_interval,
        }
    }
}

/// Progress storage service connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Endpoint of the storage service. When unset the host is expected to
    /// wire its own store (tests use the in-memory one).
    pub base_url: Option<String>,
    /// Bearer token minted by the identity collaborator.
    pub bearer_token: Option<String>,
    /// Per-request timeout; a timeout maps to a transient store failure.
    #[serde(with = "duration_string")]
    pub request_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            bearer_token: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Top-level engine settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub policy: PolicyConfig,
    pub autosave: AutosaveConfig,
    pub player: PlayerConfig,
    pub store: StoreConfig,
}

impl EngineConfig {
    /// Load engine configuration overrides using environment variables.
    /// Evaluation order:
    /// 1) `$LUMIO_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$LUMIO_CONFIG_JSON` (inline JSON),
    /// 3) `lumio.toml` in the working directory,
    /// 4) defaults if none are present.
    pub fn load_from_env() -> anyhow::Result<(Self, EngineConfigSource)> {
        dotenvy::dotenv().ok();

        if let Ok(path_str) = env::var("LUMIO_CONFIG_PATH")
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = Self::load_from_file(&path)?;
            return Ok((config, EngineConfigSource::EnvPath(path)));
        }

        if let Ok(raw) = env::var("LUMIO_CONFIG_JSON")
            && !raw.trim().is_empty()
        {
            let parsed = Self::parse_json(&raw)
                .context("failed to parse LUMIO_CONFIG_JSON")?;
            return Ok((parsed, EngineConfigSource::EnvInline));
        }

        if let Some(path) = Self::find_default_file() {
            let config = Self::load_from_file(&path)?;
            return Ok((config, EngineConfigSource::File(path)));
        }

        Ok((Self::default(), EngineConfigSource::Default))
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| {
            format!("failed to read engine config from {}", path.display())
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents).with_context(|| {
                format!("invalid engine config {}", path.display())
            }),
            _ => {
                let config: Self =
                    toml::from_str(&contents).map_err(|err| {
                        anyhow!(
                            "invalid engine config {}: {}",
                            path.display(),
                            err
                        )
                    })?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn parse_json(raw: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn find_default_file() -> Option<PathBuf> {
        let candidate = PathBuf::from("lumio.toml");
        candidate.is_file().then_some(candidate)
    }

    /// Guard rails on values that would make the engine misbehave quietly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fraction = self.policy.min_watch_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigError::InvalidWatchFraction(fraction));
        }
        if self.autosave.sample_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("autosave.sample_interval"));
        }
        if self.autosave.min_save_interval.is_zero() {
            return Err(ConfigError::ZeroDuration(
                "autosave.min_save_interval",
            ));
        }
        if self.autosave.teardown_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration(
                "autosave.teardown_timeout",
            ));
        }
        if self.player.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("player.poll_interval"));
        }
        if self.store.request_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("store.request_timeout"));
        }
        if let Some(raw) = &self.store.base_url {
            let url = Url::parse(raw)
                .map_err(|_| ConfigError::InvalidStoreUrl(raw.clone()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidStoreUrl(raw.clone()));
            }
        }
        Ok(())
    }

    pub fn skip_policy(&self) -> SkipPolicy {
        SkipPolicy {
            min_watch_seconds: self.policy.min_watch_seconds,
            min_watch_fraction: self.policy.min_watch_fraction,
            seek_tolerance_seconds: self.policy.seek_tolerance_seconds,
            completion_slack_seconds: self.policy.completion_slack_seconds,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            policy: self.skip_policy(),
            adapter: AdapterOptions {
                poll_interval: self.player.poll_interval,
            },
            sample_interval: self.autosave.sample_interval,
            min_save_interval: self.autosave.min_save_interval,
            teardown_timeout: self.autosave.teardown_timeout,
        }
    }

    /// Connection settings for the REST store, when an endpoint is
    /// configured. Validation has already checked the URL parses.
    pub fn rest_store_options(&self) -> Option<RestStoreOptions> {
        let raw = self.store.base_url.as_ref()?;
        let base_url = Url::parse(raw).ok()?;
        Some(RestStoreOptions {
            base_url,
            bearer_token: self.store.bearer_token.clone(),
            timeout: self.store.request_timeout,
        })
    }
}
