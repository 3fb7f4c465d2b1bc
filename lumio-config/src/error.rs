use thiserror::Error;

/// Validation failures for an [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("min_watch_fraction must be in (0, 1], got {0}")]
    InvalidWatchFraction(f64),

    #[error("{0} must be non-zero")]
    ZeroDuration(&'static str),

    #[error("store base_url is not a valid http(s) URL: {0}")]
    InvalidStoreUrl(String),
}
