use thiserror::Error;

use crate::adapter::AdapterError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("player adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("progress store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid video descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("playback session closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, EngineError>;
