use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug)]
pub enum ModelError {
    InvalidEmbedId(String),
    InvalidVideo(String),
    InvalidProgress(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidEmbedId(msg) => {
                write!(f, "invalid embed id: {msg}")
            }
            ModelError::InvalidVideo(msg) => write!(f, "invalid video: {msg}"),
            ModelError::InvalidProgress(msg) => {
                write!(f, "invalid progress: {msg}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
