//! Core data model definitions shared across Lumio crates.
#![allow(missing_docs)]

pub mod error;
pub mod format;
pub mod ids;
pub mod prelude;
pub mod progress;
pub mod video;

// Intentionally curated re-exports for downstream consumers.
pub use error::{ModelError, Result as ModelResult};
pub use format::format_duration;
pub use ids::{EmbedId, UserId, VideoId};
pub use progress::{ProgressKey, ProgressRecord, WatchPercent};
pub use video::VideoDescriptor;
