//! Engine/UI focused snapshot of the types surface.
//! Prefer importing from this module instead of individual tree nodes when
//! working in lumio-core or other consuming layers.

pub use super::error::{ModelError, Result as ModelResult};
pub use super::format::format_duration;
pub use super::ids::{EmbedId, UserId, VideoId};
pub use super::progress::{ProgressKey, ProgressRecord, WatchPercent};
pub use super::video::VideoDescriptor;
