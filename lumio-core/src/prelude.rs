//! Curated surface for hosts embedding the engine.
//! Prefer importing from this module instead of individual tree nodes when
//! wiring the engine into a player view.

pub use lumio_model::{
    EmbedId, ProgressKey, ProgressRecord, UserId, VideoDescriptor, VideoId,
    WatchPercent, format_duration,
};

pub use crate::adapter::embed::{
    EmbedEvent, EmbedHandle, EmbedLibrary, EmbedPlaybackState,
    install_library,
};
pub use crate::adapter::{
    AdapterError, AdapterOptions, PlaybackState, PlayerAdapter, PlayerEvent,
};
pub use crate::error::{EngineError, Result};
pub use crate::policy::SkipPolicy;
pub use crate::session::{
    FinalFlush, PlaybackSession, ProgressProjection, SeekDecision,
    SessionEvent, SessionOptions, SessionState, TeardownReport,
};
pub use crate::store::{
    MemoryProgressStore, ProgressStore, RestProgressStore, RestStoreOptions,
    StoreError,
};
