//! Playback session: the engine's root component.
//!
//! Composed of a pure state machine ([`SessionCore`]) and the tokio driver
//! that schedules it ([`PlaybackSession`]). The session consumes normalized
//! player events, tracks live position against the gating policy, and owns
//! every durable write for its (user, video) key.

mod driver;
mod projection;
mod state;

pub use driver::{
    FinalFlush, PlaybackSession, SessionOptions, TeardownReport,
};
pub use projection::{ProgressProjection, SessionEvent};
pub use state::{SampleOutcome, SeekDecision, SessionCore, SessionState};
