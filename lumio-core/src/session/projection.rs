//! Read-only surfaces the session exposes to the rendering layer.

/// Snapshot of session progress, re-emitted on every internal change over
/// the session's watch channel. Everything the UI needs to draw the
/// progress bar, the skip lock, and the completion badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ProgressProjection {
    pub position_seconds: u32,
    pub percent_watched: u8,
    pub skip_eligible: bool,
    /// Seconds left until forward seeking unlocks; 0 once eligible.
    pub remaining_lock_seconds: u32,
    pub completed: bool,
}

/// Out-of-band notices and failures, kept separate from the progress
/// projection so the rendering layer can banner them without conflating
/// them with playback state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A forward seek was denied by the gate. Pure notice; session state is
    /// untouched.
    SkipDenied {
        remaining_lock_seconds: u32,
        /// Whole minutes still to watch, for the user-facing message.
        hint_minutes: u32,
    },
    /// The store actively refused a write; flushing for this record has
    /// stopped. Emitted once.
    SaveRejected { message: String },
    /// The embedded player failed; the session is terminal.
    PlayerFailed { message: String },
}
