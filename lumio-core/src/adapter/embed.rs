//! Vendor surface of the third-party embeddable player.
//!
//! The real player ships as a page-global script that loads once and is
//! never unloaded; everything downstream of it is callback-driven and may
//! be momentarily unavailable while the script initializes. This module
//! pins that shape down to two small traits plus a process-wide
//! registration point, so the rest of the engine never touches the vendor
//! API directly.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::sync::mpsc;
use tracing::warn;

use lumio_model::EmbedId;

/// Raw playback states as the vendor reports them.
///
/// `Buffering` exists only here; the adapter absorbs it before the session
/// ever sees a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedPlaybackState {
    Playing,
    Paused,
    Buffering,
    Ended,
}

/// Raw events delivered by the vendor player, unnormalized.
///
/// The vendor is allowed to misbehave here: duplicate `Ready` deliveries
/// and state changes before `Ready` both happen in the wild and are handled
/// one layer up.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedEvent {
    Ready { duration: f64 },
    StateChange(EmbedPlaybackState),
    Error(i32),
}

/// One live embedded player instance.
///
/// Commands are fire-and-forget: the vendor guarantees no acknowledgment,
/// so a subsequent [`EmbedEvent`] is the only source of truth. Queries may
/// transiently return `None` while the underlying widget rebuilds itself.
pub trait EmbedHandle: Send + Sync {
    fn current_time(&self) -> Option<f64>;
    fn duration(&self) -> Option<f64>;
    fn play(&self);
    fn pause(&self);
    fn seek_to(&self, seconds: f64);
    fn mute(&self);
    fn unmute(&self);
    /// Release the underlying widget. Further commands are no-ops.
    fn destroy(&self);
}

impl fmt::Debug for dyn EmbedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedHandle").finish_non_exhaustive()
    }
}

/// The page-global player library.
pub trait EmbedLibrary: Send + Sync {
    /// Whether the library has finished its own asynchronous load.
    fn is_ready(&self) -> bool;

    /// Create a player for `embed_id`, starting at `start_seconds`.
    /// Events flow into `events` for the lifetime of the handle.
    fn create_player(
        &self,
        embed_id: &EmbedId,
        start_seconds: u32,
        events: mpsc::UnboundedSender<EmbedEvent>,
    ) -> Result<Box<dyn EmbedHandle>, CreatePlayerError>;
}

impl fmt::Debug for dyn EmbedLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedLibrary")
            .field("is_ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

/// Player creation failure reported by the vendor library.
#[derive(Debug, Clone, thiserror::Error)]
#[error("embed player creation failed: {0}")]
pub struct CreatePlayerError(pub String);

static LIBRARY: OnceCell<Arc<dyn EmbedLibrary>> = OnceCell::new();

/// Register the process-wide embed library. Load-once semantics: a second
/// installation is ignored with a warning, mirroring how the vendor script
/// behaves when injected twice.
pub fn install_library(library: Arc<dyn EmbedLibrary>) {
    if LIBRARY.set(library).is_err() {
        warn!("embed library already installed; ignoring reinstall");
    }
}

/// The installed library, if any. Adapters constructed before installation
/// poll this until it appears.
pub fn library() -> Option<Arc<dyn EmbedLibrary>> {
    LIBRARY.get().cloned()
}
