//! Player adapter: the normalized face of the embedded third-party player.
//!
//! Translates the vendor's callback-driven, sometimes-absent API into a
//! small pull/push surface the playback session can reason about:
//!
//! - [`PlayerAdapter::initialize`] rides out the page-level script-load race
//!   by polling the library singleton on a short backoff.
//! - [`PlayerAdapter::next_event`] yields deduplicated, normalized
//!   [`PlayerEvent`]s (`Ready` at most once, `Buffering` absorbed).
//! - Position/duration queries return the last known value instead of
//!   erroring when the widget is transiently unavailable.
//! - Commands are fire-and-forget; a later event is the source of truth.

pub mod embed;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use lumio_model::EmbedId;

use self::embed::{EmbedEvent, EmbedHandle, EmbedLibrary, EmbedPlaybackState};

/// Normalized playback states, post-adapter. The session only ever sees
/// these three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Ended,
}

/// Normalized events emitted toward the playback session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerEvent {
    /// Emitted at most once per adapter, with the duration the player
    /// reports. The catalog's duration still wins for gating math.
    Ready { duration_seconds: u32 },
    StateChanged(PlaybackState),
    Error(i32),
}

/// Errors surfaced by the adapter itself.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    #[error("embed player creation failed: {0}")]
    Create(String),
    #[error("adapter already failed with player error code {0}")]
    Failed(i32),
}

/// Adapter tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterOptions {
    /// Backoff between readiness polls while the vendor script loads.
    pub poll_interval: Duration,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Wrapper around one embedded player instance.
#[derive(Debug)]
pub struct PlayerAdapter {
    embed_id: EmbedId,
    start_position_seconds: u32,
    options: AdapterOptions,
    /// Explicitly injected library; falls back to the process-wide
    /// singleton when absent.
    library: Option<Arc<dyn EmbedLibrary>>,
    handle: Option<Box<dyn EmbedHandle>>,
    events_tx: mpsc::UnboundedSender<EmbedEvent>,
    events_rx: mpsc::UnboundedReceiver<EmbedEvent>,
    last_position: f64,
    last_duration: f64,
    ready_seen: bool,
    error_code: Option<i32>,
}

impl PlayerAdapter {
    /// Adapter resolving the embed library through the process-wide
    /// registration (`embed::install_library`).
    pub fn new(
        embed_id: EmbedId,
        start_position_seconds: u32,
        options: AdapterOptions,
    ) -> Self {
        Self::build(embed_id, start_position_seconds, options, None)
    }

    /// Adapter bound to an explicit library instance. Used by tests and by
    /// hosts embedding more than one vendor runtime.
    pub fn with_library(
        library: Arc<dyn EmbedLibrary>,
        embed_id: EmbedId,
        start_position_seconds: u32,
        options: AdapterOptions,
    ) -> Self {
        Self::build(embed_id, start_position_seconds, options, Some(library))
    }

    fn build(
        embed_id: EmbedId,
        start_position_seconds: u32,
        options: AdapterOptions,
        library: Option<Arc<dyn EmbedLibrary>>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            embed_id,
            start_position_seconds,
            options,
            library,
            handle: None,
            events_tx,
            events_rx,
            last_position: start_position_seconds as f64,
            last_duration: 0.0,
            ready_seen: false,
            error_code: None,
        }
    }

    /// Create the underlying player, waiting out the vendor script load.
    ///
    /// Idempotent: a second call on an initialized adapter is a no-op.
    /// Suspends (poll + sleep, never blocking a thread) until the library
    /// is registered and reports ready.
    pub async fn initialize(&mut self) -> Result<(), AdapterError> {
        if self.handle.is_some() {
            return Ok(());
        }
        if let Some(code) = self.error_code {
            return Err(AdapterError::Failed(code));
        }

        let library = loop {
            let candidate =
                self.library.clone().or_else(embed::library);
            if let Some(lib) = candidate
                && lib.is_ready()
            {
                break lib;
            }
            tokio::time::sleep(self.options.poll_interval).await;
        };

        let handle = library
            .create_player(
                &self.embed_id,
                self.start_position_seconds,
                self.events_tx.clone(),
            )
            .map_err(|e| AdapterError::Create(e.0))?;
        self.handle = Some(handle);
        debug!(embed_id = %self.embed_id, "embed player created");
        Ok(())
    }

    /// Next normalized event, or `None` once the underlying player is gone
    /// or has failed. `Ready` is emitted at most once; `Buffering` never
    /// reaches the caller.
    pub async fn next_event(&mut self) -> Option<PlayerEvent> {
        if self.error_code.is_some() {
            return None;
        }
        while let Some(raw) = self.events_rx.recv().await {
            match raw {
                EmbedEvent::Ready { duration } => {
                    if self.ready_seen {
                        debug!("duplicate ready event from embed player");
                        continue;
                    }
                    self.ready_seen = true;
                    if duration.is_finite() && duration > 0.0 {
                        self.last_duration = duration;
                    }
                    return Some(PlayerEvent::Ready {
                        duration_seconds: self.last_duration.round() as u32,
                    });
                }
                EmbedEvent::StateChange(state) => match state {
                    EmbedPlaybackState::Buffering => continue,
                    EmbedPlaybackState::Playing => {
                        return Some(PlayerEvent::StateChanged(
                            PlaybackState::Playing,
                        ));
                    }
                    EmbedPlaybackState::Paused => {
                        return Some(PlayerEvent::StateChanged(
                            PlaybackState::Paused,
                        ));
                    }
                    EmbedPlaybackState::Ended => {
                        return Some(PlayerEvent::StateChanged(
                            PlaybackState::Ended,
                        ));
                    }
                },
                EmbedEvent::Error(code) => {
                    warn!(code, "embed player reported an error");
                    self.error_code = Some(code);
                    // Internal polling stops here; recovery is a caller
                    // decision.
                    return Some(PlayerEvent::Error(code));
                }
            }
        }
        None
    }

    /// Last known playback position in whole seconds. Falls back to the
    /// previous reading when the widget is momentarily unavailable.
    pub fn current_position(&mut self) -> u32 {
        if self.error_code.is_none()
            && let Some(handle) = &self.handle
            && let Some(t) = handle.current_time()
            && t.is_finite()
            && t >= 0.0
        {
            self.last_position = t;
        }
        self.last_position.floor() as u32
    }

    /// Last known duration in whole seconds; 0 until the player reports one.
    pub fn duration(&mut self) -> u32 {
        if self.error_code.is_none()
            && let Some(handle) = &self.handle
            && let Some(d) = handle.duration()
            && d.is_finite()
            && d > 0.0
        {
            self.last_duration = d;
        }
        self.last_duration.round() as u32
    }

    pub fn play(&self) {
        if let Some(handle) = &self.handle {
            handle.play();
        }
    }

    pub fn pause(&self) {
        if let Some(handle) = &self.handle {
            handle.pause();
        }
    }

    pub fn seek(&self, to_seconds: u32) {
        if let Some(handle) = &self.handle {
            handle.seek_to(to_seconds as f64);
        }
    }

    pub fn mute(&self) {
        if let Some(handle) = &self.handle {
            handle.mute();
        }
    }

    pub fn unmute(&self) {
        if let Some(handle) = &self.handle {
            handle.unmute();
        }
    }

    pub fn has_failed(&self) -> bool {
        self.error_code.is_some()
    }

    /// Tear down the underlying widget.
    pub fn destroy(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.destroy();
        }
    }
}

impl Drop for PlayerAdapter {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedEmbed;

    fn embed_id() -> EmbedId {
        EmbedId::new("dQw4w9WgXcQ").unwrap()
    }

    fn adapter_with(embed: &ScriptedEmbed, start: u32) -> PlayerAdapter {
        PlayerAdapter::with_library(
            Arc::new(embed.clone()),
            embed_id(),
            start,
            AdapterOptions::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_polls_until_library_ready() {
        let embed = ScriptedEmbed::new();
        let mut adapter = adapter_with(&embed, 0);

        let ready_embed = embed.clone();
        let init = tokio::spawn(async move {
            // Library becomes ready only after a few poll rounds.
            tokio::time::sleep(Duration::from_millis(350)).await;
            ready_embed.set_ready(true);
        });

        adapter.initialize().await.unwrap();
        init.await.unwrap();
        assert_eq!(embed.created_players(), 1);

        // Idempotent: no second player.
        adapter.initialize().await.unwrap();
        assert_eq!(embed.created_players(), 1);
    }

    #[tokio::test]
    async fn ready_is_emitted_at_most_once() {
        let embed = ScriptedEmbed::ready();
        let mut adapter = adapter_with(&embed, 0);
        adapter.initialize().await.unwrap();

        embed.emit_ready(600.0);
        embed.emit_ready(600.0);
        embed.emit_state(EmbedPlaybackState::Playing);

        assert_eq!(
            adapter.next_event().await,
            Some(PlayerEvent::Ready {
                duration_seconds: 600
            })
        );
        // The duplicate ready is swallowed; the next thing out is the state
        // change.
        assert_eq!(
            adapter.next_event().await,
            Some(PlayerEvent::StateChanged(PlaybackState::Playing))
        );
    }

    #[tokio::test]
    async fn buffering_is_absorbed() {
        let embed = ScriptedEmbed::ready();
        let mut adapter = adapter_with(&embed, 0);
        adapter.initialize().await.unwrap();

        embed.emit_state(EmbedPlaybackState::Buffering);
        embed.emit_state(EmbedPlaybackState::Paused);

        assert_eq!(
            adapter.next_event().await,
            Some(PlayerEvent::StateChanged(PlaybackState::Paused))
        );
    }

    #[tokio::test]
    async fn position_survives_transient_nulls() {
        let embed = ScriptedEmbed::ready();
        let mut adapter = adapter_with(&embed, 0);
        adapter.initialize().await.unwrap();

        embed.set_position(42.7);
        assert_eq!(adapter.current_position(), 42);

        // Widget momentarily gone: the cached value holds.
        embed.set_position_unavailable();
        assert_eq!(adapter.current_position(), 42);
    }

    #[tokio::test]
    async fn error_stops_the_event_stream() {
        let embed = ScriptedEmbed::ready();
        let mut adapter = adapter_with(&embed, 0);
        adapter.initialize().await.unwrap();

        embed.emit_error(101);
        assert_eq!(adapter.next_event().await, Some(PlayerEvent::Error(101)));
        assert!(adapter.has_failed());

        // Later events never surface.
        embed.emit_state(EmbedPlaybackState::Playing);
        assert_eq!(adapter.next_event().await, None);
    }

    #[tokio::test]
    async fn commands_are_recorded_fire_and_forget() {
        let embed = ScriptedEmbed::ready();
        let mut adapter = adapter_with(&embed, 0);
        adapter.initialize().await.unwrap();

        adapter.play();
        adapter.seek(90);
        adapter.pause();
        adapter.mute();
        adapter.unmute();

        assert_eq!(
            embed.commands(),
            vec![
                "play".to_string(),
                "seek:90".to_string(),
                "pause".to_string(),
                "mute".to_string(),
                "unmute".to_string(),
            ]
        );
    }
}
