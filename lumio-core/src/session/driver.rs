//! Async driver for the playback session.
//!
//! One spawned task owns the whole engine: the player adapter, the state
//! core, and the store writes. Everything runs through a single
//! `tokio::select!` loop, so sampling and the flush decision happen in the
//! same tick and a flush always writes the freshest sampled position.
//!
//! Write serialization: at most one upsert is in flight per session. A
//! sample that advances the record mid-flight leaves the core dirty, and
//! the completion handler coalesces that into exactly one follow-up write.
//! Teardown cancels the timers, settles any in-flight write, and issues at
//! most one final flush bounded by the teardown timeout.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lumio_model::{ProgressRecord, UserId, VideoDescriptor};

use crate::adapter::embed::EmbedLibrary;
use crate::adapter::{AdapterOptions, PlayerAdapter, PlayerEvent};
use crate::error::{EngineError, Result};
use crate::policy::SkipPolicy;
use crate::session::projection::{ProgressProjection, SessionEvent};
use crate::session::state::{SeekDecision, SessionCore, SessionState};
use crate::store::{ProgressStore, StoreError};

/// Session tuning. Defaults follow the platform policy: sample once a
/// second, keep durable writes at least 30 s apart, give teardown 5 s.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub policy: SkipPolicy,
    pub adapter: AdapterOptions,
    /// Cadence of the shared sampling/flush-decision tick.
    pub sample_interval: Duration,
    /// Minimum spacing between flush attempts outside urgent paths
    /// (completion, player failure, teardown).
    pub min_save_interval: Duration,
    /// Budget for settling writes during teardown.
    pub teardown_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            policy: SkipPolicy::default(),
            adapter: AdapterOptions::default(),
            sample_interval: Duration::from_secs(1),
            min_save_interval: Duration::from_secs(30),
            teardown_timeout: Duration::from_secs(5),
        }
    }
}

/// What happened to the final durable write during teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalFlush {
    /// Nothing dirty (or the store had rejected the record): no write
    /// attempted.
    NotNeeded,
    Flushed,
    Failed(String),
    TimedOut,
}

/// Teardown outcome returned by [`PlaybackSession::shutdown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub final_flush: FinalFlush,
}

enum Command {
    Play,
    Pause,
    Mute,
    Unmute,
    Seek {
        target_seconds: u32,
        reply: oneshot::Sender<SeekDecision>,
    },
    ResetProgress,
    Shutdown {
        reply: oneshot::Sender<TeardownReport>,
    },
}

/// Handle to a live playback session.
///
/// Owned by the mounted player view, never shared across views. Dropping
/// the handle cancels the driver, which still performs the final flush;
/// prefer [`shutdown`] to observe the outcome.
///
/// [`shutdown`]: PlaybackSession::shutdown
pub struct PlaybackSession {
    commands: mpsc::UnboundedSender<Command>,
    projection_rx: watch::Receiver<ProgressProjection>,
    events_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("projection", &*self.projection_rx.borrow())
            .finish_non_exhaustive()
    }
}

impl PlaybackSession {
    /// Start a session against the process-wide embed library.
    ///
    /// Loads the prior progress record (if any) so playback resumes where
    /// the user left off, then spawns the driver. A transient load failure
    /// degrades to a fresh record rather than blocking playback; a rejected
    /// load is surfaced because the record's referential ground is gone.
    pub async fn start(
        user_id: UserId,
        video: VideoDescriptor,
        store: Arc<dyn ProgressStore>,
        options: SessionOptions,
    ) -> Result<Self> {
        Self::start_inner(user_id, video, store, options, None).await
    }

    /// Start a session against an explicit embed library instance.
    pub async fn start_with_library(
        library: Arc<dyn EmbedLibrary>,
        user_id: UserId,
        video: VideoDescriptor,
        store: Arc<dyn ProgressStore>,
        options: SessionOptions,
    ) -> Result<Self> {
        Self::start_inner(user_id, video, store, options, Some(library)).await
    }

    async fn start_inner(
        user_id: UserId,
        video: VideoDescriptor,
        store: Arc<dyn ProgressStore>,
        options: SessionOptions,
        library: Option<Arc<dyn EmbedLibrary>>,
    ) -> Result<Self> {
        let prior = match store.load(user_id, video.id).await {
            Ok(prior) => prior,
            Err(e) if e.is_transient() => {
                warn!(
                    video = %video.id,
                    error = %e,
                    "progress load failed transiently; starting fresh"
                );
                None
            }
            Err(e) => return Err(EngineError::Store(e)),
        };

        let core =
            SessionCore::new(user_id, video.clone(), options.policy, prior);

        let adapter = match library {
            Some(library) => PlayerAdapter::with_library(
                library,
                video.embed_id.clone(),
                core.resume_position(),
                options.adapter,
            ),
            None => PlayerAdapter::new(
                video.embed_id.clone(),
                core.resume_position(),
                options.adapter,
            ),
        };

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (projection_tx, projection_rx) = watch::channel(core.projection());
        let cancel = CancellationToken::new();

        let driver = Driver {
            core,
            adapter,
            store,
            options,
            commands: commands_rx,
            events: events_tx,
            projection: projection_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(driver.run());

        Ok(Self {
            commands: commands_tx,
            projection_rx,
            events_rx: Some(events_rx),
            cancel,
        })
    }

    /// Current progress snapshot.
    pub fn projection(&self) -> ProgressProjection {
        *self.projection_rx.borrow()
    }

    /// Watch channel carrying every projection update.
    pub fn subscribe(&self) -> watch::Receiver<ProgressProjection> {
        self.projection_rx.clone()
    }

    /// The projection as an async stream, for hosts that compose streams.
    pub fn projection_stream(&self) -> WatchStream<ProgressProjection> {
        WatchStream::new(self.projection_rx.clone())
    }

    /// Notice/error events, separate from the progress projection. Yields
    /// `Some` on first call, `None` afterwards.
    pub fn take_events(
        &mut self,
    ) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events_rx.take()
    }

    pub fn play(&self) -> Result<()> {
        self.send(Command::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn mute(&self) -> Result<()> {
        self.send(Command::Mute)
    }

    pub fn unmute(&self) -> Result<()> {
        self.send(Command::Unmute)
    }

    /// Explicitly reset the watched position to zero, the only sanctioned
    /// regression of the durable record.
    pub fn reset_progress(&self) -> Result<()> {
        self.send(Command::ResetProgress)
    }

    /// Request a seek. Returns the gating decision; a denial carries the
    /// remaining lock time for the user-facing notice and mutates nothing.
    pub async fn seek(&self, target_seconds: u32) -> Result<SeekDecision> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Seek {
            target_seconds,
            reply,
        })?;
        response.await.map_err(|_| EngineError::Closed)
    }

    /// Tear the session down: cancel the timers and flush once if dirty.
    /// Resolves when the final flush attempt settles or times out.
    pub async fn shutdown(self) -> Result<TeardownReport> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Shutdown { reply })?;
        response.await.map_err(|_| EngineError::Closed)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| EngineError::Closed)
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        // Unmount without an explicit shutdown still triggers the final
        // flush path in the driver.
        self.cancel.cancel();
    }
}

struct Driver {
    core: SessionCore,
    adapter: PlayerAdapter,
    store: Arc<dyn ProgressStore>,
    options: SessionOptions,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SessionEvent>,
    projection: watch::Sender<ProgressProjection>,
    cancel: CancellationToken,
}

type FlushFuture = BoxFuture<'static, std::result::Result<(), StoreError>>;

impl Driver {
    async fn run(mut self) {
        // Ride out the vendor script load; teardown may interrupt it.
        tokio::select! {
            res = self.adapter.initialize() => {
                if let Err(e) = res {
                    warn!(error = %e, "player initialization failed");
                    self.core.on_player_error();
                    let _ = self.events.send(SessionEvent::PlayerFailed {
                        message: e.to_string(),
                    });
                    self.publish();
                }
            }
            _ = self.cancel.cancelled() => {
                let report = self.teardown(None, None).await;
                debug!(?report, "session cancelled during initialization");
                return;
            }
        }

        let mut tick = tokio::time::interval(self.options.sample_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut in_flight: Option<FlushFuture> = None;
        let mut flush_snapshot: Option<ProgressRecord> = None;
        let mut last_flush_attempt: Option<Instant> = None;
        let mut urgent_followup = false;
        let mut commands_open = true;
        let mut player_open = true;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let report = self
                        .teardown(in_flight.take(), flush_snapshot.take())
                        .await;
                    debug!(?report, "session cancelled");
                    return;
                }

                command = self.commands.recv(), if commands_open => {
                    let Some(command) = command else {
                        // All handles gone; the cancellation token fires
                        // right after.
                        commands_open = false;
                        continue;
                    };
                    match command {
                        Command::Play => self.adapter.play(),
                        Command::Pause => self.adapter.pause(),
                        Command::Mute => self.adapter.mute(),
                        Command::Unmute => self.adapter.unmute(),
                        Command::Seek { target_seconds, reply } => {
                            let decision =
                                self.core.request_seek(target_seconds);
                            match decision {
                                SeekDecision::Allowed { target_seconds } => {
                                    self.adapter.seek(target_seconds);
                                }
                                SeekDecision::Denied {
                                    remaining_lock_seconds,
                                    hint_minutes,
                                } => {
                                    let _ = self.events.send(
                                        SessionEvent::SkipDenied {
                                            remaining_lock_seconds,
                                            hint_minutes,
                                        },
                                    );
                                }
                            }
                            let _ = reply.send(decision);
                        }
                        Command::ResetProgress => {
                            self.core.reset_progress();
                            self.adapter.seek(0);
                            self.publish();
                        }
                        Command::Shutdown { reply } => {
                            let report = self
                                .teardown(
                                    in_flight.take(),
                                    flush_snapshot.take(),
                                )
                                .await;
                            let _ = reply.send(report);
                            return;
                        }
                    }
                }

                event = self.adapter.next_event(), if player_open => {
                    let Some(event) = event else {
                        // Terminal: the player errored or went away; no
                        // further events will arrive.
                        player_open = false;
                        continue;
                    };
                    let urgent = self.handle_player_event(event);
                    self.publish();
                    if urgent {
                        if in_flight.is_some() {
                            urgent_followup = true;
                        } else if self.core.needs_flush() {
                            last_flush_attempt = Some(Instant::now());
                            self.begin_flush(
                                &mut in_flight,
                                &mut flush_snapshot,
                            );
                        }
                    }
                }

                result = async {
                    in_flight
                        .as_mut()
                        .expect("guarded by precondition")
                        .as_mut()
                        .await
                }, if in_flight.is_some() => {
                    in_flight = None;
                    let snapshot = flush_snapshot.take();
                    let followup = std::mem::take(&mut urgent_followup);
                    match result {
                        Ok(()) => {
                            if let Some(snapshot) = &snapshot {
                                self.core.note_flushed(snapshot);
                            }
                            // Coalesced follow-up: progress that arrived
                            // while the write was in flight goes out now,
                            // exactly once.
                            if (followup || self.core.dirty())
                                && self.core.needs_flush()
                            {
                                last_flush_attempt = Some(Instant::now());
                                self.begin_flush(
                                    &mut in_flight,
                                    &mut flush_snapshot,
                                );
                            }
                        }
                        Err(e) if e.is_transient() => {
                            // Dirty stays set; the autosave tick retries.
                            warn!(error = %e, "progress flush failed");
                        }
                        Err(e) => {
                            warn!(error = %e, "progress write rejected");
                            if self.core.note_store_rejected() {
                                let _ = self.events.send(
                                    SessionEvent::SaveRejected {
                                        message: e.to_string(),
                                    },
                                );
                            }
                        }
                    }
                }

                _ = tick.tick() => {
                    if self.core.state() == SessionState::Playing {
                        let position = self.adapter.current_position();
                        let outcome = self.core.on_sample(position);
                        self.publish();
                        if outcome.newly_completed {
                            info!(
                                position,
                                "video completed; forcing immediate flush"
                            );
                            if in_flight.is_some() {
                                urgent_followup = true;
                            } else {
                                last_flush_attempt = Some(Instant::now());
                                self.begin_flush(
                                    &mut in_flight,
                                    &mut flush_snapshot,
                                );
                            }
                            continue;
                        }
                    }

                    // Autosave decision runs in the same tick as sampling,
                    // so a flush always carries the freshest position.
                    let due = last_flush_attempt.is_none_or(|at| {
                        at.elapsed() >= self.options.min_save_interval
                    });
                    if due && in_flight.is_none() && self.core.needs_flush() {
                        last_flush_attempt = Some(Instant::now());
                        self.begin_flush(&mut in_flight, &mut flush_snapshot);
                    }
                }
            }
        }
    }

    /// Apply a normalized player event. Returns true when the event
    /// warrants an immediate flush (completion or player failure).
    fn handle_player_event(&mut self, event: PlayerEvent) -> bool {
        match event {
            PlayerEvent::Ready { duration_seconds } => {
                self.core.on_ready(duration_seconds);
                false
            }
            PlayerEvent::StateChanged(playback) => {
                self.core.on_state_changed(playback)
            }
            PlayerEvent::Error(code) => {
                warn!(code, "player failed; session going terminal");
                self.core.on_player_error();
                let _ = self.events.send(SessionEvent::PlayerFailed {
                    message: format!("player error code {code}"),
                });
                // Best-effort flush of the last known position.
                true
            }
        }
    }

    fn begin_flush(
        &mut self,
        in_flight: &mut Option<FlushFuture>,
        flush_snapshot: &mut Option<ProgressRecord>,
    ) {
        let record = self.core.flush_snapshot();
        let store = Arc::clone(&self.store);
        let payload = record.clone();
        *in_flight =
            Some(Box::pin(async move { store.upsert(&payload).await }));
        *flush_snapshot = Some(record);
    }

    fn publish(&self) {
        self.projection.send_replace(self.core.projection());
    }

    /// Cancel-path and shutdown-path teardown: settle the in-flight write,
    /// then issue at most one final flush, all bounded by the teardown
    /// timeout so pending work cannot outlive the unmount.
    async fn teardown(
        &mut self,
        in_flight: Option<FlushFuture>,
        flush_snapshot: Option<ProgressRecord>,
    ) -> TeardownReport {
        self.adapter.destroy();

        if let Some(pending) = in_flight {
            match tokio::time::timeout(self.options.teardown_timeout, pending)
                .await
            {
                Ok(Ok(())) => {
                    if let Some(snapshot) = &flush_snapshot {
                        self.core.note_flushed(snapshot);
                    }
                }
                Ok(Err(e)) => {
                    if !e.is_transient() {
                        self.core.note_store_rejected();
                    }
                    warn!(error = %e, "in-flight flush failed during teardown");
                }
                Err(_) => {
                    warn!("in-flight flush did not settle before teardown");
                }
            }
        }

        if !self.core.needs_flush() {
            return TeardownReport {
                final_flush: FinalFlush::NotNeeded,
            };
        }

        let record = self.core.flush_snapshot();
        let final_flush = match tokio::time::timeout(
            self.options.teardown_timeout,
            self.store.upsert(&record),
        )
        .await
        {
            Ok(Ok(())) => {
                self.core.note_flushed(&record);
                FinalFlush::Flushed
            }
            Ok(Err(e)) => {
                warn!(error = %e, "final flush failed");
                FinalFlush::Failed(e.to_string())
            }
            Err(_) => {
                warn!("final flush timed out");
                FinalFlush::TimedOut
            }
        };

        TeardownReport { final_flush }
    }
}
