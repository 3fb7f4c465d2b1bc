//! Synchronous core of the playback session.
//!
//! [`SessionCore`] owns every decision the engine makes (transitions,
//! sampling, seek gating, completion latching, flush bookkeeping) with no
//! I/O and no clocks, so the whole contract is unit-testable. The async
//! driver around it only schedules ticks and performs the writes this core
//! asks for.

use tracing::{debug, warn};

use lumio_model::{ProgressRecord, UserId, VideoDescriptor};

use crate::adapter::PlaybackState;
use crate::policy::SkipPolicy;
use crate::session::projection::ProgressProjection;

/// Lifecycle of one mounted player view.
///
/// `Ended` and `Error` are terminal for the session instance; a new mount
/// creates a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
    Playing,
    Paused,
    Ended,
    Error,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Ended | SessionState::Error)
    }
}

/// Outcome of a caller-initiated seek request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDecision {
    /// Forward to the player, with the target clamped to the video length.
    Allowed { target_seconds: u32 },
    /// Gate still locked. No state was mutated; the fields feed the notice.
    Denied {
        remaining_lock_seconds: u32,
        hint_minutes: u32,
    },
}

/// What a position sample changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleOutcome {
    /// The durable record advanced (new maximum this session).
    pub advanced: bool,
    /// This sample crossed the completion threshold.
    pub newly_completed: bool,
}

/// The session state machine. Pure logic; see the module docs.
#[derive(Debug)]
pub struct SessionCore {
    video: VideoDescriptor,
    policy: SkipPolicy,
    state: SessionState,
    record: ProgressRecord,
    /// Last value read from the player. May regress on an allowed seek;
    /// the durable record only ever advances.
    live_position_seconds: u32,
    skip_eligible: bool,
    /// Progress advanced since the last successful flush.
    dirty: bool,
    /// The store refused a write; no further flushes for this record.
    store_rejected: bool,
}

impl SessionCore {
    pub fn new(
        user_id: UserId,
        video: VideoDescriptor,
        policy: SkipPolicy,
        prior: Option<ProgressRecord>,
    ) -> Self {
        let record = prior
            .unwrap_or_else(|| ProgressRecord::new(user_id, &video));
        let live_position_seconds = record.position_seconds;
        let skip_eligible = policy
            .skip_eligible(live_position_seconds, video.duration_seconds);
        Self {
            video,
            policy,
            state: SessionState::Uninitialized,
            record,
            live_position_seconds,
            skip_eligible,
            dirty: false,
            store_rejected: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn duration_seconds(&self) -> u32 {
        self.video.duration_seconds
    }

    /// Where the player should start: the persisted position, if any.
    pub fn resume_position(&self) -> u32 {
        self.record.position_seconds
    }

    /// Adapter reported ready. The catalog duration stays authoritative for
    /// gating math; a player report that disagrees by more than the
    /// completion slack is logged and otherwise ignored.
    pub fn on_ready(&mut self, reported_duration_seconds: u32) -> bool {
        if self.state != SessionState::Uninitialized {
            debug!(state = ?self.state, "ignoring ready in non-initial state");
            return false;
        }
        let catalog = self.video.duration_seconds;
        if reported_duration_seconds.abs_diff(catalog)
            > self.policy.completion_slack_seconds
        {
            warn!(
                catalog,
                reported = reported_duration_seconds,
                video = %self.video.id,
                "player duration disagrees with catalog; using catalog"
            );
        }
        self.state = SessionState::Ready;
        true
    }

    /// Normalized player state change. Invalid transitions are ignored.
    /// Returns true when the session crossed the completion threshold as a
    /// result (ended event) and an urgent flush is warranted.
    pub fn on_state_changed(&mut self, playback: PlaybackState) -> bool {
        match (self.state, playback) {
            (
                SessionState::Ready | SessionState::Paused,
                PlaybackState::Playing,
            ) => {
                self.state = SessionState::Playing;
                false
            }
            (SessionState::Playing, PlaybackState::Paused) => {
                self.state = SessionState::Paused;
                false
            }
            (
                SessionState::Playing | SessionState::Paused,
                PlaybackState::Ended,
            ) => self.on_ended(),
            (state, playback) => {
                debug!(?state, ?playback, "ignoring invalid transition");
                false
            }
        }
    }

    /// Played to the end. Terminal; latches completion and requests an
    /// immediate flush.
    fn on_ended(&mut self) -> bool {
        self.state = SessionState::Ended;
        self.live_position_seconds = self.video.duration_seconds;
        if self.record.advance_to(self.video.duration_seconds) {
            self.dirty = true;
        }
        self.skip_eligible = true;
        let newly_completed = !self.record.completed;
        if newly_completed {
            self.record.mark_completed();
            self.dirty = true;
        }
        newly_completed
    }

    /// Adapter-fatal error. Terminal; the driver issues a best-effort flush
    /// and surfaces the failure, but never retries playback.
    pub fn on_player_error(&mut self) {
        self.state = SessionState::Error;
    }

    /// One position sample while playing: clamp, track the live position,
    /// recompute eligibility, advance the durable record, latch completion.
    pub fn on_sample(&mut self, raw_position_seconds: u32) -> SampleOutcome {
        let duration = self.video.duration_seconds;
        let clamped = raw_position_seconds.min(duration);

        self.live_position_seconds = clamped;
        self.skip_eligible = self.policy.skip_eligible(clamped, duration);

        let advanced = self.record.advance_to(clamped);
        if advanced {
            self.dirty = true;
        }

        let newly_completed = !self.record.completed
            && self.policy.is_complete(clamped, duration);
        if newly_completed {
            self.record.mark_completed();
            self.dirty = true;
        }

        SampleOutcome {
            advanced,
            newly_completed,
        }
    }

    /// Gate a caller-initiated seek. Rewatching is never restricted; a
    /// forward jump beyond the tolerance needs eligibility. Denial mutates
    /// nothing.
    pub fn request_seek(&self, target_seconds: u32) -> SeekDecision {
        let duration = self.video.duration_seconds;
        let target = target_seconds.min(duration);

        if self.policy.allows_seek(
            target,
            self.live_position_seconds,
            self.record.position_seconds,
            self.skip_eligible,
        ) {
            SeekDecision::Allowed {
                target_seconds: target,
            }
        } else {
            let remaining = self.policy.remaining_lock_seconds(
                self.live_position_seconds,
                duration,
            );
            SeekDecision::Denied {
                remaining_lock_seconds: remaining,
                hint_minutes: SkipPolicy::hint_minutes(remaining),
            }
        }
    }

    /// Explicit progress reset, the only sanctioned position regression.
    /// Completion stays latched for the life of this session.
    pub fn reset_progress(&mut self) {
        self.record.reset();
        self.live_position_seconds = 0;
        self.skip_eligible = self
            .policy
            .skip_eligible(0, self.video.duration_seconds);
        self.dirty = true;
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn store_rejected(&self) -> bool {
        self.store_rejected
    }

    /// Whether a flush should happen at all: there is something new to
    /// write and the store has not refused this record.
    pub fn needs_flush(&self) -> bool {
        self.dirty && !self.store_rejected
    }

    /// Snapshot for a durable write, stamped with the write time.
    pub fn flush_snapshot(&mut self) -> ProgressRecord {
        self.record.touch();
        self.record.clone()
    }

    /// A flush of `snapshot` succeeded. Clears `dirty` only if nothing
    /// advanced while the write was in flight; otherwise the record stays
    /// dirty and the driver coalesces into one follow-up flush.
    pub fn note_flushed(&mut self, snapshot: &ProgressRecord) {
        if self.record.position_seconds == snapshot.position_seconds
            && self.record.completed == snapshot.completed
        {
            self.dirty = false;
        }
    }

    /// The store refused a write. Returns true on the first refusal so the
    /// caller surfaces it exactly once.
    pub fn note_store_rejected(&mut self) -> bool {
        let newly = !self.store_rejected;
        self.store_rejected = true;
        newly
    }

    pub fn projection(&self) -> ProgressProjection {
        let duration = self.video.duration_seconds;
        let remaining = if self.skip_eligible {
            0
        } else {
            self.policy
                .remaining_lock_seconds(self.live_position_seconds, duration)
        };
        ProgressProjection {
            position_seconds: self.live_position_seconds,
            percent_watched: self.record.percent_watched,
            skip_eligible: self.skip_eligible,
            remaining_lock_seconds: remaining,
            completed: self.record.completed,
        }
    }
}
