//! Durable watch-progress records.
//!
//! A [`ProgressRecord`] is the unit the engine persists: one row per
//! (user, video) pair, carrying the furthest position reached, the derived
//! percentage, and the one-way completion flag. Position updates are
//! monotonic; the only sanctioned regression is an explicit [`reset`].
//!
//! [`reset`]: ProgressRecord::reset

use chrono::{DateTime, Utc};

use crate::ids::{UserId, VideoId};
use crate::video::VideoDescriptor;

/// Unique key of a progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgressKey {
    pub user_id: UserId,
    pub video_id: VideoId,
}

/// Watch percentage derived from position and duration.
///
/// Never persisted as a source of truth on its own; always recomputed from
/// `position_seconds` on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchPercent(u8);

impl WatchPercent {
    /// Compute `round(position / duration * 100)`, clamped to 0..=100.
    /// A zero duration yields 0 rather than a division error.
    pub fn compute(position_seconds: u32, duration_seconds: u32) -> Self {
        if duration_seconds == 0 {
            return WatchPercent(0);
        }
        let ratio =
            position_seconds as f64 / duration_seconds as f64 * 100.0;
        WatchPercent(ratio.round().clamp(0.0, 100.0) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_started(&self) -> bool {
        self.0 > 0
    }
}

/// The durable unit of watch progress for one (user, video) pair.
///
/// # Invariants
///
/// - `position_seconds <= video_duration_seconds`
/// - `percent_watched` is always the derivation of `position_seconds`
/// - `completed` transitions false -> true exactly once and never reverts
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub video_id: VideoId,
    pub position_seconds: u32,
    /// Captured from the catalog descriptor at record creation; the player's
    /// own duration report is not trusted here.
    pub video_duration_seconds: u32,
    pub percent_watched: u8,
    pub completed: bool,
    /// Timestamp of the most recent durable write.
    pub last_watched_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Fresh record at position zero for a user/video pair.
    pub fn new(user_id: UserId, video: &VideoDescriptor) -> Self {
        Self {
            user_id,
            video_id: video.id,
            position_seconds: 0,
            video_duration_seconds: video.duration_seconds,
            percent_watched: 0,
            completed: false,
            last_watched_at: Utc::now(),
        }
    }

    pub fn key(&self) -> ProgressKey {
        ProgressKey {
            user_id: self.user_id,
            video_id: self.video_id,
        }
    }

    /// Advance to `position_seconds`, clamped to the video duration.
    ///
    /// Lower values are ignored so an out-of-order update can never walk the
    /// record backwards. Returns true when the position actually moved.
    pub fn advance_to(&mut self, position_seconds: u32) -> bool {
        let clamped = position_seconds.min(self.video_duration_seconds);
        if clamped <= self.position_seconds {
            return false;
        }
        self.position_seconds = clamped;
        self.percent_watched = WatchPercent::compute(
            self.position_seconds,
            self.video_duration_seconds,
        )
        .value();
        true
    }

    /// Latch the completion flag. One-way: calling this is irreversible.
    pub fn mark_completed(&mut self) {
        self.completed = true;
    }

    /// Explicit reset of the watched position, the only sanctioned
    /// regression. Does not unlatch `completed`.
    pub fn reset(&mut self) {
        self.position_seconds = 0;
        self.percent_watched = 0;
    }

    /// Stamp the write timestamp; called right before a durable write.
    pub fn touch(&mut self) {
        self.last_watched_at = Utc::now();
    }

    pub fn percent(&self) -> WatchPercent {
        WatchPercent::compute(
            self.position_seconds,
            self.video_duration_seconds,
        )
    }
}
