//! Skip/advance gating policy.
//!
//! The gate threshold is the *smaller* of an absolute floor and a fraction
//! of the video's length, so a short video can never demand more watch-time
//! than it contains. All math runs on the catalog's authoritative duration,
//! never on what the embedded player reports.

/// Tuning for the minimum-engagement gate and completion detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkipPolicy {
    /// Absolute watch-time floor before forward seeking unlocks.
    pub min_watch_seconds: u32,
    /// Fractional alternative to the floor; the smaller of the two wins.
    pub min_watch_fraction: f64,
    /// Forward slack absorbed before a seek counts as a skip attempt.
    pub seek_tolerance_seconds: u32,
    /// How close to the nominal end still counts as having finished; the
    /// player tends to stop a few seconds short of the reported duration.
    pub completion_slack_seconds: u32,
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self {
            min_watch_seconds: 180,
            min_watch_fraction: 0.1,
            seek_tolerance_seconds: 10,
            completion_slack_seconds: 5,
        }
    }
}

impl SkipPolicy {
    /// Seconds of watch-time required before skipping unlocks for a video of
    /// the given duration: `min(min_watch_seconds, duration * fraction)`.
    pub fn gate_seconds(&self, duration_seconds: u32) -> u32 {
        let fractional =
            (duration_seconds as f64 * self.min_watch_fraction).floor() as u32;
        self.min_watch_seconds.min(fractional)
    }

    pub fn skip_eligible(
        &self,
        position_seconds: u32,
        duration_seconds: u32,
    ) -> bool {
        position_seconds >= self.gate_seconds(duration_seconds)
    }

    /// Seconds still to watch before the gate opens. Zero once eligible.
    pub fn remaining_lock_seconds(
        &self,
        position_seconds: u32,
        duration_seconds: u32,
    ) -> u32 {
        self.gate_seconds(duration_seconds)
            .saturating_sub(position_seconds)
    }

    /// Whole-minutes hint shown to the user on a denied skip.
    pub fn hint_minutes(remaining_lock_seconds: u32) -> u32 {
        remaining_lock_seconds.div_ceil(60)
    }

    /// Whether a position counts as having finished the video.
    pub fn is_complete(
        &self,
        position_seconds: u32,
        duration_seconds: u32,
    ) -> bool {
        position_seconds
            >= duration_seconds.saturating_sub(self.completion_slack_seconds)
    }

    /// Seek gating. Rewatching is never restricted: any target behind the
    /// live position (plus tolerance) or inside the already-watched range is
    /// allowed. Only a genuine jump ahead requires eligibility.
    pub fn allows_seek(
        &self,
        target_seconds: u32,
        live_position_seconds: u32,
        max_watched_seconds: u32,
        skip_eligible: bool,
    ) -> bool {
        if target_seconds
            <= live_position_seconds
                .saturating_add(self.seek_tolerance_seconds)
        {
            return true;
        }
        if target_seconds <= max_watched_seconds {
            return true;
        }
        skip_eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_uses_smaller_of_floor_and_fraction() {
        let policy = SkipPolicy::default();
        // duration 100 -> min(180, 10) = 10
        assert_eq!(policy.gate_seconds(100), 10);
        assert!(!policy.skip_eligible(9, 100));
        assert!(policy.skip_eligible(10, 100));
    }

    #[test]
    fn short_video_floor() {
        let policy = SkipPolicy::default();
        // duration 30 -> min(180, 3) = 3
        assert_eq!(policy.gate_seconds(30), 3);
        assert!(policy.skip_eligible(3, 30));
    }

    #[test]
    fn long_video_hits_absolute_floor() {
        let policy = SkipPolicy::default();
        // duration 3600 -> min(180, 360) = 180
        assert_eq!(policy.gate_seconds(3600), 180);
        assert!(!policy.skip_eligible(179, 3600));
        assert!(policy.skip_eligible(180, 3600));
    }

    #[test]
    fn remaining_lock_counts_down_to_zero() {
        let policy = SkipPolicy::default();
        assert_eq!(policy.remaining_lock_seconds(0, 3600), 180);
        assert_eq!(policy.remaining_lock_seconds(120, 3600), 60);
        assert_eq!(policy.remaining_lock_seconds(500, 3600), 0);
    }

    #[test]
    fn hint_rounds_up_to_whole_minutes() {
        assert_eq!(SkipPolicy::hint_minutes(180), 3);
        assert_eq!(SkipPolicy::hint_minutes(61), 2);
        assert_eq!(SkipPolicy::hint_minutes(1), 1);
        assert_eq!(SkipPolicy::hint_minutes(0), 0);
    }

    #[test]
    fn completion_respects_slack() {
        let policy = SkipPolicy::default();
        assert!(!policy.is_complete(594, 600));
        assert!(policy.is_complete(595, 600));
        assert!(policy.is_complete(600, 600));
    }

    #[test]
    fn rewatch_is_always_allowed() {
        let policy = SkipPolicy::default();
        // Behind the live position, eligibility irrelevant.
        assert!(policy.allows_seek(50, 100, 100, false));
        // Inside the already-watched range even though live regressed.
        assert!(policy.allows_seek(150, 60, 200, false));
    }

    #[test]
    fn forward_seek_needs_eligibility_beyond_tolerance() {
        let policy = SkipPolicy::default();
        // Within the 10s tolerance: allowed.
        assert!(policy.allows_seek(109, 100, 100, false));
        assert!(policy.allows_seek(110, 100, 100, false));
        // Beyond tolerance and beyond watched range: gated.
        assert!(!policy.allows_seek(111, 100, 100, false));
        assert!(policy.allows_seek(111, 100, 100, true));
    }
}
