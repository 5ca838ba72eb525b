//! Correspondence between log time and wall time.
//!
//! A [`ClockMapping`] is established from the first resolvable timestamp of a
//! session and converts any later log time `t` into
//! `wall_anchor + (t - log_anchor)`. The wall side is kept twice: as a
//! `chrono` instant for rendering rewritten timestamps, and as a tokio
//! [`Instant`] for sleeping, so paused-time tests drive the scheduler exactly.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

use crate::timestamp::LogTime;

/// Smallest gap kept between the last emission of a pass and the first
/// emission of the next one.
pub const MIN_REBASE_GAP: Duration = Duration::from_millis(1);

/// Maps log timestamps onto the real clock.
#[derive(Debug, Clone)]
pub struct ClockMapping {
    log_anchor: LogTime,
    wall_start: DateTime<Utc>,
    instant_start: Instant,
    /// Accumulated rebase shift applied to the wall side.
    shift: Duration,
    /// Largest anchor offset emitted since the last rebase.
    high_water: Duration,
}

impl ClockMapping {
    /// Pin `log_anchor` to the current wall time.
    pub fn establish(log_anchor: LogTime, wall_now: DateTime<Utc>, instant_now: Instant) -> Self {
        Self {
            log_anchor,
            wall_start: wall_now,
            instant_start: instant_now,
            shift: Duration::ZERO,
            high_water: Duration::ZERO,
        }
    }

    pub fn log_anchor(&self) -> LogTime {
        self.log_anchor
    }

    /// Wall time the log anchor currently maps to.
    pub fn wall_anchor(&self) -> DateTime<Utc> {
        add_to_wall(self.wall_start, self.shift)
    }

    /// Lines older than the anchor are never replayed.
    pub fn is_before_anchor(&self, t: &LogTime) -> bool {
        *t < self.log_anchor
    }

    /// Wall-clock equivalent of a log time.
    pub fn map(&self, t: &LogTime) -> DateTime<Utc> {
        add_to_wall(self.wall_start, self.shift + self.offset_of(t))
    }

    /// Monotonic instant at which a log time is due.
    pub fn deadline(&self, t: &LogTime) -> Instant {
        let offset = self.shift + self.offset_of(t);
        self.instant_start
            .checked_add(offset)
            .unwrap_or(self.instant_start)
    }

    /// Remember that lines up to log time `t` have been emitted.
    pub fn record_emission(&mut self, t: &LogTime) {
        self.high_water = self.high_water.max(self.offset_of(t));
    }

    /// Slide the mapping for the next loop iteration.
    ///
    /// `elapsed` is the real time since the session began. The log anchor of
    /// the next pass maps to that point, but never earlier than
    /// [`MIN_REBASE_GAP`] after the latest emission of the previous pass.
    pub fn rebase(&mut self, elapsed: Duration) {
        let floor = self.shift + self.high_water + MIN_REBASE_GAP;
        self.shift = elapsed.max(floor);
        self.high_water = Duration::ZERO;
    }

    /// Distance from the anchor, zero for times before it.
    fn offset_of(&self, t: &LogTime) -> Duration {
        t.signed_duration_since(self.log_anchor)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

fn add_to_wall(start: DateTime<Utc>, offset: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(offset)
        .ok()
        .and_then(|delta| start.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
