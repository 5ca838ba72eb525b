//! Coalescing of nearby lines into batches.
//!
//! Lines whose log times fall within a small window of the first member are
//! treated as simultaneous and released together, which keeps the scheduler
//! from arming one timer per line on dense logs.

use std::time::Duration;

use chrono::TimeDelta;

use crate::timestamp::LogTime;

/// Default proximity window.
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(500);

/// Ordered, non-empty group of lines sharing one anchor time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    anchor: LogTime,
    latest: LogTime,
    lines: Vec<String>,
}

impl Batch {
    fn open(anchor: LogTime, first: String) -> Self {
        Self {
            anchor,
            latest: anchor,
            lines: vec![first],
        }
    }

    fn add(&mut self, time: LogTime, line: String) {
        self.latest = self.latest.max(time);
        self.lines.push(line);
    }

    /// Log time of the first member.
    pub fn anchor(&self) -> LogTime {
        self.anchor
    }

    /// Latest log time among the members, which may be past the anchor.
    pub fn latest(&self) -> LogTime {
        self.latest
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Groups consecutive lines into [`Batch`]es.
#[derive(Debug)]
pub struct BatchAccumulator {
    window: TimeDelta,
    open: Option<Batch>,
}

impl BatchAccumulator {
    pub fn new(window: Duration) -> Self {
        Self {
            window: TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX),
            open: None,
        }
    }

    /// Anchor of the open batch, if any.
    pub fn open_anchor(&self) -> Option<LogTime> {
        self.open.as_ref().map(Batch::anchor)
    }

    /// Add a line with a resolved log time.
    ///
    /// Returns the previous batch once `time` falls outside its window; the
    /// line then opens a new batch anchored at `time`.
    pub fn push(&mut self, time: LogTime, line: String) -> Option<Batch> {
        match self.open.as_mut() {
            Some(batch) if time.signed_duration_since(batch.anchor) <= self.window => {
                batch.add(time, line);
                None
            }
            _ => self.open.replace(Batch::open(time, line)),
        }
    }

    /// Add a line without a timestamp of its own.
    ///
    /// The line joins the open batch and so inherits its anchor time. Returns
    /// `false` when no batch is open and the line has to be dropped.
    pub fn push_unresolved(&mut self, line: String) -> bool {
        match self.open.as_mut() {
            Some(batch) => {
                batch.lines.push(line);
                true
            }
            None => false,
        }
    }

    /// Hand out whatever is still open, at end of input.
    pub fn finish(&mut self) -> Option<Batch> {
        self.open.take()
    }
}

impl Default for BatchAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(millis: i64) -> LogTime {
        (Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap() + TimeDelta::milliseconds(millis))
            .fixed_offset()
    }

    #[test]
    fn lines_within_window_share_a_batch() {
        let mut acc = BatchAccumulator::new(Duration::from_millis(500));
        assert!(acc.push(at(0), "a".into()).is_none());
        assert!(acc.push(at(200), "b".into()).is_none());
        // Boundary is inclusive.
        assert!(acc.push(at(500), "c".into()).is_none());

        let batch = acc.finish().unwrap();
        assert_eq!(batch.anchor(), at(0));
        assert_eq!(batch.latest(), at(500));
        assert_eq!(batch.lines(), ["a", "b", "c"]);
        assert!(acc.finish().is_none());
    }

    #[test]
    fn exceeding_window_closes_the_batch() {
        let mut acc = BatchAccumulator::new(Duration::from_millis(500));
        acc.push(at(0), "a".into());
        acc.push(at(400), "b".into());

        let closed = acc.push(at(501), "c".into()).unwrap();
        assert_eq!(closed.anchor(), at(0));
        assert_eq!(closed.lines(), ["a", "b"]);

        // The window is measured from the new anchor, not the last member.
        assert_eq!(acc.open_anchor(), Some(at(501)));
        assert!(acc.push(at(1000), "d".into()).is_none());
        let closed = acc.push(at(1002), "e".into()).unwrap();
        assert_eq!(closed.lines(), ["c", "d"]);
    }

    #[test]
    fn unresolved_lines_follow_the_open_batch() {
        let mut acc = BatchAccumulator::default();
        assert!(!acc.push_unresolved("orphan".into()));
        assert!(acc.open_anchor().is_none());

        acc.push(at(0), "first".into());
        assert!(acc.push_unresolved("continuation".into()));
        let batch = acc.finish().unwrap();
        assert_eq!(batch.lines(), ["first", "continuation"]);
        assert_eq!(batch.latest(), at(0));
    }

    #[test]
    fn earlier_times_stay_in_the_open_batch() {
        let mut acc = BatchAccumulator::new(Duration::from_millis(100));
        acc.push(at(1000), "late".into());
        assert!(acc.push(at(900), "early".into()).is_none());
        let batch = acc.finish().unwrap();
        assert_eq!(batch.lines(), ["late", "early"]);
        assert_eq!(batch.latest(), at(1000));
    }
}
