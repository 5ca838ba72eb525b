//! Replay loop controller.
//!
//! Drives `scan -> filter -> extract -> accumulate -> schedule` over a file,
//! and on end of input either rewinds (rebasing the clock mapping) or stops.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::batch::{Batch, BatchAccumulator, DEFAULT_BATCH_WINDOW};
use crate::clock::ClockMapping;
use crate::error::{ReplayError, Result};
use crate::filter::{LineFilter, MATCH_ALL};
use crate::scheduler::{Dispatch, Scheduler};
use crate::timestamp::{
    DEFAULT_TIMESTAMP_FORMAT, DEFAULT_TIMESTAMP_PATTERN, LogZone, TimestampExtractor,
};

/// Session configuration, fixed once a replay starts.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Lines not matching this pattern are skipped before anything else.
    pub filter_pattern: String,
    /// Pattern with exactly one capture group around the timestamp.
    pub timestamp_pattern: String,
    /// chrono strftime descriptor used to parse and re-render timestamps.
    pub timestamp_format: String,
    /// Restart from the beginning after end of input.
    pub loop_replay: bool,
    /// Lines within this distance of a batch's anchor are released together.
    pub batch_window: Duration,
    /// Zone for timestamps without an explicit offset.
    pub zone: LogZone,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            filter_pattern: MATCH_ALL.to_string(),
            timestamp_pattern: DEFAULT_TIMESTAMP_PATTERN.to_string(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            loop_replay: false,
            batch_window: DEFAULT_BATCH_WINDOW,
            zone: LogZone::Utc,
        }
    }
}

impl ReplayOptions {
    pub fn with_filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter_pattern = pattern.into();
        self
    }

    pub fn with_timestamp(mut self, pattern: impl Into<String>, format: impl Into<String>) -> Self {
        self.timestamp_pattern = pattern.into();
        self.timestamp_format = format.into();
        self
    }

    pub fn with_loop(mut self, loop_replay: bool) -> Self {
        self.loop_replay = loop_replay;
        self
    }

    pub fn with_batch_window(mut self, window: Duration) -> Self {
        self.batch_window = window;
        self
    }

    pub fn with_zone(mut self, zone: LogZone) -> Self {
        self.zone = zone;
        self
    }
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Passes started over the file, including a cancelled one.
    pub passes: u32,
    pub lines_read: u64,
    /// Lines rejected by the filter pattern.
    pub lines_filtered: u64,
    /// Lines before the log anchor, or unresolved with no open batch.
    pub lines_dropped: u64,
    /// Lines without a timestamp that joined the open batch.
    pub lines_unresolved: u64,
    pub lines_emitted: u64,
    pub batches: u64,
    /// Whether the session ended because of cancellation.
    pub cancelled: bool,
}

/// How a single pass over the file ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassEnd {
    Eof,
    Cancelled,
}

/// Replays one file according to [`ReplayOptions`].
#[derive(Debug, Clone)]
pub struct LogReplayer {
    path: PathBuf,
    options: ReplayOptions,
}

impl LogReplayer {
    pub fn new(path: impl Into<PathBuf>, options: ReplayOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &ReplayOptions {
        &self.options
    }

    /// Run a replay session until end of input (without looping), until
    /// `token` is cancelled, or until an I/O error occurs.
    ///
    /// `emit` is called once per replayed line, in file order, at the line's
    /// mapped wall-clock time. It runs on the replay task, so its execution
    /// time delays subsequent batches.
    ///
    /// Configuration problems are reported before the file is opened.
    pub async fn run<F>(&self, token: CancellationToken, emit: F) -> Result<ReplayStats>
    where
        F: FnMut(String),
    {
        let filter = LineFilter::new(&self.options.filter_pattern)?;
        let extractor = TimestampExtractor::new(
            &self.options.timestamp_pattern,
            &self.options.timestamp_format,
            self.options.zone,
        )?;

        let file = File::open(&self.path)
            .await
            .map_err(|e| ReplayError::io(&self.path, e))?;
        let mut reader = BufReader::new(file);

        info!(
            path = %self.path.display(),
            loop_replay = self.options.loop_replay,
            batch_window_ms = self.options.batch_window.as_millis() as u64,
            "Starting log replay"
        );

        let mut session = Session {
            filter,
            extractor,
            scheduler: Scheduler::new(token),
            batch_window: self.options.batch_window,
            started: Instant::now(),
            mapping: None,
            stats: ReplayStats::default(),
            emit,
        };

        loop {
            session.stats.passes += 1;
            let emitted_before = session.stats.lines_emitted;
            let end = session.run_pass(&mut reader, &self.path).await?;
            debug!(
                pass = session.stats.passes,
                emitted = session.stats.lines_emitted - emitted_before,
                "Replay pass finished"
            );

            if end == PassEnd::Cancelled || session.scheduler.token().is_cancelled() {
                session.stats.cancelled = true;
                break;
            }
            if !self.options.loop_replay {
                break;
            }
            if session.stats.lines_emitted == emitted_before {
                warn!(
                    path = %self.path.display(),
                    "Pass emitted no lines, not looping over a file without usable timestamps"
                );
                break;
            }

            reader
                .seek(SeekFrom::Start(0))
                .await
                .map_err(|e| ReplayError::io(&self.path, e))?;
            if let Some(mapping) = session.mapping.as_mut() {
                mapping.rebase(session.started.elapsed());
                debug!(wall_anchor = %mapping.wall_anchor(), "Rebased clock for next pass");
            }
        }

        let stats = session.stats;
        info!(
            passes = stats.passes,
            emitted = stats.lines_emitted,
            dropped = stats.lines_dropped,
            filtered = stats.lines_filtered,
            cancelled = stats.cancelled,
            "Log replay finished"
        );
        Ok(stats)
    }
}

/// Mutable state of one replay session.
struct Session<F> {
    filter: LineFilter,
    extractor: TimestampExtractor,
    scheduler: Scheduler,
    batch_window: Duration,
    started: Instant,
    mapping: Option<ClockMapping>,
    stats: ReplayStats,
    emit: F,
}

impl<F> Session<F>
where
    F: FnMut(String),
{
    async fn run_pass(&mut self, reader: &mut BufReader<File>, path: &Path) -> Result<PassEnd> {
        let mut batches = BatchAccumulator::new(self.batch_window);
        let mut buf = Vec::new();

        loop {
            if self.scheduler.token().is_cancelled() {
                return Ok(PassEnd::Cancelled);
            }

            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|e| ReplayError::io(path, e))?;
            if read == 0 {
                break;
            }
            self.stats.lines_read += 1;

            let line = decode_line(&buf);
            if !self.filter.matches(&line) {
                self.stats.lines_filtered += 1;
                continue;
            }

            let Some(extracted) = self.extractor.extract(&line) else {
                if batches.push_unresolved(line) {
                    self.stats.lines_unresolved += 1;
                } else {
                    self.stats.lines_dropped += 1;
                    trace!("Dropping line without timestamp outside any batch");
                }
                continue;
            };

            let mapping = self.mapping.get_or_insert_with(|| {
                let mapping = ClockMapping::establish(extracted.time, Utc::now(), Instant::now());
                debug!(
                    log_anchor = %extracted.time,
                    wall_anchor = %mapping.wall_anchor(),
                    "Established clock mapping"
                );
                mapping
            });

            if mapping.is_before_anchor(&extracted.time) {
                self.stats.lines_dropped += 1;
                trace!(time = %extracted.time, "Dropping line older than the log anchor");
                continue;
            }

            let text = self
                .extractor
                .rewrite(&line, &extracted, mapping.map(&extracted.time));
            if let Some(batch) = batches.push(extracted.time, text)
                && self.flush(batch).await == Dispatch::Cancelled
            {
                return Ok(PassEnd::Cancelled);
            }
        }

        if let Some(batch) = batches.finish()
            && self.flush(batch).await == Dispatch::Cancelled
        {
            return Ok(PassEnd::Cancelled);
        }
        Ok(PassEnd::Eof)
    }

    async fn flush(&mut self, batch: Batch) -> Dispatch {
        // Batches only open after the mapping is established.
        let Some(mapping) = self.mapping.as_mut() else {
            return Dispatch::Flushed(0);
        };

        let anchor = batch.anchor();
        let latest = batch.latest();
        let outcome = self.scheduler.dispatch(batch, mapping, &mut self.emit).await;
        if let Dispatch::Flushed(count) = outcome {
            // Members carry their own rewritten times, up to `latest`.
            mapping.record_emission(&latest);
            self.stats.batches += 1;
            self.stats.lines_emitted += count as u64;
            debug!(anchor = %anchor, lines = count, "Flushed batch");
        }
        outcome
    }
}

/// Strip the line terminator; invalid UTF-8 is replaced rather than rejected.
fn decode_line(buf: &[u8]) -> String {
    let mut end = buf.len();
    if end > 0 && buf[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && buf[end - 1] == b'\r' {
            end -= 1;
        }
    }
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_tracing;

    #[test]
    fn decode_strips_terminators() {
        assert_eq!(decode_line(b"abc\n"), "abc");
        assert_eq!(decode_line(b"abc\r\n"), "abc");
        assert_eq!(decode_line(b"abc"), "abc");
        assert_eq!(decode_line(b"\n"), "");
        assert_eq!(decode_line(b"a\xffb\n"), "a\u{fffd}b");
    }

    #[test]
    fn options_builder_overrides_defaults() {
        let replayer = LogReplayer::new(
            "app.log",
            ReplayOptions::default()
                .with_filter("ERROR")
                .with_loop(true)
                .with_batch_window(Duration::from_secs(1))
                .with_zone(LogZone::Local),
        );
        assert_eq!(replayer.path(), Path::new("app.log"));

        let options = replayer.options();

        assert_eq!(options.filter_pattern, "ERROR");
        assert_eq!(options.timestamp_format, DEFAULT_TIMESTAMP_FORMAT);
        assert!(options.loop_replay);
        assert_eq!(options.batch_window, Duration::from_secs(1));
        assert_eq!(options.zone, LogZone::Local);
    }

    #[tokio::test]
    async fn config_errors_surface_before_opening_the_file() {
        init_tracing();
        let replayer = LogReplayer::new(
            "/definitely/not/here.log",
            ReplayOptions::default().with_filter("(["),
        );
        let err = replayer
            .run(CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ReplayError::InvalidFilterPattern { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        init_tracing();
        let replayer = LogReplayer::new("/definitely/not/here.log", ReplayOptions::default());
        let err = replayer
            .run(CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ReplayError::Io { .. }));
        assert!(!err.is_config());
    }
}
