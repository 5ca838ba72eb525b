//! Timestamp extraction and rewriting.
//!
//! A line's timestamp is located with a regex that has exactly one capture
//! group. The captured text is parsed with a chrono strftime descriptor, and
//! the same descriptor is used to render the replacement wall-clock time, so
//! rewritten lines keep the shape of the originals.

use std::ops::Range;
use std::str::FromStr;

use chrono::format::{Item, Parsed, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::error::{ReplayError, Result};

/// A point on the log's own time axis.
pub type LogTime = DateTime<FixedOffset>;

/// Default pattern: `2023-01-01 12:00:00.000` style timestamps.
pub const DEFAULT_TIMESTAMP_PATTERN: &str = r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3})";

/// Default descriptor matching [`DEFAULT_TIMESTAMP_PATTERN`].
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Zone assumed for timestamps that carry no UTC offset of their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogZone {
    #[default]
    Utc,
    Local,
}

impl FromStr for LogZone {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utc" | "z" => Ok(Self::Utc),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown time zone '{other}', expected 'utc' or 'local'")),
        }
    }
}

/// A timestamp found in a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Parsed log time.
    pub time: LogTime,
    /// Offset written in the line itself, if the descriptor has one.
    pub explicit_offset: Option<FixedOffset>,
    /// Byte range of the captured substring.
    pub span: Range<usize>,
}

/// Locates, parses and rewrites timestamps.
#[derive(Debug, Clone)]
pub struct TimestampExtractor {
    regex: Regex,
    format: String,
    zone: LogZone,
}

impl TimestampExtractor {
    pub fn new(pattern: &str, format: &str, zone: LogZone) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| ReplayError::InvalidTimestampPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        // captures_len() counts the implicit whole-match group.
        let groups = regex.captures_len() - 1;
        if groups != 1 {
            return Err(ReplayError::CaptureGroupCount {
                pattern: pattern.to_string(),
                groups,
            });
        }

        if format.is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(ReplayError::InvalidTimestampFormat {
                format: format.to_string(),
            });
        }

        Ok(Self {
            regex,
            format: format.to_string(),
            zone,
        })
    }

    /// Find and parse the timestamp of `line`.
    ///
    /// Returns `None` when the pattern does not match or the captured text
    /// does not parse under the descriptor.
    pub fn extract(&self, line: &str) -> Option<Extracted> {
        let captured = self.regex.captures(line)?.get(1)?;
        let (time, explicit_offset) = self.parse(captured.as_str())?;
        Some(Extracted {
            time,
            explicit_offset,
            span: captured.range(),
        })
    }

    /// Replace the captured timestamp of `line` with `wall` rendered in the
    /// descriptor's format.
    pub fn rewrite(&self, line: &str, extracted: &Extracted, wall: DateTime<Utc>) -> String {
        let rendered = self.render(wall, extracted.explicit_offset);
        let mut out = String::with_capacity(line.len() + rendered.len());
        out.push_str(&line[..extracted.span.start]);
        out.push_str(&rendered);
        out.push_str(&line[extracted.span.end..]);
        out
    }

    /// Render a wall-clock instant with the descriptor.
    ///
    /// Explicit offsets from the source line are preserved; otherwise the
    /// configured [`LogZone`] decides.
    pub fn render(&self, wall: DateTime<Utc>, offset: Option<FixedOffset>) -> String {
        match (offset, self.zone) {
            (Some(offset), _) => wall.with_timezone(&offset).format(&self.format).to_string(),
            (None, LogZone::Utc) => wall.format(&self.format).to_string(),
            (None, LogZone::Local) => wall.with_timezone(&Local).format(&self.format).to_string(),
        }
    }

    fn parse(&self, raw: &str) -> Option<(LogTime, Option<FixedOffset>)> {
        let mut parsed = Parsed::new();
        chrono::format::parse(&mut parsed, raw, StrftimeItems::new(&self.format)).ok()?;

        if let Ok(with_offset) = parsed.to_datetime() {
            return Some((with_offset, Some(*with_offset.offset())));
        }

        // Time-only descriptors land on the epoch date.
        let naive = parsed.to_naive_datetime_with_offset(0).ok().or_else(|| {
            let time = parsed.to_naive_time().ok()?;
            Some(NaiveDate::from_ymd_opt(1970, 1, 1)?.and_time(time))
        })?;

        Some((self.localize(naive)?, None))
    }

    fn localize(&self, naive: NaiveDateTime) -> Option<LogTime> {
        match self.zone {
            LogZone::Utc => Some(Utc.from_utc_datetime(&naive).fixed_offset()),
            LogZone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|t| t.fixed_offset()),
        }
    }
}
