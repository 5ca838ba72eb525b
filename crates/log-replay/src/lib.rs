//! # Log Replay
//!
//! Reproduces a historical log file in real time: lines are emitted with the
//! same relative delays they originally had, and their timestamps are
//! rewritten to the current wall clock. Replay can optionally loop forever,
//! in which case the clock mapping is rebased on every pass so rewritten
//! timestamps keep moving forward.
//!
//! ## Pipeline
//!
//! file -> [`LineFilter`] -> [`TimestampExtractor`] -> [`BatchAccumulator`]
//! -> [`Scheduler`] -> callback
//!
//! [`LogReplayer`] drives the pipeline and owns the file for the lifetime of
//! a session. Cancellation is cooperative through a
//! [`tokio_util::sync::CancellationToken`].
//!
//! ## Example
//!
//! ```ignore
//! use log_replay::{LogReplayer, ReplayOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let replayer = LogReplayer::new("app.log", ReplayOptions::default().with_loop(true));
//! let stats = replayer
//!     .run(CancellationToken::new(), |line| println!("{line}"))
//!     .await?;
//! ```

pub mod batch;
pub mod clock;
pub mod error;
pub mod filter;
pub mod replayer;
pub mod scheduler;
pub mod timestamp;

#[cfg(test)]
mod test_utils;

pub use batch::{Batch, BatchAccumulator, DEFAULT_BATCH_WINDOW};
pub use clock::ClockMapping;
pub use error::{ReplayError, Result};
pub use filter::LineFilter;
pub use replayer::{LogReplayer, ReplayOptions, ReplayStats};
pub use scheduler::{Dispatch, Scheduler};
pub use timestamp::{
    DEFAULT_TIMESTAMP_FORMAT, DEFAULT_TIMESTAMP_PATTERN, Extracted, LogTime, LogZone,
    TimestampExtractor,
};
