use std::io::{self, LineWriter, Write};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Writes replayed lines, flushing each one as it is emitted.
///
/// A write failure cancels the session. A closed pipe (`logreplay | head`)
/// ends the run quietly; any other failure is kept and reported by
/// [`finish`](Self::finish).
pub struct LineSink<W: Write> {
    writer: LineWriter<W>,
    token: CancellationToken,
    failure: Option<io::Error>,
}

impl LineSink<io::Stdout> {
    pub fn stdout(token: CancellationToken) -> Self {
        Self::new(io::stdout(), token)
    }
}

impl<W: Write> LineSink<W> {
    pub fn new(writer: W, token: CancellationToken) -> Self {
        Self {
            writer: LineWriter::new(writer),
            token,
            failure: None,
        }
    }

    pub fn write_line(&mut self, line: &str) {
        if self.failure.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.writer, "{line}") {
            if e.kind() == io::ErrorKind::BrokenPipe {
                debug!("Output closed by consumer, stopping replay");
            } else {
                error!(error = %e, "Failed to write replayed line");
                self.failure = Some(e);
            }
            self.token.cancel();
        }
    }

    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.failure.take() {
            return Err(e);
        }
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}
