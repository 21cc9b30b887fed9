//! Invocation-scoped output capture.
//!
//! Each invocation gets its own pair of in-memory writers. Nothing global is
//! redirected, so concurrent invocations can never see each other's output.
//! An [`OutputCapture`] seals its writers when it finishes or is dropped;
//! writes arriving afterwards (from a worker that outlived its deadline) are
//! discarded.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

/// In-memory writer handed to a handler as its stdout or stderr.
///
/// Cloning shares the underlying buffer.
#[derive(Debug, Clone)]
pub struct LogWriter {
    /// `None` once the owning capture has been sealed.
    buffer: Arc<Mutex<Option<Vec<u8>>>>,
}

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Some(Vec::new()))),
        }
    }

    /// Returns the lines written so far without consuming them.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.buffer
            .lock()
            .as_deref()
            .map(split_lines)
            .unwrap_or_default()
    }

    /// Takes the buffered output and rejects further writes.
    fn seal(&self) -> Vec<String> {
        self.buffer
            .lock()
            .take()
            .map(|bytes| split_lines(&bytes))
            .unwrap_or_default()
    }
}

impl Default for LogWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(buffer) = self.buffer.lock().as_mut() {
            buffer.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Splits captured bytes into lines without their terminators. A trailing
/// partial line is kept; invalid UTF-8 is replaced.
fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_owned)
        .collect()
}

/// Lines captured during one invocation, in emission order per stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

/// Owns the stdout/stderr buffers of a single invocation.
///
/// The buffers are sealed on every exit path: explicitly by
/// [`finish`](Self::finish), or by `Drop` if the invocation unwinds.
#[derive(Debug)]
pub struct OutputCapture {
    stdout: LogWriter,
    stderr: LogWriter,
}

impl OutputCapture {
    #[must_use]
    pub fn begin() -> Self {
        Self {
            stdout: LogWriter::new(),
            stderr: LogWriter::new(),
        }
    }

    #[must_use]
    pub fn stdout(&self) -> LogWriter {
        self.stdout.clone()
    }

    #[must_use]
    pub fn stderr(&self) -> LogWriter {
        self.stderr.clone()
    }

    /// Seals both writers and returns what was captured.
    #[must_use]
    pub fn finish(self) -> CapturedOutput {
        CapturedOutput {
            stdout: self.stdout.seal(),
            stderr: self.stderr.seal(),
        }
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        self.stdout.seal();
        self.stderr.seal();
    }
}
