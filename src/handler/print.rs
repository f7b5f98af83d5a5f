//! Handler printing each event as one line to a writer.

use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::Path,
    sync::{Mutex, PoisonError},
};

use super::{HandlerError, HandlerResult, Origin, ServerContext, SessionlessEventHandler};
use crate::event::SyslogEvent;

/// Writes `{facility} DATE LEVEL message` lines to stdout, stderr or a file.
pub struct PrintStreamHandler {
    out: Mutex<Box<dyn Write + Send>>,
}

impl PrintStreamHandler {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    #[must_use]
    pub fn stdout() -> Self { Self::new(io::stdout()) }

    #[must_use]
    pub fn stderr() -> Self { Self::new(io::stderr()) }

    /// Append to `path`, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns the error raised while opening the file.
    pub fn file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{line}")?;
        out.flush()
    }
}

impl SessionlessEventHandler for PrintStreamHandler {
    fn event(&self, _server: &ServerContext, _origin: &Origin, event: &SyslogEvent) -> HandlerResult {
        let line = format!(
            "{{{}}} {} {} {}",
            event.facility(),
            event.date().to_rfc3339(),
            event.severity(),
            event.message()
        );
        self.write_line(&line).map_err(HandlerError::from)
    }

    fn exception(
        &self,
        _server: &ServerContext,
        origin: Option<&Origin>,
        error: &HandlerError,
    ) -> HandlerResult {
        let line = match origin {
            Some(origin) => format!("exception from {}: {error}", origin.peer),
            None => format!("exception: {error}"),
        };
        self.write_line(&line).map_err(HandlerError::from)
    }
}
