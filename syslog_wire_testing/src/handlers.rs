//! Handlers that record every callback they receive.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use syslog_wire::{
    event::SyslogEvent,
    handler::{
        HandlerError,
        HandlerResult,
        Origin,
        ServerContext,
        SessionEventHandler,
        SessionToken,
        SessionlessEventHandler,
    },
};
use tokio::time::{Instant, sleep};

/// One recorded callback, tagged with the name of the handler that saw it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Initialize {
        handler: String,
    },
    Opened {
        handler: String,
    },
    Event {
        handler: String,
        session: Option<String>,
        message: String,
    },
    Exception {
        handler: String,
        session: Option<String>,
        error: String,
    },
    Closed {
        handler: String,
        session: Option<String>,
        timed_out: bool,
    },
    Destroy {
        handler: String,
    },
}

impl Call {
    #[must_use]
    pub fn handler(&self) -> &str {
        match self {
            Self::Initialize { handler }
            | Self::Opened { handler }
            | Self::Event { handler, .. }
            | Self::Exception { handler, .. }
            | Self::Closed { handler, .. }
            | Self::Destroy { handler } => handler,
        }
    }
}

/// Shared, append-only list of [`Call`]s.
#[derive(Clone, Debug, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn record(&self, call: Call) { self.0.lock().unwrap_or_else(PoisonError::into_inner).push(call); }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> { self.0.lock().unwrap_or_else(PoisonError::into_inner).clone() }

    /// Messages delivered to `handler`, in arrival order.
    #[must_use]
    pub fn messages(&self, handler: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Event {
                    handler: name,
                    message,
                    ..
                } if name == handler => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    /// Poll until at least `n` calls match `predicate`, giving up after
    /// `limit`. Returns whether the count was reached.
    pub async fn wait_for(&self, n: usize, limit: Duration, predicate: impl Fn(&Call) -> bool) -> bool {
        let deadline = Instant::now() + limit;
        loop {
            if self.count(&predicate) >= n {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(5)).await;
        }
    }
}

/// How a recording handler reacts to an event whose message contains a
/// trigger string.
#[derive(Clone, Debug, Default)]
struct Faults {
    fail_on: Option<String>,
    panic_on: Option<String>,
}

impl Faults {
    fn check(&self, message: &str) -> HandlerResult {
        if self.panic_on.as_deref().is_some_and(|needle| message.contains(needle)) {
            panic!("refusing {message}");
        }
        if self.fail_on.as_deref().is_some_and(|needle| message.contains(needle)) {
            return Err(HandlerError::failed(format!("rejected {message}")));
        }
        Ok(())
    }
}

fn token_text(session: Option<&SessionToken>) -> Option<String> {
    session.and_then(|token| token.downcast_ref::<String>().cloned())
}

/// Session-capable handler that hands out `"<name>-<connection>"` tokens.
#[derive(Clone, Debug)]
pub struct RecordingSessionHandler {
    name: String,
    log: CallLog,
    faults: Faults,
    issue_tokens: bool,
}

impl RecordingSessionHandler {
    #[must_use]
    pub fn new(log: CallLog) -> Self { Self::named("session", log) }

    #[must_use]
    pub fn named(name: &str, log: CallLog) -> Self {
        Self {
            name: name.to_owned(),
            log,
            faults: Faults::default(),
            issue_tokens: true,
        }
    }

    /// Return an error for events containing `needle`.
    #[must_use]
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.faults.fail_on = Some(needle.to_owned());
        self
    }

    /// Panic for events containing `needle`.
    #[must_use]
    pub fn panicking_on(mut self, needle: &str) -> Self {
        self.faults.panic_on = Some(needle.to_owned());
        self
    }

    /// Return no token from `session_opened`.
    #[must_use]
    pub fn without_tokens(mut self) -> Self {
        self.issue_tokens = false;
        self
    }
}

impl SessionEventHandler for RecordingSessionHandler {
    fn initialize(&self, _server: &ServerContext) -> HandlerResult {
        self.log.record(Call::Initialize {
            handler: self.name.clone(),
        });
        Ok(())
    }

    fn session_opened(&self, _server: &ServerContext, origin: &Origin) -> HandlerResult<Option<SessionToken>> {
        self.log.record(Call::Opened {
            handler: self.name.clone(),
        });
        if !self.issue_tokens {
            return Ok(None);
        }
        let id = origin.connection.map_or(0, |id| id.as_u64());
        let token: SessionToken = Arc::new(format!("{}-{id}", self.name));
        Ok(Some(token))
    }

    fn event(
        &self,
        session: Option<&SessionToken>,
        _server: &ServerContext,
        _origin: &Origin,
        event: &SyslogEvent,
    ) -> HandlerResult {
        self.log.record(Call::Event {
            handler: self.name.clone(),
            session: token_text(session),
            message: event.message().to_owned(),
        });
        self.faults.check(event.message())
    }

    fn exception(
        &self,
        session: Option<&SessionToken>,
        _server: &ServerContext,
        _origin: Option<&Origin>,
        error: &HandlerError,
    ) -> HandlerResult {
        self.log.record(Call::Exception {
            handler: self.name.clone(),
            session: token_text(session),
            error: error.to_string(),
        });
        Ok(())
    }

    fn session_closed(
        &self,
        session: Option<&SessionToken>,
        _server: &ServerContext,
        _origin: &Origin,
        timed_out: bool,
    ) -> HandlerResult {
        self.log.record(Call::Closed {
            handler: self.name.clone(),
            session: token_text(session),
            timed_out,
        });
        Ok(())
    }

    fn destroy(&self, _server: &ServerContext) -> HandlerResult {
        self.log.record(Call::Destroy {
            handler: self.name.clone(),
        });
        Ok(())
    }
}

/// Sessionless handler recording events and exceptions.
#[derive(Clone, Debug)]
pub struct RecordingSessionlessHandler {
    name: String,
    log: CallLog,
    faults: Faults,
}

impl RecordingSessionlessHandler {
    #[must_use]
    pub fn new(log: CallLog) -> Self { Self::named("sessionless", log) }

    #[must_use]
    pub fn named(name: &str, log: CallLog) -> Self {
        Self {
            name: name.to_owned(),
            log,
            faults: Faults::default(),
        }
    }

    /// Return an error for events containing `needle`.
    #[must_use]
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.faults.fail_on = Some(needle.to_owned());
        self
    }

    /// Panic for events containing `needle`.
    #[must_use]
    pub fn panicking_on(mut self, needle: &str) -> Self {
        self.faults.panic_on = Some(needle.to_owned());
        self
    }
}

impl SessionlessEventHandler for RecordingSessionlessHandler {
    fn initialize(&self, _server: &ServerContext) -> HandlerResult {
        self.log.record(Call::Initialize {
            handler: self.name.clone(),
        });
        Ok(())
    }

    fn event(&self, _server: &ServerContext, _origin: &Origin, event: &SyslogEvent) -> HandlerResult {
        self.log.record(Call::Event {
            handler: self.name.clone(),
            session: None,
            message: event.message().to_owned(),
        });
        self.faults.check(event.message())
    }

    fn exception(&self, _server: &ServerContext, _origin: Option<&Origin>, error: &HandlerError) -> HandlerResult {
        self.log.record(Call::Exception {
            handler: self.name.clone(),
            session: None,
            error: error.to_string(),
        });
        Ok(())
    }

    fn destroy(&self, _server: &ServerContext) -> HandlerResult {
        self.log.record(Call::Destroy {
            handler: self.name.clone(),
        });
        Ok(())
    }
}
