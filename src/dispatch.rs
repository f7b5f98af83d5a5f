//! Fan-out of parsed events to registered handlers.
//!
//! The engine drives the per-connection lifecycle
//! `opened -> event* -> closed` for stream transports and plain event
//! delivery for datagrams. Every callback is contained: an error or panic
//! is redirected once to the same handler's `exception` callback, and
//! anything that callback raises is logged and dropped. Nothing a handler
//! does can stop delivery to the handlers after it or escape the engine.

use std::sync::Arc;

use tracing::debug;

use crate::{
    event::SyslogEvent,
    handler::{EventHandler, HandlerError, HandlerResult, Origin, ServerContext, SessionToken},
    metrics,
    panic::run_contained,
    session::{HandlerId, SessionRegistry},
};

/// Runs the handler chain for one server instance.
pub struct DispatchEngine {
    handlers: Vec<EventHandler>,
    registry: Arc<SessionRegistry>,
    context: ServerContext,
}

impl DispatchEngine {
    /// Create an engine; handlers are invoked in the order given.
    #[must_use]
    pub fn new(
        handlers: Vec<EventHandler>,
        registry: Arc<SessionRegistry>,
        context: ServerContext,
    ) -> Self {
        Self {
            handlers,
            registry,
            context,
        }
    }

    #[must_use]
    pub fn handlers(&self) -> &[EventHandler] { &self.handlers }

    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> { &self.registry }

    #[must_use]
    pub fn context(&self) -> &ServerContext { &self.context }

    fn entries(&self) -> impl Iterator<Item = (HandlerId, &EventHandler)> {
        self.handlers
            .iter()
            .enumerate()
            .map(|(index, handler)| (HandlerId::new(index), handler))
    }

    /// Run every handler's `initialize` hook.
    pub fn initialize(&self) {
        for (id, handler) in self.entries() {
            let result = contain(|| match handler {
                EventHandler::Session(h) => h.initialize(&self.context),
                EventHandler::Sessionless(h) => h.initialize(&self.context),
            });
            if let Err(error) = result {
                self.redirect(id, handler, None, None, "initialize", &error);
            }
        }
    }

    /// Run every handler's `destroy` hook and forget all sessions.
    pub fn shutdown(&self) {
        for (id, handler) in self.entries() {
            let result = contain(|| match handler {
                EventHandler::Session(h) => h.destroy(&self.context),
                EventHandler::Sessionless(h) => h.destroy(&self.context),
            });
            if let Err(error) = result {
                self.redirect(id, handler, None, None, "destroy", &error);
            }
        }
        self.registry.clear();
    }

    /// Register a stream connection and collect session tokens.
    ///
    /// Datagram origins are ignored.
    pub fn open_connection(&self, origin: &Origin) {
        let Some(connection) = origin.connection else {
            return;
        };
        self.registry.add_socket(connection);
        for (id, handler) in self.entries() {
            let EventHandler::Session(h) = handler else {
                continue;
            };
            match contain(|| h.session_opened(&self.context, origin)) {
                Ok(Some(token)) => self.registry.add_session(connection, id, token),
                Ok(None) => {}
                Err(error) => self.redirect(id, handler, None, Some(origin), "session_opened", &error),
            }
        }
    }

    /// Deliver `event` to every handler in registration order.
    pub fn dispatch(&self, origin: &Origin, event: &SyslogEvent) {
        for (id, handler) in self.entries() {
            let session = self.session(origin, id, handler);
            let result = contain(|| match handler {
                EventHandler::Session(h) => h.event(session.as_ref(), &self.context, origin, event),
                EventHandler::Sessionless(h) => h.event(&self.context, origin, event),
            });
            if let Err(error) = result {
                self.redirect(id, handler, session.as_ref(), Some(origin), "event", &error);
            }
        }
    }

    /// Notify session handlers that a connection closed and drop its
    /// sessions.
    pub fn close_connection(&self, origin: &Origin, timed_out: bool) {
        let Some(connection) = origin.connection else {
            return;
        };
        for (id, handler) in self.entries() {
            let EventHandler::Session(h) = handler else {
                continue;
            };
            let session = self.registry.get_session(connection, id);
            let result =
                contain(|| h.session_closed(session.as_ref(), &self.context, origin, timed_out));
            if let Err(error) = result {
                self.redirect(id, handler, session.as_ref(), Some(origin), "session_closed", &error);
            }
        }
        self.registry.remove_socket(connection);
    }

    /// Report a transport failure to every handler's `exception` callback.
    pub fn handle_exception(&self, origin: Option<&Origin>, error: &HandlerError) {
        for (id, handler) in self.entries() {
            let session = origin.and_then(|origin| self.session(origin, id, handler));
            self.notify(id, handler, session.as_ref(), origin, error);
        }
    }

    fn session(&self, origin: &Origin, id: HandlerId, handler: &EventHandler) -> Option<SessionToken> {
        match (handler, origin.connection) {
            (EventHandler::Session(_), Some(connection)) => self.registry.get_session(connection, id),
            _ => None,
        }
    }

    fn redirect(
        &self,
        id: HandlerId,
        handler: &EventHandler,
        session: Option<&SessionToken>,
        origin: Option<&Origin>,
        callback: &'static str,
        error: &HandlerError,
    ) {
        metrics::inc_handler_failures();
        debug!(handler = id.index(), callback, error = %error, "handler callback failed");
        self.notify(id, handler, session, origin, error);
    }

    fn notify(
        &self,
        id: HandlerId,
        handler: &EventHandler,
        session: Option<&SessionToken>,
        origin: Option<&Origin>,
        error: &HandlerError,
    ) {
        let result = contain(|| match handler {
            EventHandler::Session(h) => h.exception(session, &self.context, origin, error),
            EventHandler::Sessionless(h) => h.exception(&self.context, origin, error),
        });
        if let Err(discarded) = result {
            debug!(
                handler = id.index(),
                error = %discarded,
                "discarding failure raised by exception callback"
            );
        }
    }
}

fn contain<T>(callback: impl FnOnce() -> HandlerResult<T>) -> HandlerResult<T> {
    run_contained(callback).unwrap_or_else(|panic| Err(HandlerError::Panicked(panic)))
}
