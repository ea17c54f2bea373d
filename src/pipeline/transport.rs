//! Outbound side of the session transport, as seen by the pipeline.

use async_trait::async_trait;
use bytes::Bytes;

use crate::analysis::PropertyMap;
use crate::constants::protocol;
use crate::error::TransportError;
use crate::types::SessionId;

/// A payload addressed to one session.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Client-facing property values.
    Properties(PropertyMap),
    /// Binary-encoded analyzer output.
    Results(Bytes),
    /// Diagnostic text.
    InternalError(String),
}

impl Outbound {
    /// Wire event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            Outbound::Properties(_) => protocol::EVENT_PROPERTIES,
            Outbound::Results(_) => protocol::EVENT_RESULTS,
            Outbound::InternalError(_) => protocol::EVENT_INTERNAL_ERROR,
        }
    }
}

/// Delivery of outbound payloads to sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send to one session. Fails if the session has no live connection.
    async fn emit(&self, session: &SessionId, message: Outbound) -> Result<(), TransportError>;

    /// Send to every connected session. Returns how many were reached.
    async fn broadcast(&self, message: Outbound) -> usize;

    /// Force the session's connection closed. No-op if already gone.
    async fn disconnect(&self, session: &SessionId);
}

#[cfg(test)]
pub(crate) mod recording {
    //! In-memory transport that records every call.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Event {
        Emit(SessionId, Outbound),
        Disconnect(SessionId),
    }

    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        events: Mutex<Vec<Event>>,
        connected: Mutex<HashSet<SessionId>>,
    }

    impl RecordingTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn connect(&self, session: &SessionId) {
            self.connected.lock().insert(session.clone());
        }

        pub fn events(&self) -> Vec<Event> {
            self.events.lock().clone()
        }

        /// Emissions to one session, by event name.
        pub fn emitted_to(&self, session: &SessionId) -> Vec<Outbound> {
            self.events
                .lock()
                .iter()
                .filter_map(|event| match event {
                    Event::Emit(id, message) if id == session => Some(message.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn disconnects(&self, session: &SessionId) -> usize {
            self.events
                .lock()
                .iter()
                .filter(|event| matches!(event, Event::Disconnect(id) if id == session))
                .count()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn emit(&self, session: &SessionId, message: Outbound) -> Result<(), TransportError> {
            if !self.connected.lock().contains(session) {
                return Err(TransportError::Unreachable(session.clone()));
            }
            self.events
                .lock()
                .push(Event::Emit(session.clone(), message));
            Ok(())
        }

        async fn broadcast(&self, message: Outbound) -> usize {
            let sessions: Vec<_> = self.connected.lock().iter().cloned().collect();
            let mut events = self.events.lock();
            for session in &sessions {
                events.push(Event::Emit(session.clone(), message.clone()));
            }
            sessions.len()
        }

        async fn disconnect(&self, session: &SessionId) {
            self.connected.lock().remove(session);
            self.events.lock().push(Event::Disconnect(session.clone()));
        }
    }
}
