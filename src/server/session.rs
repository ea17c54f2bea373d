//! Session lifecycle: start analysis, update properties, disconnect.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analysis::{apply_updates, AnalyzerCatalog, PropertyMap};
use crate::error::{AppError, Result};
use crate::pipeline::{Outbound, SessionRegistry, Transport};
use crate::reliability::metrics as service_metrics;
use crate::server::protocol::ClientEvent;
use crate::types::SessionId;

/// Applies inbound session events to the registry.
pub struct SessionService {
    registry: Arc<SessionRegistry>,
    catalog: Arc<AnalyzerCatalog>,
    transport: Arc<dyn Transport>,
}

impl SessionService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        catalog: Arc<AnalyzerCatalog>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            registry,
            catalog,
            transport,
        }
    }

    /// Route one event. Failures are reported to the session as
    /// `internal_error` without closing it.
    pub async fn handle(&self, id: &SessionId, event: ClientEvent) {
        let result = match event {
            ClientEvent::StartAnalysis(name) => self.start_analysis(id, &name).await,
            ClientEvent::SetProperties(updates) => self.set_properties(id, updates).await,
        };

        if let Err(e) = result {
            warn!(session_id = %id, error = %e, "Session request failed");
            service_metrics::record_request_failure();
            self.report(id, e.to_string()).await;
        }
    }

    /// Construct the named analyzer, register it and send its properties.
    ///
    /// An unknown name registers nothing.
    pub async fn start_analysis(&self, id: &SessionId, name: &str) -> Result<()> {
        let analyzer = self.catalog.create(name)?;
        let properties = analyzer.get_client_properties(None)?;

        self.registry.register(id.clone(), name, analyzer);
        service_metrics::record_session_started(name);
        info!(session_id = %id, analyzer = name, "Analysis started");

        self.transport
            .emit(id, Outbound::Properties(properties))
            .await?;
        Ok(())
    }

    /// Apply updates under the session lock, in request order, stopping at
    /// the first error. On success, sends back the requested properties.
    ///
    /// Requests for sessions without an analyzer are ignored.
    pub async fn set_properties(&self, id: &SessionId, updates: PropertyMap) -> Result<()> {
        let names: Vec<String> = updates.keys().cloned().collect();
        let outcome = self
            .registry
            .with_session(id, |analyzer| {
                apply_updates(analyzer, &updates)?;
                analyzer.get_client_properties(Some(names.as_slice()))
            })
            .await;

        let properties = match outcome {
            Ok(properties) => properties?,
            Err(AppError::SessionNotFound(_)) => {
                debug!(session_id = %id, "Ignoring property update for idle session");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.transport
            .emit(id, Outbound::Properties(properties))
            .await?;
        Ok(())
    }

    /// Drop the session's analyzer. Safe to call for unknown ids.
    pub fn disconnect(&self, id: &SessionId) {
        if self.registry.unregister(id) {
            service_metrics::record_session_ended();
            info!(session_id = %id, "Analysis stopped");
        }
    }

    async fn report(&self, id: &SessionId, message: String) {
        if let Err(e) = self
            .transport
            .emit(id, Outbound::InternalError(message))
            .await
        {
            debug!(session_id = %id, error = %e, "Could not report error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::recording::RecordingTransport;
    use serde_json::json;

    struct Harness {
        registry: Arc<SessionRegistry>,
        transport: Arc<RecordingTransport>,
        service: SessionService,
        id: SessionId,
    }

    fn harness() -> Harness {
        let registry = Arc::new(SessionRegistry::new());
        let transport = Arc::new(RecordingTransport::new());
        let id = SessionId::from("s1");
        transport.connect(&id);
        let service = SessionService::new(
            Arc::clone(&registry),
            Arc::new(AnalyzerCatalog::with_builtins()),
            transport.clone(),
        );
        Harness {
            registry,
            transport,
            service,
            id,
        }
    }

    fn updates(value: serde_json::Value) -> PropertyMap {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_start_registers_and_sends_properties() {
        let h = harness();
        h.service
            .handle(&h.id, ClientEvent::StartAnalysis("spectrum".into()))
            .await;

        assert!(h.registry.contains(&h.id));
        let sent = h.transport.emitted_to(&h.id);
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Outbound::Properties(props) => {
                assert_eq!(props["channel"], json!(0));
                assert_eq!(props["db"], json!(false));
            }
            other => panic!("unexpected emission: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_analyzer_is_reported_not_registered() {
        let h = harness();
        h.service
            .handle(&h.id, ClientEvent::StartAnalysis("oscilloscope".into()))
            .await;

        assert!(!h.registry.contains(&h.id));
        assert!(matches!(
            &h.transport.emitted_to(&h.id)[..],
            [Outbound::InternalError(msg)] if msg.contains("oscilloscope")
        ));
        assert_eq!(h.transport.disconnects(&h.id), 0);
    }

    #[tokio::test]
    async fn test_set_properties_echoes_requested_subset() {
        let h = harness();
        h.service.start_analysis(&h.id, "spectrum").await.unwrap();

        h.service
            .set_properties(&h.id, updates(json!({"db": true, "channel": null})))
            .await
            .unwrap();

        let sent = h.transport.emitted_to(&h.id);
        assert_eq!(
            sent.last(),
            Some(&Outbound::Properties(updates(json!({"db": true, "channel": 0}))))
        );
    }

    #[tokio::test]
    async fn test_set_properties_stops_at_unknown_name() {
        let h = harness();
        h.service.start_analysis(&h.id, "spectrum").await.unwrap();

        h.service
            .handle(
                &h.id,
                ClientEvent::SetProperties(updates(json!({"db": true, "gain": 2, "channel": 3}))),
            )
            .await;

        assert!(matches!(
            h.transport.emitted_to(&h.id).last(),
            Some(Outbound::InternalError(msg)) if msg.contains("gain")
        ));
        let current = h
            .registry
            .with_session(&h.id, |analyzer| analyzer.get_client_properties(None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current["db"], json!(true));
        assert_eq!(current["channel"], json!(0));
        assert!(h.registry.contains(&h.id));
    }

    #[tokio::test]
    async fn test_set_properties_without_session_is_ignored() {
        let h = harness();
        h.service
            .set_properties(&h.id, updates(json!({"db": true})))
            .await
            .unwrap();
        assert!(h.transport.events().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_unregisters() {
        let h = harness();
        h.service.start_analysis(&h.id, "sum").await.unwrap();
        h.service.disconnect(&h.id);
        h.service.disconnect(&h.id);
        assert!(!h.registry.contains(&h.id));
    }
}
