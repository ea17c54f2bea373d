//! The single consumer of the hand-off queue.
//!
//! Each dequeued snapshot starts a dispatch round: the registry is copied
//! once, then every session in that copy is analyzed in registration order
//! under its own lock. A failing session is told why, removed and
//! disconnected; the round carries on with the next one.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisOutput, Analyzer};
use crate::codec;
use crate::error::AnalysisError;
use crate::pipeline::queue::{HandoffReceiver, PipelineItem, QueueInfo};
use crate::pipeline::registry::{SessionRegistry, SessionSlot};
use crate::pipeline::transport::{Outbound, Transport};
use crate::pipeline::window::Snapshot;
use crate::types::SessionId;

/// Per-round tallies.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Sessions that received a result.
    pub delivered: usize,
    /// Sessions isolated after a failure.
    pub failed: usize,
    /// Sessions removed between the registry copy and their turn.
    pub vanished: usize,
}

/// Totals over the lifetime of a loop, returned when it terminates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub rounds: u64,
    pub delivered: u64,
    pub failed: u64,
}

impl DispatchSummary {
    fn absorb(&mut self, round: RoundOutcome) {
        self.rounds += 1;
        self.delivered += round.delivered as u64;
        self.failed += round.failed as u64;
    }
}

enum SessionOutcome {
    Delivered,
    Failed,
    Vanished,
}

/// Drains the hand-off queue and fans each snapshot out to the sessions.
pub struct DispatchLoop {
    receiver: HandoffReceiver,
    registry: Arc<SessionRegistry>,
    transport: Arc<dyn Transport>,
    info: Arc<QueueInfo>,
}

impl DispatchLoop {
    pub fn new(
        receiver: HandoffReceiver,
        registry: Arc<SessionRegistry>,
        transport: Arc<dyn Transport>,
        info: Arc<QueueInfo>,
    ) -> Self {
        Self {
            receiver,
            registry,
            transport,
            info,
        }
    }

    /// Run until the shutdown sentinel arrives or every sender is gone.
    ///
    /// Consumes the loop, so it can never run concurrently with itself.
    pub async fn run(mut self) -> DispatchSummary {
        info!("Dispatch loop started");
        let mut summary = DispatchSummary::default();

        loop {
            match self.receiver.recv().await {
                Some(PipelineItem::Snapshot(snapshot)) => {
                    let round = self.dispatch(&snapshot).await;
                    self.info.record_processed();
                    metrics::counter!("sigstream_snapshots_processed_total").increment(1);
                    summary.absorb(round);
                }
                Some(PipelineItem::Shutdown) => {
                    info!(rounds = summary.rounds, "Dispatch loop received shutdown sentinel");
                    break;
                }
                None => {
                    warn!("Hand-off queue closed without a shutdown sentinel");
                    break;
                }
            }
        }

        summary
    }

    /// Deliver one snapshot to every session registered right now.
    pub async fn dispatch(&self, snapshot: &Snapshot) -> RoundOutcome {
        let sessions = self.registry.snapshot();
        let mut round = RoundOutcome::default();

        for (id, slot) in &sessions {
            match self.dispatch_session(id, slot, snapshot).await {
                SessionOutcome::Delivered => round.delivered += 1,
                SessionOutcome::Failed => round.failed += 1,
                SessionOutcome::Vanished => round.vanished += 1,
            }
        }

        debug!(
            sessions = sessions.len(),
            delivered = round.delivered,
            failed = round.failed,
            vanished = round.vanished,
            "dispatch round complete"
        );
        round
    }

    async fn dispatch_session(
        &self,
        id: &SessionId,
        slot: &Arc<SessionSlot>,
        snapshot: &Snapshot,
    ) -> SessionOutcome {
        let result = {
            let Some(mut analyzer) = slot.lock().await else {
                return SessionOutcome::Vanished;
            };
            run_analyzer(&mut **analyzer, snapshot)
        };

        let reason = match result {
            Ok(output) => {
                let frame = codec::encode(&output);
                match self.transport.emit(id, Outbound::Results(frame)).await {
                    Ok(()) => return SessionOutcome::Delivered,
                    Err(e) => e.to_string(),
                }
            }
            Err(e) => e.to_string(),
        };

        self.isolate(id, slot, reason).await;
        SessionOutcome::Failed
    }

    /// Report the failure to the session, then drop it.
    async fn isolate(&self, id: &SessionId, slot: &Arc<SessionSlot>, reason: String) {
        warn!(
            session_id = %id,
            analyzer = slot.analyzer_name(),
            error = %reason,
            "Session failed during dispatch, disconnecting"
        );
        metrics::counter!("sigstream_session_failures_total").increment(1);

        if let Err(e) = self
            .transport
            .emit(id, Outbound::InternalError(reason))
            .await
        {
            debug!(session_id = %id, error = %e, "could not deliver diagnostic");
        }
        self.registry.unregister_slot(id, slot);
        self.transport.disconnect(id).await;
    }
}

/// Run one analysis, turning a panic into an ordinary session error.
fn run_analyzer(
    analyzer: &mut dyn Analyzer,
    snapshot: &Snapshot,
) -> Result<AnalysisOutput, AnalysisError> {
    panic::catch_unwind(AssertUnwindSafe(|| analyzer.analyze(snapshot)))
        .unwrap_or_else(|payload| Err(AnalysisError::Panicked(panic_message(payload))))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::properties::PropertyTable;
    use crate::analysis::SumAnalyzer;
    use crate::error::ConfigError;
    use crate::pipeline::queue::{handoff, HandoffSender};
    use crate::pipeline::transport::recording::RecordingTransport;
    use crate::types::OverflowPolicy;
    use serde_json::Value;

    #[derive(Default)]
    struct Failing {
        panic: bool,
    }

    static NO_PROPERTIES: PropertyTable<Failing> = PropertyTable::new(&[]);

    impl Analyzer for Failing {
        fn analyze(&mut self, _: &Snapshot) -> Result<AnalysisOutput, AnalysisError> {
            if self.panic {
                panic!("analyzer exploded");
            }
            Err(AnalysisError::Failed("always fails".to_string()))
        }

        fn property_names(&self) -> Vec<&'static str> {
            NO_PROPERTIES.names()
        }

        fn get_property(&self, name: &str) -> Result<Value, ConfigError> {
            NO_PROPERTIES.get(self, name)
        }

        fn set_property(&mut self, name: &str, value: Value) -> Result<(), ConfigError> {
            NO_PROPERTIES.set(self, name, value)
        }
    }

    /// Changes the registry from inside `analyze`, mid-round.
    struct RegistryChurn {
        registry: Arc<SessionRegistry>,
        join: SessionId,
        leave: SessionId,
    }

    static CHURN_PROPERTIES: PropertyTable<RegistryChurn> = PropertyTable::new(&[]);

    impl Analyzer for RegistryChurn {
        fn analyze(&mut self, _: &Snapshot) -> Result<AnalysisOutput, AnalysisError> {
            self.registry
                .register(self.join.clone(), "sum", Box::new(SumAnalyzer));
            self.registry.unregister(&self.leave);
            Ok(AnalysisOutput::scalar(0.0))
        }

        fn property_names(&self) -> Vec<&'static str> {
            CHURN_PROPERTIES.names()
        }

        fn get_property(&self, name: &str) -> Result<Value, ConfigError> {
            CHURN_PROPERTIES.get(self, name)
        }

        fn set_property(&mut self, name: &str, value: Value) -> Result<(), ConfigError> {
            CHURN_PROPERTIES.set(self, name, value)
        }
    }

    struct Harness {
        registry: Arc<SessionRegistry>,
        transport: Arc<RecordingTransport>,
        info: Arc<QueueInfo>,
        sender: HandoffSender,
        dispatch: DispatchLoop,
    }

    fn harness() -> Harness {
        let registry = Arc::new(SessionRegistry::new());
        let transport = Arc::new(RecordingTransport::new());
        let info = Arc::new(QueueInfo::new());
        let (sender, receiver) = handoff(OverflowPolicy::Unbounded, Arc::clone(&info));
        let dispatch = DispatchLoop::new(
            receiver,
            Arc::clone(&registry),
            transport.clone(),
            Arc::clone(&info),
        );
        Harness {
            registry,
            transport,
            info,
            sender,
            dispatch,
        }
    }

    fn snapshot(data: Vec<f32>) -> Snapshot {
        Snapshot::from_interleaved(data, 1).unwrap()
    }

    fn results(transport: &RecordingTransport, id: &SessionId) -> Vec<AnalysisOutput> {
        transport
            .emitted_to(id)
            .into_iter()
            .filter_map(|message| match message {
                Outbound::Results(frame) => Some(codec::decode(&frame).unwrap()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_sum_session_receives_single_result() {
        let h = harness();
        let a = SessionId::from("a");
        h.transport.connect(&a);
        h.registry.register(a.clone(), "sum", Box::new(SumAnalyzer));

        h.sender.offer(snapshot(vec![1.0, 2.0, 3.0, 4.0]));
        h.sender.shutdown().await.unwrap();
        let summary = h.dispatch.run().await;

        assert_eq!(results(&h.transport, &a), vec![AnalysisOutput::scalar(10.0)]);
        assert_eq!(h.transport.events().len(), 1);
        assert_eq!(summary.rounds, 1);
        assert_eq!(h.info.peek().processed, 1);
    }

    #[tokio::test]
    async fn test_failing_session_is_isolated() {
        let h = harness();
        let (a, b) = (SessionId::from("a"), SessionId::from("b"));
        h.transport.connect(&a);
        h.transport.connect(&b);
        h.registry.register(a.clone(), "sum", Box::new(SumAnalyzer));
        h.registry.register(b.clone(), "failing", Box::new(Failing::default()));

        let round = h.dispatch.dispatch(&snapshot(vec![1.0, 2.0])).await;
        h.info.record_processed();

        assert_eq!(round, RoundOutcome { delivered: 1, failed: 1, vanished: 0 });
        assert_eq!(results(&h.transport, &a), vec![AnalysisOutput::scalar(3.0)]);

        let to_b = h.transport.emitted_to(&b);
        assert_eq!(to_b.len(), 1);
        assert!(matches!(&to_b[0], Outbound::InternalError(msg) if msg.contains("always fails")));
        assert_eq!(h.transport.disconnects(&b), 1);
        assert_eq!(h.transport.disconnects(&a), 0);
        assert!(!h.registry.contains(&b));
        assert_eq!(h.info.peek().processed, 1);
    }

    #[tokio::test]
    async fn test_failure_counts_as_processed_in_loop() {
        let h = harness();
        let b = SessionId::from("b");
        h.transport.connect(&b);
        h.registry.register(b.clone(), "failing", Box::new(Failing::default()));

        h.sender.offer(snapshot(vec![1.0]));
        h.sender.offer(snapshot(vec![2.0]));
        h.sender.shutdown().await.unwrap();
        let summary = h.dispatch.run().await;

        assert_eq!(summary, DispatchSummary { rounds: 2, delivered: 0, failed: 1 });
        assert_eq!(h.info.peek().processed, 2);
        assert_eq!(h.transport.disconnects(&b), 1);
    }

    #[tokio::test]
    async fn test_panicking_analyzer_is_isolated() {
        let h = harness();
        let (a, b) = (SessionId::from("a"), SessionId::from("b"));
        h.transport.connect(&a);
        h.transport.connect(&b);
        h.registry.register(b.clone(), "failing", Box::new(Failing { panic: true }));
        h.registry.register(a.clone(), "sum", Box::new(SumAnalyzer));

        let round = h.dispatch.dispatch(&snapshot(vec![5.0])).await;

        assert_eq!(round.delivered, 1);
        assert!(matches!(
            &h.transport.emitted_to(&b)[0],
            Outbound::InternalError(msg) if msg.contains("analyzer exploded")
        ));
        assert_eq!(results(&h.transport, &a), vec![AnalysisOutput::scalar(5.0)]);
    }

    #[tokio::test]
    async fn test_unregistered_session_gets_nothing() {
        let h = harness();
        let a = SessionId::from("a");
        h.transport.connect(&a);
        h.registry.register(a.clone(), "sum", Box::new(SumAnalyzer));
        h.registry.unregister(&a);

        h.sender.offer(snapshot(vec![1.0]));
        h.sender.shutdown().await.unwrap();
        h.dispatch.run().await;

        assert!(h.transport.events().is_empty());
        assert_eq!(h.info.peek().processed, 1);
    }

    #[tokio::test]
    async fn test_round_uses_registry_as_of_its_start() {
        let h = harness();
        let (a, late, z) = (SessionId::from("a"), SessionId::from("late"), SessionId::from("z"));
        for id in [&a, &late, &z] {
            h.transport.connect(id);
        }
        let churn = RegistryChurn {
            registry: Arc::clone(&h.registry),
            join: late.clone(),
            leave: z.clone(),
        };
        h.registry.register(a.clone(), "churn", Box::new(churn));
        h.registry.register(z.clone(), "sum", Box::new(SumAnalyzer));

        let round = h.dispatch.dispatch(&snapshot(vec![1.0])).await;

        assert_eq!(round, RoundOutcome { delivered: 1, failed: 0, vanished: 1 });
        assert_eq!(h.transport.emitted_to(&a).len(), 1);
        assert!(h.transport.emitted_to(&late).is_empty());
        assert!(h.transport.emitted_to(&z).is_empty());
        assert!(h.registry.contains(&late));
        assert!(!h.registry.contains(&z));
    }

    #[tokio::test]
    async fn test_snapshots_dispatched_in_fifo_order() {
        let h = harness();
        let a = SessionId::from("a");
        h.transport.connect(&a);
        h.registry.register(a.clone(), "sum", Box::new(SumAnalyzer));

        for value in 1..=5 {
            h.sender.offer(snapshot(vec![value as f32]));
        }
        h.sender.shutdown().await.unwrap();
        h.dispatch.run().await;

        let sums: Vec<f32> = results(&h.transport, &a)
            .iter()
            .map(|output| output.data()[0])
            .collect();
        assert_eq!(sums, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[tokio::test]
    async fn test_unreachable_session_is_removed() {
        let h = harness();
        let ghost = SessionId::from("ghost");
        h.registry.register(ghost.clone(), "sum", Box::new(SumAnalyzer));

        let round = h.dispatch.dispatch(&snapshot(vec![1.0])).await;

        assert_eq!(round.failed, 1);
        assert!(h.transport.emitted_to(&ghost).is_empty());
        assert_eq!(h.transport.disconnects(&ghost), 1);
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_loop_ends_when_senders_dropped() {
        let h = harness();
        h.sender.offer(snapshot(vec![1.0]));
        drop(h.sender);

        let summary = h.dispatch.run().await;
        assert_eq!(summary.rounds, 1);
    }
}
