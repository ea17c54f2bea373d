//! Glue between the real-time capture callback and the async pipeline.
//!
//! Everything here runs synchronously on the capture thread, once per
//! physical callback. It never awaits and never waits on a lock that async
//! code can hold across I/O.

use std::sync::Arc;
use tracing::{trace, warn};

use crate::pipeline::queue::{Admission, HandoffSender};
use crate::pipeline::window::WindowCache;

/// Handle the capture thread uses to feed the pipeline.
#[derive(Debug, Clone)]
pub struct CaptureBridge {
    cache: Arc<WindowCache>,
    handoff: HandoffSender,
}

impl CaptureBridge {
    pub fn new(cache: Arc<WindowCache>, handoff: HandoffSender) -> Self {
        Self { cache, handoff }
    }

    /// Merge one interleaved block into the window and forward a snapshot.
    ///
    /// A malformed block is logged and not merged, but the current window is
    /// still forwarded so consumers keep their cadence.
    pub fn process_block(&self, block: &[f32]) -> Admission {
        let (snapshot, merged) = self.cache.merge_and_snapshot(block);
        if let Err(e) = merged {
            warn!(error = %e, "dropping malformed capture block");
        }

        let admission = self.handoff.offer(snapshot);
        if admission == Admission::Dropped {
            trace!("hand-off queue full, snapshot skipped");
        }
        admission
    }

    /// Surface a status flag raised by the capture device.
    ///
    /// Purely observational; the bridge keeps merging.
    pub fn report_status(&self, status: &str) {
        warn!(status, "capture device reported a status flag");
    }

    /// Channel count blocks must be interleaved with.
    pub fn channels(&self) -> usize {
        self.cache.channels()
    }
}
