use std::sync::Arc;

use chunkcast_common::protocol::{NodeIdentity, Report, ReportAction};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::chunk_cache::CacheEvent;
use crate::master::MasterLink;

/// Pushes local chunk-added/removed events upstream.
///
/// Consumes the chunk cache's event channel and translates each event into
/// a `report` RPC against the currently active master. Delivery is
/// fire-and-forget: an unreachable master loses the report (the next
/// registration resynchronizes the directory from the full chunk list), so
/// failures are logged and dropped rather than retried.
pub struct Reporter {
    identity: NodeIdentity,
    link: Arc<MasterLink>,
    events: mpsc::UnboundedReceiver<CacheEvent>,
}

impl Reporter {
    pub fn new(
        identity: NodeIdentity,
        link: Arc<MasterLink>,
        events: mpsc::UnboundedReceiver<CacheEvent>,
    ) -> Self {
        Self {
            identity,
            link,
            events,
        }
    }

    /// Starts the reporter task. Exits when the cache side of the event
    /// channel is dropped.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            let (action, chunk) = match event {
                CacheEvent::Added(chunk) => (ReportAction::Added, chunk),
                CacheEvent::Evicted(chunk) => (ReportAction::Deleted, chunk),
            };
            let report = Report {
                from: self.identity.name.clone(),
                action,
                filename: chunk.filename.clone(),
                chunk: chunk.chunk,
            };

            let args = match serde_json::to_value(&report) {
                Ok(args) => args,
                Err(e) => {
                    warn!("Failed to encode report: {}", e);
                    continue;
                }
            };

            let master = self.link.active();
            match master.invoke("report", args).await {
                Ok(_) => {
                    debug!(
                        "Reported {:?} {}:{} to {}",
                        action,
                        report.filename,
                        report.chunk,
                        master.address()
                    );
                }
                Err(e) => {
                    warn!("Failed to report to master {}: {}", master.address(), e);
                }
            }
        }
        debug!("Reporter shutting down: cache event channel closed");
    }
}
