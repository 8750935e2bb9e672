//! Upstream master state: registration, failover, and recovery.
//!
//! A mid-tree node addresses exactly one active master at a time. The
//! primary is the configured master; an optional supermaster is a cold
//! standby used only while the primary is out. [`MasterLink`] owns that
//! state triple and the transitions over it; [`MasterMonitor`] feeds it the
//! master-timeout signal by pinging the active master on an interval.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chunkcast_common::protocol::error::{ChunkcastError, Result};
use chunkcast_common::protocol::{ChunkRef, NodeIdentity, RegisterArgs};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::node::NodeEvent;
use crate::peer::PeerHandle;

/// Master state triple. Invariant: `active` is always `primary` or
/// `supermaster`, and `on_supermaster` is true iff it is the supermaster.
struct MasterState {
    primary: Arc<PeerHandle>,
    supermaster: Option<Arc<PeerHandle>>,
    active: Arc<PeerHandle>,
    on_supermaster: bool,
}

/// This node's link to its (super)master.
///
/// The state mutex is never held across an await; callers clone the active
/// handle out and perform I/O against the clone, so a transition observed
/// mid-call simply means that call was addressed to the previous master.
pub struct MasterLink {
    identity: NodeIdentity,
    state: Mutex<MasterState>,
}

impl MasterLink {
    pub fn new(
        identity: NodeIdentity,
        primary: Arc<PeerHandle>,
        supermaster: Option<Arc<PeerHandle>>,
    ) -> Self {
        Self {
            identity,
            state: Mutex::new(MasterState {
                active: Arc::clone(&primary),
                primary,
                supermaster,
                on_supermaster: false,
            }),
        }
    }

    /// The master currently addressed for registration and reports.
    pub fn active(&self) -> Arc<PeerHandle> {
        Arc::clone(&self.state.lock().unwrap().active)
    }

    pub fn on_supermaster(&self) -> bool {
        self.state.lock().unwrap().on_supermaster
    }

    /// NORMAL -> DEGRADED: switch to the supermaster.
    ///
    /// Returns `false` when no supermaster is configured; the node then has
    /// no failover path and keeps addressing the unreachable primary.
    pub fn fail_over(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match &state.supermaster {
            Some(supermaster) => {
                if !state.on_supermaster {
                    info!(
                        "Master failover: switching to supermaster {}",
                        supermaster.address()
                    );
                    state.active = Arc::clone(supermaster);
                    state.on_supermaster = true;
                }
                true
            }
            None => {
                warn!("Master timed out but no supermaster is configured");
                false
            }
        }
    }

    /// Registers this node with the active master.
    ///
    /// Fire-and-forget with respect to serving: a failure never blocks the
    /// node, it only drives failover/recovery policy. The caller decides
    /// what a failure means.
    pub async fn register(&self, chunks: Vec<ChunkRef>) -> Result<()> {
        let active = self.active();
        let args = RegisterArgs {
            name: self.identity.name.clone(),
            address: self.identity.address.clone(),
            chunks,
        };
        debug!("Sending register to master {}", active.address());
        active
            .invoke("register", serde_json::to_value(&args)?)
            .await
            .map_err(|e| ChunkcastError::UpstreamUnreachable(e.to_string()))?;
        Ok(())
    }

    /// One tick of the optimistic DEGRADED -> NORMAL recovery.
    ///
    /// No-op unless degraded. Otherwise the link optimistically switches
    /// back to the primary and re-registers against it; if that single
    /// attempt fails (or exceeds `attempt_timeout`, so a slow attempt never
    /// holds up the next tick), the switch is rolled back. One failed
    /// attempt is all it ever takes to return to the degraded state.
    pub async fn recovery_tick(&self, chunks: Vec<ChunkRef>, attempt_timeout: Duration) {
        {
            let mut state = self.state.lock().unwrap();
            if !state.on_supermaster {
                return;
            }
            state.active = Arc::clone(&state.primary);
            state.on_supermaster = false;
        }

        debug!("Attempting to re-register with primary master");
        let attempt = tokio::time::timeout(attempt_timeout, self.register(chunks)).await;
        match attempt {
            Ok(Ok(())) => {
                info!("Recovered: back on primary master");
            }
            Ok(Err(e)) => {
                debug!("Primary still unreachable: {}", e);
                self.roll_back();
            }
            Err(_) => {
                debug!(
                    "Primary re-register timed out after {}ms",
                    attempt_timeout.as_millis()
                );
                self.roll_back();
            }
        }
    }

    fn roll_back(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(supermaster) = &state.supermaster {
            state.active = Arc::clone(supermaster);
            state.on_supermaster = true;
        }
    }
}

/// Configuration for the upstream heartbeat.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub timeout: Duration,
    pub failure_threshold: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(2),
            failure_threshold: 3,
        }
    }
}

/// Pings the active master on an interval and raises
/// [`NodeEvent::MasterTimeout`] after enough consecutive failures.
pub struct MasterMonitor {
    link: Arc<MasterLink>,
    events: mpsc::UnboundedSender<NodeEvent>,
    config: MonitorConfig,
}

impl MasterMonitor {
    pub fn new(
        link: Arc<MasterLink>,
        events: mpsc::UnboundedSender<NodeEvent>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            link,
            events,
            config,
        }
    }

    /// Starts the monitor task.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut failures: u32 = 0;

        loop {
            interval.tick().await;

            let active = self.link.active();
            let ping = tokio::time::timeout(self.config.timeout, active.ping()).await;
            match ping {
                Ok(Ok(())) => {
                    failures = 0;
                }
                Ok(Err(e)) => {
                    failures += 1;
                    debug!(
                        "Master {} heartbeat failed ({}/{}): {}",
                        active.address(),
                        failures,
                        self.config.failure_threshold,
                        e
                    );
                }
                Err(_) => {
                    failures += 1;
                    debug!(
                        "Master {} heartbeat timed out ({}/{})",
                        active.address(),
                        failures,
                        self.config.failure_threshold
                    );
                }
            }

            if failures >= self.config.failure_threshold {
                warn!(
                    "Master {} unresponsive after {} heartbeats",
                    active.address(),
                    failures
                );
                if self.events.send(NodeEvent::MasterTimeout).is_err() {
                    // Node is shutting down.
                    return;
                }
                failures = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkcast_common::protocol::{Request, Response};
    use chunkcast_common::transport::TcpServer;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn identity() -> NodeIdentity {
        NodeIdentity {
            name: "relay-1".to_string(),
            address: "127.0.0.1:9100".to_string(),
        }
    }

    /// A master stub that acknowledges every request while `up`, and counts
    /// the register calls it sees.
    async fn spawn_master(
        up: Arc<AtomicBool>,
        registers: Arc<AtomicUsize>,
    ) -> std::net::SocketAddr {
        let server = TcpServer::new("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server
                .run_with_handler(move |req: Request| {
                    let up = up.clone();
                    let registers = registers.clone();
                    async move {
                        if !up.load(Ordering::SeqCst) {
                            return Ok(Response::error(req.id, "master down"));
                        }
                        if req.method == "register" {
                            registers.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok(Response::success(req.id, json!("ok")))
                    }
                })
                .await;
        });
        addr
    }

    fn link_to(primary: &str, supermaster: Option<&str>) -> Arc<MasterLink> {
        let primary = Arc::new(PeerHandle::new("master", primary).unwrap());
        let supermaster =
            supermaster.map(|addr| Arc::new(PeerHandle::new("supermaster", addr).unwrap()));
        Arc::new(MasterLink::new(identity(), primary, supermaster))
    }

    #[test]
    fn test_fail_over_requires_supermaster() {
        let link = link_to("127.0.0.1:1", None);
        assert!(!link.fail_over());
        assert!(!link.on_supermaster());
        assert_eq!(link.active().address(), "127.0.0.1:1");
    }

    #[test]
    fn test_fail_over_switches_to_supermaster() {
        let link = link_to("127.0.0.1:1", Some("127.0.0.1:2"));
        assert!(link.fail_over());
        assert!(link.on_supermaster());
        assert_eq!(link.active().address(), "127.0.0.1:2");

        // Idempotent while degraded.
        assert!(link.fail_over());
        assert!(link.on_supermaster());
    }

    #[tokio::test]
    async fn test_recovery_tick_noop_when_normal() {
        let link = link_to("127.0.0.1:1", Some("127.0.0.1:2"));
        // Not degraded: the tick must not touch the unreachable primary.
        link.recovery_tick(vec![], Duration::from_millis(100)).await;
        assert!(!link.on_supermaster());
        assert_eq!(link.active().address(), "127.0.0.1:1");
    }

    #[tokio::test]
    async fn test_recovery_rolls_back_when_primary_down() {
        let link = link_to("127.0.0.1:1", Some("127.0.0.1:2"));
        link.fail_over();

        link.recovery_tick(vec![], Duration::from_millis(500)).await;

        // Exactly one failed attempt returns us to the degraded state.
        assert!(link.on_supermaster());
        assert_eq!(link.active().address(), "127.0.0.1:2");
    }

    #[tokio::test]
    async fn test_recovery_sticks_when_primary_back() {
        let up = Arc::new(AtomicBool::new(true));
        let registers = Arc::new(AtomicUsize::new(0));
        let addr = spawn_master(up, registers.clone()).await;

        let link = link_to(&addr.to_string(), Some("127.0.0.1:2"));
        link.fail_over();
        assert!(link.on_supermaster());

        link.recovery_tick(vec![ChunkRef::new("movie", 0)], Duration::from_secs(2))
            .await;

        assert!(!link.on_supermaster());
        assert_eq!(link.active().address(), addr.to_string());
        assert_eq!(registers.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_register_reaches_active_master() {
        let up = Arc::new(AtomicBool::new(true));
        let registers = Arc::new(AtomicUsize::new(0));
        let addr = spawn_master(up.clone(), registers.clone()).await;

        let link = link_to(&addr.to_string(), None);
        link.register(vec![]).await.unwrap();
        assert_eq!(registers.load(Ordering::SeqCst), 1);

        // A master that answers with errors surfaces as UpstreamUnreachable.
        up.store(false, Ordering::SeqCst);
        let err = link.register(vec![]).await.unwrap_err();
        assert!(matches!(err, ChunkcastError::UpstreamUnreachable(_)));
    }

    #[tokio::test]
    async fn test_monitor_emits_master_timeout() {
        // Primary is a dead endpoint; the monitor should report it after
        // the configured number of failed heartbeats.
        let link = link_to("127.0.0.1:1", Some("127.0.0.1:2"));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let monitor = MasterMonitor::new(
            Arc::clone(&link),
            tx,
            MonitorConfig {
                interval: Duration::from_millis(10),
                timeout: Duration::from_millis(100),
                failure_threshold: 3,
            },
        );
        let handle = monitor.spawn();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("monitor should raise a timeout event")
            .unwrap();
        assert!(matches!(event, NodeEvent::MasterTimeout));

        handle.abort();
    }
}
