//! The node orchestrator.
//!
//! Owns this node's role (root vs. mid-tree relay), its master/failover
//! state, and the routing of the five RPC surfaces. Mid-tree nodes delegate
//! child `get` requests to the stream sequencer; `register`/`report`/`query`
//! mutate and read the child registry and chunk-location index.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chunkcast_common::protocol::error::{ChunkcastError, Result};
use chunkcast_common::protocol::{
    GetArgs, GetReply, NodeIdentity, PeerDescriptor, QueryArgs, RegisterArgs, Report, ReportAction,
    Request, Response,
};
use chunkcast_common::transport::TcpServer;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::child_registry::ChildRegistry;
use crate::chunk_cache::ChunkCache;
use crate::chunk_index::ChunkLocationIndex;
use crate::master::{MasterLink, MasterMonitor, MonitorConfig};
use crate::peer::PeerHandle;
use crate::reporter::Reporter;
use crate::stream::StreamManager;
use crate::video_store::VideoStore;

/// Capacity of the local chunk cache on relay nodes.
const CHUNK_CACHE_CAPACITY: usize = 50;

/// How often a degraded node retries its primary master. Short enough to
/// recover promptly, long enough not to flood a primary that is down.
const RETRY_MASTER_INTERVAL: Duration = Duration::from_millis(100);

/// Cap on a single recovery register attempt, so a slow attempt never
/// blocks the next tick.
const RECOVERY_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

/// Chunk index at which a masterless node without a video store reports
/// end-of-content for its synthetic data.
const SYNTHETIC_CHUNK_BOUND: u64 = 1000;

/// Bound on the stream table; least-recently-used idle sessions are
/// evicted past this.
const STREAM_TABLE_CAPACITY: usize = 1024;

/// Liveness events consumed by the node's control loop.
///
/// Detection lives outside the orchestrator (the master monitor, a child
/// heartbeat tracker); policy lives here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// The active master stopped responding.
    MasterTimeout,
    /// A registered child is gone; purge it from registry and directory.
    ChildDead(String),
}

/// Configuration for one node process.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub name: String,
    pub port: u16,
    /// Endpoint advertised to the master. Defaults to `127.0.0.1:<port>`.
    pub public_addr: Option<String>,
    /// Master endpoint. Present means this node is mid-tree.
    pub master_addr: Option<String>,
    /// Cold-standby master, used only while the primary is out.
    pub supermaster_addr: Option<String>,
    /// Authoritative video store directory for a root node.
    pub video_dir: Option<PathBuf>,
    pub cache_capacity: usize,
    pub stream_capacity: usize,
    pub monitor: MonitorConfig,
    pub recovery_interval: Duration,
}

impl NodeConfig {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
            public_addr: None,
            master_addr: None,
            supermaster_addr: None,
            video_dir: None,
            cache_capacity: CHUNK_CACHE_CAPACITY,
            stream_capacity: STREAM_TABLE_CAPACITY,
            monitor: MonitorConfig::default(),
            recovery_interval: RETRY_MASTER_INTERVAL,
        }
    }
}

/// State present only on mid-tree relay nodes.
struct RelayState {
    link: Arc<MasterLink>,
    cache: Arc<ChunkCache>,
    streams: StreamManager,
}

/// One node of the overlay tree.
pub struct Node {
    identity: NodeIdentity,
    bind_addr: String,
    registry: Arc<ChildRegistry>,
    index: Arc<ChunkLocationIndex>,
    relay: Option<RelayState>,
    store: Option<VideoStore>,
    events: mpsc::UnboundedSender<NodeEvent>,
    // Background task handles, aborted when the node is dropped.
    tasks: Vec<JoinHandle<()>>,
}

impl Node {
    /// Builds the node and spawns its background tasks (control loop, and
    /// for relay nodes the master monitor, recovery timer, and reporter).
    ///
    /// Must be called within a tokio runtime. The initial registration with
    /// the master is fire-and-forget: failure never blocks startup or
    /// serving, the recovery machinery retries.
    pub fn start(config: NodeConfig) -> Result<Self> {
        let public_addr = config
            .public_addr
            .clone()
            .unwrap_or_else(|| format!("127.0.0.1:{}", config.port));
        let identity = NodeIdentity {
            name: config.name.clone(),
            address: public_addr,
        };
        let bind_addr = format!("0.0.0.0:{}", config.port);

        let registry = Arc::new(ChildRegistry::new());
        let index = Arc::new(ChunkLocationIndex::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut tasks = Vec::new();
        let mut store = None;

        let relay = if let Some(master_addr) = &config.master_addr {
            let primary = Arc::new(PeerHandle::new("master", master_addr)?);
            let supermaster = match &config.supermaster_addr {
                Some(addr) => Some(Arc::new(PeerHandle::new("supermaster", addr)?)),
                None => None,
            };
            let link = Arc::new(MasterLink::new(identity.clone(), primary, supermaster));
            let (cache, cache_events) = ChunkCache::new(config.cache_capacity);
            let cache = Arc::new(cache);

            // Announce ourselves with whatever the cache already holds.
            {
                let link = Arc::clone(&link);
                let chunks = cache.all_chunks();
                tasks.push(tokio::spawn(async move {
                    if let Err(e) = link.register(chunks).await {
                        warn!("Initial registration failed: {}", e);
                    }
                }));
            }

            tasks.push(
                MasterMonitor::new(Arc::clone(&link), events_tx.clone(), config.monitor.clone())
                    .spawn(),
            );
            tasks.push(Reporter::new(identity.clone(), Arc::clone(&link), cache_events).spawn());
            tasks.push(spawn_recovery_timer(
                Arc::clone(&link),
                Arc::clone(&cache),
                config.recovery_interval,
            ));

            Some(RelayState {
                link,
                cache,
                streams: StreamManager::new(config.stream_capacity),
            })
        } else {
            if let Some(dir) = &config.video_dir {
                store = Some(VideoStore::new(dir.clone())?);
            }
            None
        };

        tasks.push(spawn_control_loop(
            events_rx,
            Arc::clone(&registry),
            Arc::clone(&index),
            relay.as_ref().map(|r| Arc::clone(&r.link)),
        ));

        Ok(Self {
            identity,
            bind_addr,
            registry,
            index,
            relay,
            store,
            events: events_tx,
            tasks,
        })
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Sender for liveness events, handed to external detectors (e.g. a
    /// child heartbeat tracker).
    pub fn event_sender(&self) -> mpsc::UnboundedSender<NodeEvent> {
        self.events.clone()
    }

    /// The local chunk cache, present on relay nodes.
    pub fn cache(&self) -> Option<Arc<ChunkCache>> {
        self.relay.as_ref().map(|r| Arc::clone(&r.cache))
    }

    /// This node's master link, present on relay nodes.
    pub fn master(&self) -> Option<Arc<MasterLink>> {
        self.relay.as_ref().map(|r| Arc::clone(&r.link))
    }

    /// Binds the RPC server on the configured port and serves forever.
    pub async fn serve(self: Arc<Self>) -> Result<()> {
        let server = TcpServer::new(&self.bind_addr).await?;
        info!(
            "Node {} listening on {}",
            self.identity.name,
            server.local_addr()?
        );
        self.run_on(server).await
    }

    /// Serves the RPC surface on an already-bound server.
    pub async fn run_on(self: Arc<Self>, server: TcpServer) -> Result<()> {
        let node = Arc::clone(&self);
        server
            .run_with_handler(move |request| {
                let node = Arc::clone(&node);
                async move { node.handle_request(request).await }
            })
            .await
    }

    /// Dispatches one inbound RPC.
    pub async fn handle_request(&self, request: Request) -> Result<Response> {
        let id = request.id;
        match request.method.as_str() {
            "get" => {
                let args: GetArgs = serde_json::from_value(request.args)
                    .map_err(|e| ChunkcastError::InvalidRequest(e.to_string()))?;
                let reply = self.handle_get(args).await?;
                Ok(Response::success(id, serde_json::to_value(reply)?))
            }
            "report" => {
                // An unrecognized action is a contract breach, not a malformed
                // request; the request fails hard but the node survives.
                let report: Report = serde_json::from_value(request.args)
                    .map_err(|e| ChunkcastError::ProtocolViolation(e.to_string()))?;
                self.handle_report(report)?;
                Ok(Response::success(id, serde_json::json!("ok")))
            }
            "register" => {
                let args: RegisterArgs = serde_json::from_value(request.args)
                    .map_err(|e| ChunkcastError::InvalidRequest(e.to_string()))?;
                self.handle_register(args)?;
                Ok(Response::success(id, serde_json::json!("ok")))
            }
            "query" => {
                let args: QueryArgs = serde_json::from_value(request.args)
                    .map_err(|e| ChunkcastError::InvalidRequest(e.to_string()))?;
                let peers = self.handle_query(&args.filename, args.chunk);
                Ok(Response::success(id, serde_json::to_value(peers)?))
            }
            "ping" => Ok(Response::success(id, serde_json::Value::Null)),
            other => Err(ChunkcastError::InvalidRequest(format!(
                "Unknown method: {}",
                other
            ))),
        }
    }

    /// Routes a `get`:
    ///
    /// 1. Root node: serve from the video store (or synthetic data), with
    ///    empty data as the end-of-content signal.
    /// 2. From a child: ordered, deduplicated delivery via the sequencer.
    /// 3. From a peer: best-effort cache lookup, no guarantees.
    async fn handle_get(&self, args: GetArgs) -> Result<GetReply> {
        let relay = match &self.relay {
            Some(relay) => relay,
            None => {
                debug!("Serving root get for {}:{}", args.filename, args.chunk);
                let data = match &self.store {
                    Some(store) => store.read(&args.filename, args.chunk).await?,
                    None => synthetic_chunk(&args.filename, args.chunk),
                };
                return Ok(GetReply {
                    data,
                    stream_id: None,
                });
            }
        };

        if args.from_child {
            let stream = relay
                .streams
                .resolve(&args.filename, args.stream_id.as_deref());
            let guard = stream.begin(args.chunk)?;

            // A miss still delivers (empty data) and advances: the child
            // asked for this position and got its answer.
            let data = relay.cache.get(&args.filename, args.chunk);
            guard.complete();

            debug!(
                "Sequenced {}:{} on stream {}",
                args.filename,
                args.chunk,
                stream.id()
            );
            Ok(GetReply {
                data,
                stream_id: Some(stream.id().to_string()),
            })
        } else {
            // A peer, not a child: just give what we have. Best effort.
            Ok(GetReply {
                data: relay.cache.get(&args.filename, args.chunk),
                stream_id: None,
            })
        }
    }

    /// Applies a child's chunk-holdings report to the location index.
    fn handle_report(&self, report: Report) -> Result<()> {
        if !self.registry.has(&report.from) {
            return Err(ChunkcastError::UnknownPeer(report.from));
        }

        match report.action {
            ReportAction::Added => {
                self.index
                    .insert(&report.filename, report.chunk, &report.from);
            }
            ReportAction::Deleted => {
                self.index
                    .remove(&report.filename, report.chunk, &report.from);
            }
        }
        Ok(())
    }

    /// Registers (or re-registers) a child with its current chunk list.
    fn handle_register(&self, args: RegisterArgs) -> Result<()> {
        let peer = Arc::new(PeerHandle::new(&args.name, &args.address)?);
        let added = self.registry.add(peer);
        if !added {
            // Flap: the peer restarted or lost contact. Its old directory
            // entries describe holdings we can no longer trust.
            info!("Child {} flapped, purging stale directory entries", args.name);
            self.index.remove_peer(&args.name);
        }

        for chunk in &args.chunks {
            self.index.insert(&chunk.filename, chunk.chunk, &args.name);
        }

        debug!(
            "Registered child {} at {} with {} chunks (new: {})",
            args.name,
            args.address,
            args.chunks.len(),
            added
        );
        Ok(())
    }

    /// Resolves the holders of a chunk to serializable peer descriptors.
    ///
    /// A holder name with no live registry entry is a directory/registry
    /// consistency gap; it is skipped rather than failing the query.
    fn handle_query(&self, filename: &str, chunk: u64) -> Vec<PeerDescriptor> {
        self.index
            .holders(filename, chunk)
            .into_iter()
            .filter_map(|name| match self.registry.get(&name) {
                Some(peer) => Some(peer.descriptor()),
                None => {
                    warn!("Directory names {} for {}:{} but it is not a registered child", name, filename, chunk);
                    None
                }
            })
            .collect()
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Synthetic test data served by a masterless node with no video store.
fn synthetic_chunk(filename: &str, chunk: u64) -> Option<String> {
    if chunk >= SYNTHETIC_CHUNK_BOUND {
        None
    } else {
        Some(format!("{}:{}", filename, chunk))
    }
}

/// The failover recovery timer: inert while on the primary, a single
/// optimistic re-register attempt per tick while degraded.
fn spawn_recovery_timer(
    link: Arc<MasterLink>,
    cache: Arc<ChunkCache>,
    recovery_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(recovery_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            link.recovery_tick(cache.all_chunks(), RECOVERY_ATTEMPT_TIMEOUT)
                .await;
        }
    })
}

/// Consumes liveness events: failover policy and child-death cleanup.
fn spawn_control_loop(
    mut events: mpsc::UnboundedReceiver<NodeEvent>,
    registry: Arc<ChildRegistry>,
    index: Arc<ChunkLocationIndex>,
    link: Option<Arc<MasterLink>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                NodeEvent::MasterTimeout => {
                    if let Some(link) = &link {
                        link.fail_over();
                    }
                }
                NodeEvent::ChildDead(name) => {
                    info!("Child dead: {}", name);
                    registry.remove(&name);
                    index.remove_peer(&name);
                }
            }
        }
    })
}
