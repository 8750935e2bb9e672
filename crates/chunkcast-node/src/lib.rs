//! Chunkcast Node
//!
//! This crate implements one node of the chunkcast overlay network. A node
//! is either a root (serving chunks straight out of an authoritative video
//! store, or synthetic test data) or a mid-tree relay (caching chunks,
//! sequencing ordered pulls from its children, and tracking which child
//! holds which chunk on behalf of the nodes below it).
//!
//! The interesting parts live in [`node`] (master registration, failover
//! state machine, request routing) and [`stream`] (the ordered-delivery
//! sequencer).

pub mod child_registry;
pub mod chunk_cache;
pub mod chunk_index;
pub mod master;
pub mod node;
pub mod peer;
pub mod reporter;
pub mod stream;
pub mod video_store;

pub use child_registry::ChildRegistry;
pub use chunk_cache::{CacheEvent, ChunkCache};
pub use chunk_index::ChunkLocationIndex;
pub use master::{MasterLink, MasterMonitor, MonitorConfig};
pub use node::{Node, NodeConfig, NodeEvent};
pub use peer::PeerHandle;
pub use reporter::Reporter;
pub use stream::{DeliveryGuard, Stream, StreamManager};
pub use video_store::VideoStore;
