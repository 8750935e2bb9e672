//! Typed payloads for the five RPC surfaces.
//!
//! Every method's args and reply travel as JSON inside the generic
//! [`Request`](super::Request)/[`Response`](super::Response) envelopes;
//! these structs give them a checked shape on both ends.
//!
//! | method | args | reply |
//! |---|---|---|
//! | `get` | [`GetArgs`] | [`GetReply`] |
//! | `report` | [`Report`] | `"ok"` |
//! | `register` | [`RegisterArgs`] | `"ok"` |
//! | `query` | [`QueryArgs`] | `[PeerDescriptor]` |
//! | `ping` | `{}` | `null` |

use serde::{Deserialize, Serialize};

/// A node's name and the endpoint peers use to reach it.
///
/// Immutable for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeIdentity {
    pub name: String,
    pub address: String,
}

/// One chunk of one piece of content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChunkRef {
    pub filename: String,
    pub chunk: u64,
}

impl ChunkRef {
    pub fn new(filename: impl Into<String>, chunk: u64) -> Self {
        Self {
            filename: filename.into(),
            chunk,
        }
    }
}

/// Arguments for the `get` method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetArgs {
    pub filename: String,
    pub chunk: u64,
    /// True when the caller is a registered child pulling in order.
    /// Peer-to-peer fetches leave this false and get best-effort service.
    #[serde(default)]
    pub from_child: bool,
    /// Pull-session identifier. Absent on the first request of a session;
    /// the serving node assigns one and echoes it back in [`GetReply`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
}

/// Reply for the `get` method.
///
/// `data: None` is the canonical "no more chunks" / "not present" signal.
/// For a root node it means end-of-content; for a best-effort peer fetch it
/// means the chunk is not cached locally. Neither is an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetReply {
    pub data: Option<String>,
    pub stream_id: Option<String>,
}

/// What a report says happened to a chunk on the reporting node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReportAction {
    #[serde(rename = "ADDED")]
    Added,
    #[serde(rename = "DELETED")]
    Deleted,
}

/// Arguments for the `report` method: a child telling its parent that it
/// gained or lost a chunk. `from` must name a registered child.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub from: String,
    pub action: ReportAction,
    pub filename: String,
    pub chunk: u64,
}

/// Arguments for the `register` method: a node announcing itself to its
/// parent along with every chunk it currently holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterArgs {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub chunks: Vec<ChunkRef>,
}

/// Arguments for the `query` method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryArgs {
    pub filename: String,
    pub chunk: u64,
}

/// A serializable pointer to a peer, returned by `query`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerDescriptor {
    pub name: String,
    pub address: String,
}
