//! Chunkcast Common Types and Transport
//!
//! This crate provides the protocol definitions and TCP transport layer
//! shared by every component of the chunkcast overlay network.
//!
//! # Overview
//!
//! Chunkcast nodes form a tree that distributes chunked video content:
//! the root holds authoritative chunk data, mid-tree nodes cache and relay
//! chunks to their children, and each parent tracks which of its children
//! holds which chunk. This crate contains the pieces all of them share:
//!
//! - **Protocol Layer**: Request/Response envelopes, typed RPC payloads,
//!   and the error taxonomy
//! - **Transport Layer**: TCP-based communication with JSON serialization
//!
//! # Wire Protocol
//!
//! - **Transport**: TCP with keep-alive connections
//! - **Serialization**: JSON
//! - **Message Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//! - **Max Message Size**: 100 MB (prevents memory exhaustion)
//!
//! # Example
//!
//! ```no_run
//! use chunkcast_common::{Request, Response};
//! use serde_json::json;
//!
//! // Create a request
//! let request = Request::new("get", json!({"filename": "movie", "chunk": 0}));
//!
//! // Process and create response
//! let response = Response::success(request.id, json!({"data": "movie:0"}));
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
