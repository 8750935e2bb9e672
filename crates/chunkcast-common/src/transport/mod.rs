//! Chunkcast Transport Layer
//!
//! This module provides the TCP transport and codec for sending/receiving
//! RPC messages between nodes.
//!
//! # Architecture
//!
//! - **Transport**: TCP with keep-alive connections
//! - **Codec**: JSON serialization for protocol messages
//! - **Wire Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//!
//! # Components
//!
//! - **[`JsonCodec`]**: Encode/decode protocol messages to JSON
//! - **[`TcpTransport`]**: Async TCP transport used for all outbound calls
//! - **[`TcpServer`]**: Async TCP server hosting a node's RPC surface
//!
//! # Message Size Limits
//!
//! All transport implementations enforce a maximum message size of 100 MB
//! to prevent memory exhaustion attacks.

pub mod codec;
pub mod tcp;
pub mod tcp_server;

pub use codec::JsonCodec;
pub use tcp::TcpTransport;
pub use tcp_server::TcpServer;

#[cfg(test)]
mod tests;
