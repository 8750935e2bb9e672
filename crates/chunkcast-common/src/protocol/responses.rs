//! Chunkcast Response Types
//!
//! This module defines the RPC response envelope.

use super::RequestId;
use serde::{Deserialize, Serialize};

/// RPC method result (JSON value)
///
/// The result is returned as a JSON value and can contain any
/// JSON-serializable data.
pub type RpcResult = serde_json::Value;

/// An RPC response returned from a node to its caller.
///
/// # Fields
///
/// - `id`: The request ID this response corresponds to
/// - `result`: The result value (present on success)
/// - `error`: Error message (present on failure)
/// - `success`: Whether the request succeeded
///
/// # Example
///
/// ```
/// use chunkcast_common::protocol::responses::Response;
/// use serde_json::json;
///
/// let success = Response::success(123, json!({"data": "movie:0"}));
/// let error = Response::error(123, "Unknown peer: leaf-3");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    /// Request identifier this response corresponds to
    pub id: RequestId,
    /// Result value (present on success)
    pub result: Option<RpcResult>,
    /// Error message (present on failure)
    pub error: Option<String>,
    /// Whether the request succeeded
    pub success: bool,
}

impl Response {
    /// Creates a successful response.
    pub fn success(id: RequestId, result: RpcResult) -> Self {
        Response {
            id,
            result: Some(result),
            error: None,
            success: true,
        }
    }

    /// Creates an error response.
    pub fn error(id: RequestId, error: impl Into<String>) -> Self {
        Response {
            id,
            result: None,
            error: Some(error.into()),
            success: false,
        }
    }
}
