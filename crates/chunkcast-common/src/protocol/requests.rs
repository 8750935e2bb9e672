use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

pub type RequestId = u64;
pub type MethodName = String;
pub type RpcArgs = serde_json::Value;

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub method: MethodName,
    pub args: RpcArgs,
}

impl Request {
    pub fn new(method: impl Into<String>, args: RpcArgs) -> Self {
        Request {
            id: generate_request_id(),
            method: method.into(),
            args,
        }
    }
}

fn generate_request_id() -> RequestId {
    // Try to use system time as the base
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    // Always increment the counter to ensure uniqueness
    let counter = REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst);

    // Combine timestamp and counter to ensure uniqueness
    // Use the lower 32 bits for counter and upper 32 bits for timestamp
    (timestamp & 0xFFFFFFFF00000000) | (counter & 0xFFFFFFFF)
}
