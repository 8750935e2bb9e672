use chunkcast_common::protocol::error::{ChunkcastError, Result};
use chunkcast_common::protocol::{PeerDescriptor, Request};
use chunkcast_common::transport::TcpTransport;
use serde_json::Value;

/// A remote-invocation proxy for another node in the tree.
///
/// Creates a fresh TCP connection for each request to enable true
/// parallelism; concurrent invocations never serialize through a shared
/// stream.
pub struct PeerHandle {
    name: String,
    address: String,
    transport: TcpTransport,
}

impl PeerHandle {
    /// Create a handle for the peer at `address` known as `name`.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        let transport = TcpTransport::new()?;
        Ok(Self {
            name: name.into(),
            address: address.into(),
            transport,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// The serializable form returned to `query` callers.
    pub fn descriptor(&self) -> PeerDescriptor {
        PeerDescriptor {
            name: self.name.clone(),
            address: self.address.clone(),
        }
    }

    /// Invoke an RPC method on the peer.
    ///
    /// Creates a fresh TCP connection for this request; the connection is
    /// closed when the stream is dropped.
    pub async fn invoke(&self, method: impl Into<String>, args: Value) -> Result<Value> {
        let request = Request::new(method, args);

        let mut stream = self.transport.connect(&self.address).await?;
        let response = self.transport.send_request(&mut stream, &request).await?;

        if response.success {
            response.result.ok_or_else(|| {
                ChunkcastError::InvalidResponse("Missing result in success response".to_string())
            })
        } else {
            Err(ChunkcastError::InvalidResponse(
                response
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }

    /// Liveness probe. No side effects on the remote node.
    pub async fn ping(&self) -> Result<()> {
        self.invoke("ping", serde_json::json!({})).await.map(|_| ())
    }
}

impl std::fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerHandle")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish()
    }
}
