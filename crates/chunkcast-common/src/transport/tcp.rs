use std::net::ToSocketAddrs;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::error::{ChunkcastError, Result};
use crate::protocol::{Request, Response};
use crate::transport::codec::JsonCodec;

/// Default timeout for TCP operations (5 seconds)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum message size (100 MB)
const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Async TCP transport for chunkcast.
///
/// Used for all outbound calls a node makes: registering with its master,
/// pulling chunks from a parent, and peer-to-peer fetches.
///
/// # Wire Protocol
///
/// Messages are sent with a 4-byte length prefix (big-endian u32) followed
/// by the JSON-encoded data:
///
/// ```text
/// [4-byte length] [JSON data]
/// ```
///
/// # Example
///
/// ```no_run
/// use chunkcast_common::transport::TcpTransport;
/// use chunkcast_common::protocol::Request;
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = TcpTransport::new()?;
/// let mut stream = transport.connect("127.0.0.1:9000").await?;
///
/// let request = Request::new("ping", json!({}));
/// let response = transport.send_request(&mut stream, &request).await?;
/// # Ok(())
/// # }
/// ```
pub struct TcpTransport;

impl TcpTransport {
    /// Creates a new async TCP transport instance.
    pub fn new() -> Result<Self> {
        Ok(Self)
    }

    /// Connects to a remote endpoint.
    ///
    /// This method resolves the address (which may resolve to multiple
    /// addresses) and attempts to connect to each until one succeeds.
    pub async fn connect(&self, addr: &str) -> Result<TcpStream> {
        // Parse the address
        let socket_addrs = addr
            .to_socket_addrs()
            .map_err(|e| ChunkcastError::Connection(format!("Invalid address '{}': {}", addr, e)))?;

        // Try each resolved address until one succeeds
        let mut last_err = None;
        for socket_addr in socket_addrs {
            match TcpStream::connect(&socket_addr).await {
                Ok(stream) => {
                    return Ok(stream);
                }
                Err(e) => {
                    last_err = Some(e);
                }
            }
        }

        Err(ChunkcastError::Connection(format!(
            "Failed to connect to {}: {}",
            addr,
            last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string())
        )))
    }

    /// Sends a request and waits for the response.
    ///
    /// This is a convenience method that combines `send_message` and
    /// `receive_message` with JSON encoding/decoding.
    pub async fn send_request(&self, stream: &mut TcpStream, request: &Request) -> Result<Response> {
        // Encode the request
        let encoded = JsonCodec::encode_request(request)?;

        // Send the request
        Self::send_message(stream, &encoded).await?;

        // Receive the response
        let response_data = Self::receive_message(stream).await?;

        // Decode the response
        let response = JsonCodec::decode_response(&response_data)?;

        Ok(response)
    }

    /// Sends a message with length prefix.
    ///
    /// Wire format: `[4-byte length as u32 big-endian] + [data]`
    pub async fn send_message(stream: &mut TcpStream, data: &[u8]) -> Result<()> {
        let len = data.len() as u32;

        // Write length prefix
        stream
            .write_all(&len.to_be_bytes())
            .await
            .map_err(|e| Self::map_io_error(e, "writing length prefix"))?;

        // Write data
        stream
            .write_all(data)
            .await
            .map_err(|e| Self::map_io_error(e, "writing data"))?;

        // Flush to ensure data is sent
        stream
            .flush()
            .await
            .map_err(|e| Self::map_io_error(e, "flushing stream"))?;

        Ok(())
    }

    /// Receives a message with length prefix.
    ///
    /// Wire format: `[4-byte length as u32 big-endian] + [data]`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Reading the length prefix fails
    /// - Message exceeds maximum size (100 MB)
    /// - Reading the data fails
    pub async fn receive_message(stream: &mut TcpStream) -> Result<Vec<u8>> {
        // Read length prefix
        let mut len_buf = [0u8; 4];
        stream
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| Self::map_io_error(e, "reading length prefix"))?;

        let len = u32::from_be_bytes(len_buf) as usize;

        // Validate length to prevent allocation of excessively large buffers
        if len > MAX_MESSAGE_SIZE {
            return Err(ChunkcastError::InvalidResponse(format!(
                "Message too large: {} bytes (max {} bytes)",
                len, MAX_MESSAGE_SIZE
            )));
        }

        // Read data
        let mut buf = vec![0u8; len];
        stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| Self::map_io_error(e, "reading data"))?;

        Ok(buf)
    }

    /// Map IO errors to appropriate ChunkcastError variants
    ///
    /// Converts standard IO errors into domain-specific errors:
    /// - Timeouts/would block -> `Timeout`
    /// - Connection errors -> `Connection`
    /// - Other IO errors -> `Io`
    fn map_io_error(err: std::io::Error, context: &str) -> ChunkcastError {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                ChunkcastError::Timeout(DEFAULT_TIMEOUT.as_millis() as u64)
            }
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected => {
                ChunkcastError::Connection(format!("{}: Connection lost", context))
            }
            _ => ChunkcastError::Io(err),
        }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_transport_creation() {
        let transport = TcpTransport::new();
        assert!(transport.is_ok());
    }

    #[tokio::test]
    async fn test_connect_invalid_address() {
        let transport = TcpTransport::new().unwrap();
        let result = transport.connect("not an address").await;
        assert!(result.is_err());
    }
}
