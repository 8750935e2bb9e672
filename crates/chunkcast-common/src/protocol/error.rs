use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkcastError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Stale request: chunk {chunk} is behind stream position {position}")]
    StaleRequest { chunk: u64, position: u64 },

    #[error("Duplicate in-flight request for chunk {chunk}, stop sending duplicates")]
    DuplicateInFlight { chunk: u64 },

    #[error("Unknown peer: {0}")]
    UnknownPeer(String),

    #[error("Upstream master unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<std::net::AddrParseError> for ChunkcastError {
    fn from(err: std::net::AddrParseError) -> Self {
        ChunkcastError::InvalidRequest(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChunkcastError>;
