pub mod error;
pub mod messages;
pub mod requests;
pub mod responses;

#[cfg(test)]
mod tests;

pub use error::{ChunkcastError, Result};
pub use messages::{
    ChunkRef, GetArgs, GetReply, NodeIdentity, PeerDescriptor, QueryArgs, RegisterArgs, Report,
    ReportAction,
};
pub use requests::{MethodName, Request, RequestId, RpcArgs};
pub use responses::{Response, RpcResult};
