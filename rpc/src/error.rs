//! RPC server errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Server(String),
}
