use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("webhook server error: {0}")]
    Rpc(#[from] warden_rpc::RpcError),

    #[error("gateway error: {0}")]
    Gateway(#[from] warden_discord::DiscordError),

    #[error("metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node already started")]
    AlreadyStarted,

    #[error("shutdown timeout")]
    ShutdownTimeout,
}
