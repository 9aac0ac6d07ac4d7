//! warden node: the process that ties the pieces together.
//!
//! - configuration, logging, metrics and shutdown
//! - routing of gateway events into moderation and the interaction flows
//! - the verification webhook server and the periodic sweeper

pub mod config;
pub mod error;
pub mod interactions;
pub mod logging;
pub mod message_handler;
pub mod metrics;
pub mod node;
pub mod panels;
pub mod shutdown;
pub mod tracing_spans;

pub use config::WardenConfig;
pub use error::NodeError;
pub use interactions::{InteractionHandler, InteractionSettings, TICKET_DELETE_DELAY};
pub use logging::{init_logging, LogFormat};
pub use message_handler::MessageHandler;
pub use metrics::WardenMetrics;
pub use node::{EventRouter, WardenNode, MAX_IN_FLIGHT_EVENTS};
pub use panels::TicketCategory;
pub use shutdown::ShutdownController;
