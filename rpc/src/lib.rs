//! HTTP surface of the verification flow.
//!
//! Endpoints:
//! - `POST /api/verify-callback`: the web front end reports a solved challenge
//! - `GET  /api/verify-session/:session_id`: the front end checks a link is live
//! - `GET  /healthz`
//! - `GET  /metrics` (Prometheus text format, when a registry is attached)

pub mod error;
pub mod gateway;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use gateway::{CallbackOutcome, SessionStatus, VerificationGateway};
pub use server::{router, RpcServer, RpcState};
