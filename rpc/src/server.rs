//! Axum-based webhook server.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, info_span, warn, Instrument};
use warden_types::{ScopeId, SessionId, SubjectId};

use crate::error::RpcError;
use crate::gateway::{CallbackOutcome, SessionStatus, VerificationGateway};
use crate::handlers::{
    HealthResponse, SessionStatusResponse, VerifyCallbackRequest, VerifyCallbackResponse,
};

/// Shared state behind every route.
pub struct RpcState {
    pub gateway: Arc<VerificationGateway>,
    /// Exposed at `/metrics` when present.
    pub metrics: Option<Registry>,
}

/// Build the router. Separate from [`RpcServer`] so tests can drive it in-process.
pub fn router(state: Arc<RpcState>) -> Router {
    Router::new()
        .route("/api/verify-callback", post(verify_callback))
        .route("/api/verify-session/:session_id", get(verify_session))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct RpcServer {
    pub port: u16,
    pub state: Arc<RpcState>,
}

impl RpcServer {
    pub fn new(port: u16, state: Arc<RpcState>) -> Self {
        Self { port, state }
    }

    /// Bind the listener. Failing here is a fatal startup error.
    pub async fn bind(&self) -> Result<TcpListener, RpcError> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| RpcError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("webhook server listening on {addr}");
        Ok(listener)
    }

    /// Serve on an already-bound listener until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}

async fn verify_callback(
    State(state): State<Arc<RpcState>>,
    payload: Result<Json<VerifyCallbackRequest>, JsonRejection>,
) -> (StatusCode, Json<VerifyCallbackResponse>) {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            warn!("malformed verification callback: {rejection}");
            return (
                StatusCode::BAD_REQUEST,
                Json(VerifyCallbackResponse::failed("malformed request")),
            );
        }
    };

    let session = SessionId::new(request.session_id);
    let subject = SubjectId::new(request.user_id);
    let scope = ScopeId::new(request.guild_id);
    let outcome = state
        .gateway
        .complete_verification(&session, &subject, &scope)
        .instrument(info_span!("callback", subject = %subject, scope = %scope))
        .await;

    match outcome {
        CallbackOutcome::Granted => (
            StatusCode::OK,
            Json(VerifyCallbackResponse::ok("role granted")),
        ),
        CallbackOutcome::Invalid => (
            StatusCode::BAD_REQUEST,
            Json(VerifyCallbackResponse::failed("invalid session")),
        ),
        CallbackOutcome::GrantFailed(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(VerifyCallbackResponse::failed("failed to grant role")),
        ),
    }
}

async fn verify_session(
    State(state): State<Arc<RpcState>>,
    Path(session_id): Path<String>,
) -> (StatusCode, Json<SessionStatusResponse>) {
    match state.gateway.check_status(&SessionId::new(session_id)).await {
        SessionStatus::Valid { subject, scope } => (
            StatusCode::OK,
            Json(SessionStatusResponse {
                valid: true,
                user_id: Some(subject.as_str().to_string()),
                guild_id: Some(scope.as_str().to_string()),
            }),
        ),
        SessionStatus::Invalid => (StatusCode::NOT_FOUND, Json(SessionStatusResponse::invalid())),
    }
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn metrics(State(state): State<Arc<RpcState>>) -> impl IntoResponse {
    let Some(registry) = &state.metrics else {
        return (StatusCode::NOT_FOUND, "metrics disabled".to_string()).into_response();
    };
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        String::from_utf8_lossy(&buffer).into_owned(),
    )
        .into_response()
}
