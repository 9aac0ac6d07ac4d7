//! The running warden node.
//!
//! Owns every long-lived component and the background tasks:
//! - the webhook server (verification callbacks, health, metrics)
//! - the gateway session and the event loop fed by it
//! - the periodic sweeper for expired sessions and idle rate windows

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use warden_discord::{DiscordError, DiscordRest, GatewayClient};
use warden_moderation::{Classifier, EnforcementDispatcher, ModerationEngine, RateWindow};
use warden_platform::{ChatEvent, ChatPlatform};
use warden_rpc::{RpcServer, RpcState, VerificationGateway};
use warden_session::SessionStore;
use warden_types::{Clock, RoleId, SystemClock};

use crate::config::WardenConfig;
use crate::interactions::{InteractionHandler, InteractionSettings};
use crate::message_handler::MessageHandler;
use crate::metrics::WardenMetrics;
use crate::panels;
use crate::shutdown::ShutdownController;
use crate::NodeError;

/// Buffered gateway events between the socket and the router.
const EVENT_CHANNEL_CAPACITY: usize = 1024;
/// Upper bound on event handlers running at once.
pub const MAX_IN_FLIGHT_EVENTS: usize = 64;
/// Timeout for waiting on background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Routes each gateway event to its handler.
pub struct EventRouter {
    platform: Arc<dyn ChatPlatform>,
    messages: MessageHandler,
    interactions: InteractionHandler,
}

impl EventRouter {
    pub async fn route(&self, event: ChatEvent) {
        match event {
            ChatEvent::Ready { bot_user } => {
                info!(bot = %bot_user, "gateway ready, registering commands");
                if let Err(e) = self.platform.register_commands(&panels::commands()).await {
                    error!(error = %e, "failed to register slash commands");
                }
            }
            ChatEvent::MessageCreated(message) => {
                self.messages.handle(message).await;
            }
            ChatEvent::Interaction(interaction) => {
                self.interactions.handle(interaction).await;
            }
        }
    }

    /// Route every event from `rx` until the channel closes, then wait for
    /// the handlers still running. At most `max_in_flight` run at once.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<ChatEvent>, max_in_flight: usize) {
        let permits = Arc::new(Semaphore::new(max_in_flight.max(1)));
        let mut handlers = JoinSet::new();
        while let Some(event) = rx.recv().await {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            while handlers.try_join_next().is_some() {}
            let router = self.clone();
            handlers.spawn(async move {
                router.route(event).await;
                drop(permit);
            });
        }
        if !handlers.is_empty() {
            debug!(in_flight = handlers.len(), "waiting for event handlers");
        }
        while let Some(joined) = handlers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "event handler task failed");
            }
        }
        debug!("event loop drained");
    }

    pub fn interactions(&self) -> &InteractionHandler {
        &self.interactions
    }
}

pub struct WardenNode {
    pub config: WardenConfig,
    sessions: Arc<SessionStore>,
    engine: Arc<ModerationEngine>,
    verification: Arc<VerificationGateway>,
    router: Arc<EventRouter>,
    metrics: Arc<WardenMetrics>,
    shutdown: Arc<ShutdownController>,
    http_addr: Option<SocketAddr>,
    gateway_handle: Option<JoinHandle<Result<(), DiscordError>>>,
    task_handles: Vec<JoinHandle<()>>,
}

impl WardenNode {
    /// Build a node talking to the real platform with the wall clock.
    pub fn with_discord(config: WardenConfig) -> Result<Self, NodeError> {
        let rest = DiscordRest::new(&config.discord_token)?;
        Self::new(config, Arc::new(rest), Arc::new(SystemClock))
    }

    /// Build a node over any platform and clock. The config is validated.
    pub fn new(
        config: WardenConfig,
        platform: Arc<dyn ChatPlatform>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let metrics = Arc::new(WardenMetrics::new()?);

        let sessions = Arc::new(SessionStore::new(clock.clone(), config.session_ttl_ms()));
        let engine = Arc::new(ModerationEngine::new(
            RateWindow::new(config.rate_window_ms, config.max_window_records),
            Classifier::new(config.classifier()),
            clock.clone(),
        ));
        let dispatcher = Arc::new(EnforcementDispatcher::new(
            platform.clone(),
            clock.clone(),
            config.restriction(),
        ));
        let verification = Arc::new(
            VerificationGateway::new(
                sessions.clone(),
                platform.clone(),
                RoleId::new(config.verified_role_id.clone()),
            )
            .with_outcome_counter(metrics.verifications.clone()),
        );

        let settings = InteractionSettings {
            verify_base_url: config.verify_base_url.clone(),
            service_tag: config.service_tag.clone(),
            ticket_role: RoleId::new(config.ticket_role_id.clone()),
            staff_role: RoleId::new(config.staff_role_id.clone()),
        };
        let router = Arc::new(EventRouter {
            platform: platform.clone(),
            messages: MessageHandler::new(engine.clone(), dispatcher, metrics.clone()),
            interactions: InteractionHandler::new(
                platform,
                sessions.clone(),
                clock,
                metrics.clone(),
                settings,
            ),
        });

        Ok(Self {
            config,
            sessions,
            engine,
            verification,
            router,
            metrics,
            shutdown: Arc::new(ShutdownController::new()),
            http_addr: None,
            gateway_handle: None,
            task_handles: Vec::new(),
        })
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn verification(&self) -> &Arc<VerificationGateway> {
        &self.verification
    }

    pub fn metrics(&self) -> &Arc<WardenMetrics> {
        &self.metrics
    }

    pub fn shutdown_controller(&self) -> &Arc<ShutdownController> {
        &self.shutdown
    }

    /// Address the webhook server is bound to, once started.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    /// Handle one event inline.
    pub async fn handle_event(&self, event: ChatEvent) {
        self.router.route(event).await;
    }

    /// Collect expired sessions and idle windows, refreshing the gauges.
    /// Returns `(sessions_purged, subjects_dropped)`.
    pub async fn sweep(&self) -> (usize, usize) {
        sweep_once(&self.sessions, &self.engine, &self.metrics).await
    }

    /// Bind the webhook server and spawn every background task.
    ///
    /// A bind failure is returned immediately; nothing is left running.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if !self.task_handles.is_empty() {
            return Err(NodeError::AlreadyStarted);
        }

        // ── Webhook server ─────────────────────────────────────────────────
        let state = Arc::new(RpcState {
            gateway: self.verification.clone(),
            metrics: self
                .config
                .enable_metrics
                .then(|| self.metrics.registry.clone()),
        });
        let server = RpcServer::new(self.config.http_port, state);
        let listener = server.bind().await?;
        self.http_addr = listener.local_addr().ok();
        let stop = self.shutdown.signalled();
        self.task_handles.push(tokio::spawn(async move {
            match server.serve(listener, stop).await {
                Ok(()) => info!("webhook server stopped"),
                Err(e) => error!("webhook server error: {e}"),
            }
        }));

        // ── Sweeper ────────────────────────────────────────────────────────
        let sessions = self.sessions.clone();
        let engine = self.engine.clone();
        let metrics = self.metrics.clone();
        let period = self.config.sweep_interval();
        let mut shutdown_rx = self.shutdown.subscribe();
        self.task_handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        debug!("sweeper shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let (purged, dropped) = sweep_once(&sessions, &engine, &metrics).await;
                        if purged > 0 || dropped > 0 {
                            debug!(sessions = purged, subjects = dropped, "sweep complete");
                        }
                    }
                }
            }
        }));

        // ── Gateway and event loop ─────────────────────────────────────────
        if self.config.enable_gateway {
            let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            let client = GatewayClient::new(self.config.discord_token.clone());
            let shutdown_rx = self.shutdown.subscribe();
            let shutdown = self.shutdown.clone();
            self.gateway_handle = Some(tokio::spawn(async move {
                let result = client.run(tx, shutdown_rx).await;
                if let Err(e) = &result {
                    error!(error = %e, "gateway failed permanently, shutting down");
                    shutdown.shutdown();
                }
                result
            }));

            let router = self.router.clone();
            self.task_handles
                .push(tokio::spawn(router.run(rx, MAX_IN_FLIGHT_EVENTS)));
        } else {
            warn!("gateway disabled; only the webhook server is running");
        }

        info!(
            http_port = self.config.http_port,
            gateway = self.config.enable_gateway,
            metrics = self.config.enable_metrics,
            "warden node started"
        );
        Ok(())
    }

    /// Block until SIGINT/SIGTERM or an internal fatal error.
    pub async fn wait_for_shutdown(&self) {
        self.shutdown.wait_for_signal().await;
    }

    /// Stop every task and wait for them (bounded).
    ///
    /// Returns the gateway's fatal error, if that is what ended the node.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        info!("warden node stopping");
        self.shutdown.shutdown();

        let gateway = self.gateway_handle.take();
        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let router = self.router.clone();
        let wait_all = async move {
            let gateway_result = match gateway {
                Some(handle) => handle.await.unwrap_or(Ok(())),
                None => Ok(()),
            };
            for handle in handles {
                let _ = handle.await;
            }
            router.interactions().drain_pending(SHUTDOWN_TIMEOUT).await;
            gateway_result
        };

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await {
            Ok(gateway_result) => {
                info!("warden node stopped");
                gateway_result.map_err(NodeError::from)
            }
            Err(_) => {
                warn!("background tasks did not finish in time");
                Err(NodeError::ShutdownTimeout)
            }
        }
    }
}

async fn sweep_once(
    sessions: &SessionStore,
    engine: &ModerationEngine,
    metrics: &WardenMetrics,
) -> (usize, usize) {
    let purged = sessions.purge_expired().await;
    let dropped = engine.sweep().await;
    metrics.live_sessions.set(sessions.len().await as i64);
    metrics
        .tracked_subjects
        .set(engine.window().subject_count().await as i64);
    (purged, dropped)
}
