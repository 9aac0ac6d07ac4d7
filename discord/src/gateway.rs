//! Gateway websocket session.
//!
//! One session: connect, read Hello, Identify, then heartbeat on the advertised
//! interval while forwarding dispatches. A missed heartbeat ack is treated as a
//! zombie connection and the session is re-established.

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::ops::BitOr;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use warden_platform::ChatEvent;

use crate::error::DiscordError;
use crate::events::parse_dispatch;
use crate::GATEWAY_URL;

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

/// Close codes after which reconnecting cannot succeed.
const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Gateway intent bit set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Intents(u64);

impl Intents {
    pub const GUILDS: Self = Self(1 << 0);
    pub const GUILD_MEMBERS: Self = Self(1 << 1);
    pub const GUILD_MESSAGES: Self = Self(1 << 9);
    pub const MESSAGE_CONTENT: Self = Self(1 << 15);

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Intents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl Default for Intents {
    /// Everything the moderation and verification flows read.
    fn default() -> Self {
        Self::GUILDS | Self::GUILD_MEMBERS | Self::GUILD_MESSAGES | Self::MESSAGE_CONTENT
    }
}

#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

enum SessionEnd {
    /// Server asked for a fresh session.
    Reconnect,
    Shutdown,
}

pub struct GatewayClient {
    token: String,
    intents: Intents,
    url: String,
}

impl GatewayClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            intents: Intents::default(),
            url: GATEWAY_URL.to_string(),
        }
    }

    pub fn with_intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Keep a gateway session alive until `shutdown` fires or the event
    /// receiver goes away. Returns an error only for fatal rejections.
    pub async fn run(
        &self,
        events: mpsc::Sender<ChatEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), DiscordError> {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match self.session(&events, &mut shutdown).await {
                Ok(SessionEnd::Shutdown) => return Ok(()),
                Ok(SessionEnd::Reconnect) => {
                    info!("gateway requested reconnect");
                    backoff = INITIAL_BACKOFF;
                }
                Err(e @ DiscordError::Rejected { .. }) => return Err(e),
                Err(e) => {
                    warn!(error = %e, backoff_secs = backoff.as_secs(), "gateway session lost");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = shutdown.recv() => return Ok(()),
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    async fn session(
        &self,
        events: &mpsc::Sender<ChatEvent>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<SessionEnd, DiscordError> {
        let (socket, _) = connect_async(self.url.as_str()).await?;
        let (mut sink, mut stream) = socket.split();

        let hello = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => break serde_json::from_str::<GatewayPayload>(&text)?,
                Some(Ok(Message::Close(frame))) => return Err(close_error(frame)),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(DiscordError::Protocol("closed before hello".into())),
            }
        };
        if hello.op != OP_HELLO {
            return Err(DiscordError::Protocol(format!(
                "expected hello, got op {}",
                hello.op
            )));
        }
        let interval = hello
            .d
            .get("heartbeat_interval")
            .and_then(Value::as_u64)
            .ok_or_else(|| DiscordError::Protocol("hello without heartbeat_interval".into()))?;

        sink.send(Message::Text(identify_payload(&self.token, self.intents).to_string()))
            .await?;
        debug!(interval_ms = interval, "identified with gateway");

        let mut heartbeat = tokio::time::interval(Duration::from_millis(interval));
        heartbeat.tick().await;
        let mut seq: Option<u64> = None;
        let mut acked = true;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    let frame = CloseFrame { code: CloseCode::Normal, reason: "shutdown".into() };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    return Ok(SessionEnd::Shutdown);
                }
                _ = heartbeat.tick() => {
                    if !acked {
                        return Err(DiscordError::Protocol("heartbeat not acknowledged".into()));
                    }
                    acked = false;
                    sink.send(Message::Text(heartbeat_payload(seq).to_string())).await?;
                }
                frame = stream.next() => {
                    let payload = match frame {
                        Some(Ok(Message::Text(text))) => serde_json::from_str::<GatewayPayload>(&text)?,
                        Some(Ok(Message::Close(frame))) => return Err(close_error(frame)),
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(DiscordError::Protocol("gateway stream ended".into())),
                    };
                    if payload.s.is_some() {
                        seq = payload.s;
                    }
                    match payload.op {
                        OP_DISPATCH => {
                            let Some(kind) = payload.t.as_deref() else { continue };
                            match parse_dispatch(kind, payload.d) {
                                Ok(Some(event)) => {
                                    if events.send(event).await.is_err() {
                                        return Ok(SessionEnd::Shutdown);
                                    }
                                }
                                Ok(None) => {}
                                Err(e) => warn!(event = kind, error = %e, "undecodable dispatch"),
                            }
                        }
                        OP_HEARTBEAT => {
                            sink.send(Message::Text(heartbeat_payload(seq).to_string())).await?;
                        }
                        OP_HEARTBEAT_ACK => acked = true,
                        OP_RECONNECT | OP_INVALID_SESSION => return Ok(SessionEnd::Reconnect),
                        other => debug!(op = other, "ignoring gateway opcode"),
                    }
                }
            }
        }
    }
}

fn close_error(frame: Option<CloseFrame<'_>>) -> DiscordError {
    match frame {
        Some(frame) => {
            let code = u16::from(frame.code);
            if FATAL_CLOSE_CODES.contains(&code) {
                DiscordError::Rejected {
                    code,
                    reason: frame.reason.to_string(),
                }
            } else {
                DiscordError::Protocol(format!("closed with code {code}: {}", frame.reason))
            }
        }
        None => DiscordError::Protocol("closed without frame".into()),
    }
}

fn identify_payload(token: &str, intents: Intents) -> Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "intents": intents.bits(),
            "properties": {
                "os": std::env::consts::OS,
                "browser": "warden",
                "device": "warden",
            },
        },
    })
}

fn heartbeat_payload(seq: Option<u64>) -> Value {
    json!({ "op": OP_HEARTBEAT, "d": seq })
}
