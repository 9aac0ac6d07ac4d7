//! HTTP API client implementing the chat platform capabilities.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;
use warden_platform::{
    ChatPlatform, CommandSpec, InteractionRef, InteractionResponse, Member, MessageRef,
    OutgoingMessage, PlatformError,
};
use warden_types::{ChannelId, Clock, RoleId, ScopeId, SubjectId, SystemClock};

use crate::error::DiscordError;
use crate::payload::{
    command_json, encode_audit_reason, interaction_response_json, iso8601, message_json,
    CHANNEL_PRIVATE_THREAD,
};
use crate::API_BASE;

const AUDIT_REASON_HEADER: &str = "X-Audit-Log-Reason";

#[derive(Deserialize)]
struct RawMember {
    user: RawUserId,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Deserialize)]
struct RawUserId {
    id: String,
}

#[derive(Deserialize)]
struct RawId {
    id: String,
}

#[derive(Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

pub struct DiscordRest {
    http: reqwest::Client,
    base: String,
    application_id: OnceCell<String>,
}

impl DiscordRest {
    pub fn new(token: &str) -> Result<Self, DiscordError> {
        Self::with_base(token, API_BASE)
    }

    /// Point the client at a different API root (tests, proxies).
    pub fn with_base(token: &str, base: &str) -> Result<Self, DiscordError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bot {token}"))
            .map_err(|e| DiscordError::InvalidToken(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!(
                "DiscordBot (https://github.com/rec877/warden, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            )),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            application_id: OnceCell::new(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base, path))
    }

    fn with_reason(builder: RequestBuilder, reason: &str) -> RequestBuilder {
        builder.header(AUDIT_REASON_HEADER, encode_audit_reason(reason))
    }

    /// Send and map non-success statuses to [`PlatformError`].
    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response, PlatformError> {
        let response = builder
            .send()
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(%status, what, "platform request failed");
        Err(match status {
            StatusCode::NOT_FOUND => PlatformError::NotFound(what.to_string()),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_ms = serde_json::from_str::<RateLimitBody>(&body)
                    .map(|b| (b.retry_after * 1000.0) as u64)
                    .unwrap_or(1000);
                PlatformError::RateLimited { retry_after_ms }
            }
            _ => PlatformError::Http {
                status: status.as_u16(),
                body,
            },
        })
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T, PlatformError> {
        self.send(builder, what)
            .await?
            .json::<T>()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))
    }

    async fn application_id(&self) -> Result<&str, PlatformError> {
        let id = self
            .application_id
            .get_or_try_init(|| async {
                let app: RawId = self
                    .send_json(self.request(Method::GET, "/applications/@me"), "application")
                    .await?;
                Ok::<_, PlatformError>(app.id)
            })
            .await?;
        Ok(id.as_str())
    }
}

#[async_trait]
impl ChatPlatform for DiscordRest {
    async fn delete_message(&self, message: &MessageRef) -> Result<(), PlatformError> {
        let path = format!("/channels/{}/messages/{}", message.channel, message.message);
        self.send(self.request(Method::DELETE, &path), "message").await?;
        Ok(())
    }

    async fn restrict_member(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
        duration: Duration,
        reason: &str,
    ) -> Result<(), PlatformError> {
        let until = SystemClock.now().plus_millis(duration.as_millis() as u64);
        let path = format!("/guilds/{scope}/members/{subject}");
        let builder = self
            .request(Method::PATCH, &path)
            .json(&json!({ "communication_disabled_until": iso8601(until) }));
        self.send(Self::with_reason(builder, reason), "member").await?;
        Ok(())
    }

    async fn send_message(
        &self,
        channel: &ChannelId,
        message: &OutgoingMessage,
    ) -> Result<(), PlatformError> {
        let path = format!("/channels/{channel}/messages");
        let builder = self.request(Method::POST, &path).json(&message_json(message));
        self.send(builder, "channel").await?;
        Ok(())
    }

    async fn fetch_member(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
    ) -> Result<Member, PlatformError> {
        let path = format!("/guilds/{scope}/members/{subject}");
        let raw: RawMember = self
            .send_json(self.request(Method::GET, &path), "member")
            .await?;
        Ok(Member {
            subject: SubjectId::new(raw.user.id),
            scope: scope.clone(),
            roles: raw.roles.into_iter().map(RoleId::new).collect(),
        })
    }

    async fn add_role(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
        role: &RoleId,
    ) -> Result<(), PlatformError> {
        let path = format!("/guilds/{scope}/members/{subject}/roles/{role}");
        self.send(self.request(Method::PUT, &path), "member role").await?;
        Ok(())
    }

    async fn remove_role(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
        role: &RoleId,
    ) -> Result<(), PlatformError> {
        let path = format!("/guilds/{scope}/members/{subject}/roles/{role}");
        self.send(self.request(Method::DELETE, &path), "member role").await?;
        Ok(())
    }

    async fn create_private_thread(
        &self,
        parent: &ChannelId,
        name: &str,
        auto_archive_minutes: u32,
        reason: &str,
    ) -> Result<ChannelId, PlatformError> {
        let path = format!("/channels/{parent}/threads");
        let builder = self.request(Method::POST, &path).json(&json!({
            "name": name,
            "auto_archive_duration": auto_archive_minutes,
            "type": CHANNEL_PRIVATE_THREAD,
        }));
        let thread: RawId = self
            .send_json(Self::with_reason(builder, reason), "channel")
            .await?;
        Ok(ChannelId::new(thread.id))
    }

    async fn add_thread_member(
        &self,
        thread: &ChannelId,
        subject: &SubjectId,
    ) -> Result<(), PlatformError> {
        let path = format!("/channels/{thread}/thread-members/{subject}");
        self.send(self.request(Method::PUT, &path), "thread").await?;
        Ok(())
    }

    async fn archive_thread(&self, thread: &ChannelId) -> Result<(), PlatformError> {
        let path = format!("/channels/{thread}");
        let builder = self
            .request(Method::PATCH, &path)
            .json(&json!({ "archived": true }));
        self.send(builder, "thread").await?;
        Ok(())
    }

    async fn delete_channel(&self, channel: &ChannelId) -> Result<(), PlatformError> {
        let path = format!("/channels/{channel}");
        self.send(self.request(Method::DELETE, &path), "channel").await?;
        Ok(())
    }

    async fn respond(
        &self,
        interaction: &InteractionRef,
        response: &InteractionResponse,
    ) -> Result<(), PlatformError> {
        let path = format!("/interactions/{}/{}/callback", interaction.id, interaction.token);
        let builder = self
            .request(Method::POST, &path)
            .json(&interaction_response_json(response));
        self.send(builder, "interaction").await?;
        Ok(())
    }

    async fn register_commands(&self, commands: &[CommandSpec]) -> Result<(), PlatformError> {
        let application = self.application_id().await?.to_string();
        let path = format!("/applications/{application}/commands");
        let body: Vec<Value> = commands.iter().map(command_json).collect();
        self.send(self.request(Method::PUT, &path).json(&body), "commands")
            .await?;
        Ok(())
    }
}
