//! Gateway dispatch payloads and their mapping to [`ChatEvent`]s.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use warden_platform::{Attachment, ChatEvent, IncomingMessage, Interaction, InteractionKind, InteractionRef};
use warden_types::{ChannelId, InteractionId, MessageId, ScopeId, SubjectId};

use crate::error::DiscordError;
use crate::payload::PERMISSION_ADMINISTRATOR;

const INTERACTION_COMMAND: u8 = 2;
const INTERACTION_COMPONENT: u8 = 3;
const INTERACTION_MODAL_SUBMIT: u8 = 5;

const COMPONENT_BUTTON: u8 = 2;

/// Thread channel types (announcement, public, private).
const THREAD_TYPES: [u8; 3] = [10, 11, 12];

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    username: String,
    #[serde(default)]
    discriminator: Option<String>,
    #[serde(default)]
    bot: bool,
}

impl RawUser {
    fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            None | Some("0") => self.username.clone(),
            Some(d) => format!("{}#{d}", self.username),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAttachment {
    filename: String,
    #[serde(default)]
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
    channel_id: String,
    #[serde(default)]
    guild_id: Option<String>,
    author: RawUser,
    #[serde(default)]
    content: String,
    #[serde(default)]
    attachments: Vec<RawAttachment>,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    user: RawUser,
    #[serde(default)]
    permissions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    #[serde(rename = "type")]
    kind: u8,
}

#[derive(Debug, Deserialize)]
struct RawInteraction {
    id: String,
    token: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    guild_id: Option<String>,
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    channel: Option<RawChannel>,
    #[serde(default)]
    member: Option<RawMember>,
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawReady {
    user: RawUser,
}

/// Map a dispatch (`t`, `d`) to an event. Unhandled dispatch types yield `None`.
pub fn parse_dispatch(event_type: &str, data: Value) -> Result<Option<ChatEvent>, DiscordError> {
    match event_type {
        "READY" => {
            let ready: RawReady = serde_json::from_value(data)?;
            Ok(Some(ChatEvent::Ready {
                bot_user: SubjectId::new(ready.user.id),
            }))
        }
        "MESSAGE_CREATE" => {
            let raw: RawMessage = serde_json::from_value(data)?;
            Ok(Some(ChatEvent::MessageCreated(message_from_raw(raw))))
        }
        "INTERACTION_CREATE" => {
            let raw: RawInteraction = serde_json::from_value(data)?;
            Ok(interaction_from_raw(raw).map(ChatEvent::Interaction))
        }
        _ => Ok(None),
    }
}

fn message_from_raw(raw: RawMessage) -> IncomingMessage {
    IncomingMessage {
        id: MessageId::new(raw.id),
        channel: ChannelId::new(raw.channel_id),
        scope: raw.guild_id.map(ScopeId::new),
        author: SubjectId::new(raw.author.id),
        author_is_bot: raw.author.bot,
        body: raw.content,
        attachments: raw
            .attachments
            .into_iter()
            .map(|a| Attachment {
                filename: a.filename,
                content_type: a.content_type,
            })
            .collect(),
    }
}

fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Collect `custom_id -> value` from a modal's rows of text inputs.
fn modal_fields(data: &Value) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    let rows = data.get("components").and_then(Value::as_array);
    for row in rows.into_iter().flatten() {
        let inputs = row.get("components").and_then(Value::as_array);
        for input in inputs.into_iter().flatten() {
            if let (Some(id), Some(value)) = (str_field(input, "custom_id"), str_field(input, "value")) {
                fields.insert(id, value);
            }
        }
    }
    fields
}

fn interaction_kind(kind: u8, data: &Value) -> Option<InteractionKind> {
    match kind {
        INTERACTION_COMMAND => Some(InteractionKind::Command {
            name: str_field(data, "name")?,
        }),
        INTERACTION_COMPONENT => {
            let custom_id = str_field(data, "custom_id")?;
            let component_type = data.get("component_type").and_then(Value::as_u64)?;
            if component_type == u64::from(COMPONENT_BUTTON) {
                Some(InteractionKind::Button { custom_id })
            } else {
                let values = data
                    .get("values")
                    .and_then(Value::as_array)
                    .map(|vs| vs.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                Some(InteractionKind::Select { custom_id, values })
            }
        }
        INTERACTION_MODAL_SUBMIT => Some(InteractionKind::ModalSubmit {
            custom_id: str_field(data, "custom_id")?,
            fields: modal_fields(data),
        }),
        _ => None,
    }
}

fn interaction_from_raw(raw: RawInteraction) -> Option<Interaction> {
    let data = raw.data.unwrap_or(Value::Null);
    let kind = interaction_kind(raw.kind, &data)?;
    let channel = ChannelId::new(raw.channel_id?);

    let (user, is_admin) = match (raw.member, raw.user) {
        (Some(member), _) => {
            let perms = member
                .permissions
                .as_deref()
                .and_then(|p| p.parse::<u64>().ok())
                .unwrap_or(0);
            (member.user, perms & PERMISSION_ADMINISTRATOR != 0)
        }
        (None, Some(user)) => (user, false),
        (None, None) => return None,
    };

    Some(Interaction {
        reference: InteractionRef {
            id: InteractionId::new(raw.id),
            token: raw.token,
        },
        scope: raw.guild_id.map(ScopeId::new),
        channel,
        channel_is_thread: raw
            .channel
            .map(|c| THREAD_TYPES.contains(&c.kind))
            .unwrap_or(false),
        user_tag: user.tag(),
        user: SubjectId::new(user.id),
        is_admin,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_create_maps_attachments() {
        let data = json!({
            "id": "m1",
            "channel_id": "c1",
            "guild_id": "g1",
            "author": { "id": "u1", "username": "alice", "bot": false },
            "content": "hello",
            "attachments": [{ "filename": "a.gif", "content_type": "image/gif" }]
        });
        let Some(ChatEvent::MessageCreated(msg)) = parse_dispatch("MESSAGE_CREATE", data).unwrap()
        else {
            panic!("expected a message event");
        };
        assert_eq!(msg.author.as_str(), "u1");
        assert_eq!(msg.scope, Some(ScopeId::new("g1")));
        assert_eq!(msg.attachment_kinds(), vec!["image/gif".to_string()]);
        assert!(!msg.author_is_bot);
    }

    #[test]
    fn direct_message_has_no_scope() {
        let data = json!({
            "id": "m1",
            "channel_id": "c1",
            "author": { "id": "u1", "username": "alice" },
            "content": ""
        });
        let Some(ChatEvent::MessageCreated(msg)) = parse_dispatch("MESSAGE_CREATE", data).unwrap()
        else {
            panic!("expected a message event");
        };
        assert!(msg.scope.is_none());
    }

    #[test]
    fn slash_command_from_admin() {
        let data = json!({
            "id": "i1",
            "token": "tok",
            "type": 2,
            "guild_id": "g1",
            "channel_id": "c1",
            "channel": { "id": "c1", "type": 0 },
            "member": { "user": { "id": "u1", "username": "alice", "discriminator": "0" }, "permissions": "8" },
            "data": { "name": "verify" }
        });
        let Some(ChatEvent::Interaction(i)) = parse_dispatch("INTERACTION_CREATE", data).unwrap()
        else {
            panic!("expected an interaction");
        };
        assert!(i.is_admin);
        assert!(!i.channel_is_thread);
        assert_eq!(i.user_tag, "alice");
        assert_eq!(
            i.kind,
            InteractionKind::Command {
                name: "verify".into()
            }
        );
    }

    #[test]
    fn select_and_button_are_distinguished() {
        let button = interaction_kind(3, &json!({ "custom_id": "create_ticket", "component_type": 2 }));
        assert_eq!(
            button,
            Some(InteractionKind::Button {
                custom_id: "create_ticket".into()
            })
        );
        let select = interaction_kind(
            3,
            &json!({ "custom_id": "ticket_category", "component_type": 3, "values": ["wiki"] }),
        );
        assert_eq!(
            select,
            Some(InteractionKind::Select {
                custom_id: "ticket_category".into(),
                values: vec!["wiki".into()]
            })
        );
    }

    #[test]
    fn modal_submit_collects_fields() {
        let data = json!({
            "custom_id": "ticket_modal_wiki",
            "components": [
                { "type": 1, "components": [{ "type": 4, "custom_id": "ticket_title", "value": "Broken page" }] }
            ]
        });
        let Some(InteractionKind::ModalSubmit { custom_id, fields }) = interaction_kind(5, &data)
        else {
            panic!("expected modal submit");
        };
        assert_eq!(custom_id, "ticket_modal_wiki");
        assert_eq!(fields.get("ticket_title").map(String::as_str), Some("Broken page"));
    }

    #[test]
    fn non_admin_member_and_thread_channel() {
        let data = json!({
            "id": "i1",
            "token": "tok",
            "type": 2,
            "guild_id": "g1",
            "channel_id": "t1",
            "channel": { "id": "t1", "type": 12 },
            "member": { "user": { "id": "u1", "username": "bob", "discriminator": "1234" }, "permissions": "2048" },
            "data": { "name": "ticket_close" }
        });
        let Some(ChatEvent::Interaction(i)) = parse_dispatch("INTERACTION_CREATE", data).unwrap()
        else {
            panic!("expected an interaction");
        };
        assert!(!i.is_admin);
        assert!(i.channel_is_thread);
        assert_eq!(i.user_tag, "bob#1234");
    }

    #[test]
    fn unknown_dispatch_is_ignored() {
        assert!(parse_dispatch("TYPING_START", json!({})).unwrap().is_none());
    }
}
