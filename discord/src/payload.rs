//! Outgoing JSON bodies built from the platform-neutral model.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use warden_platform::{
    ActionRow, ButtonStyle, CommandSpec, Component, Embed, InteractionResponse, Modal,
    OutgoingMessage,
};
use warden_types::Timestamp;

/// Message flag: only the invoking user sees the reply.
pub const FLAG_EPHEMERAL: u64 = 1 << 6;

/// Permission bit: administrator.
pub const PERMISSION_ADMINISTRATOR: u64 = 1 << 3;

/// Interaction callback types.
const CALLBACK_CHANNEL_MESSAGE: u8 = 4;
const CALLBACK_MODAL: u8 = 9;

/// Channel type of a private thread.
pub const CHANNEL_PRIVATE_THREAD: u8 = 12;

/// RFC 3339 rendering of a millisecond timestamp.
pub fn iso8601(at: Timestamp) -> String {
    let dt = DateTime::<Utc>::from_timestamp_millis(at.as_millis() as i64).unwrap_or_default();
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn embed_json(embed: &Embed) -> Value {
    let mut obj = Map::new();
    obj.insert("title".into(), json!(embed.title));
    obj.insert("description".into(), json!(embed.description));
    if let Some(color) = embed.color {
        obj.insert("color".into(), json!(color));
    }
    if !embed.fields.is_empty() {
        let fields: Vec<Value> = embed
            .fields
            .iter()
            .map(|f| json!({ "name": f.name, "value": f.value, "inline": f.inline }))
            .collect();
        obj.insert("fields".into(), Value::Array(fields));
    }
    if let Some(at) = embed.timestamp {
        obj.insert("timestamp".into(), json!(iso8601(at)));
    }
    Value::Object(obj)
}

fn button_style(style: ButtonStyle) -> u8 {
    match style {
        ButtonStyle::Primary => 1,
        ButtonStyle::Secondary => 2,
        ButtonStyle::Success => 3,
        ButtonStyle::Danger => 4,
    }
}

pub fn component_json(component: &Component) -> Value {
    match component {
        Component::Button {
            custom_id,
            label,
            style,
            emoji,
        } => {
            let mut v = json!({
                "type": 2,
                "custom_id": custom_id,
                "label": label,
                "style": button_style(*style),
            });
            if let Some(emoji) = emoji {
                v["emoji"] = json!({ "name": emoji });
            }
            v
        }
        Component::Select {
            custom_id,
            placeholder,
            options,
        } => {
            let options: Vec<Value> = options
                .iter()
                .map(|o| {
                    let mut v = json!({ "label": o.label, "value": o.value });
                    if let Some(emoji) = &o.emoji {
                        v["emoji"] = json!({ "name": emoji });
                    }
                    v
                })
                .collect();
            json!({
                "type": 3,
                "custom_id": custom_id,
                "placeholder": placeholder,
                "options": options,
            })
        }
        Component::TextInput {
            custom_id,
            label,
            required,
            max_length,
        } => {
            let mut v = json!({
                "type": 4,
                "custom_id": custom_id,
                "label": label,
                "style": 1,
                "required": required,
            });
            if let Some(max) = max_length {
                v["max_length"] = json!(max);
            }
            v
        }
    }
}

fn rows_json(rows: &[ActionRow]) -> Value {
    Value::Array(
        rows.iter()
            .map(|row| {
                json!({
                    "type": 1,
                    "components": row.components.iter().map(component_json).collect::<Vec<_>>(),
                })
            })
            .collect(),
    )
}

/// Body of a channel message or an interaction reply.
pub fn message_json(message: &OutgoingMessage) -> Value {
    let mut obj = Map::new();
    if let Some(content) = &message.content {
        obj.insert("content".into(), json!(content));
    }
    if !message.embeds.is_empty() {
        obj.insert(
            "embeds".into(),
            Value::Array(message.embeds.iter().map(embed_json).collect()),
        );
    }
    if !message.rows.is_empty() {
        obj.insert("components".into(), rows_json(&message.rows));
    }
    if message.ephemeral {
        obj.insert("flags".into(), json!(FLAG_EPHEMERAL));
    }
    // Mentions in notices are informational; never ping.
    obj.insert("allowed_mentions".into(), json!({ "parse": [] }));
    Value::Object(obj)
}

pub fn modal_json(modal: &Modal) -> Value {
    json!({
        "custom_id": modal.custom_id,
        "title": modal.title,
        "components": rows_json(&modal.rows),
    })
}

pub fn interaction_response_json(response: &InteractionResponse) -> Value {
    match response {
        InteractionResponse::Message(message) => json!({
            "type": CALLBACK_CHANNEL_MESSAGE,
            "data": message_json(message),
        }),
        InteractionResponse::Modal(modal) => json!({
            "type": CALLBACK_MODAL,
            "data": modal_json(modal),
        }),
    }
}

pub fn command_json(command: &CommandSpec) -> Value {
    let mut v = json!({
        "name": command.name,
        "description": command.description,
        "type": 1,
    });
    if command.admin_only {
        v["default_member_permissions"] = json!(PERMISSION_ADMINISTRATOR.to_string());
    }
    v
}

/// Percent-encode an audit log reason for the `X-Audit-Log-Reason` header.
pub fn encode_audit_reason(reason: &str) -> String {
    let mut out = String::with_capacity(reason.len());
    for byte in reason.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
