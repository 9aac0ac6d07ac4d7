//! Opaque string identifiers.
//!
//! Chat platforms hand out numeric snowflakes that overflow some JSON
//! consumers, so every id is carried as its string form.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Return the raw id string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// The user a message or verification attempt belongs to.
    SubjectId
);
string_id!(
    /// The community (guild) within which a privilege is granted.
    ScopeId
);
string_id!(
    /// Opaque, unguessable verification session token.
    SessionId
);
string_id!(ChannelId);
string_id!(MessageId);
string_id!(RoleId);
string_id!(
    /// Identifier of an inbound UI interaction (button, command, modal).
    InteractionId
);

impl SubjectId {
    /// Platform mention markup for this user.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl RoleId {
    /// Platform mention markup for this role.
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.0)
    }
}

impl ChannelId {
    /// Platform mention markup for this channel or thread.
    pub fn mention(&self) -> String {
        format!("<#{}>", self.0)
    }
}
