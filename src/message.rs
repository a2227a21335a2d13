//! Protocol messages as tagged records.
//!
//! A message is a kind tag plus named string fields. Lookups return `Option`
//! so an absent field stays distinct from a field that is present but empty.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field holding the raw correlation token.
pub const IDENTIFIER_FIELD: &str = "Identifier";

/// Field signalling that the message carries a redirect instruction.
pub const REDIRECT_URI_FIELD: &str = "RedirectUri";

/// Kind of the reply to a keypair generation request.
pub const SSK_KEYPAIR_KIND: &str = "SSKKeypair";

/// An inbound protocol message. Immutable once received.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl Message {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn identifier(&self) -> Option<&str> {
        self.get(IDENTIFIER_FIELD)
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        self.get(REDIRECT_URI_FIELD)
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// Insert/request URI pair carried by an `SSKKeypair` reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SskKeypair {
    pub insert_uri: String,
    pub request_uri: String,
}

impl SskKeypair {
    /// `None` unless the message is an `SSKKeypair` with both URIs present.
    pub fn from_message(message: &Message) -> Option<Self> {
        if !message.is_kind(SSK_KEYPAIR_KIND) {
            return None;
        }
        Some(Self {
            insert_uri: message.get("InsertURI")?.to_string(),
            request_uri: message.get("RequestURI")?.to_string(),
        })
    }
}
