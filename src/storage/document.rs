//! Normalization of stored documents into one read-side shape.
//!
//! Documents written over time use several spellings for the same fields:
//! `userPersona` / `user_persona`, `adminPersona` / `admin_persona` /
//! `coach_persona`, `conversation` / `messages`, and `role` / `sender` on
//! turns. Personas may be a bare name or an object with a `type` field.
//! Everything is folded into [`StoredConversation`] here so the rest of the
//! crate sees a single shape.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::conversation::Sender;

/// Persona name used when a document carries none.
pub const UNKNOWN_PERSONA: &str = "Unknown";

/// A normalized turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTurn {
    pub sender: Sender,
    pub text: String,
    pub persona: Option<String>,
}

/// A normalized stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredConversation {
    pub id: String,
    pub user_persona: String,
    pub admin_persona: String,
    pub goal: Option<String>,
    pub conversation: Vec<StoredTurn>,
    pub is_test: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl StoredConversation {
    /// Normalize a raw document body.
    ///
    /// `stored_at` is the store's own insert timestamp, used when the body
    /// carries no readable `created_at`.
    pub fn from_document(
        id: impl Into<String>,
        body: &Value,
        stored_at: Option<DateTime<Utc>>,
    ) -> Result<Self, serde_json::Error> {
        let raw = RawDocument::deserialize(body)?;

        let user_persona = raw
            .user_persona_camel
            .or(raw.user_persona)
            .and_then(PersonaField::into_name);
        let admin_persona = raw
            .admin_persona_camel
            .or(raw.admin_persona)
            .or(raw.coach_persona)
            .and_then(PersonaField::into_name);

        let turns = raw.conversation.or(raw.messages).unwrap_or_default();
        let conversation = turns.into_iter().map(RawTurn::normalize).collect();

        Ok(Self {
            id: id.into(),
            user_persona: user_persona.unwrap_or_else(|| UNKNOWN_PERSONA.to_string()),
            admin_persona: admin_persona.unwrap_or_else(|| UNKNOWN_PERSONA.to_string()),
            goal: raw.goal.filter(|g| !g.trim().is_empty()),
            conversation,
            is_test: raw.test.unwrap_or(false),
            created_at: raw.created_at.as_ref().and_then(parse_timestamp).or(stored_at),
        })
    }
}

/// A persona stored either as its name or as an object with a `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PersonaField {
    Name(String),
    Detailed {
        #[serde(rename = "type", default)]
        kind: Option<String>,
    },
}

impl PersonaField {
    /// The persona name, if present and non-empty.
    pub fn into_name(self) -> Option<String> {
        let name = match self {
            Self::Name(name) => Some(name),
            Self::Detailed { kind } => kind,
        };
        name.filter(|n| !n.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(rename = "userPersona", default)]
    user_persona_camel: Option<PersonaField>,
    #[serde(default)]
    user_persona: Option<PersonaField>,
    #[serde(rename = "adminPersona", default)]
    admin_persona_camel: Option<PersonaField>,
    #[serde(default)]
    admin_persona: Option<PersonaField>,
    #[serde(default)]
    coach_persona: Option<PersonaField>,
    #[serde(default)]
    goal: Option<String>,
    #[serde(default)]
    conversation: Option<Vec<RawTurn>>,
    #[serde(default)]
    messages: Option<Vec<RawTurn>>,
    #[serde(default)]
    test: Option<bool>,
    #[serde(default)]
    created_at: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawTurn {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    sender: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    persona: Option<String>,
}

impl RawTurn {
    fn normalize(self) -> StoredTurn {
        let label = self.role.or(self.sender);
        StoredTurn {
            sender: label.as_deref().map_or(Sender::Coach, parse_sender),
            text: self.text.unwrap_or_default(),
            persona: self.persona,
        }
    }
}

/// Map a stored sender label onto [`Sender`].
///
/// Only `user` is the user side; every other label (`ai`, `assistant`,
/// `model`, `system`, ...) is read as the coach.
pub fn parse_sender(label: &str) -> Sender {
    match label.trim().to_lowercase().as_str() {
        "user" => Sender::User,
        "coach" | "ai" | "assistant" | "model" => Sender::Coach,
        other => {
            tracing::debug!(sender = %other, "Reading unrecognized sender as coach");
            Sender::Coach
        }
    }
}

/// RFC 3339 strings, or `{ "_seconds" | "seconds": n }` timestamp objects.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Object(map) => {
            let seconds = map
                .get("_seconds")
                .or_else(|| map.get("seconds"))
                .and_then(Value::as_i64)?;
            Utc.timestamp_opt(seconds, 0).single()
        }
        _ => None,
    }
}
