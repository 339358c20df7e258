//! Conversation record types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who spoke a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    #[serde(alias = "ai", alias = "assistant", alias = "model")]
    Coach,
}

impl Sender {
    /// Wire and log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Coach => "coach",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One utterance in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub sender: Sender,
    pub text: String,
    /// Persona type of the speaker.
    pub persona: String,
}

impl Turn {
    pub fn new(sender: Sender, text: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            persona: persona.into(),
        }
    }
}

/// A completed simulated conversation, ready to insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub user_persona: String,
    pub admin_persona: String,
    pub goal: String,
    pub conversation: Vec<Turn>,
    /// Assigned by the store at insert time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ConversationRecord {
    /// Number of turns.
    pub fn len(&self) -> usize {
        self.conversation.len()
    }

    /// Whether the record has no turns.
    pub fn is_empty(&self) -> bool {
        self.conversation.is_empty()
    }

    /// Check the shape the simulator guarantees: starts with the user, ends
    /// with the coach, strictly alternates, and no turn is blank.
    pub fn is_well_formed(&self) -> bool {
        let alternates = self
            .conversation
            .iter()
            .enumerate()
            .all(|(i, turn)| {
                let expected = if i % 2 == 0 { Sender::User } else { Sender::Coach };
                turn.sender == expected && !turn.text.trim().is_empty()
            });

        alternates
            && self.conversation.len() >= 2
            && self.conversation.len() % 2 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(senders: &[Sender]) -> ConversationRecord {
        ConversationRecord {
            user_persona: "INTJ".to_string(),
            admin_persona: "Strict PT".to_string(),
            goal: "Quit smoking".to_string(),
            conversation: senders
                .iter()
                .map(|s| Turn::new(*s, "text", "p"))
                .collect(),
            created_at: None,
        }
    }

    #[test]
    fn test_sender_serialization() {
        assert_eq!(serde_json::to_string(&Sender::User).unwrap(), r#""user""#);
        assert_eq!(serde_json::to_string(&Sender::Coach).unwrap(), r#""coach""#);
    }

    #[test]
    fn test_sender_aliases() {
        for raw in [r#""ai""#, r#""assistant""#, r#""model""#, r#""coach""#] {
            let sender: Sender = serde_json::from_str(raw).unwrap();
            assert_eq!(sender, Sender::Coach, "{raw}");
        }
        let user: Sender = serde_json::from_str(r#""user""#).unwrap();
        assert_eq!(user, Sender::User);
    }

    #[test]
    fn test_well_formed() {
        use Sender::*;
        assert!(record(&[User, Coach]).is_well_formed());
        assert!(record(&[User, Coach, User, Coach]).is_well_formed());
        assert!(!record(&[User]).is_well_formed());
        assert!(!record(&[User, Coach, User]).is_well_formed());
        assert!(!record(&[Coach, User]).is_well_formed());
        assert!(!record(&[User, User]).is_well_formed());
    }

    #[test]
    fn test_created_at_omitted_until_assigned() {
        let json = serde_json::to_value(record(&[Sender::User, Sender::Coach])).unwrap();
        assert!(json.get("created_at").is_none());
        assert_eq!(json["conversation"][1]["sender"], "coach");
    }
}
