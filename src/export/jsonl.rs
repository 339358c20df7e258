//! JSONL fine-tuning export.
//!
//! Each line is `{"textInput": ..., "output": ...}`: every turn except the
//! last, labeled and newline-joined, as input; the final coach reply as
//! output.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::conversation::Sender;
use crate::error::ExportError;
use crate::storage::{ConversationStore, RecordQuery, StoredConversation};

/// Label for user turns in `textInput`.
pub const USER_LABEL: &str = "사용자";

/// Label for coach turns in `textInput`.
pub const COACH_LABEL: &str = "코치";

/// Default output file name.
pub const DEFAULT_OUTPUT_FILE: &str = "training_data.jsonl";

// ============================================================================
// Training Example
// ============================================================================

/// One line of the output artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    #[serde(rename = "textInput")]
    pub text_input: String,
    pub output: String,
}

/// Why a document produced no example.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Fewer than two turns.
    TooShort,
    /// The last turn is not a coach reply.
    EndsWithUser,
}

fn label(sender: Sender) -> &'static str {
    match sender {
        Sender::User => USER_LABEL,
        Sender::Coach => COACH_LABEL,
    }
}

impl TrainingExample {
    /// Build an example from a normalized document.
    pub fn from_conversation(doc: &StoredConversation) -> Result<Self, SkipReason> {
        let (last, prior) = match doc.conversation.split_last() {
            Some(split) if doc.conversation.len() >= 2 => split,
            _ => return Err(SkipReason::TooShort),
        };
        if last.sender != Sender::Coach {
            return Err(SkipReason::EndsWithUser);
        }

        let text_input = prior
            .iter()
            .map(|turn| format!("{}: {}", label(turn.sender), turn.text))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Self {
            text_input,
            output: last.text.clone(),
        })
    }
}

// ============================================================================
// Export Summary
// ============================================================================

/// Result of an export run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    /// Documents read from the store.
    pub scanned: usize,
    /// Lines written.
    pub written: usize,
    pub skipped_too_short: usize,
    pub skipped_ends_with_user: usize,
}

// ============================================================================
// Exporter
// ============================================================================

/// Writes training documents of a collection as JSONL.
pub struct FineTuneExporter {
    store: Arc<dyn ConversationStore>,
    collection: String,
}

impl FineTuneExporter {
    pub fn new(store: Arc<dyn ConversationStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Export every document with a goal that is not a test document.
    pub async fn export_to(&self, path: &Path) -> Result<ExportSummary, ExportError> {
        let docs = self
            .store
            .query(&self.collection, &RecordQuery::training())
            .await?;

        tracing::info!(
            collection = %self.collection,
            documents = docs.len(),
            path = %path.display(),
            "Exporting training data"
        );

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let mut summary = write_examples(&docs, &mut writer)?;
        writer.flush()?;

        summary.path = path.to_path_buf();
        tracing::info!(
            written = summary.written,
            skipped_too_short = summary.skipped_too_short,
            skipped_ends_with_user = summary.skipped_ends_with_user,
            "Export complete"
        );
        Ok(summary)
    }
}

/// Write one JSONL line per usable document.
pub fn write_examples<W: Write>(
    docs: &[StoredConversation],
    writer: &mut W,
) -> Result<ExportSummary, ExportError> {
    let mut summary = ExportSummary {
        scanned: docs.len(),
        ..Default::default()
    };

    for doc in docs {
        match TrainingExample::from_conversation(doc) {
            Ok(example) => {
                writeln!(writer, "{}", serde_json::to_string(&example)?)?;
                summary.written += 1;
            }
            Err(SkipReason::TooShort) => summary.skipped_too_short += 1,
            Err(SkipReason::EndsWithUser) => summary.skipped_ends_with_user += 1,
        }
    }

    Ok(summary)
}
