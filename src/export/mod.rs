//! Export of stored conversations as fine-tuning data.

pub mod jsonl;

pub use jsonl::{
    write_examples, ExportSummary, FineTuneExporter, SkipReason, TrainingExample,
    COACH_LABEL, DEFAULT_OUTPUT_FILE, USER_LABEL,
};
