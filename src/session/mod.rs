//! Document session: selection, analysis and follow-up questions
//!
//! One [`SessionMachine`] tracks a single document at a time and owns the whole
//! lifecycle from selection through analysis to the follow-up conversation.

mod document;
mod machine;
mod types;

pub use document::{
    read_document_file, Document, DocumentFile, DocumentStore, MediaType, SUPPORTED_EXTENSIONS,
};
pub use machine::{SessionMachine, SessionWatcher};
pub use types::{AnalysisResult, Completion, FollowupExchange, PendingOperation, SessionState};
