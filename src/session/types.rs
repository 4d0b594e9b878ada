//! Session data model

use crate::error::SessionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Extracted text and AI analysis for one document
///
/// Produced once per document and never mutated. `id` identifies the result
/// when checking whether a follow-up answer still belongs to the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: Uuid,
    pub extracted_text: String,
    pub analysis_summary: String,
    pub created_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn new(extracted_text: impl Into<String>, analysis_summary: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            extracted_text: extracted_text.into(),
            analysis_summary: analysis_summary.into(),
            created_at: Utc::now(),
        }
    }
}

/// One answered follow-up question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowupExchange {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

/// The request a failed session re-issues on retry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PendingOperation {
    Analysis,
    Followup { question: String },
}

/// Result of a successful retry
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Analysis(AnalysisResult),
    Followup(FollowupExchange),
}

/// Current state of the document session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Uploading,
    Analyzed {
        analysis: AnalysisResult,
        exchanges: Vec<FollowupExchange>,
    },
    QueryInFlight {
        analysis: AnalysisResult,
        exchanges: Vec<FollowupExchange>,
        question: String,
    },
    Failed {
        analysis: Option<AnalysisResult>,
        exchanges: Vec<FollowupExchange>,
        error: SessionError,
        operation: PendingOperation,
    },
}

impl SessionState {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Analyzed { .. } => "analyzed",
            Self::QueryInFlight { .. } => "queryInFlight",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether a provider request is pending for this session
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Uploading | Self::QueryInFlight { .. })
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        match self {
            Self::Analyzed { analysis, .. } | Self::QueryInFlight { analysis, .. } => Some(analysis),
            Self::Failed { analysis, .. } => analysis.as_ref(),
            Self::Idle | Self::Uploading => None,
        }
    }

    pub fn exchanges(&self) -> &[FollowupExchange] {
        match self {
            Self::Analyzed { exchanges, .. }
            | Self::QueryInFlight { exchanges, .. }
            | Self::Failed { exchanges, .. } => exchanges,
            Self::Idle | Self::Uploading => &[],
        }
    }

    pub fn error(&self) -> Option<&SessionError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_accessors() {
        let analysis = AnalysisResult::new("Amoxicillin 500mg", "Antibiotic");
        let state = SessionState::Analyzed {
            analysis: analysis.clone(),
            exchanges: vec![],
        };
        assert_eq!(state.status(), "analyzed");
        assert_eq!(state.analysis(), Some(&analysis));
        assert!(!state.is_in_flight());
        assert!(state.error().is_none());

        assert!(SessionState::Uploading.is_in_flight());
        assert!(SessionState::Idle.analysis().is_none());
        assert!(SessionState::default().exchanges().is_empty());
    }

    #[test]
    fn test_failed_state_keeps_prior_analysis() {
        let analysis = AnalysisResult::new("text", "summary");
        let state = SessionState::Failed {
            analysis: Some(analysis.clone()),
            exchanges: vec![],
            error: SessionError::NetworkUnavailable { message: "refused".into() },
            operation: PendingOperation::Followup { question: "Dose?".into() },
        };
        assert_eq!(state.analysis().map(|a| a.id), Some(analysis.id));
        assert_eq!(state.error().map(|e| e.kind()), Some(crate::error::ErrorKind::NetworkUnavailable));
    }

    #[test]
    fn test_state_serializes_for_presentation() {
        let state = SessionState::QueryInFlight {
            analysis: AnalysisResult::new("text", "summary"),
            exchanges: vec![],
            question: "Can I drive?".into(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "queryInFlight");
        assert_eq!(json["question"], "Can I drive?");
        assert_eq!(json["analysis"]["extractedText"], "text");

        let json = serde_json::to_value(SessionState::Idle).unwrap();
        assert_eq!(json["status"], "idle");
    }

    #[test]
    fn test_analysis_results_get_distinct_ids() {
        let a = AnalysisResult::new("same", "same");
        let b = AnalysisResult::new("same", "same");
        assert_ne!(a.id, b.id);
    }
}
