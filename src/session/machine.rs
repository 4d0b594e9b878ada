//! Session state machine
//!
//! ## Transitions
//!
//! ```text
//! ┌──────┐ request_analysis ┌───────────┐  ok   ┌──────────┐ ask_followup ┌───────────────┐
//! │ Idle │ ───────────────▶ │ Uploading │ ────▶ │ Analyzed │ ───────────▶ │ QueryInFlight │
//! └──────┘                  └───────────┘       └──────────┘ ◀─────────── └───────────────┘
//!                                 │ err           (append exchange)  ok          │ err
//!                                 ▼                                              ▼
//!                           ┌────────────────────── Failed ◀─────────────────────┘
//!                           └─ retry: back to Uploading / QueryInFlight
//!
//! select_document / reset: any state ──▶ Idle
//! ```
//!
//! The state lives behind a mutex that is never held across an `.await`. Each
//! operation is admitted and moved to its in-flight state under one lock
//! acquisition, so two racing callers cannot both start a request. Every started
//! operation takes a fresh flight token; completions carrying an outdated token
//! (the user picked another document meanwhile) are dropped, never applied.

use super::document::{Document, DocumentStore};
use super::types::{AnalysisResult, Completion, FollowupExchange, PendingOperation, SessionState};
use crate::ai::analysis::AnalysisProvider;
use crate::ai::followup::FollowupProvider;
use crate::error::{SessionError, SessionResult};
use crate::identity::Principal;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// Receiver that yields the new state after every transition
pub type SessionWatcher = watch::Receiver<SessionState>;

struct SessionInner {
    store: DocumentStore,
    state: SessionState,
    /// Token of the most recently started operation or document change
    flight: u64,
}

/// An operation admitted by the state machine, ready to hit the network
enum Flight {
    Analysis {
        token: u64,
        document: Arc<Document>,
    },
    Followup {
        token: u64,
        analysis: AnalysisResult,
        question: String,
        asked_at: DateTime<Utc>,
    },
}

enum RetryPlan {
    Analysis,
    Followup {
        analysis: AnalysisResult,
        exchanges: Vec<FollowupExchange>,
        question: String,
    },
}

/// Single-document analysis session with conversational follow-up
pub struct SessionMachine {
    analysis: Arc<dyn AnalysisProvider>,
    followup: Arc<dyn FollowupProvider>,
    principal: Option<Principal>,
    inner: Mutex<SessionInner>,
    notifier: watch::Sender<SessionState>,
}

impl SessionMachine {
    pub fn new(analysis: Arc<dyn AnalysisProvider>, followup: Arc<dyn FollowupProvider>) -> Self {
        let (notifier, _) = watch::channel(SessionState::Idle);

        Self {
            analysis,
            followup,
            principal: None,
            inner: Mutex::new(SessionInner {
                store: DocumentStore::new(),
                state: SessionState::Idle,
                flight: 0,
            }),
            notifier,
        }
    }

    /// Forward this principal's credential on every provider request
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Session state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn set_state(&self, inner: &mut SessionInner, state: SessionState) {
        tracing::debug!(from = inner.state.status(), to = state.status(), "Session transition");
        inner.state = state;
        self.notifier.send_replace(inner.state.clone());
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    /// Observe every state transition
    pub fn subscribe(&self) -> SessionWatcher {
        self.notifier.subscribe()
    }

    pub fn current_document(&self) -> Option<Arc<Document>> {
        self.lock().store.current()
    }

    /// Replace the document and return to `Idle`
    ///
    /// Prior analysis and follow-ups are discarded. A request still in flight is
    /// not cancelled, but its eventual response will be dropped. Rejected
    /// selections leave both the document and the state untouched.
    pub fn select_document(
        &self,
        payload: Vec<u8>,
        media_type: &str,
        name: &str,
    ) -> SessionResult<Arc<Document>> {
        let mut inner = self.lock();
        let document = inner.store.select(payload, media_type, name)?;

        if inner.state.is_in_flight() {
            tracing::info!(
                document = %document.id,
                state = inner.state.status(),
                "New document selected while a request is in flight; its response will be discarded"
            );
        }

        inner.flight += 1;
        self.set_state(&mut inner, SessionState::Idle);
        Ok(document)
    }

    /// Discard the document and all derived state
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.store.clear();
        inner.flight += 1;
        self.set_state(&mut inner, SessionState::Idle);
        tracing::info!("Session reset");
    }

    /// Upload the selected document for OCR and analysis
    ///
    /// Allowed from `Idle`, and from `Failed` when the analysis itself failed
    /// (equivalent to [`SessionMachine::retry`]).
    pub async fn request_analysis(&self) -> SessionResult<AnalysisResult> {
        let flight = {
            let mut inner = self.lock();
            match &inner.state {
                SessionState::Uploading | SessionState::QueryInFlight { .. } => {
                    return Err(SessionError::OperationInProgress);
                }
                SessionState::Analyzed { .. } => {
                    return Err(SessionError::invalid_state("the document has already been analyzed"));
                }
                SessionState::Failed {
                    operation: PendingOperation::Followup { .. },
                    ..
                } => {
                    return Err(SessionError::invalid_state(
                        "retry the failed question or select a new document",
                    ));
                }
                SessionState::Idle
                | SessionState::Failed {
                    operation: PendingOperation::Analysis,
                    ..
                } => {}
            }
            self.start_analysis(&mut inner)?
        };

        self.run_analysis(flight).await
    }

    /// Ask a question about the analyzed document
    ///
    /// The question is kept verbatim in the resulting exchange.
    pub async fn ask_followup(&self, question: &str) -> SessionResult<FollowupExchange> {
        if question.trim().is_empty() {
            return Err(SessionError::InvalidQuestion);
        }

        let flight = {
            let mut inner = self.lock();
            let (analysis, exchanges) = match &inner.state {
                SessionState::Analyzed { analysis, exchanges } => (analysis.clone(), exchanges.clone()),
                SessionState::Uploading | SessionState::QueryInFlight { .. } => {
                    return Err(SessionError::OperationInProgress);
                }
                SessionState::Idle => {
                    return Err(SessionError::invalid_state("no analyzed document to ask about"));
                }
                SessionState::Failed { .. } => {
                    return Err(SessionError::invalid_state(
                        "retry the failed request or select a new document",
                    ));
                }
            };
            self.start_followup(&mut inner, analysis, exchanges, question.to_string())?
        };

        self.run_followup(flight).await
    }

    /// Re-issue the operation that moved the session to `Failed`, with the same input
    pub async fn retry(&self) -> SessionResult<Completion> {
        let flight = {
            let mut inner = self.lock();
            let plan = match &inner.state {
                SessionState::Failed {
                    operation: PendingOperation::Analysis,
                    ..
                } => RetryPlan::Analysis,
                SessionState::Failed {
                    operation: PendingOperation::Followup { question },
                    analysis: Some(analysis),
                    exchanges,
                    ..
                } => RetryPlan::Followup {
                    analysis: analysis.clone(),
                    exchanges: exchanges.clone(),
                    question: question.clone(),
                },
                SessionState::Uploading | SessionState::QueryInFlight { .. } => {
                    return Err(SessionError::OperationInProgress);
                }
                _ => return Err(SessionError::invalid_state("there is no failed request to retry")),
            };

            tracing::info!(state = inner.state.status(), "Retrying failed request");

            match plan {
                RetryPlan::Analysis => self.start_analysis(&mut inner)?,
                RetryPlan::Followup {
                    analysis,
                    exchanges,
                    question,
                } => self.start_followup(&mut inner, analysis, exchanges, question)?,
            }
        };

        match flight {
            Flight::Analysis { .. } => self.run_analysis(flight).await.map(Completion::Analysis),
            Flight::Followup { .. } => self.run_followup(flight).await.map(Completion::Followup),
        }
    }

    fn start_analysis(&self, inner: &mut SessionInner) -> SessionResult<Flight> {
        let document = inner
            .store
            .current()
            .ok_or_else(|| SessionError::invalid_state("no document selected"))?;

        inner.flight += 1;
        let token = inner.flight;
        self.set_state(inner, SessionState::Uploading);

        Ok(Flight::Analysis { token, document })
    }

    fn start_followup(
        &self,
        inner: &mut SessionInner,
        analysis: AnalysisResult,
        exchanges: Vec<FollowupExchange>,
        question: String,
    ) -> SessionResult<Flight> {
        self.followup.check_prompt(&analysis, &question)?;

        inner.flight += 1;
        let token = inner.flight;
        self.set_state(
            inner,
            SessionState::QueryInFlight {
                analysis: analysis.clone(),
                exchanges,
                question: question.clone(),
            },
        );

        Ok(Flight::Followup {
            token,
            analysis,
            question,
            asked_at: Utc::now(),
        })
    }

    async fn run_analysis(&self, flight: Flight) -> SessionResult<AnalysisResult> {
        let Flight::Analysis { token, document } = flight else {
            return Err(SessionError::invalid_state("expected an analysis request"));
        };

        let result = self.analysis.analyze(&document, self.principal.as_ref()).await;

        let mut inner = self.lock();
        if inner.flight != token || !matches!(inner.state, SessionState::Uploading) {
            tracing::warn!(
                document = %document.id,
                succeeded = result.is_ok(),
                "Discarding stale analysis response"
            );
            return Err(SessionError::StaleResponseDiscarded);
        }

        match result {
            Ok(analysis) => {
                self.set_state(
                    &mut inner,
                    SessionState::Analyzed {
                        analysis: analysis.clone(),
                        exchanges: Vec::new(),
                    },
                );
                Ok(analysis)
            }
            Err(error) => {
                self.set_state(
                    &mut inner,
                    SessionState::Failed {
                        analysis: None,
                        exchanges: Vec::new(),
                        error: error.clone(),
                        operation: PendingOperation::Analysis,
                    },
                );
                Err(error)
            }
        }
    }

    async fn run_followup(&self, flight: Flight) -> SessionResult<FollowupExchange> {
        let Flight::Followup {
            token,
            analysis,
            question,
            asked_at,
        } = flight
        else {
            return Err(SessionError::invalid_state("expected a follow-up request"));
        };

        let result = self
            .followup
            .ask(&analysis, &question, self.principal.as_ref())
            .await;

        let mut inner = self.lock();
        let current_flight = inner.flight;
        let exchanges = match &mut inner.state {
            SessionState::QueryInFlight {
                analysis: bound,
                exchanges,
                ..
            } if current_flight == token && bound.id == analysis.id => Some(std::mem::take(exchanges)),
            _ => None,
        };
        let Some(mut exchanges) = exchanges else {
            tracing::warn!(
                analysis = %analysis.id,
                succeeded = result.is_ok(),
                "Discarding stale follow-up response"
            );
            return Err(SessionError::StaleResponseDiscarded);
        };

        match result {
            Ok(answer) => {
                let exchange = FollowupExchange {
                    question,
                    answer,
                    asked_at,
                };
                exchanges.push(exchange.clone());
                self.set_state(&mut inner, SessionState::Analyzed { analysis, exchanges });
                Ok(exchange)
            }
            Err(error) => {
                self.set_state(
                    &mut inner,
                    SessionState::Failed {
                        analysis: Some(analysis),
                        exchanges,
                        error: error.clone(),
                        operation: PendingOperation::Followup { question },
                    },
                );
                Err(error)
            }
        }
    }
}
