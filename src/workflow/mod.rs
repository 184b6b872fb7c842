//! Generation workflow — submit, wait or poll, append.
//!
//! ## Lifecycle
//!
//! 1. Read the document and the trigger line; gate on the language profile
//! 2. Claim the document in the in-flight registry (one run per document)
//! 3. Submit the job once (never retried)
//! 4. If the submit response is final, use it; otherwise poll on a fixed
//!    interval, bounded by attempts and elapsed time, until a terminal result
//! 5. Append the payload, or a failure comment, via `append_with_spacing`
//!
//! Every error ends as an [`Outcome`]; nothing escapes to the host.

pub mod in_flight;
pub mod request;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ClientError, GenerationResult, GenerationService, GenerationStatus};
use crate::config::{IdentifierMode, TenerateConfig, ValidationPolicy};
use crate::document::{DocumentEditor, DocumentError};
use crate::language::LanguageProfile;
use crate::notify::Notifier;

pub use in_flight::{InFlight, InFlightGuard};
pub use request::{document_identifier, GenerationRequest};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("generation service reported failure: {0}")]
    ServiceFailed(String),

    #[error("no result after {attempts} polls ({elapsed:?})")]
    PollingExhausted { attempts: u32, elapsed: Duration },

    #[error("cancelled")]
    Cancelled,
}

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    /// Payload appended. `assertions` counts asserting lines in it.
    Generated { assertions: usize },
    /// Failure comment appended.
    Failed(WorkflowError),
    /// Entry guard failed under `ValidationPolicy::Ignore`.
    Skipped,
    /// Entry guard failed under `ValidationPolicy::Notify`. Always `Validation`.
    Rejected(WorkflowError),
    /// Another run already holds this document.
    Busy,
    /// Cancelled before a result arrived; the document is untouched.
    Cancelled,
    /// Reading or editing the document failed.
    EditFailed(DocumentError),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_) | Outcome::EditFailed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkflowState {
    Idle,
    Submitting,
    WaitingImmediate,
    Polling,
    Done,
}

/// Knobs the workflow reads from config.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub max_poll_duration: Duration,
    pub identifier_mode: IdentifierMode,
    pub validation_policy: ValidationPolicy,
}

impl From<&TenerateConfig> for WorkflowSettings {
    fn from(config: &TenerateConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_poll_attempts: config.max_poll_attempts,
            max_poll_duration: config.max_poll_duration(),
            identifier_mode: config.identifier_mode,
            validation_policy: config.validation_policy,
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self::from(&TenerateConfig::default())
    }
}

/// Orchestrates one generation per `run` call. Cheap to clone.
#[derive(Clone)]
pub struct GenerationWorkflow {
    service: Arc<dyn GenerationService>,
    notifier: Arc<dyn Notifier>,
    settings: WorkflowSettings,
    in_flight: InFlight,
}

impl GenerationWorkflow {
    pub fn new(
        service: Arc<dyn GenerationService>,
        notifier: Arc<dyn Notifier>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            service,
            notifier,
            settings,
            in_flight: InFlight::new(),
        }
    }

    /// Share an existing registry (e.g. one per editor session).
    pub fn with_in_flight(mut self, in_flight: InFlight) -> Self {
        self.in_flight = in_flight;
        self
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Run the workflow for the zero-based `cursor_line` of `editor`'s document.
    pub async fn run(
        &self,
        profile: &LanguageProfile,
        editor: &DocumentEditor,
        cursor_line: usize,
        cancel: &CancellationToken,
    ) -> Outcome {
        let mut state = WorkflowState::Idle;

        let (text, line) = match read_trigger(editor, cursor_line).await {
            Ok(v) => v,
            Err(DocumentError::LineOutOfRange { .. }) => {
                return self.reject(format!("line {} is outside the document", cursor_line + 1));
            }
            Err(e) => {
                self.notifier.error(&format!("Could not read document: {e}"));
                return Outcome::EditFailed(e);
            }
        };

        if !profile.is_function_definition_line(&line) {
            return self.reject("Place the cursor on a function definition to generate tests".into());
        }

        let uri = editor.uri();
        let request =
            GenerationRequest::new(profile, self.settings.identifier_mode, &uri, text, line);
        let key = request
            .document_identifier
            .clone()
            .unwrap_or_else(|| uri.clone());

        let Some(_guard) = self.in_flight.try_acquire(&key) else {
            info!(%uri, "generation already in flight, ignoring request");
            self.notifier
                .info("Test generation is already running for this document");
            return Outcome::Busy;
        };

        info!(%uri, function = %request.function_name, "starting test generation");

        match self.drive(&request, cancel, &mut state).await {
            Ok(payload) => {
                transition(&mut state, WorkflowState::Done);
                let assertions = profile.count_assertions(&payload);
                if let Err(e) = editor.append_with_spacing(&payload).await {
                    self.notifier
                        .error(&format!("Generated tests could not be written: {e}"));
                    return Outcome::EditFailed(e);
                }
                self.notifier.info(&format!(
                    "Test generation is now complete ({assertions} assertions)"
                ));
                Outcome::Generated { assertions }
            }
            Err(WorkflowError::Cancelled) => {
                info!(%uri, "test generation cancelled");
                Outcome::Cancelled
            }
            Err(err) => {
                transition(&mut state, WorkflowState::Done);
                warn!(%uri, error = %err, "test generation failed");
                if let Err(e) = editor.append_with_spacing(&profile.failure_comment()).await {
                    self.notifier
                        .error(&format!("Failure comment could not be written: {e}"));
                    return Outcome::EditFailed(e);
                }
                self.notifier
                    .error(&format!("Test generation failed: {err}"));
                Outcome::Failed(err)
            }
        }
    }

    /// Apply the validation policy to a failed entry guard.
    pub(crate) fn reject(&self, reason: String) -> Outcome {
        match self.settings.validation_policy {
            ValidationPolicy::Ignore => {
                debug!(%reason, "entry guard failed, skipping");
                Outcome::Skipped
            }
            ValidationPolicy::Notify => {
                self.notifier.info(&reason);
                Outcome::Rejected(WorkflowError::Validation(reason))
            }
        }
    }

    /// Submit, then wait on the immediate result or poll. Returns the payload.
    async fn drive(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
        state: &mut WorkflowState,
    ) -> Result<String, WorkflowError> {
        transition(state, WorkflowState::Submitting);
        let id = request.identifier();
        let body = request.submit_body();

        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WorkflowError::Cancelled),
            r = self.service.submit(id, &body) => r?,
        };

        match submitted.status {
            GenerationStatus::Success => {
                transition(state, WorkflowState::WaitingImmediate);
                return take_payload(submitted);
            }
            GenerationStatus::Failure => return Err(service_failed(submitted)),
            GenerationStatus::Pending => {
                if let Some(message) = &submitted.message {
                    self.notifier.info(message);
                }
            }
        }

        transition(state, WorkflowState::Polling);
        self.poll_until_done(id, cancel).await
    }

    async fn poll_until_done(
        &self,
        id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, WorkflowError> {
        let period = self.settings.poll_interval;
        let started = Instant::now();
        let mut ticker = tokio::time::interval_at(started + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempts = 0u32;

        loop {
            let elapsed = started.elapsed();
            if attempts >= self.settings.max_poll_attempts
                || elapsed >= self.settings.max_poll_duration
            {
                return Err(WorkflowError::PollingExhausted { attempts, elapsed });
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WorkflowError::Cancelled),
                _ = ticker.tick() => {}
            }

            attempts += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WorkflowError::Cancelled),
                r = self.service.poll(id) => r?,
            };

            match result.status {
                GenerationStatus::Pending => {
                    debug!(attempts, "generation still pending");
                }
                GenerationStatus::Success => return take_payload(result),
                GenerationStatus::Failure => return Err(service_failed(result)),
            }
        }
    }
}

impl std::fmt::Debug for GenerationWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationWorkflow")
            .field("settings", &self.settings)
            .finish()
    }
}

fn transition(state: &mut WorkflowState, next: WorkflowState) {
    debug!(from = ?*state, to = ?next, "workflow transition");
    *state = next;
}

async fn read_trigger(
    editor: &DocumentEditor,
    cursor_line: usize,
) -> Result<(String, String), DocumentError> {
    let text = editor.text().await?;
    let line = editor.line_at(cursor_line).await?;
    Ok((text, line))
}

fn take_payload(result: GenerationResult) -> Result<String, WorkflowError> {
    result.payload_text.ok_or_else(|| {
        WorkflowError::Client(ClientError::MalformedResponse(
            "success without payload".into(),
        ))
    })
}

fn service_failed(result: GenerationResult) -> WorkflowError {
    WorkflowError::ServiceFailed(result.message.unwrap_or_else(|| "no details".into()))
}
