//! Workflow controller
//!
//! Drives one [`AuditSession`] through its lifecycle:
//! - Validates step and busy preconditions before any backend call
//! - Holds `is_processing` for the duration of each call (single flight)
//! - Merges backend replies and records failures in the session
//!
//! The session lives behind a `parking_lot::Mutex` that is never held across
//! an `.await`. Every call captures the session epoch when it starts;
//! `reset()` bumps the epoch so late replies are dropped rather than merged
//! into the fresh session.

use crate::error::WorkflowError;
use crate::session::{AuditSession, WorkflowStep};
use audit_gateway::{endpoints, BackendGateway, GatewayError, UploadFile};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Default)]
struct SessionCell {
    session: AuditSession,
    epoch: u64,
}

/// Owner of the live audit session
pub struct WorkflowController {
    gateway: Arc<dyn BackendGateway>,
    state: Mutex<SessionCell>,
}

impl WorkflowController {
    /// Create controller with a fresh session
    #[must_use]
    pub fn new(gateway: Arc<dyn BackendGateway>) -> Self {
        Self {
            gateway,
            state: Mutex::new(SessionCell::default()),
        }
    }

    /// Copy of the current session for rendering
    #[must_use]
    pub fn snapshot(&self) -> AuditSession {
        self.state.lock().session.clone()
    }

    /// Current step
    #[must_use]
    pub fn current_step(&self) -> WorkflowStep {
        self.state.lock().session.current_step
    }

    /// Whether a backend call is outstanding
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.state.lock().session.is_processing
    }

    /// Upload the test script and derive the evidence checklist
    ///
    /// # Errors
    /// - `WorkflowError::Busy` / `WrongStep` before any call is made
    /// - `WorkflowError::Gateway` if the backend call fails; the session
    ///   stays at `upload_script` with `error` set
    pub async fn submit_test_script(&self, file: UploadFile) -> Result<AuditSession, WorkflowError> {
        let (epoch, ()) = self.begin(WorkflowStep::UploadScript, |_| Ok(()))?;
        tracing::info!(filename = %file.filename, bytes = file.len(), "submitting test script");

        let result = self.gateway.upload_script(&file).await;

        self.finish(epoch, move |session| match result {
            Ok(analysis) => {
                tracing::info!(
                    session_id = %analysis.session_id,
                    controls = analysis.controls_found,
                    warnings = analysis.warnings.len(),
                    "test script analysed"
                );
                session.apply_script_analysis(file, analysis);
                session.advance(WorkflowStep::ReviewChecklist)
            }
            Err(e) => Err(record_failure(session, e)),
        })
    }

    /// Accept the checklist and move on to evidence collection
    ///
    /// # Errors
    /// - `WorkflowError::Busy` / `WrongStep`
    pub fn acknowledge_checklist(&self) -> Result<AuditSession, WorkflowError> {
        let mut cell = self.state.lock();
        let session = &mut cell.session;
        check_preconditions(session, WorkflowStep::ReviewChecklist)?;

        session.advance(WorkflowStep::UploadEvidence)?;
        session.error = None;
        Ok(session.clone())
    }

    /// Add evidence files and validate the whole accumulated set
    ///
    /// The files are appended before the call and kept even if it fails, so a
    /// retry does not need the user to select them again.
    ///
    /// # Errors
    /// - `WorkflowError::Busy` if another call is outstanding (no queueing)
    /// - `WorkflowError::WrongStep` / `MissingSessionId`
    /// - `WorkflowError::Gateway` if the call fails or the summary does not
    ///   reconcile; `files_processed` is left untouched
    pub async fn submit_evidence(&self, files: Vec<UploadFile>) -> Result<AuditSession, WorkflowError> {
        let (epoch, (session_id, all_files)) = self.begin(WorkflowStep::UploadEvidence, |session| {
            let session_id = session
                .session_id
                .clone()
                .ok_or(WorkflowError::MissingSessionId)?;
            session.evidence_files.extend(files);
            Ok((session_id, session.evidence_files.clone()))
        })?;
        tracing::info!(%session_id, files = all_files.len(), "submitting evidence");

        let result = self.gateway.upload_evidence(&session_id, &all_files).await;

        self.finish(epoch, move |session| {
            let validation = match result {
                Ok(v) => match v.evidence_summary {
                    Some(summary) if !summary.reconciles() => {
                        let e = GatewayError::malformed(
                            endpoints::UPLOAD_EVIDENCE,
                            format!(
                                "evidence summary does not reconcile: {} received + {} pending + {} rejected != {} total",
                                summary.received, summary.pending, summary.rejected, summary.total_controls
                            ),
                        );
                        return Err(record_failure(session, e));
                    }
                    _ => v,
                },
                Err(e) => return Err(record_failure(session, e)),
            };

            session.apply_evidence_validation(validation);
            tracing::info!(
                pending = session.pending_controls.len(),
                ready = session.ready_to_generate,
                "evidence validated"
            );
            Ok(())
        })
    }

    /// Generate the workpaper
    ///
    /// # Errors
    /// - `WorkflowError::Busy` / `WrongStep` / `NotReady` / `MissingSessionId`
    /// - `WorkflowError::Gateway` if generation fails; the session returns to
    ///   `upload_evidence` with `error` set
    pub async fn generate_workpaper(&self) -> Result<AuditSession, WorkflowError> {
        let (epoch, session_id) = self.begin(WorkflowStep::UploadEvidence, |session| {
            if !session.ready_to_generate {
                return Err(WorkflowError::NotReady {
                    pending: session.pending_controls.len(),
                });
            }
            let session_id = session
                .session_id
                .clone()
                .ok_or(WorkflowError::MissingSessionId)?;
            session.advance(WorkflowStep::Generating)?;
            Ok(session_id)
        })?;
        tracing::info!(%session_id, "generating workpaper");

        let result = self.gateway.generate_workpaper(&session_id).await;

        self.finish(epoch, move |session| match result {
            Ok(workpaper) => {
                tracing::info!(filename = %workpaper.workpaper_filename, "workpaper generated");
                session.apply_workpaper(workpaper);
                session.advance(WorkflowStep::Results)
            }
            Err(e) => {
                let err = record_failure(session, e);
                session.advance(WorkflowStep::UploadEvidence)?;
                Err(err)
            }
        })
    }

    /// Fetch the generated workpaper document
    ///
    /// Does not change the step; a failure only sets `error`.
    ///
    /// # Errors
    /// - `WorkflowError::Busy` / `WrongStep` / `MissingWorkpaper`
    /// - `WorkflowError::Gateway` if the download fails
    pub async fn download_workpaper(&self) -> Result<Vec<u8>, WorkflowError> {
        let (epoch, filename) = self.begin(WorkflowStep::Results, |session| {
            session
                .workpaper_filename
                .clone()
                .ok_or(WorkflowError::MissingWorkpaper)
        })?;

        let result = self.gateway.download_workpaper(&filename).await;

        let mut bytes = None;
        self.finish(epoch, |session| match result {
            Ok(body) => {
                tracing::info!(%filename, bytes = body.len(), "workpaper downloaded");
                session.error = None;
                bytes = Some(body);
                Ok(())
            }
            Err(e) => Err(record_failure(session, e)),
        })?;
        Ok(bytes.unwrap_or_default())
    }

    /// Discard the session and start over
    pub fn reset(&self) {
        let mut cell = self.state.lock();
        cell.epoch += 1;
        cell.session = AuditSession::new();
        tracing::info!(epoch = cell.epoch, "audit session reset");
    }

    /// Check preconditions, let `prepare` stage the call, then mark the
    /// session busy. Nothing is mutated if any check fails.
    fn begin<T>(
        &self,
        expected: WorkflowStep,
        prepare: impl FnOnce(&mut AuditSession) -> Result<T, WorkflowError>,
    ) -> Result<(u64, T), WorkflowError> {
        let mut cell = self.state.lock();
        let epoch = cell.epoch;
        let session = &mut cell.session;

        check_preconditions(session, expected)?;
        let prepared = prepare(session)?;
        session.is_processing = true;
        Ok((epoch, prepared))
    }

    /// Release the busy flag and merge a reply, unless the session was reset
    /// while the call was outstanding.
    fn finish(
        &self,
        epoch: u64,
        apply: impl FnOnce(&mut AuditSession) -> Result<(), WorkflowError>,
    ) -> Result<AuditSession, WorkflowError> {
        let mut cell = self.state.lock();
        if cell.epoch != epoch {
            tracing::warn!(call_epoch = epoch, epoch = cell.epoch, "dropping reply for a reset session");
            return Err(WorkflowError::Superseded);
        }

        let session = &mut cell.session;
        session.is_processing = false;
        apply(session)?;
        Ok(session.clone())
    }
}

impl fmt::Debug for WorkflowController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.state.lock();
        f.debug_struct("WorkflowController")
            .field("step", &cell.session.current_step)
            .field("session_id", &cell.session.session_id)
            .field("epoch", &cell.epoch)
            .finish_non_exhaustive()
    }
}

fn check_preconditions(session: &AuditSession, expected: WorkflowStep) -> Result<(), WorkflowError> {
    if session.is_processing {
        tracing::warn!(step = %session.current_step, "rejected: call already in progress");
        return Err(WorkflowError::Busy);
    }
    if session.current_step != expected {
        tracing::warn!(expected = %expected, actual = %session.current_step, "rejected: wrong step");
        return Err(WorkflowError::WrongStep {
            expected,
            actual: session.current_step,
        });
    }
    Ok(())
}

fn record_failure(session: &mut AuditSession, error: GatewayError) -> WorkflowError {
    tracing::warn!(step = %session.current_step, error = %error, "backend call failed");
    session.error = Some(error.to_string());
    WorkflowError::Gateway(error)
}
