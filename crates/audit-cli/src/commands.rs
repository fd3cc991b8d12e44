//! Subcommand implementations
//!
//! Each command returns data; `main` decides how to print it. The `render_*`
//! helpers produce the plain-text form.

use anyhow::{bail, Context, Result};
use audit_clarification::{AnalysisOutcome, ClarificationController, PendingClarification};
use audit_gateway::{
    BackendGateway, ChecklistItem, ControlStatus, ContextFlags, HealthStatus, UploadFile,
    ValidationStatus,
};
use audit_workflow::{AuditSession, WorkflowController};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of a complete `audit` run
#[derive(Debug, Clone)]
pub struct AuditRun {
    pub session: AuditSession,
    pub workpaper_path: PathBuf,
}

/// Ping the backend
///
/// # Errors
/// Fails if the backend is unreachable or reports itself unhealthy.
pub async fn health(gateway: &dyn BackendGateway) -> Result<HealthStatus> {
    let status = gateway.health().await.context("health check failed")?;
    if !status.is_ok() {
        bail!("backend reported status {:?}", status.status);
    }
    Ok(status)
}

/// Run the clarification gate for one query
///
/// # Errors
/// Refuses while a clarification is pending: the next input answers it, so
/// the user has to `resume` or `cancel` first.
pub async fn ask(
    agent: &ClarificationController,
    query: &str,
    flags: ContextFlags,
) -> Result<AnalysisOutcome> {
    if let Some(pending) = agent.pending() {
        bail!(
            "chat is waiting for {} for {:?}; run `resume` once it is loaded or `cancel`",
            pending.kind(),
            pending.original_query
        );
    }
    Ok(agent.analyze_query(query, flags).await)
}

/// Drive one audit from test script to downloaded workpaper
///
/// Stops before generation when evidence is still missing and lists the
/// pending controls.
///
/// # Errors
/// Fails on unreadable input files, any backend failure, pending controls, or
/// when the workpaper cannot be written to `out_dir`.
pub async fn run_audit(
    gateway: Arc<dyn BackendGateway>,
    script: &Path,
    evidence: &[PathBuf],
    out_dir: &Path,
) -> Result<AuditRun> {
    let workflow = WorkflowController::new(gateway);

    let script_file = UploadFile::read_from(script)
        .await
        .with_context(|| format!("reading test script {}", script.display()))?;
    let session = workflow
        .submit_test_script(script_file)
        .await
        .context("test script upload failed")?;
    tracing::info!(controls = session.controls_found, "checklist extracted");
    for warning in &session.warnings {
        tracing::warn!(%warning, "test script warning");
    }
    workflow.acknowledge_checklist()?;

    let mut files = Vec::with_capacity(evidence.len());
    for path in evidence {
        files.push(
            UploadFile::read_from(path)
                .await
                .with_context(|| format!("reading evidence {}", path.display()))?,
        );
    }
    let session = workflow
        .submit_evidence(files)
        .await
        .context("evidence upload failed")?;

    if !session.ready_to_generate {
        let ids: Vec<&str> = session
            .pending_controls
            .iter()
            .map(|c| c.control_id.as_str())
            .collect();
        bail!(
            "{} control(s) still need evidence: {}",
            ids.len(),
            ids.join(", ")
        );
    }

    workflow
        .generate_workpaper()
        .await
        .context("workpaper generation failed")?;
    let bytes = workflow
        .download_workpaper()
        .await
        .context("workpaper download failed")?;

    let session = workflow.snapshot();
    let filename = session
        .workpaper_filename
        .as_deref()
        .and_then(|name| Path::new(name).file_name())
        .context("backend returned no usable workpaper filename")?;

    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("creating {}", out_dir.display()))?;
    let workpaper_path = out_dir.join(filename);
    tokio::fs::write(&workpaper_path, bytes)
        .await
        .with_context(|| format!("writing {}", workpaper_path.display()))?;
    tracing::info!(path = %workpaper_path.display(), "workpaper saved");

    Ok(AuditRun {
        session,
        workpaper_path,
    })
}

pub fn render_outcome(outcome: &AnalysisOutcome) -> String {
    match outcome {
        AnalysisOutcome::NeedsAction { request, reasoning } => {
            let pending = PendingClarification::new(request.clone(), String::new());
            let mut out = format!("needs {}", pending.kind());
            if let Some(prompt) = pending.prompt() {
                let _ = write!(out, ": {prompt}");
            }
            if let Some(reasoning) = reasoning {
                let _ = write!(out, " ({reasoning})");
            }
            out
        }
        AnalysisOutcome::Proceed { query, error: None } => format!("proceed: {query}"),
        AnalysisOutcome::Proceed {
            query,
            error: Some(error),
        } => format!("proceed: {query} (analysis unavailable: {error})"),
        AnalysisOutcome::Superseded => "superseded by a newer query".to_string(),
    }
}

pub fn render_pending(pending: Option<&PendingClarification>) -> String {
    match pending {
        None => "no pending clarification".to_string(),
        Some(pending) => {
            let mut out = format!(
                "waiting for {} before answering: {}",
                pending.kind(),
                pending.original_query
            );
            if let Some(prompt) = pending.prompt() {
                let _ = write!(out, "\n  {prompt}");
            }
            out
        }
    }
}

fn status_label(item: &ChecklistItem) -> &'static str {
    match item.status {
        ControlStatus::Pending => "pending",
        ControlStatus::Received => "received",
        ControlStatus::Rejected => "rejected",
        ControlStatus::Other => "unknown",
    }
}

/// Checklist, evidence summary and workpaper location of a session
pub fn render_session(session: &AuditSession) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "session {} at {}",
        session.session_id.as_deref().unwrap_or("-"),
        session.current_step
    );

    let _ = writeln!(out, "controls found: {}", session.controls_found);
    for item in &session.evidence_checklist {
        let _ = writeln!(
            out,
            "  [{:<8}] {}  {}",
            status_label(item),
            item.control_id,
            item.control_description
        );
    }

    for file in &session.files_processed {
        let verdict = match file.validation_status {
            ValidationStatus::Accepted => "accepted",
            ValidationStatus::Rejected => "rejected",
            ValidationStatus::Other => "unknown",
        };
        let _ = write!(out, "  {} {verdict}", file.filename);
        if let Some(reason) = &file.reason {
            let _ = write!(out, ": {reason}");
        }
        out.push('\n');
    }

    if let Some(summary) = session.evidence_summary {
        let _ = writeln!(
            out,
            "evidence: {}/{} received, {} pending, {} rejected",
            summary.received, summary.total_controls, summary.pending, summary.rejected
        );
    }
    if let Some(message) = &session.result_message {
        let _ = writeln!(out, "{message}");
    }
    if let Some(url) = &session.download_url {
        let _ = writeln!(out, "download: {url}");
    }
    if let Some(error) = &session.error {
        let _ = writeln!(out, "error: {error}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_blocked_outcome() {
        let outcome = AnalysisOutcome::NeedsAction {
            request: json!({"type": "need_kb", "prompt": "Upload the access policy"}),
            reasoning: Some("no knowledge base loaded".to_string()),
        };
        assert_eq!(
            render_outcome(&outcome),
            "needs knowledge base: Upload the access policy (no knowledge base loaded)"
        );
    }

    #[test]
    fn render_fail_open_outcome() {
        let outcome = AnalysisOutcome::Proceed {
            query: "hi".to_string(),
            error: Some("connection refused".to_string()),
        };
        assert_eq!(
            render_outcome(&outcome),
            "proceed: hi (analysis unavailable: connection refused)"
        );
    }

    #[test]
    fn render_no_pending() {
        assert_eq!(render_pending(None), "no pending clarification");
    }

    #[test]
    fn render_fresh_session() {
        let out = render_session(&AuditSession::new());
        assert!(out.starts_with("session - at upload_script"));
        assert!(out.contains("controls found: 0"));
    }
}
