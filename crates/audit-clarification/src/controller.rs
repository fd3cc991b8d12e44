//! Clarification controller
//!
//! Gates each chat query on the backend's context-sufficiency oracle. When
//! the oracle asks for something, the query is parked as a
//! [`PendingClarification`] in memory and in durable storage until the user
//! supplies the missing context or cancels.

use crate::error::StoreError;
use crate::pending::{PendingClarification, PendingRequestStore};
use crate::storage::KeyValueStore;
use audit_gateway::{BackendGateway, ContextFlags};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Result of gating one query
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// Chat is suspended until the request is satisfied
    NeedsAction {
        request: Value,
        reasoning: Option<String>,
    },
    /// Query goes to the normal chat path unchanged
    ///
    /// `error` is set when the oracle could not be consulted.
    Proceed { query: String, error: Option<String> },
    /// The oracle asked for clarification, but a newer analysis, `cancel` or
    /// `resolve` happened while this one was in flight, so the chat was not
    /// re-parked. Replies that let the query through are never superseded.
    Superseded,
}

impl AnalysisOutcome {
    #[inline]
    #[must_use]
    pub fn needs_action(&self) -> bool {
        matches!(self, Self::NeedsAction { .. })
    }

    /// Oracle failure message, if the gate failed open
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Proceed { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}

/// Agent clarification loop
pub struct ClarificationController {
    gateway: Arc<dyn BackendGateway>,
    store: PendingRequestStore,
    // Serializes durable writes with the sequence check. Readers only take `pending`.
    writer: Mutex<()>,
    pending: Mutex<Option<PendingClarification>>,
    last_error: Mutex<Option<String>>,
    sequence: AtomicU64,
}

impl ClarificationController {
    /// Create a controller, restoring any persisted pending request
    #[must_use]
    pub fn new(gateway: Arc<dyn BackendGateway>, store: Arc<dyn KeyValueStore>) -> Self {
        let store = PendingRequestStore::new(store);
        let pending = store.load();
        if let Some(restored) = &pending {
            tracing::info!(
                kind = %restored.kind(),
                query = %restored.original_query,
                "restored pending clarification"
            );
        }

        Self {
            gateway,
            store,
            writer: Mutex::new(()),
            pending: Mutex::new(pending),
            last_error: Mutex::new(None),
            sequence: AtomicU64::new(0),
        }
    }

    /// Current pending clarification
    #[must_use]
    pub fn pending(&self) -> Option<PendingClarification> {
        self.pending.lock().clone()
    }

    /// Whether the chat is suspended
    #[inline]
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Message of the last fail-open analysis, cleared by the next successful one
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Ask the oracle whether `user_input` can be answered with the loaded context
    ///
    /// Never fails: oracle errors let the query through with
    /// `Proceed { error: Some(..) }`.
    pub async fn analyze_query(&self, user_input: &str, flags: ContextFlags) -> AnalysisOutcome {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(seq, ?flags, "analyzing query");

        let result = self.gateway.analyze_query(user_input, flags).await;
        let current = self.sequence.load(Ordering::SeqCst) == seq;

        let analysis = match result {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(error = %e, "query analysis failed, proceeding without gate");
                let message = e.to_string();
                if current {
                    *self.last_error.lock() = Some(message.clone());
                }
                return AnalysisOutcome::Proceed {
                    query: user_input.to_string(),
                    error: Some(message),
                };
            }
        };
        if current {
            *self.last_error.lock() = None;
        }

        if !analysis.requires_clarification() {
            return AnalysisOutcome::Proceed {
                query: user_input.to_string(),
                error: None,
            };
        }

        let request = analysis.agent_request.unwrap_or(Value::Null);
        let parked = PendingClarification::new(request.clone(), user_input);
        if !self.park(seq, parked) {
            tracing::debug!(seq, "dropping superseded clarification");
            return AnalysisOutcome::Superseded;
        }

        AnalysisOutcome::NeedsAction {
            request,
            reasoning: analysis.reasoning,
        }
    }

    /// Drop the pending clarification without resubmitting
    ///
    /// # Errors
    /// - `StoreError` if the durable copy cannot be removed; the in-memory
    ///   copy is then kept too
    pub fn cancel(&self) -> Result<(), StoreError> {
        if self.take()?.is_some() {
            tracing::info!("pending clarification cancelled");
        }
        Ok(())
    }

    /// Mark the missing context as supplied and hand back the parked query
    ///
    /// # Errors
    /// - `StoreError` if the durable copy cannot be removed; the in-memory
    ///   copy is then kept too
    pub fn resolve(&self) -> Result<Option<PendingClarification>, StoreError> {
        let resolved = self.take()?;
        if let Some(resolved) = &resolved {
            tracing::info!(kind = %resolved.kind(), "pending clarification resolved");
        }
        Ok(resolved)
    }

    /// Resolve and re-run the analysis for the parked query
    ///
    /// Returns `None` when nothing was pending.
    ///
    /// # Errors
    /// - `StoreError` if the durable copy cannot be removed
    pub async fn resume(&self, flags: ContextFlags) -> Result<Option<AnalysisOutcome>, StoreError> {
        let Some(resolved) = self.resolve()? else {
            return Ok(None);
        };
        Ok(Some(self.analyze_query(&resolved.original_query, flags).await))
    }

    /// Persist then publish `parked`, unless `seq` is no longer the newest
    /// analysis. The durable slot ends up holding `parked` or nothing.
    fn park(&self, seq: u64, parked: PendingClarification) -> bool {
        let _writer = self.writer.lock();
        if self.sequence.load(Ordering::SeqCst) != seq {
            return false;
        }

        if let Err(e) = self.store.save(&parked) {
            tracing::error!(error = %e, "failed to persist pending clarification");
            if let Err(e) = self.store.clear() {
                tracing::error!(error = %e, "failed to clear previous pending clarification");
            }
        }
        tracing::info!(kind = %parked.kind(), "chat suspended on clarification");
        *self.pending.lock() = Some(parked);
        true
    }

    fn take(&self) -> Result<Option<PendingClarification>, StoreError> {
        let _writer = self.writer.lock();
        // Invalidate in-flight analyses so none re-parks the chat afterwards.
        self.sequence.fetch_add(1, Ordering::SeqCst);
        self.store.clear()?;
        Ok(self.pending.lock().take())
    }
}

impl std::fmt::Debug for ClarificationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClarificationController")
            .field("pending", &*self.pending.lock())
            .field("sequence", &self.sequence.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::{ORIGINAL_QUERY_KEY, PENDING_REQUEST_KEY};
    use crate::storage::MemoryStore;
    use audit_gateway::{endpoints, GatewayError, QueryAnalysis};
    use audit_test_utils::{blocked, transport_error, ScriptedGateway};
    use serde_json::json;

    /// Reads succeed, writes fail
    struct ReadOnlyStore(MemoryStore);

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.0.get(key)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("read-only".to_string()))
        }

        fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("read-only".to_string()))
        }
    }

    /// Accepts the first `budget` multi-key writes, then fails every write
    struct FailingAfterStore {
        inner: MemoryStore,
        budget: AtomicU64,
    }

    impl FailingAfterStore {
        fn new(inner: MemoryStore, budget: u64) -> Self {
            Self {
                inner,
                budget: AtomicU64::new(budget),
            }
        }
    }

    impl KeyValueStore for FailingAfterStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.set(key, value)
        }

        fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.inner.delete(key)
        }

        fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
            let left = self.budget.load(Ordering::SeqCst);
            if left == 0 {
                return Err(StoreError::Backend("disk full".to_string()));
            }
            self.budget.store(left - 1, Ordering::SeqCst);
            self.inner.set_many(entries)
        }
    }

    fn setup() -> (Arc<ScriptedGateway>, MemoryStore, ClarificationController) {
        let gateway = Arc::new(ScriptedGateway::new());
        let memory = MemoryStore::new();
        let controller = ClarificationController::new(gateway.clone(), Arc::new(memory.clone()));
        (gateway, memory, controller)
    }

    #[tokio::test]
    async fn proceed_passes_query_through() {
        let (gateway, memory, controller) = setup();
        gateway.push_analysis(Ok(QueryAnalysis::proceed()));

        let outcome = controller
            .analyze_query("Summarize control CTL-004", ContextFlags::none().with_kb(true))
            .await;

        assert_eq!(
            outcome,
            AnalysisOutcome::Proceed {
                query: "Summarize control CTL-004".to_string(),
                error: None
            }
        );
        assert!(!controller.is_suspended());
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn oracle_failure_fails_open() {
        let (gateway, memory, controller) = setup();
        gateway.push_analysis(Err(transport_error(endpoints::ANALYZE_QUERY)));

        let outcome = controller.analyze_query("hello", ContextFlags::none()).await;

        assert!(outcome.error().unwrap().contains("connection refused"));
        assert!(matches!(outcome, AnalysisOutcome::Proceed { ref query, .. } if query == "hello"));
        assert!(controller.last_error().is_some());
        assert!(!controller.is_suspended());
        assert!(memory.is_empty());

        gateway.push_analysis(Ok(QueryAnalysis::proceed()));
        controller.analyze_query("hello", ContextFlags::none()).await;
        assert!(controller.last_error().is_none());
    }

    #[tokio::test]
    async fn malformed_reply_fails_open() {
        let (gateway, _, controller) = setup();
        gateway.push_analysis(Err(GatewayError::malformed(endpoints::ANALYZE_QUERY, "expected value")));

        let outcome = controller.analyze_query("q", ContextFlags::none()).await;
        assert!(!outcome.needs_action());
        assert!(outcome.error().is_some());
    }

    #[tokio::test]
    async fn clarification_wins_over_proceed() {
        let (gateway, _, controller) = setup();
        let mut analysis = blocked("need_company", "company profile missing");
        analysis.can_proceed = true;
        analysis.clarification_needed = Some(true);
        gateway.push_analysis(Ok(analysis));

        let outcome = controller.analyze_query("Who owns IT?", ContextFlags::none()).await;
        assert!(outcome.needs_action());
        assert_eq!(
            controller.pending().unwrap().kind(),
            crate::pending::ClarificationKind::CompanyContext
        );
    }

    #[tokio::test]
    async fn missing_agent_request_is_stored_as_null() {
        let (gateway, memory, controller) = setup();
        gateway.push_analysis(Ok(QueryAnalysis {
            can_proceed: false,
            clarification_needed: None,
            agent_request: None,
            reasoning: None,
        }));

        let outcome = controller.analyze_query("q", ContextFlags::none()).await;
        assert_eq!(
            outcome,
            AnalysisOutcome::NeedsAction {
                request: Value::Null,
                reasoning: None
            }
        );
        assert_eq!(memory.get(PENDING_REQUEST_KEY).unwrap().as_deref(), Some("null"));
    }

    #[tokio::test]
    async fn new_request_overwrites_old() {
        let (gateway, memory, controller) = setup();
        gateway.push_analysis(Ok(blocked("need_kb", "no kb")));
        gateway.push_analysis(Ok(blocked("need_evidence", "no evidence")));

        controller.analyze_query("first", ContextFlags::none()).await;
        controller.analyze_query("second", ContextFlags::none()).await;

        let pending = controller.pending().unwrap();
        assert_eq!(pending.original_query, "second");
        assert_eq!(memory.get(ORIGINAL_QUERY_KEY).unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn persist_failure_still_suspends_in_memory() {
        let gateway = Arc::new(ScriptedGateway::new());
        let controller =
            ClarificationController::new(gateway.clone(), Arc::new(ReadOnlyStore(MemoryStore::new())));
        gateway.push_analysis(Ok(blocked("need_kb", "no knowledge base loaded")));

        let outcome = controller.analyze_query("q", ContextFlags::none()).await;

        assert!(outcome.needs_action());
        assert!(controller.is_suspended());
    }

    #[tokio::test]
    async fn failed_overwrite_does_not_leave_old_request_on_disk() {
        let gateway = Arc::new(ScriptedGateway::new());
        let memory = MemoryStore::new();
        let controller = ClarificationController::new(
            gateway.clone(),
            Arc::new(FailingAfterStore::new(memory.clone(), 1)),
        );
        gateway.push_analysis(Ok(blocked("need_kb", "no kb")));
        gateway.push_analysis(Ok(blocked("need_company", "no company")));

        controller.analyze_query("first", ContextFlags::none()).await;
        assert_eq!(memory.get(ORIGINAL_QUERY_KEY).unwrap().as_deref(), Some("first"));

        let outcome = controller.analyze_query("second", ContextFlags::none()).await;
        assert!(outcome.needs_action());
        assert_eq!(controller.pending().unwrap().original_query, "second");
        assert!(memory.is_empty());

        let reloaded = ClarificationController::new(gateway, Arc::new(memory));
        assert_eq!(reloaded.pending(), None);
    }

    #[tokio::test]
    async fn proceed_reply_after_cancel_still_passes_through() {
        let (gateway, memory, controller) = setup();
        let controller = Arc::new(controller);
        gateway.push_analysis(Ok(QueryAnalysis::proceed()));

        let gate = gateway.hold_next_call();
        let in_flight = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.analyze_query("q", ContextFlags::none()).await })
        };
        gate.wait_entered().await;

        controller.cancel().unwrap();
        gate.release();

        assert_eq!(
            in_flight.await.unwrap(),
            AnalysisOutcome::Proceed {
                query: "q".to_string(),
                error: None
            }
        );
        assert!(!controller.is_suspended());
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn failed_cancel_keeps_both_copies() {
        let memory = MemoryStore::new();
        let pending = PendingClarification::new(json!({"type": "need_kb"}), "q");
        PendingRequestStore::new(Arc::new(memory.clone())).save(&pending).unwrap();

        let controller = ClarificationController::new(
            Arc::new(ScriptedGateway::new()),
            Arc::new(ReadOnlyStore(memory.clone())),
        );
        assert!(controller.cancel().is_err());
        assert_eq!(controller.pending(), Some(pending));
        assert!(memory.contains_key(PENDING_REQUEST_KEY));
    }

    #[tokio::test]
    async fn cancel_without_pending_is_noop() {
        let (_, memory, controller) = setup();
        controller.cancel().unwrap();
        assert!(memory.is_empty());
        assert_eq!(controller.resolve().unwrap(), None);
    }

    #[tokio::test]
    async fn resume_without_pending_returns_none() {
        let (gateway, _, controller) = setup();
        assert_eq!(controller.resume(ContextFlags::none()).await.unwrap(), None);
        assert_eq!(gateway.call_count(), 0);
    }
}
