//! Durable pending clarification
//!
//! A suspended chat is stored under two keys: the backend's request payload
//! (JSON) and the query that triggered it. Both are written together and
//! removed together; a slot holding only one of them is treated as corrupt.

use crate::error::StoreError;
use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Key holding the serialized clarification request
pub const PENDING_REQUEST_KEY: &str = "agent_pending_request";

/// Key holding the query that triggered the request
pub const ORIGINAL_QUERY_KEY: &str = "agent_original_query";

/// What the backend is asking for before it will answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarificationKind {
    KnowledgeBase,
    CompanyContext,
    Evidence,
    Other(String),
    Unspecified,
}

impl fmt::Display for ClarificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KnowledgeBase => f.write_str("knowledge base"),
            Self::CompanyContext => f.write_str("company context"),
            Self::Evidence => f.write_str("evidence"),
            Self::Other(tag) => f.write_str(tag),
            Self::Unspecified => f.write_str("unspecified"),
        }
    }
}

/// A chat suspended on a clarification request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingClarification {
    /// Opaque backend payload, e.g. `{"type": "need_kb"}`
    pub request: Value,
    pub original_query: String,
}

impl PendingClarification {
    #[inline]
    #[must_use]
    pub fn new(request: Value, original_query: impl Into<String>) -> Self {
        Self {
            request,
            original_query: original_query.into(),
        }
    }

    /// Interpret the request's `type` tag
    #[must_use]
    pub fn kind(&self) -> ClarificationKind {
        match self.request.get("type").and_then(Value::as_str) {
            Some("need_kb") => ClarificationKind::KnowledgeBase,
            Some("need_company") => ClarificationKind::CompanyContext,
            Some("need_evidence") => ClarificationKind::Evidence,
            Some(other) => ClarificationKind::Other(other.to_string()),
            None => ClarificationKind::Unspecified,
        }
    }

    /// Human-readable prompt carried by the request, if any
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        ["prompt", "message"]
            .iter()
            .find_map(|field| self.request.get(field).and_then(Value::as_str))
    }
}

/// Reads and writes the pending clarification through a [`KeyValueStore`]
#[derive(Clone)]
pub struct PendingRequestStore {
    store: Arc<dyn KeyValueStore>,
}

impl PendingRequestStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Write both keys in one call, replacing any previous request
    ///
    /// # Errors
    /// - `StoreError` if the request cannot be encoded or written
    pub fn save(&self, pending: &PendingClarification) -> Result<(), StoreError> {
        let request = serde_json::to_string(&pending.request)?;
        self.store.set_many(&[
            (PENDING_REQUEST_KEY, request.as_str()),
            (ORIGINAL_QUERY_KEY, pending.original_query.as_str()),
        ])
    }

    /// Load the persisted request
    ///
    /// A half-written slot (one key without the other) or an unparseable
    /// request is cleared and reported as nothing pending.
    #[must_use]
    pub fn load(&self) -> Option<PendingClarification> {
        let request = self.read(PENDING_REQUEST_KEY)?;
        let query = self.read(ORIGINAL_QUERY_KEY)?;

        match (request, query) {
            (None, None) => None,
            (Some(raw), Some(original_query)) => match serde_json::from_str::<Value>(&raw) {
                Ok(request) => Some(PendingClarification {
                    request,
                    original_query,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "discarding unparseable pending request");
                    self.discard();
                    None
                }
            },
            (request, query) => {
                tracing::warn!(
                    has_request = request.is_some(),
                    has_query = query.is_some(),
                    "discarding half-written pending request"
                );
                self.discard();
                None
            }
        }
    }

    /// Remove both keys in one call
    ///
    /// # Errors
    /// - `StoreError` if the backend refuses the delete
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.delete_many(&[PENDING_REQUEST_KEY, ORIGINAL_QUERY_KEY])
    }

    // Outer None means the read itself failed.
    fn read(&self, key: &str) -> Option<Option<String>> {
        match self.store.get(key) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read pending request");
                None
            }
        }
    }

    fn discard(&self) {
        if let Err(e) = self.clear() {
            tracing::error!(error = %e, "failed to clear corrupt pending request");
        }
    }
}

impl fmt::Debug for PendingRequestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequestStore").finish_non_exhaustive()
    }
}
