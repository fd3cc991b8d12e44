//! Audit Clarification - the agent's context-sufficiency gate
//!
//! Before a chat query is answered, [`ClarificationController::analyze_query`]
//! asks the backend whether the loaded context (knowledge base, company
//! profile, evidence) is enough. If not, the chat is suspended on a
//! [`PendingClarification`] that survives restarts through a
//! [`KeyValueStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use audit_clarification::{AnalysisOutcome, ClarificationController, FileStore};
//! use audit_gateway::{ContextFlags, GatewayConfig, HttpGateway};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Arc::new(HttpGateway::new(GatewayConfig::default())?);
//! let store = Arc::new(FileStore::open(".audit-assistant/state.json")?);
//! let agent = ClarificationController::new(gateway, store);
//!
//! match agent.analyze_query("What is our policy on X?", ContextFlags::none()).await {
//!     AnalysisOutcome::NeedsAction { reasoning, .. } => println!("blocked: {reasoning:?}"),
//!     AnalysisOutcome::Proceed { query, .. } => println!("answering {query}"),
//!     AnalysisOutcome::Superseded => {}
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod controller;
pub mod error;
pub mod pending;
pub mod storage;

pub use controller::{AnalysisOutcome, ClarificationController};
pub use error::StoreError;
pub use pending::{
    ClarificationKind, PendingClarification, PendingRequestStore, ORIGINAL_QUERY_KEY,
    PENDING_REQUEST_KEY,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
