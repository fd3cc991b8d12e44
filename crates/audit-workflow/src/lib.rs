//! Audit Workflow - the five-step control-testing lifecycle
//!
//! `upload_script → review_checklist → upload_evidence → generating → results`
//!
//! The [`WorkflowController`] owns one [`AuditSession`], checks the
//! preconditions of every operation, serializes backend calls through the
//! session's `is_processing` flag, and merges replies into the session.
//!
//! # Example
//!
//! ```rust,ignore
//! use audit_gateway::{GatewayConfig, HttpGateway, UploadFile};
//! use audit_workflow::WorkflowController;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Arc::new(HttpGateway::new(GatewayConfig::default())?);
//! let workflow = WorkflowController::new(gateway);
//!
//! let script = UploadFile::read_from("ITGC test script.xlsx").await?;
//! let session = workflow.submit_test_script(script).await?;
//! println!("{} controls found", session.controls_found);
//!
//! workflow.acknowledge_checklist()?;
//! workflow
//!     .submit_evidence(vec![UploadFile::read_from("access review.pdf").await?])
//!     .await?;
//! if workflow.snapshot().ready_to_generate {
//!     workflow.generate_workpaper().await?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod controller;
pub mod error;
pub mod session;
pub mod state_machine;

pub use controller::WorkflowController;
pub use error::WorkflowError;
pub use session::{AuditSession, WorkflowStep};
pub use state_machine::{allowed_transitions, validate_transition};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
