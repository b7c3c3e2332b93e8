//! ---
//! oprov_section: "04-configuration-orchestration"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Phase ordering and run orchestration."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
#![warn(missing_docs)]
//! Runs the reconciliation phases against one authenticated session.
//!
//! Phases execute in the fixed order `langs`, `params`, `company`, `modules`,
//! `users`, `mail`. The first failure stops the run; re-running after fixing
//! the cause converges because every reconciler is idempotent.

mod engine;
mod error;
mod phase;
mod report;

pub use engine::{http_transport, open_client, provision, Orchestrator};
pub use error::{ProvisionError, EXIT_ABORTED, EXIT_FATAL};
pub use phase::{Phase, PhaseSelection};
pub use report::{PhaseReport, ProvisionReport, ResourceReport};
