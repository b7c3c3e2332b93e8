//! ---
//! oprov_section: "01-core-functionality"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Resource reconcilers for the provisioning engine."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use oprov_resilience::CallError;
use thiserror::Error;

/// Failure of a reconciliation step.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// A platform call failed.
    #[error(transparent)]
    Call(#[from] CallError),
    /// Requested modules are unknown to the module registry.
    #[error("modules not found in ir.module.module: {}", .0.join(", "))]
    MissingModules(Vec<String>),
}

impl ReconcileError {
    /// Fatal conditions end the run with the configuration/infrastructure exit code.
    pub fn is_fatal(&self) -> bool {
        match self {
            ReconcileError::Call(err) => err.is_fatal(),
            ReconcileError::MissingModules(_) => true,
        }
    }
}
