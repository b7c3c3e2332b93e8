//! ---
//! oprov_section: "04-configuration-orchestration"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Phase ordering and run orchestration."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use oprov_common::ConfigError;
use oprov_reconcile::ReconcileError;
use oprov_rpc::{ConnectError, RpcError};
use thiserror::Error;

use crate::phase::Phase;

/// Exit code for fatal conditions: configuration, authentication, unknown
/// modules and exhausted retries.
pub const EXIT_FATAL: u8 = 2;
/// Exit code when a business fault or unexpected failure aborts the run.
pub const EXIT_ABORTED: u8 = 1;

/// Top-level failure of a provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The configuration could not be loaded or is incomplete.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The HTTP transport could not be built.
    #[error("transport setup failed: {0}")]
    Transport(#[source] RpcError),
    /// No authenticated session could be opened.
    #[error(transparent)]
    Connect(#[from] ConnectError),
    /// A phase failed; later phases were not run.
    #[error("phase {phase} aborted: {source}")]
    Phase {
        /// Failing phase.
        phase: Phase,
        /// Underlying reconciliation failure.
        #[source]
        source: ReconcileError,
    },
}

impl ProvisionError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            ProvisionError::Config(_)
            | ProvisionError::Transport(_)
            | ProvisionError::Connect(_) => EXIT_FATAL,
            ProvisionError::Phase { source, .. } if source.is_fatal() => EXIT_FATAL,
            ProvisionError::Phase { .. } => EXIT_ABORTED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oprov_resilience::CallError;
    use oprov_rpc::RemoteFault;

    #[test]
    fn exit_codes_follow_failure_class() {
        let missing = ProvisionError::Phase {
            phase: Phase::Modules,
            source: ReconcileError::MissingModules(vec!["nope".into()]),
        };
        assert_eq!(missing.exit_code(), EXIT_FATAL);

        let exhausted = ProvisionError::Phase {
            phase: Phase::Users,
            source: ReconcileError::Call(CallError::RetriesExhausted {
                model: "res.users".into(),
                method: "search".into(),
                attempts: 3,
                source: RpcError::Timeout("read".into()),
            }),
        };
        assert_eq!(exhausted.exit_code(), EXIT_FATAL);

        let fault = ProvisionError::Phase {
            phase: Phase::Users,
            source: ReconcileError::Call(CallError::Fault {
                model: "res.users".into(),
                method: "create".into(),
                fault: RemoteFault::new(200, "boom"),
            }),
        };
        assert_eq!(fault.exit_code(), EXIT_ABORTED);

        let config = ProvisionError::Config(ConfigError::MissingKeys(vec!["odoo.db".into()]));
        assert_eq!(config.exit_code(), EXIT_FATAL);
    }
}
