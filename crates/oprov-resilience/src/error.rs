//! ---
//! oprov_section: "07-resilience-fault-tolerance"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Retry and fault classification around platform calls."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use oprov_rpc::{RemoteFault, RpcError};
use thiserror::Error;

/// Final outcome of a wrapped call that did not succeed.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// Every attempt failed with a transient error.
    #[error("{model}.{method} failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        /// Model the call targeted.
        model: String,
        /// Method invoked.
        method: String,
        /// Attempts performed.
        attempts: u32,
        /// Last transient failure.
        #[source]
        source: RpcError,
    },
    /// The platform rejected the call.
    #[error("{model}.{method} rejected by platform: {fault}")]
    Fault {
        /// Model the call targeted.
        model: String,
        /// Method invoked.
        method: String,
        /// Remote fault code and message.
        fault: RemoteFault,
    },
    /// Neither transient nor a business fault.
    #[error("{model}.{method} failed unexpectedly: {source}")]
    Unexpected {
        /// Model the call targeted.
        model: String,
        /// Method invoked.
        method: String,
        /// Underlying failure.
        #[source]
        source: RpcError,
    },
    /// The call succeeded but its result had an unexpected shape.
    #[error("{model}.{method} returned an unexpected result: {detail}")]
    Decode {
        /// Model the call targeted.
        model: String,
        /// Method invoked.
        method: String,
        /// What was wrong with the result.
        detail: String,
    },
}

impl CallError {
    /// Conditions that end the run as a fatal infrastructure failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CallError::RetriesExhausted { .. })
    }

    /// Remote fault carried by a business rejection.
    pub fn fault(&self) -> Option<&RemoteFault> {
        match self {
            CallError::Fault { fault, .. } => Some(fault),
            _ => None,
        }
    }

    pub(crate) fn decode(model: &str, method: &str, detail: impl Into<String>) -> Self {
        CallError::Decode {
            model: model.to_owned(),
            method: method.to_owned(),
            detail: detail.into(),
        }
    }
}
