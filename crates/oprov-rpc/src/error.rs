//! ---
//! oprov_section: "05-networking-external-interfaces"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "RPC gateway towards the Odoo object API."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured rejection returned by the platform after it executed a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFault {
    /// Fault code reported by the server.
    pub code: i64,
    /// Human readable reason.
    pub message: String,
    /// Server-side exception class, when provided (e.g. `odoo.exceptions.ValidationError`).
    #[serde(default)]
    pub exception: Option<String>,
}

impl RemoteFault {
    /// Construct a fault without exception metadata.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            exception: None,
        }
    }
}

impl fmt::Display for RemoteFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.exception {
            Some(exception) => write!(f, "{} - {} ({})", self.code, self.message, exception),
            None => write!(f, "{} - {}", self.code, self.message),
        }
    }
}

/// How a failure must be treated by the retry layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network-level blip; the call may be retried.
    Transient,
    /// The platform rejected the call for domain reasons; never retried.
    BusinessFault,
    /// Anything else; surfaced without retry.
    Unexpected,
}

/// Failure of a single RPC round trip.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// The connection could not be established or was reset.
    #[error("connection failed: {0}")]
    Connection(String),
    /// The HTTP layer answered with a non-success status.
    #[error("protocol error (HTTP {status}): {message}")]
    Protocol {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        message: String,
    },
    /// The platform executed the call and rejected it.
    #[error("remote fault {0}")]
    Fault(RemoteFault),
    /// The response could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// Any other failure.
    #[error("unexpected RPC failure: {0}")]
    Unexpected(String),
}

impl RpcError {
    /// Classify the failure for the retry layer.
    pub fn class(&self) -> ErrorClass {
        match self {
            RpcError::Timeout(_) | RpcError::Connection(_) | RpcError::Protocol { .. } => {
                ErrorClass::Transient
            }
            RpcError::Fault(_) => ErrorClass::BusinessFault,
            RpcError::Malformed(_) | RpcError::Unexpected(_) => ErrorClass::Unexpected,
        }
    }

    /// Return the remote fault when this is a business rejection.
    pub fn fault(&self) -> Option<&RemoteFault> {
        match self {
            RpcError::Fault(fault) => Some(fault),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RpcError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() || err.is_body() {
            RpcError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            RpcError::Protocol {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            RpcError::Malformed(err.to_string())
        } else {
            RpcError::Unexpected(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_retry_contract() {
        assert_eq!(
            RpcError::Timeout("read".into()).class(),
            ErrorClass::Transient
        );
        assert_eq!(
            RpcError::Connection("reset by peer".into()).class(),
            ErrorClass::Transient
        );
        assert_eq!(
            RpcError::Protocol {
                status: 502,
                message: "bad gateway".into()
            }
            .class(),
            ErrorClass::Transient
        );
        assert_eq!(
            RpcError::Fault(RemoteFault::new(200, "constraint violated")).class(),
            ErrorClass::BusinessFault
        );
        assert_eq!(
            RpcError::Malformed("not json".into()).class(),
            ErrorClass::Unexpected
        );
    }

    #[test]
    fn fault_display_carries_code_and_message() {
        let fault = RemoteFault {
            code: 200,
            message: "The login must be unique".into(),
            exception: Some("odoo.exceptions.ValidationError".into()),
        };
        let rendered = RpcError::Fault(fault).to_string();
        assert!(rendered.contains("200"));
        assert!(rendered.contains("The login must be unique"));
        assert!(rendered.contains("ValidationError"));
    }
}
