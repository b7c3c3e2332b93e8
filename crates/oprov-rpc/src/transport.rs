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

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RpcError;

/// Logical RPC service exposed by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Authentication and server metadata.
    Common,
    /// Model operations through `execute_kw`.
    Object,
}

impl Service {
    /// Wire name of the service.
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Common => "common",
            Service::Object => "object",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request/response exchange with the platform.
///
/// Implementations perform exactly one attempt per call; retrying is the
/// caller's responsibility.
#[async_trait]
pub trait RpcTransport: Send + Sync + fmt::Debug {
    /// Invoke `method` on `service` with positional arguments.
    async fn call(&self, service: Service, method: &str, args: Vec<Value>)
        -> Result<Value, RpcError>;
}
