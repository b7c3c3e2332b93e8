//! ---
//! oprov_section: "05-networking-external-interfaces"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "RPC gateway towards the Odoo object API."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
#![warn(missing_docs)]
//! RPC gateway for the Odoo platform.
//!
//! The platform exposes two logical services: `common` (authentication,
//! version) and `object` (`execute_kw` on any model). [`RpcTransport`] is the
//! seam between the engine and the wire; [`JsonRpcTransport`] talks to a real
//! server while tests plug in an in-memory platform.

pub mod domain;
pub mod error;
pub mod gateway;
pub mod jsonrpc;
pub mod transport;
pub mod value;

pub use domain::Domain;
pub use error::{ErrorClass, RemoteFault, RpcError};
pub use gateway::{connect, ConnectError, Connection};
pub use jsonrpc::{JsonRpcTransport, TransportOptions};
pub use transport::{RpcTransport, Service};
pub use value::{id_from_value, ids_from_value, RecordId};
