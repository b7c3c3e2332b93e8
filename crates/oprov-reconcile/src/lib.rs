//! ---
//! oprov_section: "01-core-functionality"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Resource reconcilers for the provisioning engine."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
//! Reconcilers drive one resource kind from its current remote state to the
//! declared state. Each one locates its record by natural key, then updates
//! it or creates it, so re-running with the same configuration adds nothing.

pub mod company;
pub mod error;
pub mod groups;
pub mod language;
pub mod mail;
pub mod modules;
pub mod params;
pub mod resolver;
pub mod upsert;
pub mod users;

pub use company::reconcile_company;
pub use error::ReconcileError;
pub use groups::{PrivilegedRelationWriter, RELATION_WRITER_ACTION, RELATION_WRITER_CODE};
pub use language::{activate_language, set_default_language};
pub use mail::{reconcile_incoming_server, reconcile_outgoing_server};
pub use modules::install_modules;
pub use params::reconcile_parameter;
pub use resolver::{ExternalId, IdentifierResolver};
pub use upsert::{upsert_with, Outcome};
pub use users::{UserOutcome, UserReconciler, DEFAULT_USER_LANG};
