//! ---
//! oprov_section: "11-test-harness"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "In-memory platform used by the provisioning tests."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
//! In-memory Odoo platform for exercising the provisioning engine.
//!
//! [`FakeOdoo`] implements [`oprov_rpc::RpcTransport`] and emulates the subset
//! of the object API the engine relies on: domain search with `active_test`,
//! `read`/`write`/`create`, module installation and the group relation writer
//! server action. Every request is logged, and failures can be injected per
//! model method.

mod domain;
mod platform;

pub use platform::{
    FakeOdoo, RecordedCall, ADMIN_LOGIN, ADMIN_SECRET, ADMIN_UID, FAKE_DB, FAKE_URL,
};
