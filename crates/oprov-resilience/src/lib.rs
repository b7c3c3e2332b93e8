//! ---
//! oprov_section: "07-resilience-fault-tolerance"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Retry and fault classification around platform calls."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
#![warn(missing_docs)]
//! Resilient call wrapper.
//!
//! Every model call made by the reconcilers goes through [`ResilientClient`]:
//! transient failures are retried under a fixed [`RetryPolicy`], business
//! faults are returned on the first attempt and anything else is surfaced
//! as-is.

pub mod client;
pub mod error;
pub mod policy;

pub use client::{ResilientClient, SearchOptions};
pub use error::CallError;
pub use policy::RetryPolicy;
