//! ---
//! oprov_section: "01-core-functionality"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Shared configuration primitives for the provisioning engine."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
#![warn(missing_docs)]
//! Shared configuration primitives for the oprov workspace.
//!
//! This crate owns the desired-state document: loading it from YAML, expanding
//! `${VAR}` placeholders from the environment and validating the keys the
//! engine cannot run without. Everything downstream receives a fully resolved
//! [`ProvisionConfig`].

pub mod config;
pub mod env;
pub mod error;

pub use config::{
    CompanyConfig, ConfigParameter, Credentials, ImapConfig, InstanceConfig, MailConfig,
    ModulesConfig, OdooConfig, ProvisionConfig, RpcConfig, SettingsConfig, SmtpConfig, TlsConfig,
    UserConfig,
};
pub use env::expand_env_with;
pub use error::ConfigError;
