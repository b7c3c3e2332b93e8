//! ---
//! oprov_section: "01-core-functionality"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Shared configuration primitives for the provisioning engine."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while loading or validating the desired-state document.
///
/// Every variant is fatal and is reported before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document path does not exist.
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// The document exists but could not be read.
    #[error("unable to read configuration file {}: {source}", path.display())]
    Io {
        /// Document path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid YAML or does not match the expected shape.
    #[error("failed to parse configuration {}: {source}", path.display())]
    Parse {
        /// Document path, or `<inline>` for in-memory documents.
        path: PathBuf,
        /// YAML decoding failure.
        #[source]
        source: serde_yaml::Error,
    },
    /// A `${VAR}` placeholder names an unset variable.
    #[error("required environment variable {var} is not set (referenced at {location})")]
    UnresolvedPlaceholder {
        /// Variable name.
        var: String,
        /// Dotted path of the value holding the placeholder.
        location: String,
    },
    /// Keys the engine cannot run without, as dotted paths.
    #[error("incomplete configuration: missing {}", .0.join(", "))]
    MissingKeys(Vec<String>),
    /// A present value failed validation.
    #[error("invalid configuration value for {key}: {message}")]
    Invalid {
        /// Dotted path of the offending key.
        key: String,
        /// What is wrong with it.
        message: String,
    },
}
