//! ---
//! oprov_section: "03-logging"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Structured logging adapters and sinks."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
#![warn(missing_docs)]
//! Tracing setup for the provisioning CLI plus the context-enriched logging
//! helpers used by the reconcilers and the orchestrator.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

#[macro_use]
pub mod macros;

#[doc(hidden)]
pub use tracing;

const LOG_ENV: &str = "OPROV_LOG";

/// Console output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable single-line records.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Options resolved by the entry point before any other work happens.
#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Console format.
    pub format: LogFormat,
    /// When set, a daily rolling JSON log is written to this directory.
    pub directory: Option<PathBuf>,
    /// File name prefix for the rolling log; defaults to the service name.
    pub file_prefix: Option<String>,
}

/// Keeps the background file writer alive. Drop it last so buffered records
/// reach the disk before the process exits.
#[derive(Debug, Default)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Initialise the global subscriber.
///
/// * `OPROV_LOG` overrides the filter (e.g. `info`, `debug,oprov_rpc=trace`).
///   When unset `RUST_LOG` is honoured, finally defaulting to `info`.
/// * Console records go to stdout; the optional file layer is always JSON.
pub fn init_tracing(service_name: &str, options: &LoggingOptions) -> Result<LoggingGuard> {
    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("invalid {LOG_ENV} directive ({err}); defaulting to info logging");
            EnvFilter::new("info")
        }),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let console = match options.format {
        LogFormat::Json => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(std::io::stdout)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(std::io::stdout)
            .boxed(),
    };

    let mut guard = LoggingGuard::default();
    let file_layer = match &options.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).with_context(|| {
                format!("unable to create log directory {}", directory.display())
            })?;
            let prefix = options
                .file_prefix
                .clone()
                .unwrap_or_else(|| service_name.to_owned());
            let appender = daily(directory, format!("{prefix}.log"));
            let (writer, file_guard) = tracing_appender::non_blocking(appender);
            guard._file = Some(file_guard);
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_timer(fmt::time::UtcTime::rfc_3339())
                    .json()
                    .with_writer(writer)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .ok();

    info!(
        service = %service_name,
        format = ?options.format,
        log_dir = ?options.directory,
        "tracing initialised"
    );
    Ok(guard)
}

/// Baseline subscriber for tests and tooling that skip [`init_tracing`].
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

/// Structured context propagated by the `prov_*` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogContext<'a> {
    /// Reconciliation phase (`langs`, `users`, ...).
    pub phase: Option<&'a str>,
    /// Remote model involved (`res.users`, ...).
    pub model: Option<&'a str>,
    /// Natural key of the resource being reconciled.
    pub resource: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the phase name.
    pub fn with_phase(mut self, phase: &'a str) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Attach the remote model name.
    pub fn with_model(mut self, model: &'a str) -> Self {
        self.model = Some(model);
        self
    }

    /// Attach the natural key of the resource.
    pub fn with_resource(mut self, resource: &'a str) -> Self {
        self.resource = Some(resource);
        self
    }
}

/// Outcome used when emitting lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event (phase start/finish, run completion).
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let ctx = context.copied().unwrap_or_default();
    match outcome {
        SystemEventOutcome::Success => info!(
            event,
            outcome = outcome.as_str(),
            phase = ctx.phase.unwrap_or(""),
            model = ctx.model.unwrap_or(""),
            resource = ctx.resource.unwrap_or(""),
            message = %message
        ),
        SystemEventOutcome::Fault => error!(
            event,
            outcome = outcome.as_str(),
            phase = ctx.phase.unwrap_or(""),
            model = ctx.model.unwrap_or(""),
            resource = ctx.resource.unwrap_or(""),
            message = %message
        ),
    }
}
