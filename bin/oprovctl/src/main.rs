//! ---
//! oprov_section: "05-networking-external-interfaces"
//! oprov_subsection: "binary"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Provisioning CLI driving the orchestrator."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use oprov_common::ProvisionConfig;
use oprov_logging::{self as logging, LogFormat, LoggingOptions};
use oprov_orchestrator::{
    http_transport, provision, Phase, PhaseSelection, ProvisionError, ProvisionReport, EXIT_FATAL,
};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "oprovctl",
    version,
    about = "Reconcile an Odoo instance with a declarative YAML document",
    long_about = None
)]
struct Cli {
    /// Desired-state document; `${NAME}` placeholders expand from the environment.
    #[arg(long, value_name = "FILE", env = "OPROV_CONFIG")]
    config: PathBuf,

    /// Run every phase or exactly one.
    #[arg(long, value_enum, default_value_t = OnlyArg::All)]
    only: OnlyArg,

    /// Console log format.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormatArg::Pretty)]
    log_format: LogFormatArg,

    /// Also write a daily rolling JSON log into this directory.
    #[arg(long = "log-dir", value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Write the per-resource outcomes of a successful run as JSON.
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnlyArg {
    All,
    Langs,
    Params,
    Company,
    Modules,
    Users,
    Mail,
}

impl From<OnlyArg> for PhaseSelection {
    fn from(value: OnlyArg) -> Self {
        match value {
            OnlyArg::All => PhaseSelection::All,
            OnlyArg::Langs => PhaseSelection::Only(Phase::Langs),
            OnlyArg::Params => PhaseSelection::Only(Phase::Params),
            OnlyArg::Company => PhaseSelection::Only(Phase::Company),
            OnlyArg::Modules => PhaseSelection::Only(Phase::Modules),
            OnlyArg::Users => PhaseSelection::Only(Phase::Users),
            OnlyArg::Mail => PhaseSelection::Only(Phase::Mail),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let options = LoggingOptions {
        format: cli.log_format.into(),
        directory: cli.log_dir.clone(),
        file_prefix: None,
    };
    let _guard = match logging::init_tracing("oprovctl", &options) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("oprovctl: {err:#}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match run(&cli) {
        Ok(report) => {
            info!(summary = %report, "provisioning finished");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let code = err
                .downcast_ref::<ProvisionError>()
                .map_or(EXIT_FATAL, ProvisionError::exit_code);
            error!(exit_code = code, "{err:#}");
            ExitCode::from(code)
        }
    }
}

fn run(cli: &Cli) -> Result<ProvisionReport> {
    let config = ProvisionConfig::load(&cli.config).map_err(ProvisionError::from)?;
    info!(
        config = %cli.config.display(),
        db = config.odoo.db.as_deref().unwrap_or_default(),
        only = ?cli.only,
        "starting provisioning run"
    );
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build the async runtime")?;
    let report = runtime.block_on(async {
        let transport = http_transport(&config)?;
        provision(transport, &config, cli.only.into()).await
    })?;
    if let Some(path) = &cli.report {
        write_report(path, &report)?;
        info!(report = %path.display(), "run report written");
    }
    Ok(report)
}

fn write_report(path: &Path, report: &ProvisionReport) -> Result<()> {
    let body = serde_json::to_string_pretty(report).context("failed to encode the run report")?;
    fs::write(path, body)
        .with_context(|| format!("failed to write run report {}", path.display()))
}
