//! ---
//! oprov_section: "04-configuration-orchestration"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Phase ordering and run orchestration."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use std::sync::Arc;

use oprov_common::ProvisionConfig;
use oprov_logging::{log_system_event, prov_info, LogContext, SystemEventOutcome};
use oprov_reconcile::{
    activate_language, install_modules, reconcile_company, reconcile_incoming_server,
    reconcile_outgoing_server, reconcile_parameter, set_default_language, ReconcileError,
    UserReconciler,
};
use oprov_resilience::{ResilientClient, RetryPolicy};
use oprov_rpc::{connect, JsonRpcTransport, RpcTransport, TransportOptions};
use tracing::{info_span, Instrument};

use crate::error::ProvisionError;
use crate::phase::{Phase, PhaseSelection};
use crate::report::{PhaseReport, ProvisionReport};

/// Build the HTTP transport described by `config.odoo`.
pub fn http_transport(config: &ProvisionConfig) -> Result<Arc<dyn RpcTransport>, ProvisionError> {
    let credentials = config.credentials()?;
    let options = TransportOptions {
        timeout: config.odoo.rpc.timeout,
        accept_invalid_certs: config.odoo.tls.accept_invalid_certs,
    };
    let transport = JsonRpcTransport::new(&credentials.base_url, &options)
        .map_err(ProvisionError::Transport)?;
    Ok(Arc::new(transport))
}

/// Authenticate once and wrap the session in the retry policy from config.
pub async fn open_client(
    transport: Arc<dyn RpcTransport>,
    config: &ProvisionConfig,
) -> Result<ResilientClient, ProvisionError> {
    let credentials = config.credentials()?;
    let connection = connect(transport, &credentials).await?;
    Ok(ResilientClient::new(
        connection,
        RetryPolicy::from_config(&config.odoo.rpc),
    ))
}

/// Connect over `transport` and run the selected phases.
pub async fn provision(
    transport: Arc<dyn RpcTransport>,
    config: &ProvisionConfig,
    selection: PhaseSelection,
) -> Result<ProvisionReport, ProvisionError> {
    let client = open_client(transport, config).await?;
    Orchestrator::new(client, config).run(selection).await
}

/// Drives one authenticated session through the reconciliation phases.
#[derive(Debug)]
pub struct Orchestrator<'a> {
    client: ResilientClient,
    config: &'a ProvisionConfig,
}

impl<'a> Orchestrator<'a> {
    /// Orchestrator over an authenticated client.
    pub fn new(client: ResilientClient, config: &'a ProvisionConfig) -> Self {
        Self { client, config }
    }

    /// Run the selected phases in order, stopping at the first failure.
    pub async fn run(&self, selection: PhaseSelection) -> Result<ProvisionReport, ProvisionError> {
        let mut report = ProvisionReport::default();
        for phase in selection.phases() {
            let span = info_span!("phase", phase = phase.as_str());
            let phase_report = self.run_phase(phase).instrument(span).await?;
            report.phases.push(phase_report);
        }
        log_system_event(
            None,
            "run.completed",
            &report.to_string(),
            SystemEventOutcome::Success,
        );
        Ok(report)
    }

    async fn run_phase(&self, phase: Phase) -> Result<PhaseReport, ProvisionError> {
        let ctx = LogContext::new().with_phase(phase.as_str());
        prov_info!(context = ctx, "phase {phase} started");
        let mut report = PhaseReport::new(phase);
        let result = match phase {
            Phase::Langs => self.langs(&mut report).await,
            Phase::Params => self.params(&mut report).await,
            Phase::Company => self.company(&mut report).await,
            Phase::Modules => self.modules(&mut report).await,
            Phase::Users => self.users(&mut report).await,
            Phase::Mail => self.mail(&mut report).await,
        };
        match result {
            Ok(()) => {
                log_system_event(
                    Some(&ctx),
                    "phase.completed",
                    &format!("{} resource(s) reconciled", report.resources.len()),
                    SystemEventOutcome::Success,
                );
                Ok(report)
            }
            Err(source) => {
                log_system_event(
                    Some(&ctx),
                    "phase.failed",
                    &source.to_string(),
                    SystemEventOutcome::Fault,
                );
                Err(ProvisionError::Phase { phase, source })
            }
        }
    }

    async fn langs(&self, report: &mut PhaseReport) -> Result<(), ReconcileError> {
        let instance = &self.config.instance;
        let languages = instance.languages();
        if languages.is_empty() {
            prov_info!("no languages declared");
            return Ok(());
        }
        for code in languages {
            let outcome = activate_language(&self.client, code).await?;
            report.push(format!("lang:{code}"), outcome);
        }
        if let Some(main) = instance.main_lang() {
            let outcome = set_default_language(&self.client, main).await?;
            report.push(format!("default_lang:{main}"), outcome);
        }
        Ok(())
    }

    async fn params(&self, report: &mut PhaseReport) -> Result<(), ReconcileError> {
        let params = &self.config.settings.ir_config_parameter;
        if params.is_empty() {
            prov_info!("no system parameters declared");
            return Ok(());
        }
        for param in params {
            let outcome = reconcile_parameter(&self.client, param).await?;
            report.push(param.key.clone(), outcome);
        }
        Ok(())
    }

    async fn company(&self, report: &mut PhaseReport) -> Result<(), ReconcileError> {
        let Some(company) = &self.config.company else {
            prov_info!("no company section declared");
            return Ok(());
        };
        let outcome = reconcile_company(&self.client, company).await?;
        report.push("company", outcome);
        Ok(())
    }

    async fn modules(&self, report: &mut PhaseReport) -> Result<(), ReconcileError> {
        let names = &self.config.modules.install;
        if names.is_empty() {
            prov_info!("no modules to install");
            return Ok(());
        }
        for (name, outcome) in install_modules(&self.client, names).await? {
            report.push(name, outcome);
        }
        Ok(())
    }

    async fn users(&self, report: &mut PhaseReport) -> Result<(), ReconcileError> {
        let users = &self.config.users;
        if users.is_empty() {
            prov_info!("no users declared");
            return Ok(());
        }
        let mut reconciler = UserReconciler::new(&self.client);
        for user in users {
            let outcome = reconciler.reconcile(user).await?;
            let login = outcome.login.as_deref().unwrap_or("<missing login>");
            report.push(login, outcome.user);
            if let Some(groups) = outcome.groups {
                report.push(format!("{login}:groups"), groups);
            }
        }
        Ok(())
    }

    async fn mail(&self, report: &mut PhaseReport) -> Result<(), ReconcileError> {
        let mail = &self.config.mail;
        match &mail.outgoing_smtp {
            Some(smtp) => {
                let outcome = reconcile_outgoing_server(&self.client, smtp).await?;
                report.push(format!("smtp:{}", smtp.name), outcome);
            }
            None => prov_info!("no outgoing mail server declared"),
        }
        match &mail.incoming_imap {
            Some(imap) => {
                let outcome = reconcile_incoming_server(&self.client, imap).await?;
                report.push(format!("imap:{}", imap.name), outcome);
            }
            None => prov_info!("no incoming mail server declared"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oprov_common::{ConfigParameter, ModulesConfig, SmtpConfig, UserConfig};
    use oprov_reconcile::Outcome;
    use oprov_rpc::{RemoteFault, RpcError};
    use oprov_testharness::FakeOdoo;
    use serde_json::json;
    use std::time::Duration;

    async fn orchestrator<'a>(fake: &FakeOdoo, config: &'a ProvisionConfig) -> Orchestrator<'a> {
        let client = ResilientClient::new(
            fake.connect().await.unwrap(),
            RetryPolicy::new(3, Duration::ZERO),
        );
        Orchestrator::new(client, config)
    }

    #[tokio::test]
    async fn empty_sections_do_nothing() {
        let fake = FakeOdoo::standard();
        let config = ProvisionConfig::default();
        let engine = orchestrator(&fake, &config).await;
        fake.clear_calls();

        let report = engine.run(PhaseSelection::All).await.unwrap();
        assert_eq!(report.phases.len(), 6);
        assert!(report.phases.iter().all(|p| p.resources.is_empty()));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn only_runs_the_selected_phase() {
        let fake = FakeOdoo::standard();
        let mut config = ProvisionConfig::default();
        config.settings.ir_config_parameter = vec![ConfigParameter {
            key: "web.base.url".into(),
            value: "https://erp.example.com".into(),
        }];
        config.users = vec![UserConfig {
            login: Some("alice".into()),
            ..Default::default()
        }];
        let engine = orchestrator(&fake, &config).await;

        let report = engine
            .run(PhaseSelection::Only(Phase::Params))
            .await
            .unwrap();
        assert_eq!(report.phases.len(), 1);
        assert!(matches!(
            report.phase(Phase::Params).unwrap().outcome("web.base.url"),
            Some(Outcome::Created(_))
        ));
        assert!(fake.find_by("res.users", "login", "alice").is_empty());
    }

    #[tokio::test]
    async fn fault_aborts_later_phases() {
        let fake = FakeOdoo::standard();
        let mut config = ProvisionConfig::default();
        config.modules = ModulesConfig {
            install: vec!["base".into()],
        };
        config.users = vec![UserConfig {
            login: Some("alice".into()),
            ..Default::default()
        }];
        config.mail.outgoing_smtp = Some(SmtpConfig {
            name: "relay".into(),
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            smtp_encryption: "starttls".into(),
            smtp_user: None,
            smtp_password: None,
            from_filter: None,
            sequence: 10,
        });
        fake.fail(
            "res.users",
            "create",
            None,
            RpcError::Fault(RemoteFault::new(200, "ValidationError")),
        );
        let engine = orchestrator(&fake, &config).await;

        let err = engine.run(PhaseSelection::All).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Phase { phase: Phase::Users, .. }));
        assert_eq!(err.exit_code(), crate::EXIT_ABORTED);
        assert_eq!(fake.calls_to("res.users", "create"), 1);
        assert_eq!(fake.count("ir.mail_server"), 0);
    }

    #[tokio::test]
    async fn langs_phase_sets_partner_default() {
        let fake = FakeOdoo::standard();
        let mut config = ProvisionConfig::default();
        config.instance.main_lang = Some("es_ES".into());
        config.instance.extra_langs = vec!["en_US".into(), "xx_XX".into()];
        let engine = orchestrator(&fake, &config).await;

        let report = engine
            .run(PhaseSelection::Only(Phase::Langs))
            .await
            .unwrap();
        let langs = report.phase(Phase::Langs).unwrap();
        assert!(matches!(langs.outcome("lang:xx_XX"), Some(Outcome::Skipped(_))));
        assert!(matches!(
            langs.outcome("default_lang:es_ES"),
            Some(Outcome::Created(_))
        ));
        let defaults = fake.records("ir.default");
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0]["json_value"], json!("\"es_ES\""));
    }
}
