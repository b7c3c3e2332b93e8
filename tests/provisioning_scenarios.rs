//! ---
//! oprov_section: "15-testing-qa-runbook"
//! oprov_subsection: "integration-tests"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "End-to-end provisioning runs against the in-memory platform."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use oprov_common::ProvisionConfig;
use oprov_orchestrator::{provision, Phase, PhaseSelection, ProvisionError, EXIT_FATAL};
use oprov_reconcile::{Outcome, ReconcileError, RELATION_WRITER_ACTION};
use oprov_rpc::RpcError;
use oprov_testharness::{FakeOdoo, RecordedCall, ADMIN_LOGIN, ADMIN_SECRET, FAKE_DB, FAKE_URL};
use serde_json::json;

fn document(body: &str) -> ProvisionConfig {
    document_with_secret(ADMIN_SECRET, body)
}

fn document_with_secret(secret: &str, body: &str) -> ProvisionConfig {
    let yaml = format!(
        "odoo:\n  base_url: {FAKE_URL}\n  db: {FAKE_DB}\n  admin_login: {ADMIN_LOGIN}\n  admin_password: {secret}\n  rpc:\n    retry_delay_secs: 0\n{body}"
    );
    yaml.parse()
        .unwrap_or_else(|err| panic!("invalid test document: {err}"))
}

fn group_id(fake: &FakeOdoo, name: &str) -> i64 {
    fake.find_by("res.groups", "name", name)[0]["id"]
        .as_i64()
        .unwrap()
}

fn first_call(calls: &[RecordedCall], model: &str) -> usize {
    calls
        .iter()
        .position(|call| call.model.as_deref() == Some(model))
        .unwrap_or_else(|| panic!("no call on {model}"))
}

const ALICE_DOCUMENT: &str = "instance:\n  main_lang: es_ES\nmodules:\n  install: [base]\nusers:\n  - login: alice\n    groups: [base.group_user]\n";

#[tokio::test]
async fn fresh_instance_converges_in_one_run() {
    let fake = FakeOdoo::standard();
    let config = document(ALICE_DOCUMENT);

    let report = provision(fake.transport(), &config, PhaseSelection::All)
        .await
        .unwrap();

    assert_eq!(fake.calls_to("ir.module.module", "button_immediate_install"), 0);
    assert_eq!(fake.calls_to("res.users", "create"), 1);
    let alice = fake.find_by("res.users", "login", "alice");
    assert_eq!(alice.len(), 1);
    let alice_id = alice[0]["id"].as_i64().unwrap();
    let group_user = group_id(&fake, "Internal User");
    assert_eq!(fake.relation_inserts(), vec![(group_user, alice_id)]);

    let langs = report.phase(Phase::Langs).unwrap();
    assert_eq!(langs.outcome("lang:es_ES"), Some(&Outcome::Updated(2)));
    let modules = report.phase(Phase::Modules).unwrap();
    assert!(matches!(modules.outcome("base"), Some(Outcome::Unchanged(_))));
    let lang = fake.record("res.lang", 2).unwrap();
    assert_eq!(lang["active"], json!(true));
}

#[tokio::test]
async fn second_run_creates_nothing() {
    let fake = FakeOdoo::standard();
    let config = document(ALICE_DOCUMENT);
    provision(fake.transport(), &config, PhaseSelection::All)
        .await
        .unwrap();
    fake.clear_calls();

    let report = provision(fake.transport(), &config, PhaseSelection::All)
        .await
        .unwrap();

    assert!(fake.calls().iter().all(|call| call.method != "create"));
    assert_eq!(fake.relation_inserts().len(), 1);
    assert_eq!(fake.count("ir.default"), 1);
    assert_eq!(fake.find_by("ir.actions.server", "name", RELATION_WRITER_ACTION).len(), 1);
    assert_eq!(report.count("created"), 0);
    let users = report.phase(Phase::Users).unwrap();
    assert!(matches!(users.outcome("alice"), Some(Outcome::Updated(_))));
}

#[tokio::test]
async fn unknown_module_stops_the_run_before_installing() {
    let fake = FakeOdoo::standard();
    fake.with_module("sale", "uninstalled");
    let config = document(
        "modules:\n  install: [sale, does_not_exist]\nusers:\n  - login: alice\n",
    );

    let err = provision(fake.transport(), &config, PhaseSelection::All)
        .await
        .unwrap_err();

    match &err {
        ProvisionError::Phase {
            phase: Phase::Modules,
            source: ReconcileError::MissingModules(missing),
        } => assert_eq!(missing, &vec!["does_not_exist".to_owned()]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), EXIT_FATAL);
    assert_eq!(fake.calls_to("ir.module.module", "button_immediate_install"), 0);
    assert!(fake.find_by("res.users", "login", "alice").is_empty());
}

#[tokio::test]
async fn phases_issue_calls_in_dependency_order() {
    let fake = FakeOdoo::standard();
    fake.with_module("sale", "uninstalled");
    let config = document(
        "instance:\n  main_lang: es_ES\nmodules:\n  install: [sale]\nusers:\n  - login: alice\n",
    );

    provision(fake.transport(), &config, PhaseSelection::All)
        .await
        .unwrap();

    let calls = fake.calls();
    let langs = first_call(&calls, "res.lang");
    let modules = first_call(&calls, "ir.module.module");
    let users = first_call(&calls, "res.users");
    assert!(langs < modules, "languages must be handled before modules");
    assert!(modules < users, "modules must be installed before users");
    assert_eq!(fake.calls_to("ir.module.module", "button_immediate_install"), 1);
}

#[tokio::test]
async fn persistent_transport_failure_is_fatal_after_three_attempts() {
    let fake = FakeOdoo::standard();
    fake.fail(
        "res.users",
        "search",
        None,
        RpcError::Connection("connection reset by peer".into()),
    );
    let config = document("users:\n  - login: alice\n");

    let err = provision(fake.transport(), &config, PhaseSelection::Only(Phase::Users))
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), EXIT_FATAL);
    assert_eq!(fake.calls_to("res.users", "search"), 3);
}

#[tokio::test]
async fn wrong_admin_password_fails_before_any_object_call() {
    let fake = FakeOdoo::standard();
    let config = document_with_secret("not-the-password", ALICE_DOCUMENT);

    let err = provision(fake.transport(), &config, PhaseSelection::All)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Connect(_)));
    assert_eq!(err.exit_code(), EXIT_FATAL);
    assert!(fake.calls().iter().all(|call| call.model.is_none()));
}

#[tokio::test]
async fn mail_servers_are_upserted_by_name() {
    let fake = FakeOdoo::standard();
    let archived = fake.insert(
        "ir.mail_server",
        json!({"name": "relay", "smtp_host": "old.example.com", "active": false}),
    );
    let config = document(
        "mail:\n  outgoing_smtp:\n    name: relay\n    smtp_host: smtp.example.com\n    smtp_port: \"587\"\n  incoming_imap:\n    name: inbox\n    server_host: imap.example.com\n    server_port: 993\n",
    );

    let report = provision(fake.transport(), &config, PhaseSelection::Only(Phase::Mail))
        .await
        .unwrap();

    let mail = report.phase(Phase::Mail).unwrap();
    assert_eq!(mail.outcome("smtp:relay"), Some(&Outcome::Updated(archived)));
    assert!(matches!(mail.outcome("imap:inbox"), Some(Outcome::Created(_))));
    let relay = fake.record("ir.mail_server", archived).unwrap();
    assert_eq!(relay["smtp_host"], json!("smtp.example.com"));
    assert_eq!(relay["smtp_port"], json!(587));
    assert_eq!(relay["active"], json!(true));
    assert_eq!(fake.count("ir.mail_server"), 1);
    let inbox = &fake.records("fetchmail.server")[0];
    assert_eq!(inbox["user"], json!(false));
}
