//! ---
//! oprov_section: "01-core-functionality"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Resource reconcilers for the provisioning engine."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
//! Outgoing (`ir.mail_server`) and incoming (`fetchmail.server`) mail servers,
//! both keyed by name and always forced active.

use oprov_common::{ImapConfig, SmtpConfig};
use oprov_logging::{prov_info, LogContext};
use oprov_resilience::{CallError, ResilientClient};
use oprov_rpc::Domain;
use serde_json::{json, Map, Value};

use crate::upsert::{upsert_with, Outcome};

const SMTP_MODEL: &str = "ir.mail_server";
const IMAP_MODEL: &str = "fetchmail.server";

// Unset optional strings are sent as `false`, the platform's empty value.
fn text_or_false(value: Option<&str>) -> Value {
    match value.filter(|v| !v.is_empty()) {
        Some(v) => Value::from(v),
        None => Value::Bool(false),
    }
}

fn smtp_values(smtp: &SmtpConfig) -> Map<String, Value> {
    let mut vals = Map::new();
    vals.insert("name".into(), json!(smtp.name));
    vals.insert("smtp_host".into(), json!(smtp.smtp_host));
    vals.insert("smtp_port".into(), json!(smtp.smtp_port));
    vals.insert("smtp_encryption".into(), json!(smtp.smtp_encryption));
    vals.insert("smtp_user".into(), text_or_false(smtp.smtp_user.as_deref()));
    vals.insert(
        "smtp_pass".into(),
        text_or_false(smtp.smtp_password.as_deref()),
    );
    vals.insert(
        "from_filter".into(),
        text_or_false(smtp.from_filter.as_deref()),
    );
    vals.insert("sequence".into(), json!(smtp.sequence));
    vals.insert("active".into(), Value::Bool(true));
    vals
}

fn imap_values(imap: &ImapConfig) -> Map<String, Value> {
    let mut vals = Map::new();
    vals.insert("name".into(), json!(imap.name));
    vals.insert("server_type".into(), json!(imap.server_type));
    vals.insert("server".into(), json!(imap.server_host));
    vals.insert("port".into(), json!(imap.server_port));
    vals.insert("is_ssl".into(), json!(imap.is_ssl));
    vals.insert("user".into(), text_or_false(imap.user.as_deref()));
    vals.insert("password".into(), text_or_false(imap.password.as_deref()));
    vals.insert("active".into(), Value::Bool(true));
    vals
}

/// Upsert the outgoing SMTP server.
pub async fn reconcile_outgoing_server(
    client: &ResilientClient,
    smtp: &SmtpConfig,
) -> Result<Outcome, CallError> {
    let ctx = LogContext::new()
        .with_model(SMTP_MODEL)
        .with_resource(&smtp.name);
    prov_info!(
        context = ctx,
        "configuring SMTP server {} ({}:{})",
        smtp.name,
        smtp.smtp_host,
        smtp.smtp_port
    );
    upsert_with(
        client,
        SMTP_MODEL,
        &Domain::new().eq("name", smtp.name.as_str()),
        true,
        |_| smtp_values(smtp),
    )
    .await
}

/// Upsert the incoming IMAP/POP server.
pub async fn reconcile_incoming_server(
    client: &ResilientClient,
    imap: &ImapConfig,
) -> Result<Outcome, CallError> {
    let ctx = LogContext::new()
        .with_model(IMAP_MODEL)
        .with_resource(&imap.name);
    prov_info!(
        context = ctx,
        "configuring {} server {} ({}:{})",
        imap.server_type,
        imap.name,
        imap.server_host,
        imap.server_port
    );
    upsert_with(
        client,
        IMAP_MODEL,
        &Domain::new().eq("name", imap.name.as_str()),
        true,
        |_| imap_values(imap),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use oprov_resilience::RetryPolicy;
    use oprov_testharness::FakeOdoo;
    use std::time::Duration;

    fn smtp() -> SmtpConfig {
        SmtpConfig {
            name: "Primary SMTP".into(),
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            smtp_encryption: "starttls".into(),
            smtp_user: Some("mailer@example.com".into()),
            smtp_password: Some("mail-secret".into()),
            from_filter: None,
            sequence: 10,
        }
    }

    #[test]
    fn smtp_values_use_platform_field_names() {
        let vals = smtp_values(&smtp());
        assert_eq!(vals["smtp_port"], json!(587));
        assert_eq!(vals["smtp_pass"], json!("mail-secret"));
        assert_eq!(vals["from_filter"], json!(false));
        assert_eq!(vals["active"], json!(true));
    }

    #[test]
    fn imap_values_default_empty_credentials_to_false() {
        let vals = imap_values(&ImapConfig {
            name: "Inbox".into(),
            server_type: "imap".into(),
            server_host: "imap.example.com".into(),
            server_port: 993,
            is_ssl: true,
            user: None,
            password: Some(String::new()),
        });
        assert_eq!(vals["server"], json!("imap.example.com"));
        assert_eq!(vals["port"], json!(993));
        assert_eq!(vals["user"], json!(false));
        assert_eq!(vals["password"], json!(false));
    }

    #[tokio::test]
    async fn archived_server_is_reactivated_not_duplicated() {
        let fake = FakeOdoo::standard();
        let archived = fake.insert(
            SMTP_MODEL,
            json!({"name": "Primary SMTP", "smtp_host": "old.example.com", "active": false}),
        );
        let client = ResilientClient::new(
            fake.connect().await.unwrap(),
            RetryPolicy::new(1, Duration::ZERO),
        );

        let outcome = reconcile_outgoing_server(&client, &smtp()).await.unwrap();
        assert_eq!(outcome, Outcome::Updated(archived));
        let record = fake.record(SMTP_MODEL, archived).unwrap();
        assert_eq!(record["smtp_host"], json!("smtp.example.com"));
        assert_eq!(record["active"], json!(true));
        assert_eq!(fake.count(SMTP_MODEL), 1);
    }

    #[tokio::test]
    async fn incoming_server_converges_on_second_run() {
        let fake = FakeOdoo::standard();
        let client = ResilientClient::new(
            fake.connect().await.unwrap(),
            RetryPolicy::new(1, Duration::ZERO),
        );
        let imap = ImapConfig {
            name: "Inbox".into(),
            server_type: "imap".into(),
            server_host: "imap.example.com".into(),
            server_port: 993,
            is_ssl: true,
            user: Some("inbox@example.com".into()),
            password: Some("imap-secret".into()),
        };

        let first = reconcile_incoming_server(&client, &imap).await.unwrap();
        let Outcome::Created(id) = first else {
            panic!("expected a created server, got {first:?}");
        };
        let before = fake.record(IMAP_MODEL, id).unwrap();

        let second = reconcile_incoming_server(&client, &imap).await.unwrap();
        assert_eq!(second, Outcome::Updated(id));
        assert_eq!(fake.count(IMAP_MODEL), 1);
        assert_eq!(fake.calls_to(IMAP_MODEL, "create"), 1);
        assert_eq!(fake.record(IMAP_MODEL, id).unwrap(), before);
    }
}
