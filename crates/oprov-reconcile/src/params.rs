//! ---
//! oprov_section: "01-core-functionality"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Resource reconcilers for the provisioning engine."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use oprov_common::ConfigParameter;
use oprov_logging::{prov_info, LogContext};
use oprov_resilience::{CallError, ResilientClient};
use oprov_rpc::Domain;
use serde_json::{Map, Value};

use crate::upsert::{upsert_with, Outcome};

const MODEL: &str = "ir.config_parameter";

/// Upsert one system parameter by key.
pub async fn reconcile_parameter(
    client: &ResilientClient,
    param: &ConfigParameter,
) -> Result<Outcome, CallError> {
    let ctx = LogContext::new()
        .with_model(MODEL)
        .with_resource(&param.key);
    prov_info!(context = ctx, "setting parameter {} = {}", param.key, param.value);
    upsert_with(
        client,
        MODEL,
        &Domain::new().eq("key", param.key.as_str()),
        false,
        |existing| {
            let mut vals = Map::new();
            if existing.is_none() {
                vals.insert("key".into(), Value::from(param.key.as_str()));
            }
            vals.insert("value".into(), Value::from(param.value.as_str()));
            vals
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use oprov_resilience::RetryPolicy;
    use oprov_testharness::FakeOdoo;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn parameter_upsert_is_idempotent() {
        let fake = FakeOdoo::standard();
        let client = ResilientClient::new(
            fake.connect().await.unwrap(),
            RetryPolicy::new(1, Duration::ZERO),
        );
        let param = ConfigParameter {
            key: "auth_signup.allow_uninvited".into(),
            value: "True".into(),
        };

        let created = reconcile_parameter(&client, &param).await.unwrap();
        let updated = reconcile_parameter(
            &client,
            &ConfigParameter {
                value: "False".into(),
                ..param.clone()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated, Outcome::Updated(created.id().unwrap()));
        let rows = fake.records(MODEL);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["value"], json!("False"));
    }
}
