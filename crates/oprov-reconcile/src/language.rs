//! ---
//! oprov_section: "01-core-functionality"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Resource reconcilers for the provisioning engine."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use oprov_logging::{prov_info, prov_warn, LogContext};
use oprov_resilience::{CallError, ResilientClient};
use oprov_rpc::Domain;
use serde_json::{json, Map, Value};

use crate::upsert::{upsert_with, Outcome};

const LANG_MODEL: &str = "res.lang";
const DEFAULT_MODEL: &str = "ir.default";

/// Activate an installed language pack. Languages the platform does not know
/// are never created.
pub async fn activate_language(
    client: &ResilientClient,
    code: &str,
) -> Result<Outcome, CallError> {
    let ctx = LogContext::new().with_model(LANG_MODEL).with_resource(code);
    let found = client
        .search_one(LANG_MODEL, &Domain::new().eq("code", code), true)
        .await?;
    let Some(id) = found else {
        prov_warn!(context = ctx, "language {code} not found in res.lang; cannot activate");
        return Ok(Outcome::Skipped(format!("language {code} unknown to the platform")));
    };

    let mut vals = Map::new();
    vals.insert("active".into(), Value::Bool(true));
    client.write(LANG_MODEL, &[id], vals).await?;
    prov_info!(context = ctx, "language {code} active");
    Ok(Outcome::Updated(id))
}

/// Make `code` the default `lang` of new partners.
pub async fn set_default_language(
    client: &ResilientClient,
    code: &str,
) -> Result<Outcome, CallError> {
    let ctx = LogContext::new()
        .with_model(DEFAULT_MODEL)
        .with_resource("res.partner.lang");
    let field_domain = Domain::new().eq("model", "res.partner").eq("name", "lang");
    let Some(field_id) = client
        .search_one("ir.model.fields", &field_domain, false)
        .await?
    else {
        prov_warn!(context = ctx, "field res.partner.lang not found; default language not set");
        return Ok(Outcome::Skipped("field res.partner.lang not found".into()));
    };

    let json_value = Value::from(code).to_string();
    let outcome = upsert_with(
        client,
        DEFAULT_MODEL,
        &Domain::new().eq("field_id", field_id),
        false,
        |_| {
            let mut vals = Map::new();
            vals.insert("field_id".into(), json!(field_id));
            vals.insert("json_value".into(), Value::from(json_value));
            vals
        },
    )
    .await?;
    prov_info!(context = ctx, "default language {code} applied to res.partner");
    Ok(outcome)
}
