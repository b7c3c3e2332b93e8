//! ---
//! oprov_section: "01-core-functionality"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Resource reconcilers for the provisioning engine."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use oprov_common::CompanyConfig;
use oprov_logging::{prov_info, prov_warn, LogContext};
use oprov_resilience::{CallError, ResilientClient};
use oprov_rpc::Domain;
use serde_json::{Map, Value};

use crate::upsert::Outcome;

const MODEL: &str = "res.company";

/// Update the first company with the declared fields.
///
/// Country and state are looked up by code (state by name or code within the
/// country); misses are logged and the field is left untouched.
pub async fn reconcile_company(
    client: &ResilientClient,
    company: &CompanyConfig,
) -> Result<Outcome, CallError> {
    let ctx = LogContext::new().with_model(MODEL);
    let Some(id) = client.search_one(MODEL, &Domain::new(), false).await? else {
        prov_warn!(context = ctx, "no company found to update");
        return Ok(Outcome::Skipped("no company found".into()));
    };

    let mut vals = Map::new();
    let declared = [
        ("name", &company.name),
        ("vat", &company.vat),
        ("email", &company.email),
        ("phone", &company.phone),
        ("website", &company.website),
        ("street", &company.street),
        ("zip", &company.zip),
        ("city", &company.city),
    ];
    for (field, value) in declared {
        if let Some(value) = value {
            vals.insert(field.into(), Value::from(value.as_str()));
        }
    }

    let country_code = company
        .country_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty());
    let state = company
        .state
        .as_deref()
        .map(str::trim)
        .filter(|state| !state.is_empty());

    match country_code {
        Some(code) => {
            let country = client
                .search_one("res.country", &Domain::new().eq("code", code), false)
                .await?;
            match country {
                Some(country_id) => {
                    vals.insert("country_id".into(), Value::from(country_id));
                    if let Some(state) = state {
                        let domain = Domain::new().eq("country_id", country_id).either(
                            Domain::new().eq("name", state),
                            Domain::new().eq("code", state),
                        );
                        match client
                            .search_one("res.country.state", &domain, false)
                            .await?
                        {
                            Some(state_id) => {
                                vals.insert("state_id".into(), Value::from(state_id));
                            }
                            None => prov_warn!(
                                context = ctx,
                                "state '{state}' not found for country '{code}'"
                            ),
                        }
                    }
                }
                None => prov_warn!(context = ctx, "country '{code}' not found"),
            }
        }
        None if state.is_some() => {
            prov_warn!(context = ctx, "state ignored: company declares no country_code");
        }
        None => {}
    }

    if vals.is_empty() {
        prov_info!(context = ctx, "company declares no fields; nothing to write");
        return Ok(Outcome::Unchanged(id));
    }

    client.write(MODEL, &[id], vals).await?;
    prov_info!(
        context = ctx,
        "company updated: {}",
        company.name.as_deref().unwrap_or("<unnamed>")
    );
    Ok(Outcome::Updated(id))
}
