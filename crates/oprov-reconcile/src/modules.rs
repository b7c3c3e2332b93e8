//! ---
//! oprov_section: "01-core-functionality"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Resource reconcilers for the provisioning engine."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use oprov_logging::{prov_info, LogContext};
use oprov_resilience::{CallError, ResilientClient, SearchOptions};
use oprov_rpc::{Domain, RecordId};
use serde_json::Value;

use crate::error::ReconcileError;
use crate::upsert::Outcome;

const MODEL: &str = "ir.module.module";
const SETTLED_STATES: &[&str] = &["installed", "to upgrade"];

#[derive(Debug)]
struct ModuleState {
    id: RecordId,
    name: String,
    state: String,
}

/// Install the requested modules one at a time, in request order.
///
/// Every name must exist in the module registry; otherwise nothing is
/// installed and [`ReconcileError::MissingModules`] is returned. Modules
/// already `installed` or `to upgrade` are left alone.
pub async fn install_modules(
    client: &ResilientClient,
    names: &[String],
) -> Result<Vec<(String, Outcome)>, ReconcileError> {
    let mut requested: Vec<&str> = Vec::with_capacity(names.len());
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        if !requested.contains(&name) {
            requested.push(name);
        }
    }
    if requested.is_empty() {
        return Ok(Vec::new());
    }

    let ctx = LogContext::new().with_model(MODEL);
    prov_info!(context = ctx, "checking modules: {}", requested.join(", "));
    let registry = client
        .search_read(
            MODEL,
            &Domain::new().is_in("name", requested.iter().copied()),
            &["name", "state"],
            SearchOptions::default(),
        )
        .await?
        .into_iter()
        .map(parse_module)
        .collect::<Result<Vec<_>, _>>()?;

    let missing: Vec<String> = requested
        .iter()
        .filter(|name| !registry.iter().any(|m| m.name == **name))
        .map(|name| (*name).to_owned())
        .collect();
    if !missing.is_empty() {
        return Err(ReconcileError::MissingModules(missing));
    }

    let pending = registry
        .iter()
        .filter(|m| !SETTLED_STATES.contains(&m.state.as_str()))
        .count();
    if pending == 0 {
        prov_info!(context = ctx, "all requested modules already installed");
    }

    let mut outcomes = Vec::with_capacity(requested.len());
    let mut installed = 0;
    for name in requested {
        let Some(module) = registry.iter().find(|m| m.name == name) else {
            continue;
        };
        if SETTLED_STATES.contains(&module.state.as_str()) {
            outcomes.push((name.to_owned(), Outcome::Unchanged(module.id)));
            continue;
        }
        installed += 1;
        let module_ctx = ctx.with_resource(name);
        prov_info!(
            context = module_ctx,
            "installing [{installed}/{pending}]: {name} (state {})",
            module.state
        );
        client
            .call_method(MODEL, "button_immediate_install", &[module.id], None)
            .await?;
        prov_info!(context = module_ctx, "module {name} installed");
        outcomes.push((name.to_owned(), Outcome::Updated(module.id)));
    }
    Ok(outcomes)
}

fn parse_module(row: serde_json::Map<String, Value>) -> Result<ModuleState, CallError> {
    let id = row.get("id").and_then(Value::as_i64);
    let name = row.get("name").and_then(Value::as_str);
    let state = row.get("state").and_then(Value::as_str).unwrap_or_default();
    match (id, name) {
        (Some(id), Some(name)) => Ok(ModuleState {
            id,
            name: name.to_owned(),
            state: state.to_owned(),
        }),
        _ => Err(CallError::Decode {
            model: MODEL.to_owned(),
            method: "search_read".to_owned(),
            detail: format!("module row without id or name: {}", Value::Object(row)),
        }),
    }
}
