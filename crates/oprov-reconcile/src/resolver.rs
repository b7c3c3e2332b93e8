//! ---
//! oprov_section: "01-core-functionality"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Resource reconcilers for the provisioning engine."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
//! External identifier (`module.name`) resolution through `ir.model.data`.

use std::collections::HashMap;
use std::fmt;

use oprov_resilience::{CallError, ResilientClient};
use oprov_rpc::{Domain, RecordId};
use serde_json::Value;
use tracing::debug;

const MAPPING_MODEL: &str = "ir.model.data";

/// Parsed `module.name` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalId {
    /// Owning module.
    pub module: String,
    /// Record name inside the module.
    pub name: String,
}

impl ExternalId {
    /// Split on the first `.`; both parts must be non-empty.
    pub fn parse(raw: &str) -> Option<Self> {
        let (module, name) = raw.split_once('.')?;
        if module.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            module: module.to_owned(),
            name: name.to_owned(),
        })
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// Resolves external identifiers to record ids, caching answers for the run.
#[derive(Debug)]
pub struct IdentifierResolver<'a> {
    client: &'a ResilientClient,
    cache: HashMap<ExternalId, Option<RecordId>>,
}

impl<'a> IdentifierResolver<'a> {
    /// Create a resolver with an empty cache.
    pub fn new(client: &'a ResilientClient) -> Self {
        Self {
            client,
            cache: HashMap::new(),
        }
    }

    /// Id of the record `raw` points at.
    ///
    /// `None` for malformed input (no remote call), unknown identifiers and
    /// mappings whose target record no longer exists.
    pub async fn resolve(&mut self, raw: &str) -> Result<Option<RecordId>, CallError> {
        let Some(xml_id) = ExternalId::parse(raw) else {
            debug!(external_id = raw, "malformed external identifier");
            return Ok(None);
        };
        if let Some(cached) = self.cache.get(&xml_id) {
            return Ok(*cached);
        }
        let resolved = self.lookup(&xml_id).await?;
        self.cache.insert(xml_id, resolved);
        Ok(resolved)
    }

    async fn lookup(&self, xml_id: &ExternalId) -> Result<Option<RecordId>, CallError> {
        let domain = Domain::new()
            .eq("module", xml_id.module.as_str())
            .eq("name", xml_id.name.as_str());
        let Some(mapping) = self.client.search_one(MAPPING_MODEL, &domain, false).await? else {
            return Ok(None);
        };

        let rows = self
            .client
            .read(MAPPING_MODEL, &[mapping], &["model", "res_id"])
            .await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let model = row.get("model").and_then(Value::as_str);
        let res_id = row
            .get("res_id")
            .and_then(Value::as_i64)
            .filter(|id| *id > 0);
        let (Some(model), Some(res_id)) = (model, res_id) else {
            return Ok(None);
        };

        let exists = self
            .client
            .search_one(model, &Domain::new().eq("id", res_id), true)
            .await?;
        if exists.is_none() {
            debug!(external_id = %xml_id, model, res_id, "mapping points at a deleted record");
        }
        Ok(exists)
    }
}
