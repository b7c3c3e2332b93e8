//! ---
//! oprov_section: "01-core-functionality"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Resource reconcilers for the provisioning engine."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use std::fmt;

use oprov_resilience::{CallError, ResilientClient};
use oprov_rpc::{Domain, RecordId};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// What a reconciler did to one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    /// A new record was created.
    Created(RecordId),
    /// The existing record was written.
    Updated(RecordId),
    /// The record already matched; nothing was sent.
    Unchanged(RecordId),
    /// The step was skipped; the reason was logged as a warning.
    Skipped(String),
}

impl Outcome {
    /// Record touched by the step, if any.
    pub fn id(&self) -> Option<RecordId> {
        match self {
            Outcome::Created(id) | Outcome::Updated(id) | Outcome::Unchanged(id) => Some(*id),
            Outcome::Skipped(_) => None,
        }
    }

    /// Stable lowercase label.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Created(_) => "created",
            Outcome::Updated(_) => "updated",
            Outcome::Unchanged(_) => "unchanged",
            Outcome::Skipped(_) => "skipped",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Skipped(reason) => write!(f, "skipped ({reason})"),
            other => match other.id() {
                Some(id) => write!(f, "{} (id={id})", other.label()),
                None => f.write_str(other.label()),
            },
        }
    }
}

/// Locate the first record of `model` matching `key`, then write the values
/// produced by `build` on it, or create a record with them.
///
/// `build` receives the id of the existing record, or `None` when the record
/// is about to be created.
pub async fn upsert_with<F>(
    client: &ResilientClient,
    model: &str,
    key: &Domain,
    include_inactive: bool,
    build: F,
) -> Result<Outcome, CallError>
where
    F: FnOnce(Option<RecordId>) -> Map<String, Value>,
{
    match client.search_one(model, key, include_inactive).await? {
        Some(id) => {
            let vals = build(Some(id));
            debug!(model, id, fields = vals.len(), "updating existing record");
            client.write(model, &[id], vals).await?;
            Ok(Outcome::Updated(id))
        }
        None => {
            let vals = build(None);
            debug!(model, fields = vals.len(), "creating record");
            let id = client.create(model, vals).await?;
            Ok(Outcome::Created(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oprov_resilience::RetryPolicy;
    use oprov_testharness::FakeOdoo;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn creates_then_updates_same_record() {
        let fake = FakeOdoo::standard();
        let client = ResilientClient::new(
            fake.connect().await.unwrap(),
            RetryPolicy::new(1, Duration::ZERO),
        );
        let key = Domain::new().eq("key", "web.base.url");
        let build = |existing: Option<RecordId>| {
            let mut vals = Map::new();
            if existing.is_none() {
                vals.insert("key".into(), json!("web.base.url"));
            }
            vals.insert("value".into(), json!("https://erp.example.com"));
            vals
        };

        let first = upsert_with(&client, "ir.config_parameter", &key, false, build)
            .await
            .unwrap();
        let second = upsert_with(&client, "ir.config_parameter", &key, false, build)
            .await
            .unwrap();

        assert!(matches!(first, Outcome::Created(_)));
        assert_eq!(second, Outcome::Updated(first.id().unwrap()));
        assert_eq!(fake.count("ir.config_parameter"), 1);
    }

    #[test]
    fn outcome_display_is_readable() {
        assert_eq!(Outcome::Created(7).to_string(), "created (id=7)");
        assert_eq!(
            Outcome::Skipped("no company".into()).to_string(),
            "skipped (no company)"
        );
    }
}
