//! ---
//! oprov_section: "01-core-functionality"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Resource reconcilers for the provisioning engine."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
//! Privileged writer for the user/group many2many relation.
//!
//! The generic `write` call cannot reliably set `groups_id` over RPC, so the
//! relation rows are inserted server-side by one `ir.actions.server` record.
//! Its code is the constant [`RELATION_WRITER_CODE`]; the login and group ids
//! travel in the call context and are never spliced into the code.

use oprov_logging::{prov_info, prov_warn, LogContext};
use oprov_resilience::{CallError, ResilientClient};
use oprov_rpc::{Domain, RecordId};
use serde_json::{json, Map, Value};

use crate::upsert::{upsert_with, Outcome};

const ACTION_MODEL: &str = "ir.actions.server";

/// Name of the server action holding the relation writer.
pub const RELATION_WRITER_ACTION: &str = "oprov: assign user groups";

/// Server-side code of the relation writer. Reads `provision_login` and
/// `provision_group_ids` from the context.
pub const RELATION_WRITER_CODE: &str = r#"login = env.context.get('provision_login')
group_ids = env.context.get('provision_group_ids') or []
user = env['res.users'].with_context(active_test=False).search([('login', '=', login)], limit=1)
if not user:
    raise UserError("no user with login %s" % login)
for group in env['res.groups'].browse(group_ids).exists():
    env.cr.execute(
        "INSERT INTO res_groups_users_rel (gid, uid) VALUES (%s, %s) ON CONFLICT DO NOTHING",
        (group.id, user.id),
    )
env['res.users'].invalidate_model()
env['res.groups'].invalidate_model()
"#;

/// Registers the relation writer once per run and triggers it per user.
#[derive(Debug)]
pub struct PrivilegedRelationWriter<'a> {
    client: &'a ResilientClient,
    action: Option<RecordId>,
}

impl<'a> PrivilegedRelationWriter<'a> {
    /// Writer with no action registered yet.
    pub fn new(client: &'a ResilientClient) -> Self {
        Self {
            client,
            action: None,
        }
    }

    /// Add every `(group, user)` pair that is missing for `login`.
    pub async fn assign(
        &mut self,
        login: &str,
        group_ids: &[RecordId],
    ) -> Result<Outcome, CallError> {
        let ctx = LogContext::new()
            .with_model(ACTION_MODEL)
            .with_resource(login);
        if group_ids.is_empty() {
            return Ok(Outcome::Skipped("no resolvable groups".into()));
        }
        let Some(action) = self.ensure_action().await? else {
            prov_warn!(context = ctx, "res.users model descriptor not found; groups not assigned");
            return Ok(Outcome::Skipped("res.users model not found".into()));
        };

        let mut context = Map::new();
        context.insert("provision_login".into(), Value::from(login));
        context.insert("provision_group_ids".into(), json!(group_ids));
        self.client
            .call_method(ACTION_MODEL, "run", &[action], Some(context))
            .await?;
        prov_info!(
            context = ctx,
            "{} group(s) ensured for {login}",
            group_ids.len()
        );
        Ok(Outcome::Updated(action))
    }

    async fn ensure_action(&mut self) -> Result<Option<RecordId>, CallError> {
        if let Some(action) = self.action {
            return Ok(Some(action));
        }
        let Some(model_id) = self
            .client
            .search_one("ir.model", &Domain::new().eq("model", "res.users"), false)
            .await?
        else {
            return Ok(None);
        };
        let outcome = upsert_with(
            self.client,
            ACTION_MODEL,
            &Domain::new().eq("name", RELATION_WRITER_ACTION),
            false,
            |_| {
                let mut vals = Map::new();
                vals.insert("name".into(), Value::from(RELATION_WRITER_ACTION));
                vals.insert("model_id".into(), json!(model_id));
                vals.insert("state".into(), Value::from("code"));
                vals.insert("code".into(), Value::from(RELATION_WRITER_CODE));
                vals
            },
        )
        .await?;
        self.action = outcome.id();
        Ok(self.action)
    }
}
