//! ---
//! oprov_section: "01-core-functionality"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Resource reconcilers for the provisioning engine."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use oprov_common::UserConfig;
use oprov_logging::{prov_info, prov_warn, LogContext};
use oprov_resilience::{CallError, ResilientClient};
use oprov_rpc::{Domain, RecordId};
use serde_json::{Map, Value};

use crate::groups::PrivilegedRelationWriter;
use crate::resolver::IdentifierResolver;
use crate::upsert::{upsert_with, Outcome};

const MODEL: &str = "res.users";

/// Language given to users that do not declare one.
pub const DEFAULT_USER_LANG: &str = "es_ES";

/// Result of reconciling one declared user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserOutcome {
    /// Login the entry declared, if any.
    pub login: Option<String>,
    /// Profile upsert.
    pub user: Outcome,
    /// Group assignment, when groups were declared.
    pub groups: Option<Outcome>,
}

/// Reconciles users, sharing one resolver and relation writer across the run.
#[derive(Debug)]
pub struct UserReconciler<'a> {
    client: &'a ResilientClient,
    resolver: IdentifierResolver<'a>,
    writer: PrivilegedRelationWriter<'a>,
}

impl<'a> UserReconciler<'a> {
    /// Reconciler bound to `client`.
    pub fn new(client: &'a ResilientClient) -> Self {
        Self {
            client,
            resolver: IdentifierResolver::new(client),
            writer: PrivilegedRelationWriter::new(client),
        }
    }

    /// Upsert the profile keyed by login, then ensure group membership.
    pub async fn reconcile(&mut self, user: &UserConfig) -> Result<UserOutcome, CallError> {
        let Some(login) = user
            .login
            .as_deref()
            .map(str::trim)
            .filter(|login| !login.is_empty())
        else {
            prov_warn!(
                context = LogContext::new().with_model(MODEL),
                "user entry without login skipped"
            );
            return Ok(UserOutcome {
                login: None,
                user: Outcome::Skipped("missing login".into()),
                groups: None,
            });
        };
        let ctx = LogContext::new().with_model(MODEL).with_resource(login);
        prov_info!(context = ctx, "processing user {login}");

        let outcome = upsert_with(
            self.client,
            MODEL,
            &Domain::new().eq("login", login),
            true,
            |existing| profile_values(login, user, existing),
        )
        .await?;
        match &outcome {
            Outcome::Created(id) => prov_info!(context = ctx, "user {login} created (id={id})"),
            _ => prov_info!(context = ctx, "user {login} updated"),
        }

        let groups = if user.groups.is_empty() {
            None
        } else {
            Some(self.assign_groups(login, &user.groups, ctx).await?)
        };

        Ok(UserOutcome {
            login: Some(login.to_owned()),
            user: outcome,
            groups,
        })
    }

    async fn assign_groups(
        &mut self,
        login: &str,
        groups: &[String],
        ctx: LogContext<'_>,
    ) -> Result<Outcome, CallError> {
        let mut group_ids: Vec<RecordId> = Vec::with_capacity(groups.len());
        for xml_id in groups {
            match self.resolver.resolve(xml_id).await? {
                Some(id) if !group_ids.contains(&id) => group_ids.push(id),
                Some(_) => {}
                None => prov_warn!(context = ctx, "group {xml_id} not found; skipped"),
            }
        }
        if group_ids.is_empty() {
            prov_warn!(context = ctx, "no declared group resolved for {login}");
            return Ok(Outcome::Skipped("no resolvable groups".into()));
        }
        self.writer.assign(login, &group_ids).await
    }
}

// Passwords are set but never logged.
fn profile_values(
    login: &str,
    user: &UserConfig,
    existing: Option<RecordId>,
) -> Map<String, Value> {
    let mut vals = Map::new();
    let name = user
        .name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(login);
    vals.insert("name".into(), Value::from(name));
    vals.insert("login".into(), Value::from(login));
    vals.insert(
        "email".into(),
        user.email
            .as_deref()
            .map(Value::from)
            .unwrap_or(Value::Bool(false)),
    );
    vals.insert("active".into(), Value::Bool(true));
    vals.insert(
        "lang".into(),
        Value::from(user.lang.as_deref().unwrap_or(DEFAULT_USER_LANG)),
    );
    match (&user.password, existing) {
        (Some(password), _) => {
            vals.insert("password".into(), Value::from(password.as_str()));
        }
        (None, None) => {
            vals.insert("password".into(), Value::from(login));
        }
        (None, Some(_)) => {}
    }
    vals
}
