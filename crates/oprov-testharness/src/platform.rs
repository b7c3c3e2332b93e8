//! ---
//! oprov_section: "11-test-harness"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "In-memory platform used by the provisioning tests."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use oprov_common::Credentials;
use oprov_rpc::{
    connect, ids_from_value, ConnectError, Connection, RecordId, RemoteFault, RpcError,
    RpcTransport, Service,
};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tracing::trace;
use url::Url;

use crate::domain::Filter;

/// Database name served by the fake platform.
pub const FAKE_DB: &str = "provisioning";
/// Administrator login accepted by the fake platform.
pub const ADMIN_LOGIN: &str = "admin";
/// Administrator secret accepted by the fake platform.
pub const ADMIN_SECRET: &str = "admin";
/// Base URL reported in fake credentials.
pub const FAKE_URL: &str = "http://odoo.test:8069";
/// Uid of the administrator account.
pub const ADMIN_UID: RecordId = 2;

const SERVER_VERSION: &str = "17.0";

// Models whose records carry an `active` flag defaulting to true.
const ACTIVE_MODELS: &[&str] = &[
    "res.users",
    "res.lang",
    "ir.mail_server",
    "fetchmail.server",
];

// (model, field) pairs the platform enforces as unique.
const UNIQUE_FIELDS: &[(&str, &str)] = &[
    ("res.users", "login"),
    ("res.lang", "code"),
    ("ir.config_parameter", "key"),
    ("ir.module.module", "name"),
];

/// One request observed by the fake platform, including failed attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Service the request targeted.
    pub service: Service,
    /// Model for `execute_kw` requests.
    pub model: Option<String>,
    /// Model method for `execute_kw`, service method otherwise.
    pub method: String,
    /// Positional arguments (the inner list for `execute_kw`).
    pub args: Vec<Value>,
    /// Keyword arguments for `execute_kw`.
    pub kwargs: Map<String, Value>,
}

impl RecordedCall {
    /// True when this is `method` invoked on `model`.
    pub fn is(&self, model: &str, method: &str) -> bool {
        self.model.as_deref() == Some(model) && self.method == method
    }
}

#[derive(Debug, Default)]
struct Table {
    last_id: RecordId,
    rows: IndexMap<RecordId, Map<String, Value>>,
}

impl Table {
    fn insert(&mut self, vals: Map<String, Value>) -> RecordId {
        self.last_id += 1;
        self.rows.insert(self.last_id, vals);
        self.last_id
    }
}

#[derive(Debug)]
struct FailureRule {
    model: String,
    method: String,
    remaining: Option<u32>,
    error: RpcError,
}

#[derive(Debug, Default)]
struct PlatformState {
    tables: BTreeMap<String, Table>,
    relations: BTreeSet<(RecordId, RecordId)>,
    relation_inserts: Vec<(RecordId, RecordId)>,
    calls: Vec<RecordedCall>,
    failures: Vec<FailureRule>,
}

/// In-memory stand-in for an Odoo server, usable wherever an
/// [`RpcTransport`] is expected.
///
/// Clones share state, so a test can hand one clone to the engine and keep
/// another for assertions.
#[derive(Debug, Clone)]
pub struct FakeOdoo {
    state: Arc<Mutex<PlatformState>>,
}

impl Default for FakeOdoo {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeOdoo {
    /// Bare platform: system and admin users, one company, the `res.users`
    /// model descriptor and the `res.partner.lang` field descriptor.
    pub fn new() -> Self {
        let fake = Self {
            state: Arc::new(Mutex::new(PlatformState::default())),
        };
        fake.insert(
            "res.users",
            json!({"login": "__system__", "name": "OdooBot", "active": false}),
        );
        fake.insert(
            "res.users",
            json!({
                "login": ADMIN_LOGIN,
                "name": "Administrator",
                "password": ADMIN_SECRET,
                "active": true
            }),
        );
        fake.insert("res.company", json!({"name": "My Company"}));
        fake.insert("ir.model", json!({"model": "res.users", "name": "User"}));
        fake.insert(
            "ir.model.fields",
            json!({"model": "res.partner", "name": "lang", "ttype": "selection"}),
        );
        fake
    }

    /// Platform seeded the way a fresh database usually looks: `en_US`
    /// active, `es_ES` known but inactive, Spain with a Madrid state, the
    /// `base.group_user` and `base.group_system` groups and `base` installed.
    pub fn standard() -> Self {
        let fake = Self::new();
        fake.with_language("en_US", true);
        fake.with_language("es_ES", false);
        let spain = fake.with_country("ES", "Spain");
        fake.with_state(spain, "Madrid", "M");
        fake.with_group("base.group_user", "Internal User");
        fake.with_group("base.group_system", "Settings");
        fake.with_module("base", "installed");
        fake
    }

    /// Insert a raw record and return its id.
    pub fn insert(&self, model: &str, vals: Value) -> RecordId {
        let vals = vals.as_object().cloned().unwrap_or_default();
        self.state.lock().table(model).insert(vals)
    }

    /// Register a module in the registry with the given state.
    pub fn with_module(&self, name: &str, state: &str) -> RecordId {
        self.insert(
            "ir.module.module",
            json!({"name": name, "state": state, "shortdesc": name}),
        )
    }

    /// Register a language pack.
    pub fn with_language(&self, code: &str, active: bool) -> RecordId {
        self.insert(
            "res.lang",
            json!({"code": code, "name": code, "active": active}),
        )
    }

    /// Register a country.
    pub fn with_country(&self, code: &str, name: &str) -> RecordId {
        self.insert("res.country", json!({"code": code, "name": name}))
    }

    /// Register a state of `country_id`.
    pub fn with_state(&self, country_id: RecordId, name: &str, code: &str) -> RecordId {
        self.insert(
            "res.country.state",
            json!({"country_id": country_id, "name": name, "code": code}),
        )
    }

    /// Create a security group and map `xml_id` to it.
    pub fn with_group(&self, xml_id: &str, name: &str) -> RecordId {
        let id = self.insert("res.groups", json!({"name": name}));
        self.with_external_id(xml_id, "res.groups", id);
        id
    }

    /// Map `xml_id` (`module.name`) to `model`/`res_id`.
    pub fn with_external_id(&self, xml_id: &str, model: &str, res_id: RecordId) -> RecordId {
        let (module, name) = xml_id.split_once('.').unwrap_or(("", xml_id));
        self.insert(
            "ir.model.data",
            json!({"module": module, "name": name, "model": model, "res_id": res_id}),
        )
    }

    /// Delete a record, leaving any mapping that points at it dangling.
    pub fn remove(&self, model: &str, id: RecordId) -> bool {
        self.state.lock().table(model).rows.shift_remove(&id).is_some()
    }

    /// Make the next `times` matching calls fail with `error`; `None` fails
    /// forever. `model` is empty for `common` service calls.
    pub fn fail(&self, model: &str, method: &str, times: Option<u32>, error: RpcError) {
        self.state.lock().failures.push(FailureRule {
            model: model.to_owned(),
            method: method.to_owned(),
            remaining: times,
            error,
        });
    }

    /// All records of `model` with their `id`.
    pub fn records(&self, model: &str) -> Vec<Map<String, Value>> {
        let mut state = self.state.lock();
        state
            .table(model)
            .rows
            .iter()
            .map(|(id, row)| with_id(*id, row))
            .collect()
    }

    /// A single record by id.
    pub fn record(&self, model: &str, id: RecordId) -> Option<Map<String, Value>> {
        let mut state = self.state.lock();
        state.table(model).rows.get(&id).map(|row| with_id(id, row))
    }

    /// Records of `model` whose `field` equals `value`.
    pub fn find_by(
        &self,
        model: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> Vec<Map<String, Value>> {
        let value = value.into();
        self.records(model)
            .into_iter()
            .filter(|row| row.get(field) == Some(&value))
            .collect()
    }

    /// Number of records of `model`.
    pub fn count(&self, model: &str) -> usize {
        self.state.lock().table(model).rows.len()
    }

    /// Current `(group_id, user_id)` rows of the user/group relation table.
    pub fn relations(&self) -> Vec<(RecordId, RecordId)> {
        self.state.lock().relations.iter().copied().collect()
    }

    /// Rows actually inserted into the relation table, in insertion order.
    pub fn relation_inserts(&self) -> Vec<(RecordId, RecordId)> {
        self.state.lock().relation_inserts.clone()
    }

    /// Every request received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Number of requests for `method` on `model`.
    pub fn calls_to(&self, model: &str, method: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.is(model, method))
            .count()
    }

    /// Forget the call log.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Credentials the fake platform accepts.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            base_url: Url::parse(FAKE_URL).expect("FAKE_URL is a valid URL"),
            db: FAKE_DB.to_owned(),
            login: ADMIN_LOGIN.to_owned(),
            secret: ADMIN_SECRET.to_owned(),
        }
    }

    /// This platform as a shared transport handle.
    pub fn transport(&self) -> Arc<dyn RpcTransport> {
        Arc::new(self.clone())
    }

    /// Authenticate as the administrator.
    pub async fn connect(&self) -> Result<Connection, ConnectError> {
        connect(self.transport(), &self.credentials()).await
    }
}

#[async_trait]
impl RpcTransport for FakeOdoo {
    async fn call(
        &self,
        service: Service,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, RpcError> {
        let mut state = self.state.lock();
        let call = match service {
            Service::Common => RecordedCall {
                service,
                model: None,
                method: method.to_owned(),
                args: args.clone(),
                kwargs: Map::new(),
            },
            Service::Object => object_call(method, &args)?,
        };
        trace!(model = ?call.model, method = %call.method, "fake platform call");
        state.calls.push(call.clone());

        if let Some(error) = state.take_failure(&call) {
            return Err(error);
        }

        match service {
            Service::Common => state.common(method, &args),
            Service::Object => {
                state.check_session(&args)?;
                let model = call.model.as_deref().unwrap_or_default();
                state.execute(model, &call.method, &call.args, &call.kwargs)
            }
        }
    }
}

fn object_call(method: &str, args: &[Value]) -> Result<RecordedCall, RpcError> {
    if method != "execute_kw" {
        return Err(fault(
            format!("object service has no method {method}"),
            "builtins.AttributeError",
        ));
    }
    let model = args.get(3).and_then(Value::as_str);
    let model_method = args.get(4).and_then(Value::as_str);
    let (Some(model), Some(model_method)) = (model, model_method) else {
        return Err(fault(
            "execute_kw expects db, uid, password, model, method",
            "builtins.TypeError",
        ));
    };
    Ok(RecordedCall {
        service: Service::Object,
        model: Some(model.to_owned()),
        method: model_method.to_owned(),
        args: args
            .get(5)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        kwargs: args
            .get(6)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    })
}

impl PlatformState {
    fn table(&mut self, model: &str) -> &mut Table {
        self.tables.entry(model.to_owned()).or_default()
    }

    fn take_failure(&mut self, call: &RecordedCall) -> Option<RpcError> {
        let model = call.model.as_deref().unwrap_or_default();
        let index = self
            .failures
            .iter()
            .position(|rule| rule.model == model && rule.method == call.method)?;
        let rule = &mut self.failures[index];
        let error = rule.error.clone();
        if let Some(remaining) = rule.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.failures.remove(index);
            }
        }
        Some(error)
    }

    fn common(&mut self, method: &str, args: &[Value]) -> Result<Value, RpcError> {
        match method {
            "version" => Ok(json!({
                "server_version": SERVER_VERSION,
                "server_version_info": [17, 0, 0, "final", 0, ""],
                "server_serie": SERVER_VERSION,
                "protocol_version": 1
            })),
            "authenticate" => {
                let db = args.first().and_then(Value::as_str).unwrap_or_default();
                if db != FAKE_DB {
                    return Err(fault(
                        format!("database \"{db}\" does not exist"),
                        "psycopg2.OperationalError",
                    ));
                }
                let login = args.get(1).cloned().unwrap_or(Value::Null);
                let password = args.get(2).cloned().unwrap_or(Value::Null);
                let uid = self.table("res.users").rows.iter().find_map(|(id, row)| {
                    let active = row.get("active") != Some(&Value::Bool(false));
                    (active
                        && row.get("login") == Some(&login)
                        && row.get("password") == Some(&password))
                    .then_some(*id)
                });
                Ok(uid.map(Value::from).unwrap_or(Value::Bool(false)))
            }
            other => Err(fault(
                format!("common service has no method {other}"),
                "builtins.AttributeError",
            )),
        }
    }

    fn check_session(&self, args: &[Value]) -> Result<(), RpcError> {
        let db = args.first().and_then(Value::as_str);
        let uid = args.get(1).and_then(Value::as_i64);
        let secret = args.get(2).and_then(Value::as_str);
        if db == Some(FAKE_DB) && uid == Some(ADMIN_UID) && secret == Some(ADMIN_SECRET) {
            Ok(())
        } else {
            Err(fault("Access Denied", "odoo.exceptions.AccessDenied"))
        }
    }

    fn execute(
        &mut self,
        model: &str,
        method: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<Value, RpcError> {
        match method {
            "search" => {
                let ids = self.search(model, args.first(), kwargs)?;
                Ok(json!(ids))
            }
            "search_read" => {
                let ids = self.search(model, args.first(), kwargs)?;
                let fields = field_list(args.get(1).or_else(|| kwargs.get("fields")));
                self.read(model, &ids, fields.as_deref())
            }
            "read" => {
                let ids = arg_ids(args.first())?;
                let fields = field_list(args.get(1).or_else(|| kwargs.get("fields")));
                self.read(model, &ids, fields.as_deref())
            }
            "write" => {
                let ids = arg_ids(args.first())?;
                let vals = arg_vals(args.get(1))?;
                self.write(model, &ids, vals)?;
                Ok(Value::Bool(true))
            }
            "create" => match args.first() {
                Some(Value::Array(batch)) => {
                    let mut ids = Vec::with_capacity(batch.len());
                    for vals in batch {
                        ids.push(self.create(model, arg_vals(Some(vals))?)?);
                    }
                    Ok(json!(ids))
                }
                other => Ok(json!(self.create(model, arg_vals(other)?)?)),
            },
            "button_immediate_install" if model == "ir.module.module" => {
                let ids = arg_ids(args.first())?;
                self.install(&ids)?;
                Ok(json!({"type": "ir.actions.client", "tag": "reload"}))
            }
            "run" if model == "ir.actions.server" => {
                let ids = arg_ids(args.first())?;
                self.run_actions(&ids, context(kwargs))?;
                Ok(Value::Bool(false))
            }
            other => Err(fault(
                format!("The method '{other}' does not exist on the model '{model}'"),
                "builtins.AttributeError",
            )),
        }
    }

    fn search(
        &mut self,
        model: &str,
        domain: Option<&Value>,
        kwargs: &Map<String, Value>,
    ) -> Result<Vec<RecordId>, RpcError> {
        let domain = domain
            .or_else(|| kwargs.get("domain"))
            .cloned()
            .unwrap_or_else(|| json!([]));
        let filter = Filter::parse(&domain).map_err(|msg| fault(msg, "builtins.ValueError"))?;
        let active_test = context(kwargs)
            .get("active_test")
            .and_then(Value::as_bool)
            .unwrap_or(true)
            && !filter.mentions_active();
        let limit = kwargs
            .get("limit")
            .and_then(Value::as_u64)
            .filter(|limit| *limit > 0)
            .map(|limit| limit as usize);

        let mut ids = Vec::new();
        for (id, row) in &self.table(model).rows {
            if active_test && row.get("active") == Some(&Value::Bool(false)) {
                continue;
            }
            if filter
                .matches(*id, row)
                .map_err(|msg| fault(msg, "builtins.ValueError"))?
            {
                ids.push(*id);
            }
            if limit.map_or(false, |limit| ids.len() >= limit) {
                break;
            }
        }
        Ok(ids)
    }

    fn read(
        &mut self,
        model: &str,
        ids: &[RecordId],
        fields: Option<&[String]>,
    ) -> Result<Value, RpcError> {
        let table = self.table(model);
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let row = table.rows.get(id).ok_or_else(|| missing(model, *id))?;
            let mut projected = Map::new();
            projected.insert("id".into(), json!(id));
            match fields {
                Some(fields) if !fields.is_empty() => {
                    for field in fields {
                        let value = row.get(field).cloned().unwrap_or(Value::Bool(false));
                        projected.insert(field.clone(), value);
                    }
                }
                _ => projected.extend(row.clone()),
            }
            out.push(Value::Object(projected));
        }
        Ok(Value::Array(out))
    }

    fn write(
        &mut self,
        model: &str,
        ids: &[RecordId],
        vals: Map<String, Value>,
    ) -> Result<(), RpcError> {
        for id in ids {
            if !self.table(model).rows.contains_key(id) {
                return Err(missing(model, *id));
            }
            self.check_unique(model, &vals, Some(*id))?;
        }
        let table = self.table(model);
        for id in ids {
            if let Some(row) = table.rows.get_mut(id) {
                row.extend(vals.clone());
            }
        }
        Ok(())
    }

    fn create(&mut self, model: &str, mut vals: Map<String, Value>) -> Result<RecordId, RpcError> {
        self.check_unique(model, &vals, None)?;
        if ACTIVE_MODELS.contains(&model) {
            vals.entry("active").or_insert(Value::Bool(true));
        }
        Ok(self.table(model).insert(vals))
    }

    fn check_unique(
        &mut self,
        model: &str,
        vals: &Map<String, Value>,
        except: Option<RecordId>,
    ) -> Result<(), RpcError> {
        for (unique_model, field) in UNIQUE_FIELDS {
            if *unique_model != model {
                continue;
            }
            let Some(value) = vals.get(*field) else {
                continue;
            };
            let clash = self
                .table(model)
                .rows
                .iter()
                .any(|(id, row)| Some(*id) != except && row.get(*field) == Some(value));
            if clash {
                return Err(fault(
                    format!("{model}.{field} must be unique ({value} already exists)"),
                    "odoo.exceptions.ValidationError",
                ));
            }
        }
        Ok(())
    }

    fn install(&mut self, ids: &[RecordId]) -> Result<(), RpcError> {
        let table = self.table("ir.module.module");
        for id in ids {
            let row = table
                .rows
                .get_mut(id)
                .ok_or_else(|| missing("ir.module.module", *id))?;
            row.insert("state".into(), json!("installed"));
        }
        Ok(())
    }

    // Emulates the group relation writer: locate the user by login, then add
    // the missing (gid, uid) rows for the groups that exist.
    fn run_actions(&mut self, ids: &[RecordId], ctx: Map<String, Value>) -> Result<(), RpcError> {
        for id in ids {
            let code = self
                .table("ir.actions.server")
                .rows
                .get(id)
                .ok_or_else(|| missing("ir.actions.server", *id))?
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            if !(code.contains("res_groups_users_rel") && code.contains("ON CONFLICT DO NOTHING")) {
                return Err(fault(
                    "fake platform only executes the group relation writer",
                    "odoo.exceptions.UserError",
                ));
            }

            let login = ctx.get("provision_login").cloned().unwrap_or(Value::Null);
            let uid = self
                .table("res.users")
                .rows
                .iter()
                .find_map(|(uid, row)| (row.get("login") == Some(&login)).then_some(*uid))
                .ok_or_else(|| {
                    fault(
                        format!("no user with login {login}"),
                        "odoo.exceptions.UserError",
                    )
                })?;
            let group_ids = ctx
                .get("provision_group_ids")
                .and_then(ids_from_value)
                .unwrap_or_default();
            for gid in group_ids {
                if !self.table("res.groups").rows.contains_key(&gid) {
                    continue;
                }
                if self.relations.insert((gid, uid)) {
                    self.relation_inserts.push((gid, uid));
                }
            }
        }
        Ok(())
    }
}

fn fault(message: impl Into<String>, exception: &str) -> RpcError {
    RpcError::Fault(RemoteFault {
        code: 200,
        message: message.into(),
        exception: Some(exception.to_owned()),
    })
}

fn missing(model: &str, id: RecordId) -> RpcError {
    fault(
        format!("Record does not exist or has been deleted. (Record: {model}({id},))"),
        "odoo.exceptions.MissingError",
    )
}

fn with_id(id: RecordId, row: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("id".into(), json!(id));
    out.extend(row.clone());
    out
}

fn context(kwargs: &Map<String, Value>) -> Map<String, Value> {
    kwargs
        .get("context")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn field_list(value: Option<&Value>) -> Option<Vec<String>> {
    value.and_then(Value::as_array).map(|fields| {
        fields
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect()
    })
}

fn arg_ids(value: Option<&Value>) -> Result<Vec<RecordId>, RpcError> {
    value
        .and_then(ids_from_value)
        .ok_or_else(|| fault("expected a list of record ids", "builtins.TypeError"))
}

fn arg_vals(value: Option<&Value>) -> Result<Map<String, Value>, RpcError> {
    value
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| fault("expected a dictionary of values", "builtins.TypeError"))
}
