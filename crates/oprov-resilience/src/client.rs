//! ---
//! oprov_section: "07-resilience-fault-tolerance"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Retry and fault classification around platform calls."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use oprov_rpc::{id_from_value, ids_from_value, Connection, Domain, RecordId};
use serde_json::{json, Map, Value};

use crate::error::CallError;
use crate::policy::RetryPolicy;

/// Options for `search` style calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Maximum number of ids returned; `None` returns every match.
    pub limit: Option<u32>,
    /// Disable the implicit `active = True` filter.
    pub include_inactive: bool,
}

impl SearchOptions {
    /// First match only.
    pub fn first() -> Self {
        Self {
            limit: Some(1),
            include_inactive: false,
        }
    }

    /// Also match archived records.
    pub fn including_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    fn kwargs(&self) -> Map<String, Value> {
        let mut kwargs = Map::new();
        if let Some(limit) = self.limit {
            kwargs.insert("limit".into(), json!(limit));
        }
        if self.include_inactive {
            kwargs.insert("context".into(), json!({"active_test": false}));
        }
        kwargs
    }
}

/// Authenticated connection plus the retry policy applied to every call.
#[derive(Debug, Clone)]
pub struct ResilientClient {
    connection: Connection,
    policy: RetryPolicy,
}

impl ResilientClient {
    /// Wrap an established connection.
    pub fn new(connection: Connection, policy: RetryPolicy) -> Self {
        Self { connection, policy }
    }

    /// Invoke `method` on `model` with retry and fault classification.
    pub async fn invoke(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, CallError> {
        self.policy
            .run(model, method, |_| {
                self.connection
                    .execute_kw(model, method, args.clone(), kwargs.clone())
            })
            .await
    }

    /// Ids of records matching `domain`.
    pub async fn search(
        &self,
        model: &str,
        domain: &Domain,
        options: SearchOptions,
    ) -> Result<Vec<RecordId>, CallError> {
        let value = self
            .invoke(model, "search", vec![domain.to_value()], options.kwargs())
            .await?;
        ids_from_value(&value)
            .ok_or_else(|| CallError::decode(model, "search", format!("expected ids, got {value}")))
    }

    /// Id of the first record matching `domain`.
    pub async fn search_one(
        &self,
        model: &str,
        domain: &Domain,
        include_inactive: bool,
    ) -> Result<Option<RecordId>, CallError> {
        let mut options = SearchOptions::first();
        options.include_inactive = include_inactive;
        let ids = self.search(model, domain, options).await?;
        Ok(ids.first().copied())
    }

    /// Records matching `domain`, restricted to `fields`.
    pub async fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[&str],
        options: SearchOptions,
    ) -> Result<Vec<Map<String, Value>>, CallError> {
        let mut kwargs = options.kwargs();
        kwargs.insert("fields".into(), json!(fields));
        let value = self
            .invoke(model, "search_read", vec![domain.to_value()], kwargs)
            .await?;
        records_from_value(model, "search_read", value)
    }

    /// Read `fields` of the given records.
    pub async fn read(
        &self,
        model: &str,
        ids: &[RecordId],
        fields: &[&str],
    ) -> Result<Vec<Map<String, Value>>, CallError> {
        let mut kwargs = Map::new();
        kwargs.insert("fields".into(), json!(fields));
        let value = self.invoke(model, "read", vec![json!(ids)], kwargs).await?;
        records_from_value(model, "read", value)
    }

    /// Write `vals` on the given records.
    pub async fn write(
        &self,
        model: &str,
        ids: &[RecordId],
        vals: Map<String, Value>,
    ) -> Result<(), CallError> {
        self.invoke(
            model,
            "write",
            vec![json!(ids), Value::Object(vals)],
            Map::new(),
        )
        .await
        .map(|_| ())
    }

    /// Create a record and return its id.
    pub async fn create(
        &self,
        model: &str,
        vals: Map<String, Value>,
    ) -> Result<RecordId, CallError> {
        let value = self
            .invoke(model, "create", vec![Value::Object(vals)], Map::new())
            .await?;
        id_from_value(&value)
            .ok_or_else(|| CallError::decode(model, "create", format!("expected an id, got {value}")))
    }

    /// Call a record method such as `button_immediate_install` or `run`.
    pub async fn call_method(
        &self,
        model: &str,
        method: &str,
        ids: &[RecordId],
        context: Option<Map<String, Value>>,
    ) -> Result<Value, CallError> {
        let mut kwargs = Map::new();
        if let Some(context) = context {
            kwargs.insert("context".into(), Value::Object(context));
        }
        self.invoke(model, method, vec![json!(ids)], kwargs).await
    }
}

fn records_from_value(
    model: &str,
    method: &str,
    value: Value,
) -> Result<Vec<Map<String, Value>>, CallError> {
    let Value::Array(items) = value else {
        return Err(CallError::decode(
            model,
            method,
            format!("expected a list of records, got {value}"),
        ));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record),
            other => Err(CallError::decode(
                model,
                method,
                format!("expected a record, got {other}"),
            )),
        })
        .collect()
}
