//! ---
//! oprov_section: "05-networking-external-interfaces"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "RPC gateway towards the Odoo object API."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
//! Normalisation of id-shaped results.

use serde_json::Value;

/// Integer primary key of a remote record.
pub type RecordId = i64;

/// Flatten a search result into a list of ids.
///
/// Nested lists are flattened; any non-integer element rejects the result.
pub fn ids_from_value(value: &Value) -> Option<Vec<RecordId>> {
    let mut ids = Vec::new();
    collect_ids(value, &mut ids).then_some(ids)
}

fn collect_ids(value: &Value, out: &mut Vec<RecordId>) -> bool {
    match value {
        Value::Number(number) => match number.as_i64() {
            Some(id) => {
                out.push(id);
                true
            }
            None => false,
        },
        Value::Array(items) => items.iter().all(|item| collect_ids(item, out)),
        _ => false,
    }
}

/// Interpret a `create` result, which is either an id or a one-element list.
pub fn id_from_value(value: &Value) -> Option<RecordId> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::Array(_) => match ids_from_value(value)?.as_slice() {
            [id] => Some(*id),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_id_lists() {
        assert_eq!(ids_from_value(&json!([1, [2, 3], []])), Some(vec![1, 2, 3]));
        assert_eq!(ids_from_value(&json!([])), Some(vec![]));
        assert_eq!(ids_from_value(&json!([1, "x"])), None);
        assert_eq!(ids_from_value(&json!(false)), None);
    }

    #[test]
    fn create_result_accepts_scalar_or_singleton() {
        assert_eq!(id_from_value(&json!(42)), Some(42));
        assert_eq!(id_from_value(&json!([42])), Some(42));
        assert_eq!(id_from_value(&json!([1, 2])), None);
        assert_eq!(id_from_value(&json!("42")), None);
    }
}
