//! ---
//! oprov_section: "11-test-harness"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "In-memory platform used by the provisioning tests."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
//! Evaluation of prefix-notation search domains against in-memory records.

use serde_json::{Map, Value};

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        field: String,
        operator: String,
        value: Value,
    },
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
}

/// Parsed domain ready for evaluation.
#[derive(Debug, Clone)]
pub(crate) struct Filter {
    root: Option<Node>,
    mentions_active: bool,
}

impl Filter {
    pub(crate) fn parse(domain: &Value) -> Result<Self, String> {
        let terms = match domain {
            Value::Array(terms) => terms.as_slice(),
            Value::Null => &[],
            other => return Err(format!("domain must be a list, got {other}")),
        };
        let mut cursor = 0;
        let mut root: Option<Node> = None;
        while cursor < terms.len() {
            let node = parse_node(terms, &mut cursor)?;
            root = Some(match root {
                Some(existing) => Node::And(Box::new(existing), Box::new(node)),
                None => node,
            });
        }
        let mentions_active = root.as_ref().map_or(false, mentions_active);
        Ok(Self {
            root,
            mentions_active,
        })
    }

    /// True when the domain filters on `active` itself, which disables the
    /// implicit active filter.
    pub(crate) fn mentions_active(&self) -> bool {
        self.mentions_active
    }

    pub(crate) fn matches(&self, id: i64, record: &Map<String, Value>) -> Result<bool, String> {
        match &self.root {
            Some(node) => eval(node, id, record),
            None => Ok(true),
        }
    }
}

fn parse_node(terms: &[Value], cursor: &mut usize) -> Result<Node, String> {
    let term = terms
        .get(*cursor)
        .ok_or_else(|| "domain ended while an operator expected more operands".to_owned())?;
    *cursor += 1;
    match term {
        Value::String(op) if op == "|" || op == "&" => {
            let left = parse_node(terms, cursor)?;
            let right = parse_node(terms, cursor)?;
            Ok(if op == "|" {
                Node::Or(Box::new(left), Box::new(right))
            } else {
                Node::And(Box::new(left), Box::new(right))
            })
        }
        Value::String(op) if op == "!" => Ok(Node::Not(Box::new(parse_node(terms, cursor)?))),
        Value::Array(parts) if parts.len() == 3 => {
            let field = parts[0]
                .as_str()
                .ok_or_else(|| format!("invalid leaf field in {term}"))?;
            let operator = parts[1]
                .as_str()
                .ok_or_else(|| format!("invalid leaf operator in {term}"))?;
            Ok(Node::Leaf {
                field: field.to_owned(),
                operator: operator.to_owned(),
                value: parts[2].clone(),
            })
        }
        other => Err(format!("invalid domain term {other}")),
    }
}

fn mentions_active(node: &Node) -> bool {
    match node {
        Node::Leaf { field, .. } => field == "active",
        Node::And(left, right) | Node::Or(left, right) => {
            mentions_active(left) || mentions_active(right)
        }
        Node::Not(inner) => mentions_active(inner),
    }
}

fn eval(node: &Node, id: i64, record: &Map<String, Value>) -> Result<bool, String> {
    match node {
        Node::And(left, right) => Ok(eval(left, id, record)? && eval(right, id, record)?),
        Node::Or(left, right) => Ok(eval(left, id, record)? || eval(right, id, record)?),
        Node::Not(inner) => Ok(!eval(inner, id, record)?),
        Node::Leaf {
            field,
            operator,
            value,
        } => {
            let actual = if field == "id" {
                Value::from(id)
            } else {
                record.get(field).cloned().unwrap_or(Value::Bool(false))
            };
            match operator.as_str() {
                "=" => Ok(loose_eq(&actual, value)),
                "!=" => Ok(!loose_eq(&actual, value)),
                "in" => Ok(members(value)?.iter().any(|v| loose_eq(&actual, v))),
                "not in" => Ok(!members(value)?.iter().any(|v| loose_eq(&actual, v))),
                other => Err(format!("unsupported domain operator {other}")),
            }
        }
    }
}

fn members(value: &Value) -> Result<&[Value], String> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| format!("'in' expects a list, got {value}"))
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Bool(false)) | (Value::Bool(false), Value::Null) => true,
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        // many2one values may be stored as [id, display_name]
        (Value::Array(pair), Value::Number(_)) if pair.len() == 2 => loose_eq(&pair[0], right),
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn implicit_and_of_leaves() {
        let filter = Filter::parse(&json!([["module", "=", "base"], ["name", "=", "group_user"]]))
            .unwrap();
        assert!(filter
            .matches(1, &record(json!({"module": "base", "name": "group_user"})))
            .unwrap());
        assert!(!filter
            .matches(1, &record(json!({"module": "base", "name": "group_system"})))
            .unwrap());
    }

    #[test]
    fn prefix_or_and_membership() {
        let filter = Filter::parse(&json!([
            ["country_id", "=", 5],
            "|",
            ["name", "=", "M"],
            ["code", "=", "M"]
        ]))
        .unwrap();
        assert!(filter
            .matches(9, &record(json!({"country_id": 5, "name": "Madrid", "code": "M"})))
            .unwrap());
        assert!(!filter
            .matches(9, &record(json!({"country_id": 6, "name": "Madrid", "code": "M"})))
            .unwrap());

        let filter = Filter::parse(&json!([["id", "in", [1, 3]]])).unwrap();
        assert!(filter.matches(3, &Map::new()).unwrap());
        assert!(!filter.matches(2, &Map::new()).unwrap());
    }

    #[test]
    fn active_leaf_is_detected() {
        assert!(Filter::parse(&json!([["active", "=", false]]))
            .unwrap()
            .mentions_active());
        assert!(!Filter::parse(&json!([])).unwrap().mentions_active());
    }

    #[test]
    fn dangling_operator_is_rejected() {
        assert!(Filter::parse(&json!(["|", ["a", "=", 1]])).is_err());
    }
}
