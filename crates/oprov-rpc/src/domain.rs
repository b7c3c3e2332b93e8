//! ---
//! oprov_section: "05-networking-external-interfaces"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "RPC gateway towards the Odoo object API."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
//! Search domains in the platform's prefix notation.
//!
//! A domain is a flat list of `[field, operator, value]` leaves and the
//! logical operators `"|"`, `"&"` and `"!"`. Consecutive leaves are implicitly
//! combined with AND.

use serde_json::{json, Value};

/// Typed builder for search domains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Domain {
    terms: Vec<Value>,
}

impl Domain {
    /// Empty domain, matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an arbitrary `[field, operator, value]` leaf.
    pub fn leaf(mut self, field: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.terms.push(json!([field, operator, value.into()]));
        self
    }

    /// Append `field = value`.
    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.leaf(field, "=", value)
    }

    /// Append `field in values`.
    pub fn is_in<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.leaf(field, "in", Value::Array(values))
    }

    /// Append `left OR right`. Each side is first folded into a single term.
    pub fn either(mut self, left: Domain, right: Domain) -> Self {
        self.terms.push(Value::from("|"));
        self.terms.extend(left.folded());
        self.terms.extend(right.folded());
        self
    }

    /// True when no term was added.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Wire representation.
    pub fn to_value(&self) -> Value {
        Value::Array(self.terms.clone())
    }

    // Prefix `n - 1` explicit ANDs so the domain occupies one operand slot.
    fn folded(self) -> Vec<Value> {
        let operands = count_operands(&self.terms);
        if operands <= 1 {
            return self.terms;
        }
        let mut out = vec![Value::from("&"); operands - 1];
        out.extend(self.terms);
        out
    }
}

impl From<Domain> for Value {
    fn from(domain: Domain) -> Self {
        Value::Array(domain.terms)
    }
}

// Number of top-level operands in a prefix expression.
fn count_operands(terms: &[Value]) -> usize {
    let mut pending = 0usize;
    let mut operands = 0usize;
    for term in terms {
        match term.as_str() {
            Some("|") | Some("&") => pending += 1,
            Some("!") => {}
            _ => {
                if pending > 0 {
                    pending -= 1;
                } else {
                    operands += 1;
                }
            }
        }
    }
    operands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_equality_and_membership_leaves() {
        let domain = Domain::new()
            .eq("module", "base")
            .is_in("name", ["sale", "stock"]);
        assert_eq!(
            domain.to_value(),
            json!([["module", "=", "base"], ["name", "in", ["sale", "stock"]]])
        );
    }

    #[test]
    fn either_uses_prefix_or() {
        let domain = Domain::new().eq("country_id", 68).either(
            Domain::new().eq("name", "Madrid"),
            Domain::new().eq("code", "Madrid"),
        );
        assert_eq!(
            domain.to_value(),
            json!([
                ["country_id", "=", 68],
                "|",
                ["name", "=", "Madrid"],
                ["code", "=", "Madrid"]
            ])
        );
    }

    #[test]
    fn either_folds_multi_leaf_operands() {
        let domain = Domain::new().either(
            Domain::new().eq("a", 1).eq("b", 2),
            Domain::new().eq("c", 3),
        );
        assert_eq!(
            domain.to_value(),
            json!(["|", "&", ["a", "=", 1], ["b", "=", 2], ["c", "=", 3]])
        );
    }

    #[test]
    fn empty_domain_matches_everything() {
        assert!(Domain::new().is_empty());
        assert_eq!(Value::from(Domain::new()), json!([]));
    }
}
