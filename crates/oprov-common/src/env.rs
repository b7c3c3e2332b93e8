//! ---
//! oprov_section: "01-core-functionality"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Shared configuration primitives for the provisioning engine."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
//! `${VAR}` expansion over a parsed YAML tree.
//!
//! Placeholders may appear anywhere inside a string scalar. Mapping keys are
//! never expanded. A placeholder whose variable is unset is a hard error so a
//! half-resolved document never reaches the engine.

use serde_yaml::{Mapping, Value};

use crate::error::ConfigError;

/// Expand placeholders using a caller-supplied lookup.
pub fn expand_env_with<F>(value: Value, lookup: F) -> Result<Value, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    walk(value, &lookup, "")
}

fn walk<F>(value: Value, lookup: &F, location: &str) -> Result<Value, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(raw) => Ok(Value::String(expand_str(&raw, lookup, location)?)),
        Value::Sequence(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| walk(item, lookup, &format!("{location}[{index}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence),
        Value::Mapping(map) => {
            let mut expanded = Mapping::with_capacity(map.len());
            for (key, item) in map {
                let label = match &key {
                    Value::String(s) => s.clone(),
                    other => format!("{other:?}"),
                };
                let child = if location.is_empty() {
                    label
                } else {
                    format!("{location}.{label}")
                };
                let item = walk(item, lookup, &child)?;
                expanded.insert(key, item);
            }
            Ok(Value::Mapping(expanded))
        }
        Value::Tagged(mut tagged) => {
            tagged.value = walk(tagged.value, lookup, location)?;
            Ok(Value::Tagged(tagged))
        }
        other => Ok(other),
    }
}

fn expand_str<F>(input: &str, lookup: &F, location: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: keep the remainder verbatim.
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let name = &after[..end];
        if !is_var_name(name) {
            out.push_str("${");
            rest = after;
            continue;
        }
        match lookup(name) {
            Some(resolved) => out.push_str(&resolved),
            None => {
                return Err(ConfigError::UnresolvedPlaceholder {
                    var: name.to_owned(),
                    location: if location.is_empty() {
                        "<root>".to_owned()
                    } else {
                        location.to_owned()
                    },
                })
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
