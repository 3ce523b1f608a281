//! field config parser - converts JSON to rule trees
//!
//! covers the declarative subset of the rule model: literals, value lists
//! and branch objects. handler and function rules carry closures and are
//! constructed programmatically through [`RuleNode::handler`] and
//! [`RuleNode::function`].
//!
//! branch objects come in two shapes:
//! - dependency branch: a single key naming another field, mapping its
//!   values to sub-rules: `{"a": {"0": "y", "1": "x"}}`
//! - self branch: every value is a leaf (string/array/number), and the
//!   keys are the owning field's own values: `{"0": ["", "hide"], "1": "required"}`
//!
//! same-level multi-dependency objects are rejected; a handler rule
//! covers that need.

use serde_json::Value as JsonValue;
use thiserror::Error;

use super::types::{FieldConfig, RuleNode};

/// error type for config parsing, annotated with the JSON path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{path}: expected an object of field configs")]
    NotAnObject { path: String },
    #[error("{path}: expected a scalar value, got {got}")]
    NotScalar { path: String, got: String },
    #[error("{path}: branch objects must name exactly one dependency field")]
    MultiKeyBranch { path: String },
    #[error("{path}: unsupported rule shape: {detail}")]
    UnsupportedRule { path: String, detail: String },
}

/// parse a whole field-config map: `{field: {type?, value?, rule?, master?}}`
///
/// fields come back in the JSON map's iteration order (sorted by key),
/// which is also the manager's dispatch discovery order.
pub fn parse_config(json: &JsonValue) -> Result<Vec<(String, FieldConfig)>, ConfigError> {
    let Some(map) = json.as_object() else {
        return Err(ConfigError::NotAnObject {
            path: String::new(),
        });
    };

    let mut fields = Vec::with_capacity(map.len());
    for (key, value) in map {
        fields.push((key.clone(), parse_field(value, key)?));
    }
    Ok(fields)
}

fn parse_field(json: &JsonValue, field_key: &str) -> Result<FieldConfig, ConfigError> {
    let Some(map) = json.as_object() else {
        return Err(ConfigError::NotAnObject {
            path: field_key.into(),
        });
    };

    let mut config = FieldConfig::new();
    if let Some(field_type) = map.get("type") {
        config.field_type = Some(scalar_to_string(field_type, &format!("{field_key}.type"))?);
    }
    if let Some(value) = map.get("value") {
        config.value = scalar_to_string(value, &format!("{field_key}.value"))?;
    }
    if let Some(master) = map.get("master") {
        config.master = master.as_bool().ok_or_else(|| ConfigError::NotScalar {
            path: format!("{field_key}.master"),
            got: type_name(master).into(),
        })?;
    }
    if let Some(rule) = map.get("rule") {
        config.rule = Some(parse_rule(rule, field_key, &format!("{field_key}.rule"))?);
    }
    Ok(config)
}

/// parse a single rule value into a [`RuleNode`]
///
/// `field_key` is the field owning the rule; self-branch objects resolve
/// their dependency to it.
pub fn parse_rule(json: &JsonValue, field_key: &str, path: &str) -> Result<RuleNode, ConfigError> {
    match json {
        JsonValue::String(s) => Ok(RuleNode::Literal(s.clone())),
        JsonValue::Number(_) | JsonValue::Bool(_) => {
            Ok(RuleNode::Literal(scalar_to_string(json, path)?))
        }
        JsonValue::Array(items) => {
            let mut list = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                list.push(scalar_to_string(item, &format!("{path}[{index}]"))?);
            }
            Ok(RuleNode::ValueList(list))
        }
        JsonValue::Object(map) => {
            // all-leaf objects branch on the owning field's own value
            if map.values().all(|value| !value.is_object()) {
                return parse_branches(map, field_key.to_string(), field_key, path);
            }

            // otherwise a single own key names the dependency field
            if map.len() != 1 {
                return Err(ConfigError::MultiKeyBranch { path: path.into() });
            }
            let (dependency, branches_json) = map.iter().next().expect("len checked");
            let branch_path = format!("{path}.{dependency}");

            let Some(branch_map) = branches_json.as_object() else {
                return Err(ConfigError::UnsupportedRule {
                    path: branch_path,
                    detail: "dependency entries must map values to sub-rules".into(),
                });
            };
            parse_branches(branch_map, dependency.clone(), field_key, &branch_path)
        }
        JsonValue::Null => Err(ConfigError::UnsupportedRule {
            path: path.into(),
            detail: "null is not a rule".into(),
        }),
    }
}

fn parse_branches(
    map: &serde_json::Map<String, JsonValue>,
    dependency: String,
    field_key: &str,
    path: &str,
) -> Result<RuleNode, ConfigError> {
    let mut branches = std::collections::BTreeMap::new();
    for (value, sub_rule) in map {
        branches.insert(
            value.clone(),
            parse_rule(sub_rule, field_key, &format!("{path}.{value}"))?,
        );
    }
    Ok(RuleNode::Branch {
        dependency,
        branches,
    })
}

fn scalar_to_string(json: &JsonValue, path: &str) -> Result<String, ConfigError> {
    match json {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        _ => Err(ConfigError::NotScalar {
            path: path.into(),
            got: type_name(json).into(),
        }),
    }
}

fn type_name(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
