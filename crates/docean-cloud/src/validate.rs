//! Configuration validation against a schema

use crate::diag::Diagnostics;
use crate::error::{CloudError, Result};
use crate::schema::{AttrType, Attribute, Block};
use crate::state::AttributeMap;
use crate::timeouts::TIMEOUTS_KEY;
use crate::value::Value;
use std::collections::BTreeMap;

/// Check a resource configuration before planning
///
/// Reports missing required attributes, unknown attributes, attempts to set
/// computed-only attributes, type mismatches, conflicts, list lengths and
/// validator failures. Deprecated attributes produce warnings.
pub fn validate_config(block: &Block, config: &AttributeMap) -> Result<Diagnostics> {
    let mut errors = Vec::new();
    let mut warnings = Diagnostics::new();

    for key in config.keys() {
        if key != TIMEOUTS_KEY && block.get(key).is_none() {
            errors.push(format!("unsupported argument '{key}'"));
        }
    }

    let fields: BTreeMap<String, Value> = config
        .iter()
        .filter(|(k, _)| k.as_str() != TIMEOUTS_KEY)
        .map(|(k, v)| (k.clone(), Value::from_json(v)))
        .collect();
    check_block(block, &fields, "", &mut errors, &mut warnings);

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(CloudError::Validation(errors))
    }
}

fn check_block(
    block: &Block,
    fields: &BTreeMap<String, Value>,
    prefix: &str,
    errors: &mut Vec<String>,
    warnings: &mut Diagnostics,
) {
    for (name, attr) in block.iter() {
        let path = format!("{prefix}{name}");
        let value = fields.get(name).filter(|v| !v.is_null());

        let Some(value) = value else {
            if attr.required {
                errors.push(format!("'{path}' is required"));
            }
            continue;
        };

        if attr.is_computed_only() {
            errors.push(format!("'{path}' is computed and cannot be set"));
            continue;
        }
        if let Some(message) = &attr.deprecated {
            warnings.warning(format!("'{path}' is deprecated"), Some(message.clone()));
        }
        for other in &attr.conflicts_with {
            if fields.get(other).is_some_and(|v| !v.is_null()) {
                errors.push(format!("'{path}' conflicts with '{prefix}{other}'"));
            }
        }
        check_value(attr, &attr.ty, value, &path, errors, warnings);
    }

    if !prefix.is_empty() {
        for key in fields.keys() {
            if block.get(key).is_none() {
                errors.push(format!("unsupported argument '{prefix}{key}'"));
            }
        }
    }
}

fn check_value(
    attr: &Attribute,
    ty: &AttrType,
    value: &Value,
    path: &str,
    errors: &mut Vec<String>,
    warnings: &mut Diagnostics,
) {
    if let Err(reason) = ty.coerce(value.clone()) {
        // Nested blocks report their own field errors below
        if !matches!(ty.element(), Some(AttrType::Block(_))) {
            errors.push(format!("'{path}': {reason}"));
            return;
        }
    }

    match ty {
        AttrType::List(elem) | AttrType::Set(elem, _) => {
            let Some(items) = value.as_list() else {
                errors.push(format!("'{path}': expected {ty}, got {}", value.kind()));
                return;
            };
            if let Some(max) = attr.max_items.filter(|max| items.len() > *max) {
                errors.push(format!("'{path}': at most {max} item(s) allowed"));
            }
            for (i, item) in items.into_iter().enumerate() {
                let item_path = format!("{path}.{i}");
                match elem.as_ref() {
                    AttrType::Block(block) => match item.as_map() {
                        Some(fields) => {
                            check_block(block, fields, &format!("{item_path}."), errors, warnings)
                        }
                        None => errors.push(format!("'{item_path}': expected block")),
                    },
                    _ => run_validator(attr, item, &item_path, errors),
                }
            }
        }
        AttrType::Block(block) => match value.as_map() {
            Some(fields) => check_block(block, fields, &format!("{path}."), errors, warnings),
            None => errors.push(format!("'{path}': expected block")),
        },
        _ => run_validator(attr, value, path, errors),
    }
}

fn run_validator(attr: &Attribute, value: &Value, path: &str, errors: &mut Vec<String>) {
    if let Some(validate) = &attr.validate {
        if let Err(reason) = validate(value) {
            errors.push(format!("'{path}': {reason}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{int_between, string_in};
    use serde_json::json;

    fn block() -> Block {
        Block::new()
            .attr("name", Attribute::string().required())
            .attr("status", Attribute::string().computed())
            .attr("ssh_keys", Attribute::list(AttrType::String).optional())
            .attr("tag", Attribute::string().optional().conflicts_with(&["droplet_ids"]))
            .attr("droplet_ids", Attribute::list(AttrType::Int).optional())
            .attr("old_field", Attribute::string().optional().deprecated("use name"))
            .attr(
                "backup_policy",
                Attribute::block_list(
                    Block::new()
                        .attr("plan", Attribute::string().required().validate(string_in(&["daily", "weekly"])))
                        .attr("hour", Attribute::int().optional().validate(int_between(0, 20))),
                )
                .optional()
                .max_items(1),
            )
    }

    fn check(config: serde_json::Value) -> Result<Diagnostics> {
        validate_config(&block(), config.as_object().unwrap())
    }

    fn errors(config: serde_json::Value) -> Vec<String> {
        match check(config) {
            Err(CloudError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_config() {
        let diags = check(json!({
            "name": "web",
            "ssh_keys": ["ab:cd"],
            "backup_policy": [{"plan": "weekly", "hour": 8}],
            "timeouts": {"create": "10m"}
        }))
        .unwrap();
        assert!(diags.is_empty());
    }

    #[test]
    fn test_required_unknown_and_computed() {
        let errs = errors(json!({"status": "active", "bogus": 1}));
        assert!(errs.contains(&"'name' is required".to_string()));
        assert!(errs.contains(&"unsupported argument 'bogus'".to_string()));
        assert!(errs.contains(&"'status' is computed and cannot be set".to_string()));
    }

    #[test]
    fn test_nested_validators() {
        let errs = errors(json!({"name": "web", "backup_policy": [{"plan": "hourly", "hour": 21}]}));
        assert_eq!(errs.len(), 2);
        assert!(errs[0].starts_with("'backup_policy.0.hour'"));
        assert!(errs[1].starts_with("'backup_policy.0.plan'"));
    }

    #[test]
    fn test_type_conflict_and_max_items() {
        let errs = errors(json!({
            "name": "web",
            "ssh_keys": "not-a-list",
            "tag": "t",
            "droplet_ids": [1],
            "backup_policy": [{"plan": "daily"}, {"plan": "weekly"}]
        }));
        assert!(errs.iter().any(|e| e.starts_with("'ssh_keys'")));
        assert!(errs.contains(&"'tag' conflicts with 'droplet_ids'".to_string()));
        assert!(errs.contains(&"'backup_policy': at most 1 item(s) allowed".to_string()));
    }

    #[test]
    fn test_deprecated_warns() {
        let diags = check(json!({"name": "web", "old_field": "x"})).unwrap();
        assert_eq!(diags.warnings().count(), 1);
    }
}
