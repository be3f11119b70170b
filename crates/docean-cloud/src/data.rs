//! The attribute tree handle passed to resource callbacks

use crate::error::{CloudError, Result};
use crate::schema::{AttrType, Schema, split_path};
use crate::state::{AttributeMap, InstanceState};
use crate::timeouts::{Operation, Timeouts};
use crate::value::{HashedSet, STRING_SET, Value, set_diff};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

/// Old and new attribute values of one resource instance
///
/// Reads see provider writes first, then the planned values. Writes go
/// through the schema: values are type checked and normalized by the
/// attribute's state function before they are stored.
#[derive(Debug, Clone)]
pub struct ResourceData {
    schema: Arc<Schema>,
    id: String,
    old: BTreeMap<String, Value>,
    new: BTreeMap<String, Value>,
    /// Keys of `new` holding raw configuration values
    from_config: BTreeSet<String>,
    written: BTreeMap<String, Value>,
    partial: bool,
    timeouts: Timeouts,
}

impl ResourceData {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            id: String::new(),
            old: BTreeMap::new(),
            new: BTreeMap::new(),
            from_config: BTreeSet::new(),
            written: BTreeMap::new(),
            partial: false,
            timeouts: Timeouts::default(),
        }
    }

    /// Handle over persisted state with no pending change
    pub fn from_state(schema: Arc<Schema>, state: &InstanceState) -> Self {
        let attrs = schema.typed_map(&state.attributes);
        let mut d = Self::new(schema);
        d.id = state.id.clone();
        d.old = attrs.clone();
        d.new = attrs;
        d
    }

    /// Handle over a planned change from `prior` to `config`
    ///
    /// Configured values replace prior ones; unset optional-computed and
    /// computed-only attributes keep their prior values; defaults fill the
    /// rest.
    pub fn planned(schema: Arc<Schema>, prior: Option<&InstanceState>, config: &AttributeMap) -> Self {
        let old = prior
            .map(|p| schema.typed_map(&p.attributes))
            .unwrap_or_default();
        let mut new = BTreeMap::new();
        let mut from_config = BTreeSet::new();

        for (name, attr) in schema.block.iter() {
            let configured = config
                .get(name)
                .filter(|v| !v.is_null() && !attr.is_computed_only())
                .and_then(|json| attr.ty.coerce(Value::from_json(json)).ok())
                .filter(|v| !v.is_null());

            if let Some(value) = configured {
                new.insert(name.clone(), value);
                from_config.insert(name.clone());
            } else if let (Some(default), false) = (&attr.default, attr.is_computed_only()) {
                new.insert(name.clone(), default.clone());
                from_config.insert(name.clone());
            } else if attr.computed {
                if let Some(prior) = old.get(name) {
                    new.insert(name.clone(), prior.clone());
                }
            }
        }

        let mut d = Self::new(schema);
        d.id = prior.map(|p| p.id.clone()).unwrap_or_default();
        d.old = old;
        d.new = new;
        d.from_config = from_config;
        d
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    // ============ Identity ============

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Forget the resource; the host treats it as gone
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    /// True while creating: no prior state exists
    pub fn is_new_resource(&self) -> bool {
        self.old.is_empty()
    }

    pub fn timeout(&self, op: Operation) -> Duration {
        self.timeouts.get(op)
    }

    // ============ Reads ============

    fn lookup(&self, path: &str) -> Option<&Value> {
        let segments = split_path(path);
        let (head, rest) = segments.split_first()?;
        let root = self.written.get(*head).or_else(|| self.new.get(*head))?;
        root.lookup(rest)
    }

    fn zero_at(&self, path: &str) -> Value {
        self.schema
            .type_at(path)
            .map(|t| t.zero())
            .unwrap_or(Value::Null)
    }

    /// Value at `path`, or the zero value of its declared type when unset
    pub fn get(&self, path: &str) -> Value {
        match self.lookup(path) {
            Some(v) if !v.is_null() => v.clone(),
            _ => self.zero_at(path),
        }
    }

    /// Value at `path` when it is set, including explicit zero values
    pub fn get_if_set(&self, path: &str) -> Option<Value> {
        self.lookup(path).filter(|v| !v.is_null()).cloned()
    }

    /// Prior value at `path`
    pub fn get_old(&self, path: &str) -> Value {
        let segments = split_path(path);
        let found = segments
            .split_first()
            .and_then(|(head, rest)| self.old.get(*head)?.lookup(rest));
        match found {
            Some(v) if !v.is_null() => v.clone(),
            _ => self.zero_at(path),
        }
    }

    /// Planned value at `path`, ignoring provider writes
    fn get_planned(&self, path: &str) -> Value {
        let segments = split_path(path);
        let found = segments
            .split_first()
            .and_then(|(head, rest)| self.new.get(*head)?.lookup(rest));
        match found {
            Some(v) if !v.is_null() => v.clone(),
            _ => self.zero_at(path),
        }
    }

    /// Both sides of the pending change at `path`
    pub fn get_change(&self, path: &str) -> (Value, Value) {
        (self.get_old(path), self.get_planned(path))
    }

    /// True iff any of `paths` differs between old and planned values
    pub fn has_change(&self, paths: &[&str]) -> bool {
        paths.iter().any(|path| {
            let old = self.get_old(path);
            let new = self.normalized_planned(path);
            if semantically_equal(&old, &new) {
                return false;
            }
            let suppressed = self
                .schema
                .attribute_at(path)
                .and_then(|a| a.diff_suppress)
                .is_some_and(|suppress| suppress(path, &old, &new));
            !suppressed
        })
    }

    /// Planned value as it would be persisted
    pub(crate) fn normalized_planned(&self, path: &str) -> Value {
        let value = self.get_planned(path);
        let segments = split_path(path);
        let configured = segments
            .first()
            .is_some_and(|head| self.from_config.contains(*head));
        if !configured {
            return value;
        }
        match self.schema.attribute_at(path) {
            Some(attr) => attr.normalize(&value),
            None => value,
        }
    }

    pub fn get_string(&self, path: &str) -> String {
        self.get(path).as_str().unwrap_or_default().to_string()
    }

    pub fn get_bool(&self, path: &str) -> bool {
        self.get(path).as_bool().unwrap_or_default()
    }

    pub fn get_int(&self, path: &str) -> i64 {
        self.get(path).as_int().unwrap_or_default()
    }

    pub fn get_float(&self, path: &str) -> f64 {
        self.get(path).as_float().unwrap_or_default()
    }

    /// Elements of a list or set attribute
    pub fn get_list(&self, path: &str) -> Vec<Value> {
        self.get(path)
            .as_list()
            .map(|items| items.into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// String elements of a list or set; other elements are skipped
    pub fn get_string_list(&self, path: &str) -> Vec<String> {
        self.get_list(path)
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                other => {
                    tracing::warn!("{}: skipping non-string element of kind {}", path, other.kind());
                    None
                }
            })
            .collect()
    }

    pub fn get_map(&self, path: &str) -> BTreeMap<String, Value> {
        self.get(path).as_map().cloned().unwrap_or_default()
    }

    fn hasher_at(&self, path: &str) -> crate::value::SetHasher {
        match self.schema.type_at(path) {
            Some(AttrType::Set(_, hasher)) => hasher,
            _ => STRING_SET,
        }
    }

    fn as_set(&self, path: &str, value: Value) -> HashedSet {
        match value {
            Value::Set(s) => s,
            Value::List(items) => HashedSet::from_values(self.hasher_at(path), items),
            _ => HashedSet::new(self.hasher_at(path)),
        }
    }

    pub fn get_set(&self, path: &str) -> HashedSet {
        self.as_set(path, self.get(path))
    }

    /// `(to_remove, to_add)` for a set attribute
    pub fn set_change(&self, path: &str) -> Result<(HashedSet, HashedSet)> {
        let (old, new) = self.get_change(path);
        set_diff(&self.as_set(path, old), &self.as_set(path, new))
    }

    // ============ Writes ============

    /// Write a top-level attribute
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let attr = self
            .schema
            .get(name)
            .ok_or_else(|| CloudError::attribute(name, "not declared in schema"))?;
        let value = attr
            .ty
            .coerce(value.into())
            .map_err(|reason| CloudError::attribute(name, reason))?;
        let value = attr.normalize(&value);
        self.written.insert(name.to_string(), value);
        Ok(())
    }

    /// While partial, only values written by the provider replace the prior
    /// state
    pub fn set_partial(&mut self, partial: bool) {
        self.partial = partial;
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// State to persist, or `None` when the resource is gone
    pub fn state(&self) -> Option<InstanceState> {
        if self.id.is_empty() {
            return None;
        }
        let mut merged: BTreeMap<String, Value> = if self.partial {
            self.old.clone()
        } else {
            self.new
                .keys()
                .map(|k| (k.clone(), self.normalized_planned(k)))
                .collect()
        };
        for (k, v) in &self.written {
            merged.insert(k.clone(), v.clone());
        }

        let attributes = merged
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k, v.to_json()))
            .collect();
        Some(InstanceState {
            id: self.id.clone(),
            schema_version: self.schema.version,
            attributes,
            ..Default::default()
        })
    }
}

/// Equality where null equals the zero value and zero map entries are
/// ignored
pub fn semantically_equal(a: &Value, b: &Value) -> bool {
    if a.is_zero() && b.is_zero() {
        return true;
    }
    match (a, b) {
        (Value::Map(x), Value::Map(y)) => {
            let keys: BTreeSet<&String> = x.keys().chain(y.keys()).collect();
            keys.into_iter().all(|k| {
                semantically_equal(
                    x.get(k).unwrap_or(&Value::Null),
                    y.get(k).unwrap_or(&Value::Null),
                )
            })
        }
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| semantically_equal(a, b))
        }
        (Value::Float(x), Value::Int(y)) | (Value::Int(y), Value::Float(x)) => *x == *y as f64,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{sha1_hex, state_lowercase, state_sha1};
    use crate::schema::{Attribute, Block};
    use serde_json::json;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(
            Block::new()
                .attr("name", Attribute::string().required())
                .attr("size", Attribute::string().required())
                .attr("region", Attribute::string().optional().state_func(state_lowercase))
                .attr("user_data", Attribute::string().optional().state_func(state_sha1))
                .attr("backups", Attribute::bool().optional().default(false))
                .attr("disk", Attribute::int().computed())
                .attr("vpc_uuid", Attribute::string().optional().computed())
                .attr("volume_ids", Attribute::set(AttrType::String, STRING_SET).optional().computed())
                .attr(
                    "backup_policy",
                    Attribute::block_list(
                        Block::new()
                            .attr("plan", Attribute::string().optional())
                            .attr("hour", Attribute::int().optional()),
                    )
                    .optional(),
                ),
        ))
    }

    fn map(v: serde_json::Value) -> AttributeMap {
        v.as_object().cloned().unwrap()
    }

    fn prior() -> InstanceState {
        InstanceState {
            id: "42".to_string(),
            schema_version: 0,
            timeouts: AttributeMap::new(),
            attributes: map(json!({
                "name": "web",
                "size": "s-1vcpu-1gb",
                "region": "nyc3",
                "disk": 25,
                "vpc_uuid": "vpc-1",
                "volume_ids": ["v1", "v2"],
                "user_data": sha1_hex("#cloud-config"),
            })),
        }
    }

    #[test]
    fn test_get_returns_zero_for_unset() {
        let d = ResourceData::planned(schema(), None, &map(json!({"name": "web"})));
        assert_eq!(d.get("size"), Value::from(""));
        assert_eq!(d.get("disk"), Value::Int(0));
        assert_eq!(d.get_if_set("size"), None);
        assert_eq!(d.get_if_set("backups"), Some(Value::Bool(false)));
        assert_eq!(d.get_int("backup_policy.0.hour"), 0);
    }

    #[test]
    fn test_planned_keeps_computed_values() {
        let config = map(json!({"name": "web", "size": "s-1vcpu-2gb", "region": "NYC3",
            "user_data": "#cloud-config"}));
        let d = ResourceData::planned(schema(), Some(&prior()), &config);

        assert_eq!(d.get_string("vpc_uuid"), "vpc-1");
        assert_eq!(d.get_int("disk"), 25);
        assert!(d.has_change(&["size"]));
        // normalized by state functions before comparison
        assert!(!d.has_change(&["region", "user_data", "vpc_uuid"]));
        // raw config value is what requests see
        assert_eq!(d.get_string("user_data"), "#cloud-config");
        assert_eq!(
            d.get_change("size"),
            (Value::from("s-1vcpu-1gb"), Value::from("s-1vcpu-2gb"))
        );
    }

    #[test]
    fn test_set_change_on_volumes() {
        let config = map(json!({"name": "web", "size": "s-1vcpu-1gb", "volume_ids": ["v2", "v3"]}));
        let d = ResourceData::planned(schema(), Some(&prior()), &config);
        let (remove, add) = d.set_change("volume_ids").unwrap();
        assert_eq!(remove.to_vec(), vec![Value::from("v1")]);
        assert_eq!(add.to_vec(), vec![Value::from("v3")]);
    }

    #[test]
    fn test_set_validates_and_normalizes() {
        let mut d = ResourceData::new(schema());
        assert!(d.set("disk", "large").is_err());
        assert!(d.set("unknown", 1).is_err());

        d.set("region", "AMS3").unwrap();
        assert_eq!(d.get_string("region"), "ams3");
        d.set("volume_ids", Value::string_list(["b", "a"])).unwrap();
        assert_eq!(d.get_set("volume_ids").len(), 2);
    }

    #[test]
    fn test_state_applies_state_funcs_once() {
        let config = map(json!({"name": "web", "size": "s", "user_data": "#cloud-config"}));
        let mut d = ResourceData::planned(schema(), None, &config);
        assert!(d.state().is_none());

        d.set_id("42");
        d.set("disk", 25).unwrap();
        let state = d.state().unwrap();
        assert_eq!(state.attributes["user_data"], json!(sha1_hex("#cloud-config")));
        assert_eq!(state.attributes["disk"], json!(25));
        assert_eq!(state.attributes["backups"], json!(false));
    }

    #[test]
    fn test_partial_preserves_prior_state() {
        let config = map(json!({"name": "renamed", "size": "s-2vcpu-2gb"}));
        let mut d = ResourceData::planned(schema(), Some(&prior()), &config);
        d.set_partial(true);
        d.set("size", "s-2vcpu-2gb").unwrap();

        let state = d.state().unwrap();
        assert_eq!(state.attributes["size"], json!("s-2vcpu-2gb"));
        assert_eq!(state.attributes["name"], json!("web"));

        d.set_partial(false);
        assert_eq!(d.state().unwrap().attributes["name"], json!("renamed"));
    }

    #[test]
    fn test_clear_id_means_gone() {
        let mut d = ResourceData::from_state(schema(), &prior());
        assert!(!d.has_change(&["name", "size", "volume_ids"]));
        d.clear_id();
        assert!(d.state().is_none());
    }

    #[test]
    fn test_semantic_equality() {
        assert!(semantically_equal(&Value::Null, &Value::from("")));
        assert!(semantically_equal(&Value::Int(2), &Value::Float(2.0)));
        let a = Value::Map(BTreeMap::from([("x".to_string(), Value::from(0))]));
        let b = Value::Map(BTreeMap::new());
        assert!(semantically_equal(&a, &b));
        assert!(!semantically_equal(&Value::from("a"), &Value::from("b")));
    }
}
