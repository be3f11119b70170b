//! Resource schemas
//!
//! A schema describes every attribute path of a resource kind: its type,
//! whether the user or the provider owns it, and the hooks that keep
//! persisted values stable across plans.

use crate::value::{HashedSet, SetHasher, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Validation hook; returns a human readable reason on failure
pub type ValidateFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Transform applied to a value before it is persisted
pub type StateFn = fn(&Value) -> Value;

/// Returns true when the change from old to new on `path` is not meaningful
pub type DiffSuppressFn = fn(path: &str, old: &Value, new: &Value) -> bool;

#[derive(Debug, Clone, PartialEq)]
pub enum AttrType {
    String,
    Bool,
    Int,
    Float,
    List(Box<AttrType>),
    Set(Box<AttrType>, SetHasher),
    /// A nested resource: a map with typed fields
    Block(Arc<Block>),
}

impl AttrType {
    pub fn list_of(elem: AttrType) -> Self {
        AttrType::List(Box::new(elem))
    }

    pub fn set_of(elem: AttrType, hasher: SetHasher) -> Self {
        AttrType::Set(Box::new(elem), hasher)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            AttrType::String | AttrType::Bool | AttrType::Int | AttrType::Float
        )
    }

    /// Element type of a list or set
    pub fn element(&self) -> Option<&AttrType> {
        match self {
            AttrType::List(e) | AttrType::Set(e, _) => Some(e),
            _ => None,
        }
    }

    pub fn zero(&self) -> Value {
        match self {
            AttrType::String => Value::String(String::new()),
            AttrType::Bool => Value::Bool(false),
            AttrType::Int => Value::Int(0),
            AttrType::Float => Value::Float(0.0),
            AttrType::List(_) => Value::List(Vec::new()),
            AttrType::Set(_, hasher) => Value::Set(HashedSet::new(*hasher)),
            AttrType::Block(_) => Value::Map(BTreeMap::new()),
        }
    }

    /// Convert a value into this type
    ///
    /// Lists are accepted for sets, integers for floats, and nested blocks
    /// are converted field by field. Null passes through.
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (AttrType::String, v @ Value::String(_)) => Ok(v),
            (AttrType::Bool, v @ Value::Bool(_)) => Ok(v),
            (AttrType::Int, v @ Value::Int(_)) => Ok(v),
            (AttrType::Int, Value::Float(f)) if f.fract() == 0.0 => Ok(Value::Int(f as i64)),
            (AttrType::Float, v @ Value::Float(_)) => Ok(v),
            (AttrType::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (AttrType::List(elem), Value::List(items)) => items
                .into_iter()
                .map(|v| elem.coerce(v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (AttrType::List(elem), Value::Set(set)) => set
                .to_vec()
                .into_iter()
                .map(|v| elem.coerce(v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (AttrType::Set(elem, hasher), Value::List(items)) => {
                let items = items
                    .into_iter()
                    .map(|v| elem.coerce(v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Set(HashedSet::from_values(*hasher, items)))
            }
            (AttrType::Set(elem, hasher), Value::Set(set)) => {
                if set.hasher() != *hasher {
                    return Err(format!(
                        "set hasher '{}' does not match '{}'",
                        set.hasher().name(),
                        hasher.name()
                    ));
                }
                let items = set
                    .to_vec()
                    .into_iter()
                    .map(|v| elem.coerce(v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Set(HashedSet::from_values(*hasher, items)))
            }
            (AttrType::Block(block), Value::Map(fields)) => block.coerce(fields).map(Value::Map),
            (ty, v) => Err(format!("expected {}, got {}", ty, v.kind())),
        }
    }

    /// Typed conversion from persisted JSON; mismatching nodes become null
    pub fn from_json(&self, json: &serde_json::Value) -> Value {
        self.coerce(Value::from_json(json)).unwrap_or(Value::Null)
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrType::String => write!(f, "string"),
            AttrType::Bool => write!(f, "bool"),
            AttrType::Int => write!(f, "int"),
            AttrType::Float => write!(f, "float"),
            AttrType::List(e) => write!(f, "list of {e}"),
            AttrType::Set(e, _) => write!(f, "set of {e}"),
            AttrType::Block(_) => write!(f, "block"),
        }
    }
}

/// One attribute of a schema
#[derive(Clone)]
pub struct Attribute {
    pub ty: AttrType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub force_new: bool,
    pub sensitive: bool,
    pub default: Option<Value>,
    pub state_func: Option<StateFn>,
    pub diff_suppress: Option<DiffSuppressFn>,
    pub validate: Option<ValidateFn>,
    pub deprecated: Option<String>,
    pub conflicts_with: Vec<String>,
    pub max_items: Option<usize>,
    pub description: String,
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("ty", &self.ty)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("force_new", &self.force_new)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
            && self.required == other.required
            && self.optional == other.optional
            && self.computed == other.computed
            && self.force_new == other.force_new
    }
}

impl Attribute {
    pub fn new(ty: AttrType) -> Self {
        Self {
            ty,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            default: None,
            state_func: None,
            diff_suppress: None,
            validate: None,
            deprecated: None,
            conflicts_with: Vec::new(),
            max_items: None,
            description: String::new(),
        }
    }

    pub fn string() -> Self {
        Self::new(AttrType::String)
    }

    pub fn bool() -> Self {
        Self::new(AttrType::Bool)
    }

    pub fn int() -> Self {
        Self::new(AttrType::Int)
    }

    pub fn float() -> Self {
        Self::new(AttrType::Float)
    }

    pub fn list(elem: AttrType) -> Self {
        Self::new(AttrType::list_of(elem))
    }

    pub fn set(elem: AttrType, hasher: SetHasher) -> Self {
        Self::new(AttrType::set_of(elem, hasher))
    }

    /// A list of nested blocks
    pub fn block_list(block: Block) -> Self {
        Self::new(AttrType::list_of(AttrType::Block(Arc::new(block))))
    }

    /// A set of nested blocks
    pub fn block_set(block: Block, hasher: SetHasher) -> Self {
        Self::new(AttrType::set_of(AttrType::Block(Arc::new(block)), hasher))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn state_func(mut self, f: StateFn) -> Self {
        self.state_func = Some(f);
        self
    }

    pub fn diff_suppress(mut self, f: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(f);
        self
    }

    pub fn validate(mut self, f: ValidateFn) -> Self {
        self.validate = Some(f);
        self
    }

    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = Some(message.into());
        self
    }

    pub fn conflicts_with(mut self, paths: &[&str]) -> Self {
        self.conflicts_with = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    /// Written only by the provider
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    /// Apply the state function, recursing into nested blocks
    pub fn normalize(&self, value: &Value) -> Value {
        let value = match self.state_func {
            Some(f) if !value.is_null() => f(value),
            _ => value.clone(),
        };
        normalize_nested(&self.ty, value)
    }
}

fn normalize_nested(ty: &AttrType, value: Value) -> Value {
    match (ty, value) {
        (AttrType::Block(block), Value::Map(fields)) => Value::Map(block.normalize(&fields)),
        (AttrType::List(elem), Value::List(items)) => Value::List(
            items
                .into_iter()
                .map(|v| normalize_nested(elem, v))
                .collect(),
        ),
        (AttrType::Set(elem, hasher), Value::Set(set)) => Value::Set(HashedSet::from_values(
            *hasher,
            set.to_vec().into_iter().map(|v| normalize_nested(elem, v)),
        )),
        (_, v) => v,
    }
}

/// A named group of attributes: the root of a schema or a nested resource
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    attributes: BTreeMap<String, Attribute>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &str, attribute: Attribute) -> Self {
        self.attributes.insert(name.to_string(), attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attributes.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Typed copy of `fields`; absent fields with a default get it
    fn coerce(&self, fields: BTreeMap<String, Value>) -> Result<BTreeMap<String, Value>, String> {
        let mut out = BTreeMap::new();
        for (name, value) in fields {
            // Unknown keys are dropped rather than rejected
            let Some(attr) = self.attributes.get(&name) else {
                continue;
            };
            let value = attr.ty.coerce(value).map_err(|e| format!("{name}: {e}"))?;
            if !value.is_null() {
                out.insert(name, value);
            }
        }
        for (name, attr) in &self.attributes {
            if let Some(default) = &attr.default {
                out.entry(name.clone()).or_insert_with(|| default.clone());
            }
        }
        Ok(out)
    }

    fn normalize(&self, fields: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        fields
            .iter()
            .map(|(name, value)| {
                let value = match self.attributes.get(name) {
                    Some(attr) => attr.normalize(value),
                    None => value.clone(),
                };
                (name.clone(), value)
            })
            .collect()
    }

    /// Resolve the attribute type at a dotted path
    pub fn type_at(&self, path: &[&str]) -> Option<AttrType> {
        let (head, rest) = path.split_first()?;
        let attr = self.attributes.get(*head)?;
        descend(&attr.ty, rest)
    }

    /// Resolve the attribute declaration at a dotted path
    pub fn attribute_at(&self, path: &[&str]) -> Option<&Attribute> {
        let (head, rest) = path.split_first()?;
        let attr = self.attributes.get(*head)?;
        if rest.is_empty() {
            return Some(attr);
        }
        let mut ty = &attr.ty;
        let mut rest = rest;
        loop {
            match ty {
                AttrType::List(elem) | AttrType::Set(elem, _) => {
                    let (_, tail) = rest.split_first()?;
                    if tail.is_empty() {
                        return None;
                    }
                    ty = elem;
                    rest = tail;
                }
                AttrType::Block(block) => return block.attribute_at(rest),
                _ => return None,
            }
        }
    }
}

fn descend(ty: &AttrType, path: &[&str]) -> Option<AttrType> {
    let Some((head, rest)) = path.split_first() else {
        return Some(ty.clone());
    };
    match ty {
        AttrType::List(elem) | AttrType::Set(elem, _) => {
            head.parse::<usize>().ok()?;
            descend(elem, rest)
        }
        AttrType::Block(block) => block.type_at(path),
        _ => None,
    }
}

/// A versioned resource schema
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub version: u32,
    pub block: Block,
}

impl Schema {
    pub fn new(block: Block) -> Self {
        Self { version: 0, block }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.block.get(name)
    }

    pub fn type_at(&self, path: &str) -> Option<AttrType> {
        self.block.type_at(&split_path(path))
    }

    pub fn attribute_at(&self, path: &str) -> Option<&Attribute> {
        self.block.attribute_at(&split_path(path))
    }

    /// Convert a persisted JSON attribute map into typed values
    pub fn typed_map(&self, raw: &serde_json::Map<String, serde_json::Value>) -> BTreeMap<String, Value> {
        raw.iter()
            .filter_map(|(name, json)| {
                let attr = self.block.get(name)?;
                Some((name.clone(), attr.ty.from_json(json)))
            })
            .collect()
    }
}

pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

// ============ Validators ============

/// Accept only one of the listed strings
pub fn string_in(allowed: &'static [&'static str]) -> ValidateFn {
    Arc::new(move |v| match v {
        Value::String(s) if allowed.contains(&s.as_str()) => Ok(()),
        Value::String(s) => Err(format!(
            "expected one of [{}], got '{}'",
            allowed.join(", "),
            s
        )),
        other => Err(format!("expected string, got {}", other.kind())),
    })
}

/// Accept integers in `[min, max]`
pub fn int_between(min: i64, max: i64) -> ValidateFn {
    Arc::new(move |v| match v {
        Value::Int(i) if (min..=max).contains(i) => Ok(()),
        Value::Int(i) => Err(format!("expected value in range [{min}, {max}], got {i}")),
        other => Err(format!("expected int, got {}", other.kind())),
    })
}

pub fn non_empty() -> ValidateFn {
    Arc::new(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Ok(()),
        Value::String(_) => Err("must not be empty".to_string()),
        other => Err(format!("expected string, got {}", other.kind())),
    })
}

/// Lowercase letters, digits and dashes; starting with a letter or digit
pub fn lowercase_slug() -> ValidateFn {
    Arc::new(|v| {
        let Value::String(s) = v else {
            return Err(format!("expected string, got {}", v.kind()));
        };
        let valid = s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && s.chars().next().is_some_and(|c| c != '-');
        if valid {
            Ok(())
        } else {
            Err(format!(
                "'{s}' must contain only lowercase letters, digits and dashes"
            ))
        }
    })
}

// ============ Diff suppression ============

/// Ignore differences in letter case
pub fn suppress_case(_path: &str, old: &Value, new: &Value) -> bool {
    match (old, new) {
        (Value::String(a), Value::String(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::STRING_SET;

    fn rule_block() -> Block {
        Block::new()
            .attr("entry_port", Attribute::int().required())
            .attr("entry_protocol", Attribute::string().required())
    }

    fn schema() -> Schema {
        Schema::new(
            Block::new()
                .attr("name", Attribute::string().required())
                .attr("ratio", Attribute::float().optional())
                .attr("tags", Attribute::set(AttrType::String, STRING_SET).optional())
                .attr("rule", Attribute::block_list(rule_block()).optional()),
        )
        .with_version(1)
    }

    #[test]
    fn test_coerce_list_into_set() {
        let ty = AttrType::set_of(AttrType::String, STRING_SET);
        let v = ty
            .coerce(Value::string_list(["b", "a", "b"]))
            .unwrap();
        assert_eq!(v.as_set().unwrap().len(), 2);
    }

    #[test]
    fn test_coerce_rejects_mismatch() {
        assert!(AttrType::Int.coerce(Value::from("x")).is_err());
        assert_eq!(AttrType::Float.coerce(Value::from(2)).unwrap(), Value::Float(2.0));
        assert_eq!(AttrType::Int.coerce(Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_nested_defaults_fill_absent_fields() {
        let block = Block::new()
            .attr("port", Attribute::int().required())
            .attr("interval", Attribute::int().optional().default(10));
        let ty = AttrType::list_of(AttrType::Block(Arc::new(block)));
        let item = Value::Map(BTreeMap::from([("port".to_string(), Value::Int(80))]));
        let coerced = ty.coerce(Value::List(vec![item])).unwrap();
        let fields = coerced.lookup(&["0"]).unwrap().as_map().unwrap();
        assert_eq!(fields["interval"], Value::Int(10));
    }

    #[test]
    fn test_type_at_paths() {
        let s = schema();
        assert_eq!(s.type_at("rule.0.entry_port"), Some(AttrType::Int));
        assert_eq!(s.type_at("rule.x.entry_port"), None);
        assert_eq!(s.type_at("missing"), None);
        assert!(s.attribute_at("rule.0.entry_protocol").unwrap().required);
    }

    #[test]
    fn test_typed_map_from_json() {
        let raw = serde_json::json!({
            "name": "lb",
            "ratio": 1,
            "tags": ["x", "y"],
            "rule": [{"entry_port": 80, "entry_protocol": "http", "stale": true}],
            "unknown": 1
        });
        let typed = schema().typed_map(raw.as_object().unwrap());
        assert_eq!(typed["ratio"], Value::Float(1.0));
        assert!(typed["tags"].as_set().is_some());
        assert!(!typed.contains_key("unknown"));
        let rule = typed["rule"].lookup(&["0"]).unwrap().as_map().unwrap();
        assert!(!rule.contains_key("stale"));
    }

    #[test]
    fn test_validators() {
        let plans = string_in(&["daily", "weekly"]);
        assert!(plans(&Value::from("daily")).is_ok());
        assert!(plans(&Value::from("hourly")).is_err());

        let hour = int_between(0, 20);
        assert!(hour(&Value::from(20)).is_ok());
        assert!(hour(&Value::from(21)).is_err());

        assert!(non_empty()(&Value::from("  ")).is_err());
        assert!(lowercase_slug()(&Value::from("s-1vcpu-1gb")).is_ok());
        assert!(lowercase_slug()(&Value::from("S-1VCPU")).is_err());
        assert!(lowercase_slug()(&Value::from("-x")).is_err());
    }

    #[test]
    fn test_suppress_case() {
        assert!(suppress_case("region", &Value::from("NYC3"), &Value::from("nyc3")));
        assert!(!suppress_case("region", &Value::from("nyc1"), &Value::from("nyc3")));
    }
}
