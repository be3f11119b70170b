//! Attribute values
//!
//! [`Value`] is the dynamically typed node of the attribute tree. Sets carry
//! their hasher: two sets are only comparable when they were built with the
//! same one.

use crate::error::{CloudError, Result};
use crate::hash;
use std::collections::BTreeMap;
use std::fmt;

/// A node of the attribute tree
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Set(HashedSet),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null or the zero value of its kind
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::String(s) => s.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::Map(m) => m.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Elements of a list, or of a set in hash order
    pub fn as_list(&self) -> Option<Vec<&Value>> {
        match self {
            Value::List(l) => Some(l.iter().collect()),
            Value::Set(s) => Some(s.iter().collect()),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&HashedSet> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
        }
    }

    /// Canonical string form used for hashing and filtering
    pub fn canonical(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::List(l) => l.iter().map(Value::canonical).collect::<Vec<_>>().join(","),
            Value::Set(s) => s.iter().map(Value::canonical).collect::<Vec<_>>().join(","),
            Value::Map(m) => m
                .iter()
                .map(|(k, v)| format!("{}={}", k, v.canonical()))
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    pub fn string_list<I, S>(items: I) -> Value
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(|s| Value::String(s.into())).collect())
    }

    /// Walk a dotted path; numeric segments index lists and sets
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        let Some((head, rest)) = path.split_first() else {
            return Some(self);
        };
        let next = match self {
            Value::Map(m) => m.get(*head)?,
            Value::List(l) => l.get(head.parse::<usize>().ok()?)?,
            Value::Set(s) => s.iter().nth(head.parse::<usize>().ok()?)?,
            _ => return None,
        };
        next.lookup(rest)
    }

    /// JSON form; sets become arrays in hash order
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(l) => serde_json::Value::Array(l.iter().map(Value::to_json).collect()),
            Value::Set(s) => serde_json::Value::Array(s.iter().map(Value::to_json).collect()),
            Value::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Untyped conversion from JSON; arrays become lists
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(a) => Value::List(a.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(o) => Value::Map(
                o.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl From<HashedSet> for Value {
    fn from(s: HashedSet) -> Self {
        Value::Set(s)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(m: BTreeMap<String, Value>) -> Self {
        Value::Map(m)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Element hash function of a set
///
/// The name is the hasher's identity; two hashers with the same name are
/// assumed to compute the same function.
#[derive(Clone, Copy)]
pub struct SetHasher {
    name: &'static str,
    func: fn(&Value) -> u32,
}

impl SetHasher {
    pub const fn new(name: &'static str, func: fn(&Value) -> u32) -> Self {
        Self { name, func }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn hash(&self, value: &Value) -> u32 {
        (self.func)(value)
    }
}

impl PartialEq for SetHasher {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for SetHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SetHasher({})", self.name)
    }
}

/// Hasher for sets of strings
pub const STRING_SET: SetHasher = SetHasher::new("string", hash::hash_string_value);

/// Hasher for sets of integers
pub const INT_SET: SetHasher = SetHasher::new("int", hash::hash_string_value);

/// A set whose element identity is defined by its hasher
///
/// Elements are kept in hash order, which is the list view used when a set
/// is materialized into a request.
#[derive(Debug, Clone)]
pub struct HashedSet {
    hasher: SetHasher,
    items: BTreeMap<u32, Value>,
}

impl HashedSet {
    pub fn new(hasher: SetHasher) -> Self {
        Self {
            hasher,
            items: BTreeMap::new(),
        }
    }

    pub fn from_values<I>(hasher: SetHasher, values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let mut set = Self::new(hasher);
        for v in values {
            set.insert(v);
        }
        set
    }

    pub fn hasher(&self) -> SetHasher {
        self.hasher
    }

    /// Insert, replacing any element with the same hash
    pub fn insert(&mut self, value: Value) -> bool {
        let code = self.hasher.hash(&value);
        self.items.insert(code, value).is_none()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.items.contains_key(&self.hasher.hash(value))
    }

    pub fn remove(&mut self, value: &Value) -> Option<Value> {
        let code = self.hasher.hash(value);
        self.items.remove(&code)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.values()
    }

    pub fn hashes(&self) -> impl Iterator<Item = u32> + '_ {
        self.items.keys().copied()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.items.values().cloned().collect()
    }

    fn check_comparable(&self, other: &HashedSet) -> Result<()> {
        if self.hasher != other.hasher {
            return Err(CloudError::IncomparableSets {
                left: self.hasher.name.to_string(),
                right: other.hasher.name.to_string(),
            });
        }
        Ok(())
    }

    /// Elements of `self` not in `other`
    pub fn difference(&self, other: &HashedSet) -> Result<HashedSet> {
        self.check_comparable(other)?;
        let items = self
            .items
            .iter()
            .filter(|(code, _)| !other.items.contains_key(code))
            .map(|(code, v)| (*code, v.clone()))
            .collect();
        Ok(HashedSet {
            hasher: self.hasher,
            items,
        })
    }

    pub fn intersection(&self, other: &HashedSet) -> Result<HashedSet> {
        self.check_comparable(other)?;
        let items = self
            .items
            .iter()
            .filter(|(code, _)| other.items.contains_key(code))
            .map(|(code, v)| (*code, v.clone()))
            .collect();
        Ok(HashedSet {
            hasher: self.hasher,
            items,
        })
    }

    pub fn union(&self, other: &HashedSet) -> Result<HashedSet> {
        self.check_comparable(other)?;
        let mut items = self.items.clone();
        for (code, v) in &other.items {
            items.entry(*code).or_insert_with(|| v.clone());
        }
        Ok(HashedSet {
            hasher: self.hasher,
            items,
        })
    }
}

impl PartialEq for HashedSet {
    fn eq(&self, other: &Self) -> bool {
        self.hasher == other.hasher && self.items.keys().eq(other.items.keys())
    }
}

/// Split a set change into `(to_remove, to_add)`
pub fn set_diff(old: &HashedSet, new: &HashedSet) -> Result<(HashedSet, HashedSet)> {
    Ok((old.difference(new)?, new.difference(old)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> HashedSet {
        HashedSet::from_values(STRING_SET, items.iter().map(|s| Value::from(*s)))
    }

    fn lower(v: &Value) -> u32 {
        hash::hash_string(&v.canonical().to_lowercase())
    }

    #[test]
    fn test_set_diff() {
        let old = strings(&["v1", "v2"]);
        let new = strings(&["v2", "v3"]);
        let (remove, add) = set_diff(&old, &new).unwrap();
        assert_eq!(remove.to_vec(), vec![Value::from("v1")]);
        assert_eq!(add.to_vec(), vec![Value::from("v3")]);
    }

    #[test]
    fn test_set_difference_partitions() {
        let a = strings(&["a", "b", "c", "d"]);
        let b = strings(&["c", "d", "e"]);
        let a_minus_b = a.difference(&b).unwrap();
        let b_minus_a = b.difference(&a).unwrap();
        let both = a.intersection(&b).unwrap();

        assert!(a_minus_b.intersection(&b_minus_a).unwrap().is_empty());
        assert_eq!(a_minus_b.union(&both).unwrap(), a);
    }

    #[test]
    fn test_hasher_defines_identity() {
        const CASELESS: SetHasher = SetHasher::new("caseless", lower);
        let mut set = HashedSet::new(CASELESS);
        assert!(set.insert(Value::from("HTTP")));
        assert!(!set.insert(Value::from("http")));
        assert_eq!(set.len(), 1);
        assert!(set.contains(&Value::from("Http")));
    }

    #[test]
    fn test_incomparable_sets() {
        const CASELESS: SetHasher = SetHasher::new("caseless", lower);
        let a = strings(&["x"]);
        let b = HashedSet::from_values(CASELESS, vec![Value::from("x")]);
        assert!(matches!(
            a.difference(&b),
            Err(CloudError::IncomparableSets { .. })
        ));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_order_is_insertion_independent() {
        let a = strings(&["one", "two", "three"]);
        let b = strings(&["three", "one", "two"]);
        assert_eq!(a.to_vec(), b.to_vec());
    }

    #[test]
    fn test_lookup_and_json() {
        let mut rule = BTreeMap::new();
        rule.insert("entry_port".to_string(), Value::from(443));
        let v = Value::Map(BTreeMap::from([(
            "rules".to_string(),
            Value::List(vec![Value::Map(rule)]),
        )]));

        assert_eq!(
            v.lookup(&["rules", "0", "entry_port"]),
            Some(&Value::Int(443))
        );
        assert_eq!(v.lookup(&["rules", "1"]), None);
        assert_eq!(Value::from_json(&v.to_json()), v);
    }

    #[test]
    fn test_zero_values() {
        assert!(Value::Null.is_zero());
        assert!(Value::from("").is_zero());
        assert!(Value::from(0).is_zero());
        assert!(!Value::from(false).as_bool().unwrap_or(true));
        assert!(!Value::from("x").is_zero());
    }
}
