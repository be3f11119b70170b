//! Tolerant access to nested attribute blocks and a builder for flattened
//! records
//!
//! Planned values can be partially typed while the host previews a plan.
//! Readers here never fail: a value of the wrong kind reads as the zero
//! value and malformed list elements are skipped with a warning.

use docean_cloud::Value;
use std::collections::BTreeMap;

pub type Fields = BTreeMap<String, Value>;

/// Map elements of a block list; other elements are skipped
pub fn blocks(items: &[Value]) -> Vec<&Fields> {
    items
        .iter()
        .filter_map(|item| match item.as_map() {
            Some(map) => Some(map),
            None => {
                tracing::warn!("skipping malformed block of kind {}", item.kind());
                None
            }
        })
        .collect()
}

pub fn string(fields: &Fields, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub fn int(fields: &Fields, key: &str) -> i64 {
    fields.get(key).and_then(Value::as_int).unwrap_or_default()
}

pub fn float(fields: &Fields, key: &str) -> f64 {
    fields.get(key).and_then(Value::as_float).unwrap_or_default()
}

pub fn boolean(fields: &Fields, key: &str) -> bool {
    fields.get(key).and_then(Value::as_bool).unwrap_or_default()
}

pub fn strings(fields: &Fields, key: &str) -> Vec<String> {
    fields
        .get(key)
        .and_then(Value::as_list)
        .map(|items| {
            items
                .into_iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

pub fn ints(fields: &Fields, key: &str) -> Vec<i64> {
    fields
        .get(key)
        .and_then(Value::as_list)
        .map(|items| items.into_iter().filter_map(Value::as_int).collect())
        .unwrap_or_default()
}

/// Elements of a nested block list
pub fn nested<'a>(fields: &'a Fields, key: &str) -> Vec<&'a Fields> {
    match fields.get(key) {
        Some(Value::List(items)) => blocks(items),
        Some(Value::Set(set)) => set.iter().filter_map(Value::as_map).collect(),
        _ => Vec::new(),
    }
}

/// First element of a nested single-block list
pub fn first<'a>(fields: &'a Fields, key: &str) -> Option<&'a Fields> {
    nested(fields, key).into_iter().next()
}

/// Builder for flattened API objects
///
/// Zero scalars and empty blocks are elided so that attributes the API
/// leaves unset do not show up as drift.
#[derive(Debug, Default, Clone)]
pub struct Record(Fields);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set unconditionally
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Set unless zero
    pub fn opt(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_zero() {
            self.0.insert(key.to_string(), value);
        }
        self
    }

    pub fn strings(self, key: &str, items: &[String]) -> Self {
        self.opt(key, Value::string_list(items.iter().cloned()))
    }

    /// Single nested block, absent when `None` or empty
    pub fn block(mut self, key: &str, block: Option<Record>) -> Self {
        if let Some(block) = block.filter(|b| !b.0.is_empty()) {
            self.0.insert(key.to_string(), Value::List(vec![block.into_value()]));
        }
        self
    }

    /// Nested block list, absent when empty
    pub fn blocks<I>(mut self, key: &str, blocks: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        let items: Vec<Value> = blocks.into_iter().map(Record::into_value).collect();
        if !items.is_empty() {
            self.0.insert(key.to_string(), Value::List(items));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Map(self.0)
    }

    pub fn into_fields(self) -> Fields {
        self.0
    }
}
