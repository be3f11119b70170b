//! Generic list data sources
//!
//! A list data source is built from a record schema, a fetcher returning
//! every remote object, and a flattener turning one object into a record.
//! [`DataList`] adds the `filter` and `sort` arguments and the read path:
//! fetch, flatten, filter, sort, then publish the records under the
//! source's result attribute.

use crate::context::Context;
use crate::data::ResourceData;
use crate::diag::Diagnostics;
use crate::error::{CloudError, Result};
use crate::resource::DataSource;
use crate::schema::{AttrType, Attribute, Block, Schema, string_in};
use crate::value::Value;
use async_trait::async_trait;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

/// One flattened remote object
pub type Record = BTreeMap<String, Value>;

pub const MATCH_BY_VALUES: &[&str] = &["exact", "re", "substring"];
pub const DIRECTION_VALUES: &[&str] = &["asc", "desc"];

/// How filter values are compared with string fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchBy {
    /// Case-insensitive equality
    #[default]
    Exact,
    /// Regular expression match
    Re,
    /// Substring containment
    Substring,
}

impl FromStr for MatchBy {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "exact" => Ok(MatchBy::Exact),
            "re" => Ok(MatchBy::Re),
            "substring" => Ok(MatchBy::Substring),
            other => Err(CloudError::DataList(format!("unknown match_by '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub key: String,
    pub values: Vec<String>,
    /// Require every value to match instead of any
    pub all: bool,
    pub match_by: MatchBy,
}

impl Filter {
    pub fn new(key: impl Into<String>, values: &[&str]) -> Self {
        Self {
            key: key.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
            all: false,
            match_by: MatchBy::Exact,
        }
    }

    pub fn all(mut self) -> Self {
        self.all = true;
        self
    }

    pub fn match_by(mut self, match_by: MatchBy) -> Self {
        self.match_by = match_by;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub key: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: Direction::Desc,
        }
    }
}

// ============ Filtering ============

enum Matcher {
    Text(String),
    Substring(String),
    Re(Regex),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Matcher {
    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Matcher::Text(want), Value::String(s)) => s.to_lowercase() == *want,
            (Matcher::Substring(want), Value::String(s)) => s.contains(want.as_str()),
            (Matcher::Re(re), Value::String(s)) => re.is_match(s),
            (Matcher::Bool(want), Value::Bool(b)) => b == want,
            (Matcher::Int(want), Value::Int(i)) => i == want,
            (Matcher::Float(want), Value::Float(f)) => f == want,
            (Matcher::Float(want), Value::Int(i)) => *i as f64 == *want,
            _ => false,
        }
    }

    /// Lists and sets match when any element does
    fn matches_field(&self, value: &Value) -> bool {
        match value.as_list() {
            Some(items) => items.into_iter().any(|v| self.matches(v)),
            None => self.matches(value),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn compile(field: &str, ty: &AttrType, raw: &str, match_by: MatchBy) -> Result<Matcher> {
    let invalid = |kind: &str| {
        CloudError::DataList(format!("filter value '{raw}' for '{field}' is not a valid {kind}"))
    };
    match ty {
        AttrType::String => match match_by {
            MatchBy::Exact => Ok(Matcher::Text(raw.to_lowercase())),
            MatchBy::Substring => Ok(Matcher::Substring(raw.to_string())),
            MatchBy::Re => Regex::new(raw)
                .map(Matcher::Re)
                .map_err(|e| CloudError::DataList(format!("invalid regex for '{field}': {e}"))),
        },
        AttrType::Bool => parse_bool(raw).map(Matcher::Bool).ok_or_else(|| invalid("bool")),
        AttrType::Int => raw.parse().map(Matcher::Int).map_err(|_| invalid("int")),
        AttrType::Float => raw.parse().map(Matcher::Float).map_err(|_| invalid("float")),
        AttrType::List(elem) | AttrType::Set(elem, _) => compile(field, elem, raw, match_by),
        AttrType::Block(_) => Err(CloudError::DataList(format!(
            "filtering on '{field}' is not supported"
        ))),
    }
}

/// Keys usable in filters: primitives and collections of primitives
pub fn filterable_keys(record: &Block) -> Vec<String> {
    record
        .iter()
        .filter(|(_, attr)| {
            attr.ty.is_primitive() || attr.ty.element().is_some_and(AttrType::is_primitive)
        })
        .map(|(name, _)| name.clone())
        .collect()
}

/// Keys usable in sorts: primitives only
pub fn sortable_keys(record: &Block) -> Vec<String> {
    record
        .iter()
        .filter(|(_, attr)| attr.ty.is_primitive())
        .map(|(name, _)| name.clone())
        .collect()
}

/// Keep records matching every filter, applied left to right
pub fn apply_filters(record: &Block, records: Vec<Record>, filters: &[Filter]) -> Result<Vec<Record>> {
    let mut records = records;
    for filter in filters {
        let attr = record
            .get(&filter.key)
            .ok_or_else(|| CloudError::DataList(format!("unknown filter key '{}'", filter.key)))?;
        let matchers = filter
            .values
            .iter()
            .map(|raw| compile(&filter.key, &attr.ty, raw, filter.match_by))
            .collect::<Result<Vec<_>>>()?;

        records.retain(|r| {
            let value = r.get(&filter.key).unwrap_or(&Value::Null);
            if filter.all {
                matchers.iter().all(|m| m.matches_field(value))
            } else {
                matchers.iter().any(|m| m.matches_field(value))
            }
        });
    }
    Ok(records)
}

// ============ Sorting ============

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.as_bytes().cmp(y.as_bytes()),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Stable multi-key sort
pub fn apply_sorts(record: &Block, records: &mut [Record], sorts: &[Sort]) -> Result<()> {
    for sort in sorts {
        let attr = record
            .get(&sort.key)
            .ok_or_else(|| CloudError::DataList(format!("unknown sort key '{}'", sort.key)))?;
        if !attr.ty.is_primitive() {
            return Err(CloudError::DataList(format!(
                "sorting on '{}' of type {} is not supported",
                sort.key, attr.ty
            )));
        }
    }

    records.sort_by(|a, b| {
        for sort in sorts {
            let ord = compare(
                a.get(&sort.key).unwrap_or(&Value::Null),
                b.get(&sort.key).unwrap_or(&Value::Null),
            );
            let ord = match sort.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

// ============ Data source ============

/// Supplies the records of a list data source
#[async_trait]
pub trait ListSource<M: Sync>: Send + Sync {
    type Item: Send + Sync;

    fn type_name(&self) -> &'static str;

    /// Attribute the records are published under
    fn result_attribute(&self) -> &'static str;

    fn record_schema(&self) -> Block;

    /// Every remote object, across all pages
    async fn fetch_all(&self, ctx: &Context, meta: &M) -> Result<Vec<Self::Item>>;

    fn flatten(&self, meta: &M, item: &Self::Item) -> Result<Record>;
}

/// A [`DataSource`] built from a [`ListSource`]
pub struct DataList<S, M> {
    source: S,
    record: Arc<Block>,
    schema: Arc<Schema>,
    _meta: PhantomData<fn(&M)>,
}

impl<S, M> DataList<S, M>
where
    S: ListSource<M>,
    M: Sync,
{
    pub fn new(source: S) -> Self {
        let record = source.record_schema();
        let filter_keys = filterable_keys(&record);
        let sort_keys = sortable_keys(&record);

        let filter = Block::new()
            .attr("key", Attribute::string().required().validate(one_of(filter_keys)))
            .attr("values", Attribute::list(AttrType::String).required())
            .attr("all", Attribute::bool().optional().default(false))
            .attr(
                "match_by",
                Attribute::string().optional().default("exact").validate(string_in(MATCH_BY_VALUES)),
            );
        let sort = Block::new()
            .attr("key", Attribute::string().required().validate(one_of(sort_keys)))
            .attr(
                "direction",
                Attribute::string().optional().default("asc").validate(string_in(DIRECTION_VALUES)),
            );

        let schema = Schema::new(
            Block::new()
                .attr("filter", Attribute::block_list(filter).optional())
                .attr("sort", Attribute::block_list(sort).optional())
                .attr(source.result_attribute(), Attribute::block_list(record.clone()).computed()),
        );

        Self {
            source,
            record: Arc::new(record),
            schema: Arc::new(schema),
            _meta: PhantomData,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

fn one_of(allowed: Vec<String>) -> crate::schema::ValidateFn {
    Arc::new(move |v| match v.as_str() {
        Some(s) if allowed.iter().any(|a| a == s) => Ok(()),
        Some(s) => Err(format!("'{}' is not one of [{}]", s, allowed.join(", "))),
        None => Err(format!("expected string, got {}", v.kind())),
    })
}

/// Filters from the `filter` argument; malformed entries are skipped
pub fn parse_filters(d: &ResourceData) -> Result<Vec<Filter>> {
    let mut filters = Vec::new();
    for item in d.get_list("filter") {
        let Some(fields) = item.as_map() else {
            tracing::warn!("skipping malformed filter of kind {}", item.kind());
            continue;
        };
        let key = fields.get("key").and_then(Value::as_str).unwrap_or_default();
        let values: Vec<String> = fields
            .get("values")
            .and_then(Value::as_list)
            .map(|vs| vs.into_iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let match_by = fields
            .get("match_by")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .parse::<MatchBy>()?;
        filters.push(Filter {
            key: key.to_string(),
            values,
            all: fields.get("all").and_then(Value::as_bool).unwrap_or(false),
            match_by,
        });
    }
    Ok(filters)
}

/// Sorts from the `sort` argument
pub fn parse_sorts(d: &ResourceData) -> Vec<Sort> {
    d.get_list("sort")
        .iter()
        .filter_map(Value::as_map)
        .map(|fields| Sort {
            key: fields
                .get("key")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            direction: match fields.get("direction").and_then(Value::as_str) {
                Some("desc") => Direction::Desc,
                _ => Direction::Asc,
            },
        })
        .collect()
}

#[async_trait]
impl<S, M> DataSource<M> for DataList<S, M>
where
    S: ListSource<M>,
    M: Sync,
{
    fn type_name(&self) -> &'static str {
        self.source.type_name()
    }

    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData, meta: &M) -> Result<Diagnostics> {
        let filters = parse_filters(d)?;
        let sorts = parse_sorts(d);

        let items = self.source.fetch_all(ctx, meta).await.map_err(|e| {
            CloudError::DataList(format!("error retrieving {}: {}", self.source.result_attribute(), e))
        })?;
        let records = items
            .iter()
            .map(|item| self.source.flatten(meta, item))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!("{} fetched {} records", self.source.type_name(), records.len());

        let mut records = apply_filters(&self.record, records, &filters)?;
        apply_sorts(&self.record, &mut records, &sorts)?;

        d.set_id(uuid::Uuid::new_v4().to_string());
        d.set(
            self.source.result_attribute(),
            Value::List(records.into_iter().map(Value::Map).collect()),
        )?;
        Ok(Diagnostics::new())
    }
}
