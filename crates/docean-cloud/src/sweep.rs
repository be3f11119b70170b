//! Bulk cleanup of test-created cloud resources
//!
//! Each resource kind registers a [`Sweeper`] together with the kinds that
//! must be swept before it (a volume cannot be destroyed while attached to
//! a droplet, so `volumes` depends on `droplets`). The registry orders the
//! kinds so every dependency runs first.

use crate::context::Context;
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

/// Name prefix of resources created by acceptance tests
pub const DEFAULT_PREFIX: &str = "tf-acc-test-";

/// Deletes every resource of one kind whose name starts with a prefix
#[async_trait]
pub trait Sweeper<M: Sync>: Send + Sync {
    /// Returns the number of deleted resources
    async fn sweep(&self, ctx: &Context, meta: &M, prefix: &str) -> Result<usize>;
}

pub fn matches_prefix(name: &str, prefix: &str) -> bool {
    !prefix.is_empty() && name.starts_with(prefix)
}

struct Entry<M: Sync> {
    dependencies: Vec<String>,
    sweeper: Box<dyn Sweeper<M>>,
}

/// Registered sweepers keyed by kind name
pub struct SweeperRegistry<M: Sync> {
    entries: BTreeMap<String, Entry<M>>,
}

impl<M: Sync> Default for SweeperRegistry<M> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

/// Per-kind outcome of a sweep run
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Kinds in execution order with their deleted counts
    pub swept: Vec<(String, usize)>,
    pub failures: Vec<(String, CloudError)>,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.swept.iter().map(|(_, n)| n).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Aggregate failures into one error
    pub fn into_result(self) -> Result<Vec<(String, usize)>> {
        if self.failures.is_empty() {
            return Ok(self.swept);
        }
        let joined = self
            .failures
            .iter()
            .map(|(kind, e)| format!("{kind}: {e}"))
            .collect::<Vec<_>>()
            .join("; ");
        Err(CloudError::Sweep(joined))
    }
}

impl<M: Sync> SweeperRegistry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S>(&mut self, name: &str, dependencies: &[&str], sweeper: S) -> Result<()>
    where
        S: Sweeper<M> + 'static,
    {
        if self.entries.contains_key(name) {
            return Err(CloudError::Sweep(format!("sweeper '{name}' is already registered")));
        }
        self.entries.insert(
            name.to_string(),
            Entry {
                dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
                sweeper: Box::new(sweeper),
            },
        );
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every registered kind, dependencies first; ties break alphabetically
    pub fn order(&self) -> Result<Vec<String>> {
        self.order_of(self.entries.keys().cloned().collect())
    }

    /// The requested kinds plus everything they transitively depend on
    pub fn order_for(&self, only: &[&str]) -> Result<Vec<String>> {
        let mut selected = BTreeSet::new();
        let mut stack: Vec<String> = only.iter().map(|s| s.to_string()).collect();
        while let Some(name) = stack.pop() {
            let entry = self
                .entries
                .get(&name)
                .ok_or_else(|| CloudError::Sweep(format!("unknown sweeper '{name}'")))?;
            if selected.insert(name) {
                stack.extend(entry.dependencies.iter().cloned());
            }
        }
        self.order_of(selected)
    }

    fn order_of(&self, selected: BTreeSet<String>) -> Result<Vec<String>> {
        let mut indegree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for name in &selected {
            let entry = &self.entries[name];
            indegree.entry(name.as_str()).or_insert(0);
            for dep in &entry.dependencies {
                if !self.entries.contains_key(dep) {
                    return Err(CloudError::Sweep(format!(
                        "sweeper '{name}' depends on unknown sweeper '{dep}'"
                    )));
                }
                if !selected.contains(dep) {
                    continue;
                }
                *indegree.entry(name.as_str()).or_insert(0) += 1;
                dependents.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }

        let mut ready: BTreeSet<&str> = indegree
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut ordered = Vec::with_capacity(selected.len());

        while let Some(name) = ready.pop_first() {
            ordered.push(name.to_string());
            for dependent in dependents.get(name).into_iter().flatten() {
                if let Some(n) = indegree.get_mut(dependent) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if ordered.len() != selected.len() {
            let stuck: Vec<&str> = indegree
                .iter()
                .filter(|(_, n)| **n > 0)
                .map(|(name, _)| *name)
                .collect();
            return Err(CloudError::Sweep(format!(
                "dependency cycle among sweepers: {}",
                stuck.join(", ")
            )));
        }
        Ok(ordered)
    }

    /// Sweep `only` (or every kind when empty) in dependency order
    ///
    /// A failing kind is recorded and the run continues with the next one.
    pub async fn run(&self, ctx: &Context, meta: &M, prefix: &str, only: &[&str]) -> Result<SweepReport> {
        if prefix.is_empty() {
            return Err(CloudError::Sweep("refusing to sweep with an empty prefix".into()));
        }
        let order = if only.is_empty() {
            self.order()?
        } else {
            self.order_for(only)?
        };

        let mut report = SweepReport::default();
        for name in order {
            ctx.check()?;
            let entry = &self.entries[&name];
            tracing::info!("sweeping {} with prefix '{}'", name, prefix);
            match entry.sweeper.sweep(ctx, meta, prefix).await {
                Ok(count) => {
                    tracing::info!("swept {} {}", count, name);
                    report.swept.push((name, count));
                }
                Err(e) => {
                    tracing::warn!("sweeper {} failed: {}", name, e);
                    report.failures.push((name, e));
                }
            }
        }
        Ok(report)
    }
}
