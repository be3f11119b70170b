//! Planned changes

use crate::data::{ResourceData, semantically_equal};
use crate::error::{CloudError, Result};
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of change planned for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    /// Create a new resource
    Create,
    /// Update in place
    Update,
    /// Destroy, then create
    Replace,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Create => write!(f, "create"),
            ChangeAction::Update => write!(f, "update"),
            ChangeAction::Replace => write!(f, "replace"),
            ChangeAction::Delete => write!(f, "delete"),
            ChangeAction::NoOp => write!(f, "no-op"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrDiff {
    pub old: Value,
    pub new: Value,
    pub requires_new: bool,
}

/// Change planned for one resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDiff {
    pub resource_type: String,
    pub attributes: BTreeMap<String, AttrDiff>,
    pub create: bool,
    pub destroy: bool,
}

impl ResourceDiff {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: BTreeMap::new(),
            create: false,
            destroy: false,
        }
    }

    pub fn destroy(resource_type: impl Into<String>) -> Self {
        Self {
            destroy: true,
            ..Self::new(resource_type)
        }
    }

    /// Compute the diff carried by a planned handle
    ///
    /// Computed-only attributes are ignored, as are attributes whose
    /// diff-suppression hook accepts the change.
    pub fn compute(resource_type: &str, d: &ResourceData) -> Self {
        let mut diff = Self::new(resource_type);
        diff.create = d.id().is_empty();

        for (name, attr) in d.schema().block.iter() {
            if attr.is_computed_only() {
                continue;
            }
            let old = d.get_old(name);
            let new = d.normalized_planned(name);
            if semantically_equal(&old, &new) {
                continue;
            }
            if attr.diff_suppress.is_some_and(|suppress| suppress(name, &old, &new)) {
                continue;
            }
            diff.attributes.insert(
                name.clone(),
                AttrDiff {
                    old,
                    new,
                    requires_new: attr.force_new && !diff.create,
                },
            );
        }
        diff
    }

    pub fn get(&self, path: &str) -> Option<&AttrDiff> {
        self.attributes.get(path)
    }

    pub fn has_change(&self, path: &str) -> bool {
        self.attributes.contains_key(path)
    }

    pub fn changed_paths(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Mark a changed attribute as requiring replacement
    pub fn force_new(&mut self, path: &str) -> Result<()> {
        match self.attributes.get_mut(path) {
            Some(change) => {
                change.requires_new = true;
                Ok(())
            }
            None => Err(CloudError::attribute(path, "cannot force replacement without a change")),
        }
    }

    pub fn requires_replace(&self) -> bool {
        self.attributes.values().any(|a| a.requires_new)
    }

    pub fn action(&self) -> ChangeAction {
        if self.destroy {
            ChangeAction::Delete
        } else if self.create {
            ChangeAction::Create
        } else if self.attributes.is_empty() {
            ChangeAction::NoOp
        } else if self.requires_replace() {
            ChangeAction::Replace
        } else {
            ChangeAction::Update
        }
    }
}

/// Plan covering several resources
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub diffs: Vec<ResourceDiff>,
}

impl Plan {
    pub fn new(diffs: Vec<ResourceDiff>) -> Self {
        Self { diffs }
    }

    pub fn has_changes(&self) -> bool {
        self.diffs.iter().any(|d| d.action() != ChangeAction::NoOp)
    }

    /// Get diffs by action
    pub fn by_action(&self, action: ChangeAction) -> Vec<&ResourceDiff> {
        self.diffs.iter().filter(|d| d.action() == action).collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.by_action(ChangeAction::Create).len(),
            update: self.by_action(ChangeAction::Update).len(),
            replace: self.by_action(ChangeAction::Replace).len(),
            delete: self.by_action(ChangeAction::Delete).len(),
            no_change: self.by_action(ChangeAction::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}
