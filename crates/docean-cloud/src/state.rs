//! Persisted resource state
//!
//! A state file maps resource addresses to the attribute map of each
//! resource together with the schema version it was written with.

use crate::error::{CloudError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const BACKUP_SUFFIX: &str = "backup";

pub type AttributeMap = serde_json::Map<String, serde_json::Value>;

/// Persisted state of one resource instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub id: String,

    /// Schema version the attributes were written with
    #[serde(default)]
    pub schema_version: u32,

    #[serde(default)]
    pub attributes: AttributeMap,

    /// Timeout overrides from the configuration that produced this state
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub timeouts: AttributeMap,
}

impl InstanceState {
    pub fn new(id: impl Into<String>, schema_version: u32) -> Self {
        Self {
            id: id.into(),
            schema_version,
            attributes: AttributeMap::new(),
            timeouts: AttributeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// A resource entry of the state file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource kind, e.g. `digitalocean_droplet`
    pub resource_type: String,

    #[serde(flatten)]
    pub instance: InstanceState,
}

impl ResourceState {
    pub fn new(resource_type: impl Into<String>, instance: InstanceState) -> Self {
        Self {
            resource_type: resource_type.into(),
            instance,
        }
    }
}

/// Contents of a state file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,

    /// Time of the last change
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by address
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl StateFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry at `address`
    pub fn set_resource(&mut self, address: impl Into<String>, state: ResourceState) {
        self.resources.insert(address.into(), state);
        self.updated_at = Utc::now();
    }

    /// Remove a resource
    pub fn remove_resource(&mut self, address: &str) -> Option<ResourceState> {
        let result = self.resources.remove(address);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    pub fn get_resource(&self, address: &str) -> Option<&ResourceState> {
        self.resources.get(address)
    }

    /// Resources of one kind
    pub fn by_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = (&'a String, &'a ResourceState)> {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }
}

/// Reads and writes a state file, keeping a backup of the previous copy
pub struct StateManager {
    path: PathBuf,
}

impl StateManager {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(BACKUP_SUFFIX);
        self.path.with_file_name(name)
    }

    /// Load the state, returning an empty one when the file is missing
    pub async fn load(&self) -> Result<StateFile> {
        if !self.path.exists() {
            tracing::debug!("no state at {}, starting empty", self.path.display());
            return Ok(StateFile::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        let state: StateFile = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "{}: format version {} is newer than supported version {}",
                self.path.display(),
                state.version,
                STATE_VERSION
            )));
        }

        tracing::debug!("loaded {} resource(s) from {}", state.resources.len(), self.path.display());
        Ok(state)
    }

    /// Save the state
    pub async fn save(&self, state: &StateFile) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        let backup = self.backup_path();
        if self.path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&self.path, &backup).await?;
            tracing::debug!("previous state kept at {}", backup.display());
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, content).await?;

        tracing::debug!("wrote {} resource(s) to {}", state.resources.len(), self.path.display());
        Ok(())
    }
}
