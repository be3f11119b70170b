//! Asynchronous action handles

use crate::client::Client;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const ACTION_IN_PROGRESS: &str = "in-progress";
pub const ACTION_COMPLETED: &str = "completed";
pub const ACTION_ERRORED: &str = "errored";

/// Handle for a long-running operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: i64,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "type", default)]
    pub action_type: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub resource_id: i64,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub region_slug: Option<String>,
}

impl Action {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn is_errored(&self) -> bool {
        self.status == ACTION_ERRORED
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActionRoot {
    pub action: Action,
}

#[async_trait]
pub trait ActionsService: Send + Sync {
    async fn get(&self, id: i64) -> Result<Action>;
}

#[async_trait]
impl ActionsService for Client {
    async fn get(&self, id: i64) -> Result<Action> {
        let root: ActionRoot = self.get_json(&format!("v2/actions/{id}"), &[]).await?;
        Ok(root.action)
    }
}
