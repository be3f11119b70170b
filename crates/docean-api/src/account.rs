//! Account information

use crate::client::Client;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub droplet_limit: i64,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct AccountRoot {
    account: Account,
}

#[async_trait]
pub trait AccountService: Send + Sync {
    async fn get(&self) -> Result<Account>;
}

#[async_trait]
impl AccountService for Client {
    async fn get(&self) -> Result<Account> {
        let root: AccountRoot = self.get_json("v2/account", &[]).await?;
        Ok(root.account)
    }
}
