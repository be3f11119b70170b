//! TLS certificates

use crate::client::Client;
use crate::error::Result;
use crate::pagination::{Links, ListOptions, Meta, Page};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const CERTIFICATE_TYPE_CUSTOM: &str = "custom";
pub const CERTIFICATE_TYPE_LETS_ENCRYPT: &str = "lets_encrypt";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dns_names: Vec<String>,
    #[serde(default)]
    pub not_after: String,
    #[serde(default)]
    pub sha1_fingerprint: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub state: String,
    #[serde(rename = "type", default)]
    pub certificate_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CertificateRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub certificate_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub private_key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub leaf_certificate: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub certificate_chain: String,
}

#[derive(Debug, Deserialize)]
struct CertificateRoot {
    certificate: Certificate,
}

#[derive(Debug, Deserialize)]
struct CertificatesRoot {
    #[serde(default)]
    certificates: Vec<Certificate>,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    meta: Meta,
}

#[async_trait]
pub trait CertificatesService: Send + Sync {
    async fn get(&self, id: &str) -> Result<Certificate>;
    async fn list(&self, opt: ListOptions) -> Result<Page<Certificate>>;
    async fn create(&self, req: &CertificateRequest) -> Result<Certificate>;
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
impl CertificatesService for Client {
    async fn get(&self, id: &str) -> Result<Certificate> {
        let root: CertificateRoot = self
            .get_json(&format!("v2/certificates/{id}"), &[])
            .await?;
        Ok(root.certificate)
    }

    async fn list(&self, opt: ListOptions) -> Result<Page<Certificate>> {
        let root: CertificatesRoot = self.get_json("v2/certificates", &opt.query()).await?;
        Ok(Page {
            items: root.certificates,
            links: root.links,
            meta: root.meta,
        })
    }

    async fn create(&self, req: &CertificateRequest) -> Result<Certificate> {
        let root: CertificateRoot = self.post_json("v2/certificates", req).await?;
        Ok(root.certificate)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.send_delete(&format!("v2/certificates/{id}")).await
    }
}
