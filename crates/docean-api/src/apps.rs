//! App Platform: apps, deployments and alerts

use crate::client::Client;
use crate::error::Result;
use crate::pagination::{Links, ListOptions, Meta, Page};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const STEP_STATUS_SUCCESS: &str = "SUCCESS";
pub const STEP_STATUS_ERROR: &str = "ERROR";
pub const STEP_STATUS_PENDING: &str = "PENDING";
pub const STEP_STATUS_RUNNING: &str = "RUNNING";

pub const DEPLOYMENT_PHASE_ACTIVE: &str = "ACTIVE";
pub const DEPLOYMENT_PHASE_ERROR: &str = "ERROR";

// ============ Source specs ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSourceSpec {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub repo_clone_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub branch: String,
}

/// Shared shape of the GitHub and GitLab sources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostedGitSourceSpec {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub repo: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub branch: String,
    pub deploy_on_push: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageDeployOnPush {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSourceSpec {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub registry_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub registry: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub repository: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub digest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_on_push: Option<ImageDeployOnPush>,
}

// ============ Component building blocks ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppVariableDefinition {
    pub key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scope: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub var_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppServiceSpecHealthCheck {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub http_path: String,
    pub initial_delay_seconds: i64,
    pub period_seconds: i64,
    pub timeout_seconds: i64,
    pub success_threshold: i64,
    pub failure_threshold: i64,
    pub port: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppStringMatch {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub exact: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub regex: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppCorsPolicy {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allow_origins: Vec<AppStringMatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allow_methods: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allow_headers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expose_headers: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub max_age: String,
    pub allow_credentials: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppAlertSpec {
    pub rule: String,
    pub disabled: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub operator: String,
    pub value: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub window: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppLogDestinationPapertrail {
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppLogDestinationDatadog {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppLogDestinationLogtail {
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppLogDestinationSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub papertrail: Option<AppLogDestinationPapertrail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datadog: Option<AppLogDestinationDatadog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logtail: Option<AppLogDestinationLogtail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppAutoscalingCpuMetric {
    pub percent: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppAutoscalingMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<AppAutoscalingCpuMetric>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppAutoscalingSpec {
    pub min_instance_count: i64,
    pub max_instance_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<AppAutoscalingMetrics>,
}

// ============ Components ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppServiceSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSourceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<HostedGitSourceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gitlab: Option<HostedGitSourceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSourceSpec>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dockerfile_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub build_command: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub run_command: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_dir: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment_slug: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<AppVariableDefinition>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instance_size_slug: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub instance_count: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub http_port: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub internal_ports: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<AppServiceSpecHealthCheck>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<AppAlertSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub log_destinations: Vec<AppLogDestinationSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<AppAutoscalingSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppWorkerSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSourceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<HostedGitSourceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gitlab: Option<HostedGitSourceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSourceSpec>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dockerfile_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub build_command: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub run_command: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_dir: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment_slug: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<AppVariableDefinition>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instance_size_slug: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub instance_count: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<AppAlertSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub log_destinations: Vec<AppLogDestinationSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<AppAutoscalingSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppJobSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSourceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<HostedGitSourceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gitlab: Option<HostedGitSourceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSourceSpec>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dockerfile_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub build_command: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub run_command: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_dir: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment_slug: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<AppVariableDefinition>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instance_size_slug: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub instance_count: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<AppAlertSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub log_destinations: Vec<AppLogDestinationSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppFunctionsSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSourceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<HostedGitSourceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gitlab: Option<HostedGitSourceSpec>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_dir: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<AppVariableDefinition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<AppAlertSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub log_destinations: Vec<AppLogDestinationSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppStaticSiteSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSourceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<HostedGitSourceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gitlab: Option<HostedGitSourceSpec>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dockerfile_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub build_command: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_dir: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment_slug: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output_dir: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub index_document: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error_document: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub catchall_document: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<AppVariableDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppDatabaseSpec {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub engine: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    pub production: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cluster_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub db_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub db_user: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppDomainSpec {
    pub domain: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub domain_type: String,
    pub wildcard: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub zone: String,
}

// ============ Ingress and egress ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppIngressSpecRuleStringMatch {
    pub prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppIngressSpecRuleMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<AppIngressSpecRuleStringMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppIngressSpecRuleRoutingComponent {
    pub name: String,
    pub preserve_path_prefix: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rewrite: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppIngressSpecRuleRoutingRedirect {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uri: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub authority: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub port: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scheme: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub redirect_code: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppIngressSpecRule {
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub rule_match: Option<AppIngressSpecRuleMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<AppIngressSpecRuleRoutingComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<AppIngressSpecRuleRoutingRedirect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors: Option<AppCorsPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppIngressSpec {
    pub rules: Vec<AppIngressSpecRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppEgressSpec {
    #[serde(rename = "type")]
    pub egress_type: String,
}

// ============ App spec ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSpec {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<AppServiceSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<AppWorkerSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<AppJobSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<AppFunctionsSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub static_sites: Vec<AppStaticSiteSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub databases: Vec<AppDatabaseSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<AppDomainSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<AppAlertSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<AppVariableDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress: Option<AppIngressSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub egress: Option<AppEgressSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

// ============ Deployments ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentProgressStepReason {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentProgressStep {
    pub name: String,
    pub status: String,
    pub reason: Option<DeploymentProgressStepReason>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentProgress {
    pub pending_steps: i64,
    pub running_steps: i64,
    pub success_steps: i64,
    pub error_steps: i64,
    pub total_steps: i64,
    pub steps: Vec<DeploymentProgressStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deployment {
    pub id: String,
    pub phase: String,
    pub cause: String,
    pub progress: Option<DeploymentProgress>,
    pub created_at: String,
}

// ============ Alerts ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppAlertSlackWebhook {
    pub url: String,
    pub channel: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppAlert {
    pub id: String,
    pub component_name: String,
    pub spec: Option<AppAlertSpec>,
    pub emails: Vec<String>,
    pub slack_webhooks: Vec<AppAlertSlackWebhook>,
    pub phase: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertDestinationUpdateRequest {
    pub emails: Vec<String>,
    pub slack_webhooks: Vec<AppAlertSlackWebhook>,
}

// ============ App ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct App {
    pub id: String,
    pub owner_uuid: String,
    pub spec: Option<AppSpec>,
    pub default_ingress: String,
    pub live_url: String,
    pub live_url_base: String,
    pub live_domain: String,
    pub active_deployment: Option<Deployment>,
    pub in_progress_deployment: Option<Deployment>,
    pub created_at: String,
    pub updated_at: String,
    pub project_id: String,
}

impl App {
    pub fn urn(&self) -> String {
        format!("do:app:{}", self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppCreateRequest {
    pub spec: AppSpec,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub project_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppUpdateRequest {
    pub spec: AppSpec,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

#[derive(Debug, Deserialize)]
struct AppRoot {
    app: App,
}

#[derive(Debug, Deserialize)]
struct AppsRoot {
    #[serde(default)]
    apps: Vec<App>,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct DeploymentRoot {
    deployment: Deployment,
}

#[derive(Debug, Deserialize)]
struct DeploymentsRoot {
    #[serde(default)]
    deployments: Vec<Deployment>,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct AlertsRoot {
    #[serde(default)]
    alerts: Vec<AppAlert>,
}

#[derive(Debug, Deserialize)]
struct AlertRoot {
    alert: AppAlert,
}

#[async_trait]
pub trait AppsService: Send + Sync {
    async fn get(&self, id: &str) -> Result<App>;
    async fn list(&self, opt: ListOptions) -> Result<Page<App>>;
    async fn create(&self, req: &AppCreateRequest) -> Result<App>;
    async fn update(&self, id: &str, req: &AppUpdateRequest) -> Result<App>;
    async fn delete(&self, id: &str) -> Result<()>;
    /// Deployments, most recent first
    async fn list_deployments(&self, app_id: &str, opt: ListOptions) -> Result<Page<Deployment>>;
    async fn get_deployment(&self, app_id: &str, deployment_id: &str) -> Result<Deployment>;
    async fn list_alerts(&self, app_id: &str) -> Result<Vec<AppAlert>>;
    async fn update_alert_destinations(
        &self,
        app_id: &str,
        alert_id: &str,
        req: &AlertDestinationUpdateRequest,
    ) -> Result<AppAlert>;
}

#[async_trait]
impl AppsService for Client {
    async fn get(&self, id: &str) -> Result<App> {
        let root: AppRoot = self.get_json(&format!("v2/apps/{id}"), &[]).await?;
        Ok(root.app)
    }

    async fn list(&self, opt: ListOptions) -> Result<Page<App>> {
        let root: AppsRoot = self.get_json("v2/apps", &opt.query()).await?;
        Ok(Page {
            items: root.apps,
            links: root.links,
            meta: root.meta,
        })
    }

    async fn create(&self, req: &AppCreateRequest) -> Result<App> {
        let root: AppRoot = self.post_json("v2/apps", req).await?;
        Ok(root.app)
    }

    async fn update(&self, id: &str, req: &AppUpdateRequest) -> Result<App> {
        let root: AppRoot = self.put_json(&format!("v2/apps/{id}"), req).await?;
        Ok(root.app)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.send_delete(&format!("v2/apps/{id}")).await
    }

    async fn list_deployments(&self, app_id: &str, opt: ListOptions) -> Result<Page<Deployment>> {
        let root: DeploymentsRoot = self
            .get_json(&format!("v2/apps/{app_id}/deployments"), &opt.query())
            .await?;
        Ok(Page {
            items: root.deployments,
            links: root.links,
            meta: root.meta,
        })
    }

    async fn get_deployment(&self, app_id: &str, deployment_id: &str) -> Result<Deployment> {
        let root: DeploymentRoot = self
            .get_json(&format!("v2/apps/{app_id}/deployments/{deployment_id}"), &[])
            .await?;
        Ok(root.deployment)
    }

    async fn list_alerts(&self, app_id: &str) -> Result<Vec<AppAlert>> {
        let root: AlertsRoot = self.get_json(&format!("v2/apps/{app_id}/alerts"), &[]).await?;
        Ok(root.alerts)
    }

    async fn update_alert_destinations(
        &self,
        app_id: &str,
        alert_id: &str,
        req: &AlertDestinationUpdateRequest,
    ) -> Result<AppAlert> {
        let root: AlertRoot = self
            .post_json(
                &format!("v2/apps/{app_id}/alerts/{alert_id}/destinations"),
                req,
            )
            .await?;
        Ok(root.alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_serialization_skips_empty_components() {
        let spec = AppSpec {
            name: "sample".to_string(),
            region: "ams".to_string(),
            services: vec![AppServiceSpec {
                name: "web".to_string(),
                github: Some(HostedGitSourceSpec {
                    repo: "digitalocean/sample-golang".to_string(),
                    branch: "main".to_string(),
                    deploy_on_push: true,
                }),
                instance_count: 1,
                ..AppServiceSpec::default()
            }],
            ..AppSpec::default()
        };
        let json = serde_json::to_value(&spec).unwrap();

        assert!(json.get("workers").is_none());
        assert!(json.get("ingress").is_none());
        assert_eq!(json["services"][0]["github"]["branch"], "main");
        assert!(json["services"][0].get("http_port").is_none());
    }

    #[test]
    fn test_deployment_progress_decoding() {
        let json = r#"{"deployment":{"id":"d-1","phase":"DEPLOYING","progress":{
            "success_steps":2,"error_steps":0,"total_steps":4,
            "steps":[{"name":"build","status":"SUCCESS"},{"name":"deploy","status":"RUNNING"}]}}}"#;
        let root: DeploymentRoot = serde_json::from_str(json).unwrap();
        let progress = root.deployment.progress.unwrap();
        assert_eq!(progress.total_steps, 4);
        assert_eq!(progress.steps[1].status, STEP_STATUS_RUNNING);
        assert!(progress.steps[0].reason.is_none());
    }

    #[test]
    fn test_ingress_rule_match_rename() {
        let rule = AppIngressSpecRule {
            rule_match: Some(AppIngressSpecRuleMatch {
                path: Some(AppIngressSpecRuleStringMatch {
                    prefix: "/api".to_string(),
                }),
            }),
            component: Some(AppIngressSpecRuleRoutingComponent {
                name: "api".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["match"]["path"]["prefix"], "/api");
        assert!(json.get("redirect").is_none());
    }
}
