//! App Spec schema with its expand and flatten functions
//!
//! The spec is one nested `spec` block. Components (services, workers,
//! jobs, functions, static sites) share their source, environment, alert
//! and log destination blocks.

use crate::fields::{self, Fields, Record};
use docean_api::apps::{
    AlertDestinationUpdateRequest, AppAlert, AppAlertSlackWebhook, AppAlertSpec, AppAutoscalingCpuMetric, AppAutoscalingMetrics, AppAutoscalingSpec,
    AppCorsPolicy, AppDatabaseSpec, AppDomainSpec, AppEgressSpec, AppFunctionsSpec,
    AppIngressSpec, AppIngressSpecRule, AppIngressSpecRuleMatch,
    AppIngressSpecRuleRoutingComponent, AppIngressSpecRuleRoutingRedirect,
    AppIngressSpecRuleStringMatch, AppJobSpec, AppLogDestinationDatadog,
    AppLogDestinationLogtail, AppLogDestinationPapertrail, AppLogDestinationSpec,
    AppServiceSpec, AppServiceSpecHealthCheck, AppStaticSiteSpec, AppStringMatch,
    AppVariableDefinition, AppWorkerSpec, GitSourceSpec, HostedGitSourceSpec, ImageDeployOnPush,
    ImageSourceSpec,
};
use docean_api::AppSpec;
use docean_cloud::schema::{int_between, string_in};
use docean_cloud::{AttrType, Attribute, Block, Value};

const ENV_SCOPES: &[&str] = &["UNSET", "RUN_TIME", "BUILD_TIME", "RUN_AND_BUILD_TIME"];
const ENV_TYPES: &[&str] = &["GENERAL", "SECRET"];
const REGISTRY_TYPES: &[&str] = &["DOCKER_HUB", "DOCR", "GHCR"];
const JOB_KINDS: &[&str] = &["UNSPECIFIED", "PRE_DEPLOY", "POST_DEPLOY", "FAILED_DEPLOY"];
const DOMAIN_TYPES: &[&str] = &["DEFAULT", "PRIMARY", "ALIAS"];
const DATABASE_ENGINES: &[&str] = &["UNSET", "MYSQL", "PG", "REDIS", "MONGODB", "KAFKA", "OPENSEARCH"];
const EGRESS_TYPES: &[&str] = &["AUTOASSIGN", "DEDICATED_IP"];
const ALERT_OPERATORS: &[&str] = &["UNSPECIFIED_OPERATOR", "GREATER_THAN", "LESS_THAN"];
const ALERT_WINDOWS: &[&str] = &[
    "UNSPECIFIED_WINDOW",
    "FIVE_MINUTES",
    "TEN_MINUTES",
    "THIRTY_MINUTES",
    "ONE_HOUR",
];

// ============ Schema ============

fn one(block: Block) -> Attribute {
    Attribute::block_list(block).optional().max_items(1)
}

fn many(block: Block) -> Attribute {
    Attribute::block_list(block).optional()
}

fn git_block() -> Block {
    Block::new()
        .attr("repo_clone_url", Attribute::string().optional())
        .attr("branch", Attribute::string().optional())
}

fn hosted_git_block() -> Block {
    Block::new()
        .attr("repo", Attribute::string().optional())
        .attr("branch", Attribute::string().optional())
        .attr("deploy_on_push", Attribute::bool().optional())
}

fn image_block() -> Block {
    let deploy_on_push = Block::new().attr("enabled", Attribute::bool().optional());
    Block::new()
        .attr(
            "registry_type",
            Attribute::string().required().validate(string_in(REGISTRY_TYPES)),
        )
        .attr("registry", Attribute::string().optional())
        .attr("repository", Attribute::string().required())
        .attr("tag", Attribute::string().optional())
        .attr("digest", Attribute::string().optional())
        .attr("deploy_on_push", one(deploy_on_push))
}

fn env_block() -> Block {
    Block::new()
        .attr("key", Attribute::string().required())
        .attr("value", Attribute::string().optional().sensitive())
        .attr(
            "scope",
            Attribute::string()
                .optional()
                .default("RUN_AND_BUILD_TIME")
                .validate(string_in(ENV_SCOPES)),
        )
        .attr(
            "type",
            Attribute::string().optional().default("GENERAL").validate(string_in(ENV_TYPES)),
        )
}

fn alert_block() -> Block {
    Block::new()
        .attr("rule", Attribute::string().required())
        .attr("disabled", Attribute::bool().optional().default(false))
        .attr("operator", Attribute::string().optional().validate(string_in(ALERT_OPERATORS)))
        .attr("value", Attribute::float().optional())
        .attr("window", Attribute::string().optional().validate(string_in(ALERT_WINDOWS)))
}

/// App-level alerts additionally route notifications
fn app_alert_block() -> Block {
    let slack = Block::new()
        .attr("url", Attribute::string().required().sensitive())
        .attr("channel", Attribute::string().required());
    let destinations = Block::new()
        .attr("emails", Attribute::list(AttrType::String).optional())
        .attr("slack_webhooks", many(slack));
    alert_block().attr("destinations", one(destinations))
}

fn log_destination_block() -> Block {
    let papertrail = Block::new().attr("endpoint", Attribute::string().required());
    let datadog = Block::new()
        .attr("endpoint", Attribute::string().optional())
        .attr("api_key", Attribute::string().required().sensitive());
    let logtail = Block::new().attr("token", Attribute::string().required().sensitive());
    Block::new()
        .attr("name", Attribute::string().required())
        .attr("papertrail", one(papertrail))
        .attr("datadog", one(datadog))
        .attr("logtail", one(logtail))
}

fn autoscaling_block() -> Block {
    let cpu = Block::new().attr("percent", Attribute::int().required().validate(int_between(1, 100)));
    let metrics = Block::new().attr("cpu", one(cpu));
    Block::new()
        .attr("min_instance_count", Attribute::int().required().validate(int_between(1, 250)))
        .attr("max_instance_count", Attribute::int().required().validate(int_between(1, 250)))
        .attr("metrics", one(metrics))
}

fn health_check_block() -> Block {
    Block::new()
        .attr("http_path", Attribute::string().optional())
        .attr("initial_delay_seconds", Attribute::int().optional())
        .attr("period_seconds", Attribute::int().optional())
        .attr("timeout_seconds", Attribute::int().optional())
        .attr("success_threshold", Attribute::int().optional())
        .attr("failure_threshold", Attribute::int().optional())
        .attr("port", Attribute::int().optional())
}

fn cors_block() -> Block {
    let origins = Block::new()
        .attr("exact", Attribute::string().optional())
        .attr("prefix", Attribute::string().optional())
        .attr("regex", Attribute::string().optional());
    Block::new()
        .attr("allow_origins", many(origins))
        .attr("allow_methods", Attribute::list(AttrType::String).optional())
        .attr("allow_headers", Attribute::list(AttrType::String).optional())
        .attr("expose_headers", Attribute::list(AttrType::String).optional())
        .attr("max_age", Attribute::string().optional())
        .attr("allow_credentials", Attribute::bool().optional())
}

/// Attributes every buildable component has
fn component(block: Block) -> Block {
    block
        .attr("name", Attribute::string().required())
        .attr("git", one(git_block()))
        .attr("github", one(hosted_git_block()))
        .attr("gitlab", one(hosted_git_block()))
        .attr("source_dir", Attribute::string().optional())
        .attr("env", many(env_block()))
}

/// Attributes of components that run a container
fn runnable(block: Block) -> Block {
    component(block)
        .attr("image", one(image_block()))
        .attr("dockerfile_path", Attribute::string().optional())
        .attr("build_command", Attribute::string().optional())
        .attr("run_command", Attribute::string().optional())
        .attr("environment_slug", Attribute::string().optional())
        .attr("instance_size_slug", Attribute::string().optional())
        .attr("instance_count", Attribute::int().optional())
        .attr("alert", many(alert_block()))
        .attr("log_destination", many(log_destination_block()))
}

fn service_block() -> Block {
    runnable(Block::new())
        .attr("http_port", Attribute::int().optional())
        .attr("internal_ports", Attribute::list(AttrType::Int).optional())
        .attr("health_check", one(health_check_block()))
        .attr("autoscaling", one(autoscaling_block()))
}

fn worker_block() -> Block {
    runnable(Block::new()).attr("autoscaling", one(autoscaling_block()))
}

fn job_block() -> Block {
    runnable(Block::new()).attr(
        "kind",
        Attribute::string().optional().default("UNSPECIFIED").validate(string_in(JOB_KINDS)),
    )
}

fn function_block() -> Block {
    component(Block::new())
        .attr("alert", many(alert_block()))
        .attr("log_destination", many(log_destination_block()))
}

fn static_site_block() -> Block {
    component(Block::new())
        .attr("dockerfile_path", Attribute::string().optional())
        .attr("build_command", Attribute::string().optional())
        .attr("environment_slug", Attribute::string().optional())
        .attr("output_dir", Attribute::string().optional())
        .attr("index_document", Attribute::string().optional())
        .attr("error_document", Attribute::string().optional())
        .attr("catchall_document", Attribute::string().optional())
}

fn database_block() -> Block {
    Block::new()
        .attr("name", Attribute::string().required())
        .attr("engine", Attribute::string().optional().validate(string_in(DATABASE_ENGINES)))
        .attr("version", Attribute::string().optional())
        .attr("production", Attribute::bool().optional())
        .attr("cluster_name", Attribute::string().optional())
        .attr("db_name", Attribute::string().optional())
        .attr("db_user", Attribute::string().optional())
}

fn domain_block() -> Block {
    Block::new()
        .attr("name", Attribute::string().required())
        .attr(
            "type",
            Attribute::string().optional().default("DEFAULT").validate(string_in(DOMAIN_TYPES)),
        )
        .attr("wildcard", Attribute::bool().optional())
        .attr("zone", Attribute::string().optional())
}

fn ingress_block() -> Block {
    let path = Block::new().attr("prefix", Attribute::string().optional());
    let rule_match = Block::new().attr("path", one(path));
    let component = Block::new()
        .attr("name", Attribute::string().optional())
        .attr("preserve_path_prefix", Attribute::bool().optional())
        .attr("rewrite", Attribute::string().optional());
    let redirect = Block::new()
        .attr("uri", Attribute::string().optional())
        .attr("authority", Attribute::string().optional())
        .attr("port", Attribute::int().optional())
        .attr("scheme", Attribute::string().optional())
        .attr("redirect_code", Attribute::int().optional());
    let rule = Block::new()
        .attr("match", one(rule_match))
        .attr("component", one(component))
        .attr("redirect", one(redirect))
        .attr("cors", one(cors_block()));
    Block::new().attr("rule", many(rule))
}

/// The `spec` block
pub fn app_spec_block() -> Block {
    let egress = Block::new().attr(
        "type",
        Attribute::string().optional().default("AUTOASSIGN").validate(string_in(EGRESS_TYPES)),
    );
    Block::new()
        .attr("name", Attribute::string().required())
        .attr("region", Attribute::string().optional())
        .attr("features", Attribute::list(AttrType::String).optional())
        .attr("env", many(env_block()))
        .attr("domain", many(domain_block()))
        .attr("alert", many(app_alert_block()))
        .attr("ingress", one(ingress_block()))
        .attr("egress", one(egress))
        .attr("service", many(service_block()))
        .attr("worker", many(worker_block()))
        .attr("job", many(job_block()))
        .attr("function", many(function_block()))
        .attr("static_site", many(static_site_block()))
        .attr("database", many(database_block()))
}

// ============ Expand ============

fn expand_git(f: &Fields) -> Option<GitSourceSpec> {
    fields::first(f, "git").map(|git| GitSourceSpec {
        repo_clone_url: fields::string(git, "repo_clone_url"),
        branch: fields::string(git, "branch"),
    })
}

fn expand_hosted_git(f: &Fields, key: &str) -> Option<HostedGitSourceSpec> {
    fields::first(f, key).map(|src| HostedGitSourceSpec {
        repo: fields::string(src, "repo"),
        branch: fields::string(src, "branch"),
        deploy_on_push: fields::boolean(src, "deploy_on_push"),
    })
}

fn expand_image(f: &Fields) -> Option<ImageSourceSpec> {
    fields::first(f, "image").map(|image| ImageSourceSpec {
        registry_type: fields::string(image, "registry_type"),
        registry: fields::string(image, "registry"),
        repository: fields::string(image, "repository"),
        tag: fields::string(image, "tag"),
        digest: fields::string(image, "digest"),
        deploy_on_push: fields::first(image, "deploy_on_push").map(|d| ImageDeployOnPush {
            enabled: fields::boolean(d, "enabled"),
        }),
    })
}

fn expand_envs(f: &Fields) -> Vec<AppVariableDefinition> {
    fields::nested(f, "env")
        .into_iter()
        .map(|env| AppVariableDefinition {
            key: fields::string(env, "key"),
            value: fields::string(env, "value"),
            scope: fields::string(env, "scope"),
            var_type: fields::string(env, "type"),
        })
        .collect()
}

fn expand_alerts(f: &Fields) -> Vec<AppAlertSpec> {
    fields::nested(f, "alert")
        .into_iter()
        .map(|alert| AppAlertSpec {
            rule: fields::string(alert, "rule"),
            disabled: fields::boolean(alert, "disabled"),
            operator: fields::string(alert, "operator"),
            value: fields::float(alert, "value"),
            window: fields::string(alert, "window"),
        })
        .collect()
}

fn expand_log_destinations(f: &Fields) -> Vec<AppLogDestinationSpec> {
    fields::nested(f, "log_destination")
        .into_iter()
        .map(|dest| AppLogDestinationSpec {
            name: fields::string(dest, "name"),
            papertrail: fields::first(dest, "papertrail").map(|p| AppLogDestinationPapertrail {
                endpoint: fields::string(p, "endpoint"),
            }),
            datadog: fields::first(dest, "datadog").map(|dd| AppLogDestinationDatadog {
                endpoint: fields::string(dd, "endpoint"),
                api_key: fields::string(dd, "api_key"),
            }),
            logtail: fields::first(dest, "logtail").map(|l| AppLogDestinationLogtail {
                token: fields::string(l, "token"),
            }),
        })
        .collect()
}

fn expand_autoscaling(f: &Fields) -> Option<AppAutoscalingSpec> {
    fields::first(f, "autoscaling").map(|a| AppAutoscalingSpec {
        min_instance_count: fields::int(a, "min_instance_count"),
        max_instance_count: fields::int(a, "max_instance_count"),
        metrics: fields::first(a, "metrics").map(|m| AppAutoscalingMetrics {
            cpu: fields::first(m, "cpu").map(|cpu| AppAutoscalingCpuMetric {
                percent: fields::int(cpu, "percent"),
            }),
        }),
    })
}

fn expand_health_check(f: &Fields) -> Option<AppServiceSpecHealthCheck> {
    fields::first(f, "health_check").map(|h| AppServiceSpecHealthCheck {
        http_path: fields::string(h, "http_path"),
        initial_delay_seconds: fields::int(h, "initial_delay_seconds"),
        period_seconds: fields::int(h, "period_seconds"),
        timeout_seconds: fields::int(h, "timeout_seconds"),
        success_threshold: fields::int(h, "success_threshold"),
        failure_threshold: fields::int(h, "failure_threshold"),
        port: fields::int(h, "port"),
    })
}

fn expand_service(f: &Fields) -> AppServiceSpec {
    AppServiceSpec {
        name: fields::string(f, "name"),
        git: expand_git(f),
        github: expand_hosted_git(f, "github"),
        gitlab: expand_hosted_git(f, "gitlab"),
        image: expand_image(f),
        dockerfile_path: fields::string(f, "dockerfile_path"),
        build_command: fields::string(f, "build_command"),
        run_command: fields::string(f, "run_command"),
        source_dir: fields::string(f, "source_dir"),
        environment_slug: fields::string(f, "environment_slug"),
        envs: expand_envs(f),
        instance_size_slug: fields::string(f, "instance_size_slug"),
        instance_count: fields::int(f, "instance_count"),
        http_port: fields::int(f, "http_port"),
        internal_ports: fields::ints(f, "internal_ports"),
        health_check: expand_health_check(f),
        alerts: expand_alerts(f),
        log_destinations: expand_log_destinations(f),
        autoscaling: expand_autoscaling(f),
    }
}

fn expand_worker(f: &Fields) -> AppWorkerSpec {
    AppWorkerSpec {
        name: fields::string(f, "name"),
        git: expand_git(f),
        github: expand_hosted_git(f, "github"),
        gitlab: expand_hosted_git(f, "gitlab"),
        image: expand_image(f),
        dockerfile_path: fields::string(f, "dockerfile_path"),
        build_command: fields::string(f, "build_command"),
        run_command: fields::string(f, "run_command"),
        source_dir: fields::string(f, "source_dir"),
        environment_slug: fields::string(f, "environment_slug"),
        envs: expand_envs(f),
        instance_size_slug: fields::string(f, "instance_size_slug"),
        instance_count: fields::int(f, "instance_count"),
        alerts: expand_alerts(f),
        log_destinations: expand_log_destinations(f),
        autoscaling: expand_autoscaling(f),
    }
}

fn expand_job(f: &Fields) -> AppJobSpec {
    AppJobSpec {
        name: fields::string(f, "name"),
        git: expand_git(f),
        github: expand_hosted_git(f, "github"),
        gitlab: expand_hosted_git(f, "gitlab"),
        image: expand_image(f),
        dockerfile_path: fields::string(f, "dockerfile_path"),
        build_command: fields::string(f, "build_command"),
        run_command: fields::string(f, "run_command"),
        source_dir: fields::string(f, "source_dir"),
        environment_slug: fields::string(f, "environment_slug"),
        envs: expand_envs(f),
        instance_size_slug: fields::string(f, "instance_size_slug"),
        instance_count: fields::int(f, "instance_count"),
        kind: fields::string(f, "kind"),
        alerts: expand_alerts(f),
        log_destinations: expand_log_destinations(f),
    }
}

fn expand_function(f: &Fields) -> AppFunctionsSpec {
    AppFunctionsSpec {
        name: fields::string(f, "name"),
        git: expand_git(f),
        github: expand_hosted_git(f, "github"),
        gitlab: expand_hosted_git(f, "gitlab"),
        source_dir: fields::string(f, "source_dir"),
        envs: expand_envs(f),
        alerts: expand_alerts(f),
        log_destinations: expand_log_destinations(f),
    }
}

fn expand_static_site(f: &Fields) -> AppStaticSiteSpec {
    AppStaticSiteSpec {
        name: fields::string(f, "name"),
        git: expand_git(f),
        github: expand_hosted_git(f, "github"),
        gitlab: expand_hosted_git(f, "gitlab"),
        dockerfile_path: fields::string(f, "dockerfile_path"),
        build_command: fields::string(f, "build_command"),
        source_dir: fields::string(f, "source_dir"),
        environment_slug: fields::string(f, "environment_slug"),
        output_dir: fields::string(f, "output_dir"),
        index_document: fields::string(f, "index_document"),
        error_document: fields::string(f, "error_document"),
        catchall_document: fields::string(f, "catchall_document"),
        envs: expand_envs(f),
    }
}

fn expand_database(f: &Fields) -> AppDatabaseSpec {
    AppDatabaseSpec {
        name: fields::string(f, "name"),
        engine: fields::string(f, "engine"),
        version: fields::string(f, "version"),
        production: fields::boolean(f, "production"),
        cluster_name: fields::string(f, "cluster_name"),
        db_name: fields::string(f, "db_name"),
        db_user: fields::string(f, "db_user"),
    }
}

fn expand_domain(f: &Fields) -> AppDomainSpec {
    AppDomainSpec {
        domain: fields::string(f, "name"),
        domain_type: fields::string(f, "type"),
        wildcard: fields::boolean(f, "wildcard"),
        zone: fields::string(f, "zone"),
    }
}

fn expand_cors(f: &Fields) -> Option<AppCorsPolicy> {
    fields::first(f, "cors").map(|cors| AppCorsPolicy {
        allow_origins: fields::nested(cors, "allow_origins")
            .into_iter()
            .map(|o| AppStringMatch {
                exact: fields::string(o, "exact"),
                prefix: fields::string(o, "prefix"),
                regex: fields::string(o, "regex"),
            })
            .collect(),
        allow_methods: fields::strings(cors, "allow_methods"),
        allow_headers: fields::strings(cors, "allow_headers"),
        expose_headers: fields::strings(cors, "expose_headers"),
        max_age: fields::string(cors, "max_age"),
        allow_credentials: fields::boolean(cors, "allow_credentials"),
    })
}

fn expand_ingress_rule(f: &Fields) -> AppIngressSpecRule {
    AppIngressSpecRule {
        rule_match: fields::first(f, "match").map(|m| AppIngressSpecRuleMatch {
            path: fields::first(m, "path").map(|p| AppIngressSpecRuleStringMatch {
                prefix: fields::string(p, "prefix"),
            }),
        }),
        component: fields::first(f, "component").map(|c| AppIngressSpecRuleRoutingComponent {
            name: fields::string(c, "name"),
            preserve_path_prefix: fields::boolean(c, "preserve_path_prefix"),
            rewrite: fields::string(c, "rewrite"),
        }),
        redirect: fields::first(f, "redirect").map(|r| AppIngressSpecRuleRoutingRedirect {
            uri: fields::string(r, "uri"),
            authority: fields::string(r, "authority"),
            port: fields::int(r, "port"),
            scheme: fields::string(r, "scheme"),
            redirect_code: fields::int(r, "redirect_code"),
        }),
        cors: expand_cors(f),
    }
}

fn collect<T>(f: &Fields, key: &str, expand: fn(&Fields) -> T) -> Vec<T> {
    fields::nested(f, key).into_iter().map(expand).collect()
}

/// Request spec from the single-element `spec` block list
///
/// Malformed elements anywhere in the tree are skipped.
pub fn expand_app_spec(items: &[Value]) -> AppSpec {
    let Some(spec) = fields::blocks(items).into_iter().next() else {
        return AppSpec::default();
    };
    AppSpec {
        name: fields::string(spec, "name"),
        region: fields::string(spec, "region"),
        services: collect(spec, "service", expand_service),
        workers: collect(spec, "worker", expand_worker),
        jobs: collect(spec, "job", expand_job),
        functions: collect(spec, "function", expand_function),
        static_sites: collect(spec, "static_site", expand_static_site),
        databases: collect(spec, "database", expand_database),
        domains: collect(spec, "domain", expand_domain),
        alerts: expand_alerts(spec),
        envs: expand_envs(spec),
        ingress: fields::first(spec, "ingress").map(|ingress| AppIngressSpec {
            rules: collect(ingress, "rule", expand_ingress_rule),
        }),
        egress: fields::first(spec, "egress").map(|egress| AppEgressSpec {
            egress_type: fields::string(egress, "type"),
        }),
        features: fields::strings(spec, "features"),
    }
}

// ============ Flatten ============

fn flatten_git(git: &GitSourceSpec) -> Record {
    Record::new()
        .opt("repo_clone_url", git.repo_clone_url.as_str())
        .opt("branch", git.branch.as_str())
}

fn flatten_hosted_git(src: &HostedGitSourceSpec) -> Record {
    Record::new()
        .opt("repo", src.repo.as_str())
        .opt("branch", src.branch.as_str())
        .opt("deploy_on_push", src.deploy_on_push)
}

fn flatten_image(image: &ImageSourceSpec) -> Record {
    let deploy_on_push = image
        .deploy_on_push
        .as_ref()
        .map(|d| Record::new().opt("enabled", d.enabled));
    Record::new()
        .set("registry_type", image.registry_type.as_str())
        .opt("registry", image.registry.as_str())
        .set("repository", image.repository.as_str())
        .opt("tag", image.tag.as_str())
        .opt("digest", image.digest.as_str())
        .block("deploy_on_push", deploy_on_push)
}

fn flatten_envs(envs: &[AppVariableDefinition]) -> impl Iterator<Item = Record> + '_ {
    envs.iter().map(|env| {
        Record::new()
            .set("key", env.key.as_str())
            .opt("value", env.value.as_str())
            .opt("scope", env.scope.as_str())
            .opt("type", env.var_type.as_str())
    })
}

fn flatten_alert(alert: &AppAlertSpec) -> Record {
    Record::new()
        .set("rule", alert.rule.as_str())
        .set("disabled", alert.disabled)
        .opt("operator", alert.operator.as_str())
        .opt("value", alert.value)
        .opt("window", alert.window.as_str())
}

fn flatten_alerts(alerts: &[AppAlertSpec]) -> impl Iterator<Item = Record> + '_ {
    alerts.iter().map(flatten_alert)
}

fn flatten_log_destinations(dests: &[AppLogDestinationSpec]) -> impl Iterator<Item = Record> + '_ {
    dests.iter().map(|dest| {
        Record::new()
            .set("name", dest.name.as_str())
            .block(
                "papertrail",
                dest.papertrail
                    .as_ref()
                    .map(|p| Record::new().set("endpoint", p.endpoint.as_str())),
            )
            .block(
                "datadog",
                dest.datadog.as_ref().map(|dd| {
                    Record::new()
                        .opt("endpoint", dd.endpoint.as_str())
                        .set("api_key", dd.api_key.as_str())
                }),
            )
            .block(
                "logtail",
                dest.logtail
                    .as_ref()
                    .map(|l| Record::new().set("token", l.token.as_str())),
            )
    })
}

fn flatten_autoscaling(a: &AppAutoscalingSpec) -> Record {
    let metrics = a.metrics.as_ref().map(|m| {
        Record::new().block(
            "cpu",
            m.cpu.as_ref().map(|cpu| Record::new().set("percent", cpu.percent)),
        )
    });
    Record::new()
        .set("min_instance_count", a.min_instance_count)
        .set("max_instance_count", a.max_instance_count)
        .block("metrics", metrics)
}

fn flatten_health_check(h: &AppServiceSpecHealthCheck) -> Record {
    Record::new()
        .opt("http_path", h.http_path.as_str())
        .opt("initial_delay_seconds", h.initial_delay_seconds)
        .opt("period_seconds", h.period_seconds)
        .opt("timeout_seconds", h.timeout_seconds)
        .opt("success_threshold", h.success_threshold)
        .opt("failure_threshold", h.failure_threshold)
        .opt("port", h.port)
}

/// Source blocks shared by every component kind
fn sources(
    record: Record,
    git: &Option<GitSourceSpec>,
    github: &Option<HostedGitSourceSpec>,
    gitlab: &Option<HostedGitSourceSpec>,
) -> Record {
    record
        .block("git", git.as_ref().map(flatten_git))
        .block("github", github.as_ref().map(flatten_hosted_git))
        .block("gitlab", gitlab.as_ref().map(flatten_hosted_git))
}

fn flatten_service(s: &AppServiceSpec) -> Record {
    sources(Record::new().set("name", s.name.as_str()), &s.git, &s.github, &s.gitlab)
        .block("image", s.image.as_ref().map(flatten_image))
        .opt("dockerfile_path", s.dockerfile_path.as_str())
        .opt("build_command", s.build_command.as_str())
        .opt("run_command", s.run_command.as_str())
        .opt("source_dir", s.source_dir.as_str())
        .opt("environment_slug", s.environment_slug.as_str())
        .blocks("env", flatten_envs(&s.envs))
        .opt("instance_size_slug", s.instance_size_slug.as_str())
        .opt("instance_count", s.instance_count)
        .opt("http_port", s.http_port)
        .opt(
            "internal_ports",
            Value::List(s.internal_ports.iter().map(|p| Value::Int(*p)).collect()),
        )
        .block("health_check", s.health_check.as_ref().map(flatten_health_check))
        .blocks("alert", flatten_alerts(&s.alerts))
        .blocks("log_destination", flatten_log_destinations(&s.log_destinations))
        .block("autoscaling", s.autoscaling.as_ref().map(flatten_autoscaling))
}

fn flatten_worker(w: &AppWorkerSpec) -> Record {
    sources(Record::new().set("name", w.name.as_str()), &w.git, &w.github, &w.gitlab)
        .block("image", w.image.as_ref().map(flatten_image))
        .opt("dockerfile_path", w.dockerfile_path.as_str())
        .opt("build_command", w.build_command.as_str())
        .opt("run_command", w.run_command.as_str())
        .opt("source_dir", w.source_dir.as_str())
        .opt("environment_slug", w.environment_slug.as_str())
        .blocks("env", flatten_envs(&w.envs))
        .opt("instance_size_slug", w.instance_size_slug.as_str())
        .opt("instance_count", w.instance_count)
        .blocks("alert", flatten_alerts(&w.alerts))
        .blocks("log_destination", flatten_log_destinations(&w.log_destinations))
        .block("autoscaling", w.autoscaling.as_ref().map(flatten_autoscaling))
}

fn flatten_job(j: &AppJobSpec) -> Record {
    sources(Record::new().set("name", j.name.as_str()), &j.git, &j.github, &j.gitlab)
        .block("image", j.image.as_ref().map(flatten_image))
        .opt("dockerfile_path", j.dockerfile_path.as_str())
        .opt("build_command", j.build_command.as_str())
        .opt("run_command", j.run_command.as_str())
        .opt("source_dir", j.source_dir.as_str())
        .opt("environment_slug", j.environment_slug.as_str())
        .blocks("env", flatten_envs(&j.envs))
        .opt("instance_size_slug", j.instance_size_slug.as_str())
        .opt("instance_count", j.instance_count)
        .opt("kind", j.kind.as_str())
        .blocks("alert", flatten_alerts(&j.alerts))
        .blocks("log_destination", flatten_log_destinations(&j.log_destinations))
}

fn flatten_function(f: &AppFunctionsSpec) -> Record {
    sources(Record::new().set("name", f.name.as_str()), &f.git, &f.github, &f.gitlab)
        .opt("source_dir", f.source_dir.as_str())
        .blocks("env", flatten_envs(&f.envs))
        .blocks("alert", flatten_alerts(&f.alerts))
        .blocks("log_destination", flatten_log_destinations(&f.log_destinations))
}

fn flatten_static_site(s: &AppStaticSiteSpec) -> Record {
    sources(Record::new().set("name", s.name.as_str()), &s.git, &s.github, &s.gitlab)
        .opt("dockerfile_path", s.dockerfile_path.as_str())
        .opt("build_command", s.build_command.as_str())
        .opt("source_dir", s.source_dir.as_str())
        .opt("environment_slug", s.environment_slug.as_str())
        .opt("output_dir", s.output_dir.as_str())
        .opt("index_document", s.index_document.as_str())
        .opt("error_document", s.error_document.as_str())
        .opt("catchall_document", s.catchall_document.as_str())
        .blocks("env", flatten_envs(&s.envs))
}

fn flatten_database(db: &AppDatabaseSpec) -> Record {
    Record::new()
        .set("name", db.name.as_str())
        .opt("engine", db.engine.as_str())
        .opt("version", db.version.as_str())
        .opt("production", db.production)
        .opt("cluster_name", db.cluster_name.as_str())
        .opt("db_name", db.db_name.as_str())
        .opt("db_user", db.db_user.as_str())
}

fn flatten_domain(domain: &AppDomainSpec) -> Record {
    Record::new()
        .set("name", domain.domain.as_str())
        .opt("type", domain.domain_type.as_str())
        .opt("wildcard", domain.wildcard)
        .opt("zone", domain.zone.as_str())
}

fn flatten_cors(cors: &AppCorsPolicy) -> Record {
    let origins = cors.allow_origins.iter().map(|o| {
        Record::new()
            .opt("exact", o.exact.as_str())
            .opt("prefix", o.prefix.as_str())
            .opt("regex", o.regex.as_str())
    });
    Record::new()
        .blocks("allow_origins", origins)
        .strings("allow_methods", &cors.allow_methods)
        .strings("allow_headers", &cors.allow_headers)
        .strings("expose_headers", &cors.expose_headers)
        .opt("max_age", cors.max_age.as_str())
        .opt("allow_credentials", cors.allow_credentials)
}

fn flatten_ingress_rule(rule: &AppIngressSpecRule) -> Record {
    let rule_match = rule.rule_match.as_ref().map(|m| {
        Record::new().block(
            "path",
            m.path.as_ref().map(|p| Record::new().opt("prefix", p.prefix.as_str())),
        )
    });
    let component = rule.component.as_ref().map(|c| {
        Record::new()
            .opt("name", c.name.as_str())
            .opt("preserve_path_prefix", c.preserve_path_prefix)
            .opt("rewrite", c.rewrite.as_str())
    });
    let redirect = rule.redirect.as_ref().map(|r| {
        Record::new()
            .opt("uri", r.uri.as_str())
            .opt("authority", r.authority.as_str())
            .opt("port", r.port)
            .opt("scheme", r.scheme.as_str())
            .opt("redirect_code", r.redirect_code)
    });
    Record::new()
        .block("match", rule_match)
        .block("component", component)
        .block("redirect", redirect)
        .block("cors", rule.cors.as_ref().map(flatten_cors))
}

/// Notification routes configured for app-level alerts, by rule
pub fn configured_destinations(items: &[Value]) -> Vec<(String, AlertDestinationUpdateRequest)> {
    let Some(spec) = fields::blocks(items).into_iter().next() else {
        return Vec::new();
    };
    fields::nested(spec, "alert")
        .into_iter()
        .filter_map(|alert| {
            let dest = fields::first(alert, "destinations")?;
            let req = AlertDestinationUpdateRequest {
                emails: fields::strings(dest, "emails"),
                slack_webhooks: fields::nested(dest, "slack_webhooks")
                    .into_iter()
                    .map(|hook| AppAlertSlackWebhook {
                        url: fields::string(hook, "url"),
                        channel: fields::string(hook, "channel"),
                    })
                    .collect(),
            };
            Some((fields::string(alert, "rule"), req))
        })
        .collect()
}

fn flatten_destinations(alert: &AppAlert) -> Option<Record> {
    let hooks = alert.slack_webhooks.iter().map(|hook| {
        Record::new()
            .set("url", hook.url.as_str())
            .set("channel", hook.channel.as_str())
    });
    let record = Record::new()
        .strings("emails", &alert.emails)
        .blocks("slack_webhooks", hooks);
    (!record.is_empty()).then_some(record)
}

/// `spec` block list for a spec returned by the API
///
/// `alerts` are the app's live alerts; destinations of app-level alerts
/// are attached to the matching `alert` block.
pub fn flatten_app_spec(spec: &AppSpec, alerts: &[AppAlert]) -> Value {
    let app_alerts = spec.alerts.iter().map(|alert| {
        let live = alerts
            .iter()
            .find(|a| a.component_name.is_empty() && a.spec.as_ref().is_some_and(|s| s.rule == alert.rule));
        let record = flatten_alert(alert);
        record.block("destinations", live.and_then(flatten_destinations))
    });
    let ingress = spec
        .ingress
        .as_ref()
        .map(|i| Record::new().blocks("rule", i.rules.iter().map(flatten_ingress_rule)));
    let egress = spec
        .egress
        .as_ref()
        .map(|e| Record::new().opt("type", e.egress_type.as_str()));
    let record = Record::new()
        .set("name", spec.name.as_str())
        .opt("region", spec.region.as_str())
        .strings("features", &spec.features)
        .blocks("env", flatten_envs(&spec.envs))
        .blocks("domain", spec.domains.iter().map(flatten_domain))
        .blocks("alert", app_alerts)
        .block("ingress", ingress)
        .block("egress", egress)
        .blocks("service", spec.services.iter().map(flatten_service))
        .blocks("worker", spec.workers.iter().map(flatten_worker))
        .blocks("job", spec.jobs.iter().map(flatten_job))
        .blocks("function", spec.functions.iter().map(flatten_function))
        .blocks("static_site", spec.static_sites.iter().map(flatten_static_site))
        .blocks("database", spec.databases.iter().map(flatten_database));
    Value::List(vec![record.into_value()])
}
