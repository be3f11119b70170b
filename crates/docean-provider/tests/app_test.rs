mod common;

use common::{FakeCloud, config, meta};
use docean_cloud::{ChangeAction, CloudError, Context};
use docean_provider::Provider;
use docean_provider::app::watcher::DEPLOYMENT_TIMEOUT;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

fn app_config(instance_count: i64, extra: serde_json::Value) -> docean_cloud::AttributeMap {
    let mut spec = json!({
        "name": "sample",
        "region": "nyc",
        "service": [{
            "name": "web",
            "instance_count": instance_count,
            "instance_size_slug": "basic-xxs",
            "http_port": 8080,
            "image": [{
                "registry_type": "DOCKER_HUB",
                "registry": "library",
                "repository": "nginx",
                "tag": "1.27",
            }],
        }],
    });
    if let (Some(spec), Some(extra)) = (spec.as_object_mut(), extra.as_object()) {
        spec.extend(extra.clone());
    }
    config(json!({"spec": [spec]}))
}

/// A deployment that never finishes fails the create after its timeout
#[tokio::test(start_paused = true)]
async fn test_create_times_out_waiting_for_deployment() {
    let fake = FakeCloud::new();
    fake.state().deployments_succeed = false;
    let provider = Provider::new(meta(&fake));
    let ctx = Context::new();
    let reconciler = provider.reconciler("digitalocean_app").unwrap();

    let mut cfg = app_config(1, json!({}));
    cfg.insert("timeouts".to_string(), json!({"create": "10s"}));

    let started = Instant::now();
    let outcome = reconciler.create(&ctx, &cfg).await;
    assert!(started.elapsed() <= Duration::from_secs(10));

    let state = outcome.state.clone().unwrap();
    assert!(state.id.starts_with("app-"));
    match outcome.result {
        Err(CloudError::Timeout(message)) => assert_eq!(message, DEPLOYMENT_TIMEOUT),
        other => panic!("expected deployment timeout, got {other:?}"),
    }

    let (_, diags) = reconciler.read(&ctx, state).await.into_result().unwrap();
    assert!(diags.warnings().any(|w| w.summary == "app has no active deployment"));
}

#[tokio::test(start_paused = true)]
async fn test_create_reads_back_deployed_app() {
    let fake = FakeCloud::new();
    let provider = Provider::new(meta(&fake));
    let ctx = Context::new();
    let reconciler = provider.reconciler("digitalocean_app").unwrap();

    let cfg = app_config(1, json!({}));
    let (state, diags) = reconciler.create(&ctx, &cfg).await.into_result().unwrap();
    let state = state.unwrap();
    assert!(diags.is_empty());

    assert_eq!(state.attributes["live_url"], json!("https://sample.ondigitalocean.app"));
    assert_eq!(state.attributes["urn"], json!(format!("do:app:{}", state.id)));
    assert!(state.attributes["active_deployment_id"].as_str().unwrap().starts_with("dep-"));
    let spec = &state.attributes["spec"][0];
    assert_eq!(spec["name"], json!("sample"));
    assert_eq!(spec["service"][0]["instance_count"], json!(1));
    assert_eq!(spec["service"][0]["image"][0]["repository"], json!("nginx"));

    let diff = reconciler.plan(&ctx, Some(state), Some(&cfg)).await.unwrap();
    assert_eq!(diff.action(), ChangeAction::NoOp);
}

/// An update follows the deployment it started, not the previous one
#[tokio::test(start_paused = true)]
async fn test_update_waits_for_new_deployment() {
    let fake = FakeCloud::new();
    let provider = Provider::new(meta(&fake));
    let ctx = Context::new();
    let reconciler = provider.reconciler("digitalocean_app").unwrap();

    let (state, _) = reconciler
        .create(&ctx, &app_config(1, json!({})))
        .await
        .into_result()
        .unwrap();
    let state = state.unwrap();
    let first = state.attributes["active_deployment_id"].clone();
    let id = state.id.clone();
    fake.clear_calls();

    let (state, _) = reconciler
        .update(&ctx, state, &app_config(3, json!({})))
        .await
        .into_result()
        .unwrap();
    let state = state.unwrap();

    assert_eq!(fake.calls(), vec![format!("update app {id}")]);
    assert_eq!(state.attributes["spec"][0]["service"][0]["instance_count"], json!(3));
    assert_ne!(state.attributes["active_deployment_id"], first);
    assert_eq!(fake.state().deployments[&id].len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_update_times_out_when_deployment_hangs() {
    let fake = FakeCloud::new();
    let provider = Provider::new(meta(&fake));
    let ctx = Context::new();
    let reconciler = provider.reconciler("digitalocean_app").unwrap();

    let (state, _) = reconciler
        .create(&ctx, &app_config(1, json!({})))
        .await
        .into_result()
        .unwrap();
    fake.state().deployments_succeed = false;

    let mut cfg = app_config(2, json!({}));
    cfg.insert("timeouts".to_string(), json!({"update": "1m"}));
    let outcome = reconciler.update(&ctx, state.unwrap(), &cfg).await;
    let err = outcome.result.unwrap_err();
    assert_eq!(err.to_string(), DEPLOYMENT_TIMEOUT);
}

/// App-level alert destinations are routed after the deployment
#[tokio::test(start_paused = true)]
async fn test_alert_destinations_are_routed() {
    let fake = FakeCloud::new();
    let provider = Provider::new(meta(&fake));
    let ctx = Context::new();
    let reconciler = provider.reconciler("digitalocean_app").unwrap();

    let cfg = app_config(
        1,
        json!({
            "alert": [{
                "rule": "DEPLOYMENT_FAILED",
                "destinations": [{
                    "emails": ["ops@example.com"],
                    "slack_webhooks": [{"url": "https://hooks.slack.com/services/T0/B0/x", "channel": "#deploys"}],
                }],
            }],
        }),
    );
    let (state, _) = reconciler.create(&ctx, &cfg).await.into_result().unwrap();
    let state = state.unwrap();
    let id = state.id.clone();

    assert!(fake.calls().contains(&format!("route alert alert-{id}-0")));
    let alerts = fake.state().alerts[&id].clone();
    assert_eq!(alerts[0].emails, vec!["ops@example.com".to_string()]);
    assert_eq!(alerts[0].slack_webhooks[0].channel, "#deploys");

    let alert = &state.attributes["spec"][0]["alert"][0];
    assert_eq!(alert["rule"], json!("DEPLOYMENT_FAILED"));
    assert_eq!(alert["destinations"][0]["emails"], json!(["ops@example.com"]));
}

#[tokio::test(start_paused = true)]
async fn test_delete_tolerates_missing_app() {
    let fake = FakeCloud::new();
    let provider = Provider::new(meta(&fake));
    let ctx = Context::new();
    let reconciler = provider.reconciler("digitalocean_app").unwrap();

    let (state, _) = reconciler
        .create(&ctx, &app_config(1, json!({})))
        .await
        .into_result()
        .unwrap();
    let state = state.unwrap();
    fake.state().apps.clear();

    let outcome = reconciler.delete(&ctx, state).await;
    assert!(outcome.is_ok());
    assert!(outcome.state.is_none());
}
