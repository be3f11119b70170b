mod common;

use common::{CREATED_AT, DEFAULT_PROJECT, FakeCloud, meta};
use docean_api::{Droplet, Vpc};
use docean_cloud::{Context, DEFAULT_PREFIX};
use docean_provider::Provider;
use std::collections::BTreeMap;
use std::sync::Arc;

fn seeded() -> Arc<FakeCloud> {
    let fake = FakeCloud::new();
    {
        let mut state = fake.state();
        for (id, name) in [(1, "tf-acc-test-web"), (2, "prod-web")] {
            state.droplets.insert(
                id,
                Droplet {
                    id,
                    name: name.to_string(),
                    status: "active".to_string(),
                    created_at: CREATED_AT.to_string(),
                    ..Default::default()
                },
            );
        }
        state.add_volume("tf-acc-test-data", "nyc3", 10);
        state.add_volume("prod-data", "nyc3", 10);
        if let Some(volume) = state.volumes.get_mut("tf-acc-test-data") {
            volume.droplet_ids.push(1);
        }
        state.add_project("proj-t", "tf-acc-test-project", &[]);
        state.add_project("proj-k", "staging", &[]);
        for (id, default) in [("vpc-t", false), ("vpc-td", true)] {
            state.vpcs.push(Vpc {
                id: id.to_string(),
                name: format!("tf-acc-test-{id}"),
                region: "nyc3".to_string(),
                default,
                created_at: CREATED_AT.to_string(),
                ..Default::default()
            });
        }
    }
    fake
}

/// Only prefixed objects go; default projects and VPCs stay
#[tokio::test(start_paused = true)]
async fn test_sweep_removes_only_prefixed_objects() {
    let fake = seeded();
    let provider = Provider::new(meta(&fake));
    let ctx = Context::new();

    let registry = provider.sweepers().unwrap();
    let report = registry
        .run(&ctx, provider.meta(), DEFAULT_PREFIX, &[])
        .await
        .unwrap();
    assert!(report.is_success(), "{:?}", report.failures);

    let swept: BTreeMap<String, usize> = report.swept.into_iter().collect();
    assert_eq!(swept["digitalocean_droplet"], 1);
    assert_eq!(swept["digitalocean_volume"], 1);
    assert_eq!(swept["digitalocean_project"], 1);
    assert_eq!(swept["digitalocean_vpc"], 1);
    assert_eq!(swept["digitalocean_app"], 0);

    let state = fake.state();
    assert_eq!(state.droplets.keys().copied().collect::<Vec<_>>(), vec![2]);
    assert_eq!(state.volumes.keys().cloned().collect::<Vec<_>>(), vec!["prod-data"]);
    assert!(state.projects.contains_key(DEFAULT_PROJECT));
    assert!(state.projects.contains_key("proj-k"));
    assert!(!state.projects.contains_key("proj-t"));
    let vpcs: Vec<&str> = state.vpcs.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(vpcs, vec!["vpc-default", "vpc-td"]);
}

/// Droplets go before the volumes attached to them
#[tokio::test(start_paused = true)]
async fn test_sweep_only_volumes_runs_droplets_first() {
    let fake = seeded();
    let provider = Provider::new(meta(&fake));
    let ctx = Context::new();

    let report = provider
        .sweepers()
        .unwrap()
        .run(&ctx, provider.meta(), DEFAULT_PREFIX, &["digitalocean_volume"])
        .await
        .unwrap();
    let names: Vec<&str> = report.swept.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["digitalocean_droplet", "digitalocean_volume"]);
    assert_eq!(
        fake.calls(),
        vec!["delete droplet 1".to_string(), "delete volume tf-acc-test-data".to_string()]
    );
    assert!(fake.state().projects.contains_key("proj-t"));
}

/// A volume attached to a kept droplet is deleted only once the detach
/// has finished
#[tokio::test(start_paused = true)]
async fn test_sweep_waits_for_volume_detach() {
    let fake = seeded();
    {
        let mut state = fake.state();
        state.slow_detach = true;
        if let Some(volume) = state.volumes.get_mut("tf-acc-test-data") {
            volume.droplet_ids = vec![2];
        }
    }
    let provider = Provider::new(meta(&fake));
    let ctx = Context::new();

    let report = provider
        .sweepers()
        .unwrap()
        .run(&ctx, provider.meta(), DEFAULT_PREFIX, &["digitalocean_volume"])
        .await
        .unwrap();
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(
        fake.calls(),
        vec![
            "delete droplet 1".to_string(),
            "detach tf-acc-test-data 2".to_string(),
            "detached tf-acc-test-data 2".to_string(),
            "delete volume tf-acc-test-data".to_string(),
        ]
    );
    assert!(fake.state().droplets.contains_key(&2));
}

#[tokio::test]
async fn test_empty_prefix_is_refused() {
    let fake = seeded();
    let provider = Provider::new(meta(&fake));
    let ctx = Context::new();

    let result = provider.sweepers().unwrap().run(&ctx, provider.meta(), "", &[]).await;
    assert!(result.is_err());
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_check_auth_reports_account() {
    let fake = FakeCloud::new();
    let provider = Provider::new(meta(&fake));
    let status = provider.check_auth(&Context::new()).await;
    assert!(status.authenticated);
    assert!(status.error.is_none());
    assert_eq!(status.account_info.unwrap().email, "ops@example.com");
}
