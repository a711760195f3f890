mod common;

use std::sync::Arc;

use account_service::config::Environment;
use account_service::services::WelcomeNotifier;
use futures::future::join_all;
use serde_json::json;
use test_harness::fakes::{FailingNotifier, RecordingNotifier};
use test_harness::Overrides;

#[tokio::test]
async fn derived_factory_leaves_the_base_untouched() {
    let base = common::factory();
    let recorder = Arc::new(RecordingNotifier::new());
    let derived = base.with_configuration(
        Overrides::new().notifier(recorder.clone() as Arc<dyn WelcomeNotifier>),
    );

    let derived_instance = derived.spawn().await.unwrap();
    let base_instance = base.spawn().await.unwrap();

    common::create_user(&derived_instance.create_client().unwrap(), "derived@example.com", 1).await;
    common::create_user(&base_instance.create_client().unwrap(), "base@example.com", 1).await;

    assert!(recorder.sent_to("derived@example.com"));
    assert!(!recorder.sent_to("base@example.com"));
    assert_eq!(recorder.sent().len(), 1);
}

#[tokio::test]
async fn production_override_applies_only_to_derived_instances() {
    let base = common::factory();
    let production = base.with_configuration(Overrides::new().configure(|mut config| {
        config.environment = Environment::Prod;
        config.common.port = 8080;
        config
    }));

    let prod = production.spawn().await.unwrap();
    let dev = base.spawn().await.unwrap();
    let payload = json!({ "email": "qa@example.com", "provider": 6 });

    let status = prod
        .create_client()
        .unwrap()
        .post_json("/users", &payload)
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, 403);

    let status = dev
        .create_client()
        .unwrap()
        .post_json("/users", &payload)
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, 201);
}

#[tokio::test]
async fn overrides_stack_in_order() {
    let renamed = common::factory()
        .with_configuration(Overrides::new().configure(|mut config| {
            config.session.cookie_name = "first_cookie".to_string();
            config
        }))
        .with_configuration(Overrides::new().configure(|mut config| {
            config.session.cookie_name = "second_cookie".to_string();
            config
        }));

    let instance = renamed.spawn().await.unwrap();
    assert_eq!(
        instance.services().unwrap().config.session.cookie_name,
        "second_cookie"
    );
}

#[tokio::test]
async fn failing_notifier_does_not_block_signup() {
    let instance = common::factory()
        .with_configuration(Overrides::new().notifier(Arc::new(FailingNotifier)))
        .spawn()
        .await
        .unwrap();

    let body = common::create_user(&instance.create_client().unwrap(), "resilient@example.com", 3).await;
    assert_eq!(body["provider_name"], "google");
}

#[tokio::test]
async fn concurrent_instances_are_isolated() {
    let factory = common::factory().with_seed([common::seed_user()]);
    let instances = join_all((0..3).map(|_| factory.spawn()))
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    let writes = instances.iter().enumerate().map(|(i, instance)| async move {
        let client = instance.create_client().unwrap();
        common::create_user(&client, &format!("user{i}@example.com"), 7).await;
        client
    });
    let clients = join_all(writes).await;

    instances[0].reset_databases().await.unwrap();

    assert_eq!(common::list_emails(&clients[0]).await, vec!["seed@example.com"]);
    for (i, client) in clients.iter().enumerate().skip(1) {
        let emails = common::list_emails(client).await;
        assert_eq!(emails.len(), 2);
        assert!(emails.contains(&format!("user{i}@example.com")));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resets_do_not_interfere() {
    let factory = common::factory().with_seed([common::seed_user()]);
    let instances = join_all((0..4).map(|_| factory.spawn()))
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let clients = instances
        .iter()
        .map(|instance| instance.create_client().unwrap())
        .collect::<Vec<_>>();

    for round in 0..5 {
        join_all(clients.iter().enumerate().map(|(i, client)| async move {
            common::create_user(client, &format!("r{round}-i{i}@example.com"), 1).await;
        }))
        .await;

        let resets = join_all(instances.iter().map(|instance| instance.reset_databases())).await;
        for result in resets {
            result.unwrap();
        }

        for client in &clients {
            assert_eq!(common::list_emails(client).await, vec!["seed@example.com"]);
        }
    }
}
