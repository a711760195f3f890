mod common;

use std::sync::Arc;
use std::time::Duration;

use account_service::models::{IdentityProvider, User};
use test_harness::{HarnessError, InstanceStatus, Overrides};

#[tokio::test]
async fn build_is_lazy_until_first_use() {
    let instance = common::factory().build();
    assert_eq!(instance.status(), InstanceStatus::Uninitialized);

    instance.services().expect("services should compose");
    assert_eq!(instance.status(), InstanceStatus::Ready);
}

#[tokio::test]
async fn services_returns_the_same_graph() {
    let instance = common::spawn().await;

    let first = instance.services().unwrap();
    let second = instance.services().unwrap();
    assert!(Arc::ptr_eq(&first.users, &second.users));
    assert!(Arc::ptr_eq(&first.sessions, &second.sessions));
}

#[tokio::test]
async fn writes_through_services_are_visible_over_http() {
    let instance = common::spawn().await;
    let user = User::new("direct@example.com", None, IdentityProvider::Supabase);

    instance.services().unwrap().users.insert(&user).await.unwrap();

    let client = instance.create_client().unwrap();
    let body: serde_json::Value = client
        .get(&format!("/users/{}", user.user_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["email"], "direct@example.com");
    assert_eq!(body["provider"], 5);
}

#[tokio::test]
async fn disposed_instance_rejects_everything() {
    let instance = common::spawn().await;
    let base_url = instance.base_url().unwrap();

    instance.dispose().await.unwrap();

    assert_eq!(instance.status(), InstanceStatus::Disposed);
    assert!(matches!(instance.services(), Err(HarnessError::Disposed)));
    assert!(matches!(instance.create_client(), Err(HarnessError::Disposed)));
    assert!(matches!(
        instance.reset_databases().await,
        Err(HarnessError::Disposed)
    ));
    assert!(matches!(instance.reprovision().await, Err(HarnessError::Disposed)));
    assert!(matches!(instance.dispose().await, Err(HarnessError::Disposed)));

    // The listener is gone.
    let result = reqwest::get(format!("{base_url}/health")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn disposing_an_uninitialized_instance_is_allowed() {
    let instance = common::factory().build();
    instance.dispose().await.unwrap();
    assert!(matches!(instance.services(), Err(HarnessError::Disposed)));
}

#[tokio::test]
async fn missing_notification_url_is_a_composition_failure() {
    let factory = common::factory().with_configuration(Overrides::new().configure(|mut config| {
        config.notification.enabled = true;
        config.notification.url = None;
        config
    }));

    let lazy = factory.build();
    assert!(matches!(
        lazy.services(),
        Err(HarnessError::CompositionFailure(_))
    ));
    assert_eq!(lazy.status(), InstanceStatus::Failed);

    let spawned = factory.spawn().await;
    assert!(matches!(spawned, Err(HarnessError::CompositionFailure(_))));
}

#[tokio::test]
async fn unusable_database_url_is_a_provisioning_failure() {
    let factory = common::factory().with_configuration(Overrides::new().configure(|mut config| {
        config.database.url = "sqlite://accounts.db?journal=fast".to_string();
        config
    }));

    assert!(matches!(
        factory.spawn().await,
        Err(HarnessError::ProvisioningFailure(_))
    ));
}

#[tokio::test]
async fn unreachable_database_fails_spawn() {
    let factory = common::factory().with_configuration(Overrides::new().configure(|mut config| {
        config.database.url = "sqlite:///no/such/directory/accounts.db".to_string();
        config
    }));

    assert!(matches!(
        factory.spawn().await,
        Err(HarnessError::ProvisioningFailure(_))
    ));
}

#[tokio::test]
async fn test_fixtures_are_refused_in_production() {
    let factory = common::factory()
        .with_seed([User::new("qa@example.com", None, IdentityProvider::Test)])
        .with_configuration(Overrides::new().configure(|mut config| {
            config.environment = account_service::config::Environment::Prod;
            config.common.port = 8080;
            config
        }));

    assert!(matches!(
        factory.spawn().await,
        Err(HarnessError::CompositionFailure(_))
    ));
}

#[tokio::test]
async fn failed_composition_is_sticky() {
    let factory = common::factory().with_configuration(Overrides::new().configure(|mut config| {
        config.notification.enabled = true;
        config.notification.url = None;
        config
    }));
    let instance = factory.build();

    let first = instance.services().err().unwrap();
    let second = instance.create_client().err().unwrap();

    assert!(matches!(second, HarnessError::CompositionFailure(_)));
    assert_eq!(first.to_string(), second.to_string());
    assert!(matches!(
        instance.reset_databases().await,
        Err(HarnessError::CompositionFailure(_))
    ));
    assert_eq!(instance.status(), InstanceStatus::Failed);

    // Same recipe, same outcome.
    assert!(matches!(
        instance.reprovision().await,
        Err(HarnessError::CompositionFailure(_))
    ));

    instance.dispose().await.unwrap();
    assert_eq!(instance.status(), InstanceStatus::Disposed);
}

#[tokio::test]
async fn dispose_waits_for_a_running_reset() {
    let instance = common::factory()
        .with_configuration(common::slow_sessions(Duration::from_millis(300)))
        .spawn()
        .await
        .unwrap();

    let reset = async {
        let result = instance.reset_databases().await;
        (result, tokio::time::Instant::now())
    };
    let dispose = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let result = instance.dispose().await;
        (result, tokio::time::Instant::now())
    };
    let ((reset_result, reset_done), (dispose_result, dispose_done)) = tokio::join!(reset, dispose);

    reset_result.unwrap();
    dispose_result.unwrap();
    assert!(reset_done <= dispose_done);
    assert_eq!(instance.status(), InstanceStatus::Disposed);
    assert!(matches!(
        instance.reset_databases().await,
        Err(HarnessError::Disposed)
    ));
}
