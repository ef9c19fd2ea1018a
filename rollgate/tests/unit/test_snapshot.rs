//! Store snapshot tests

use rollgate::filesys::file::File;
use rollgate::lifecycle::fsm::DeploymentStatus;
use rollgate::models::environment::ConcurrencyLimit;
use rollgate::store::{MemoryStore, RecordStore};

use crate::common::Fixture;

fn temp_file(name: &str) -> File {
    let dir = std::env::temp_dir().join(format!("rollgate-test-{}", uuid::Uuid::new_v4()));
    File::new(dir.join(name))
}

#[tokio::test]
async fn test_snapshot_restores_records() {
    let fixture = Fixture::new(ConcurrencyLimit::AtMost(2)).await;
    let running = fixture.started(false).await;
    let rollback = fixture.queue(true).await.with_params("{\"replicas\": 3}");
    fixture.store.add_deployment(rollback.clone()).await.unwrap();

    let file = temp_file("snapshot.json");
    fixture.store.save_snapshot(&file).await.unwrap();

    let restored = MemoryStore::load_snapshot(&file).await.unwrap();
    let env = restored
        .find_environment_by_id(fixture.environment.id)
        .await
        .unwrap();
    assert_eq!(env.concurrency_limit().unwrap(), ConcurrencyLimit::AtMost(2));

    let running = restored.find_deployment_by_id(running.id).await.unwrap();
    assert_eq!(running.status, DeploymentStatus::Started);

    let rollback = restored.find_deployment_by_id(rollback.id).await.unwrap();
    assert!(rollback.is_emergency_rollback());
    assert_eq!(rollback.deployment_params.as_deref(), Some("{\"replicas\": 3}"));
    assert_eq!(rollback.user_email, "dev@example.com");
}

#[tokio::test]
async fn test_missing_snapshot_starts_empty() {
    let file = temp_file("absent.json");
    let store = MemoryStore::load_snapshot(&file).await.unwrap();
    assert!(store.list_environments().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_snapshot_accepts_handwritten_records() {
    let file = temp_file("seed.json");
    let env_id = uuid::Uuid::new_v4();
    let seed = serde_json::json!({
        "environments": [
            { "id": env_id, "name": "prod", "concurrency_limit": -1 }
        ],
        "deployments": [
            {
                "id": uuid::Uuid::new_v4(),
                "environment_id": env_id,
                "service_id": uuid::Uuid::new_v4(),
                "deployable_version_id": uuid::Uuid::new_v4(),
                "status": "PENDING",
                "emergency_rollback": true,
                "created_at": "2024-05-01T12:00:00Z"
            }
        ]
    });
    file.write_json(&seed).await.unwrap();

    let store = MemoryStore::load_snapshot(&file).await.unwrap();
    let env = store.list_environments().await.unwrap().remove(0);
    assert_eq!(env.concurrency_limit().unwrap(), ConcurrencyLimit::Unlimited);

    let pending = store
        .find_deployments_by_environment_and_status(env.id, DeploymentStatus::Pending)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].is_emergency_rollback());
}
