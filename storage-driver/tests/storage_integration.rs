use anyhow::Result;
use release_types::{Release, ReleaseStatus};
use std::sync::Arc;
use storage_driver::{new_driver, MemoryDriver, Storage, StorageConfig};
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

fn release(name: &str, version: u32, status: ReleaseStatus) -> Release {
    Release::new(name, "default", version)
        .with_status(status)
        .with_payload(serde_json::json!({"chart": format!("{name}-chart")}))
}

async fn seed(storage: &Storage) -> Result<()> {
    storage
        .create(&release("web", 1, ReleaseStatus::Superseded))
        .await?;
    storage
        .create(&release("web", 2, ReleaseStatus::Deployed))
        .await?;
    storage
        .create(&release("web", 3, ReleaseStatus::Failed))
        .await?;
    storage
        .create(&release("api", 1, ReleaseStatus::Deployed))
        .await?;
    Ok(())
}

fn local_storage() -> Result<(Storage, TempDir)> {
    let temp_dir = TempDir::new()?;
    let driver = new_driver(StorageConfig::local(temp_dir.path()))?;
    Ok((Storage::new(driver), temp_dir))
}

// ============================================================================
// Memory Driver Tests
// ============================================================================

#[tokio::test]
async fn test_memory_history_is_sorted() -> Result<()> {
    let storage = Storage::new(Arc::new(MemoryDriver::new()));
    seed(&storage).await?;

    let history = storage.history("web").await?;
    let versions: Vec<u32> = history.iter().map(|r| r.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);

    assert!(storage.history("missing").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_memory_last_and_deployed() -> Result<()> {
    let storage = Storage::new(Arc::new(MemoryDriver::new()));
    seed(&storage).await?;

    assert_eq!(storage.last("web").await?.version, 3);
    assert_eq!(storage.deployed("web").await?.version, 2);
    assert_eq!(storage.deployed("api").await?.version, 1);

    let err = storage.last("missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.key(), Some("missing"));

    let err = storage.deployed("missing").await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_memory_list_deployed() -> Result<()> {
    let storage = Storage::new(Arc::new(MemoryDriver::new()));
    seed(&storage).await?;

    assert_eq!(storage.list_releases().await?.len(), 4);

    let mut deployed: Vec<String> = storage
        .list_deployed()
        .await?
        .into_iter()
        .map(|r| format!("{}.v{}", r.name, r.version))
        .collect();
    deployed.sort();
    assert_eq!(deployed, vec!["api.v1", "web.v2"]);
    Ok(())
}

#[tokio::test]
async fn test_memory_create_vs_update() -> Result<()> {
    let storage = Storage::new(Arc::new(MemoryDriver::new()));
    let pending = release("web", 1, ReleaseStatus::PendingInstall);

    let err = storage.update(&pending).await.unwrap_err();
    assert!(err.is_not_found());

    storage.create(&pending).await?;
    let err = storage.create(&pending).await.unwrap_err();
    assert!(err.is_already_exists());

    let deployed = pending.clone().with_status(ReleaseStatus::Deployed);
    storage.update(&deployed).await?;
    assert_eq!(storage.get("web", 1).await?, deployed);
    Ok(())
}

// ============================================================================
// Local Object Store Tests
// ============================================================================

#[tokio::test]
async fn test_local_history_survives_reopen() -> Result<()> {
    let (storage, dir) = local_storage()?;
    assert_eq!(storage.driver_name(), "ObjectStore");
    seed(&storage).await?;
    drop(storage);

    let reopened = Storage::new(new_driver(StorageConfig::local(dir.path()))?);
    let versions: Vec<u32> = reopened
        .history("web")
        .await?
        .iter()
        .map(|r| r.version)
        .collect();
    assert_eq!(versions, vec![1, 2, 3]);
    assert_eq!(reopened.deployed("web").await?.version, 2);
    Ok(())
}

#[tokio::test]
async fn test_local_delete_revision() -> Result<()> {
    let (storage, _dir) = local_storage()?;
    seed(&storage).await?;

    let deleted = storage.delete("web", 3).await?;
    assert_eq!(deleted.status, ReleaseStatus::Failed);
    assert_eq!(storage.last("web").await?.version, 2);

    let err = storage.delete("web", 3).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.key(), Some("web.v3"));

    let err = storage.get("web", 3).await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_local_payload_round_trip() -> Result<()> {
    let (storage, _dir) = local_storage()?;
    let rls = release("web", 1, ReleaseStatus::Deployed)
        .with_label("env", "prod")
        .with_description("Install complete")
        .with_payload(serde_json::json!({
            "chart": {"name": "nginx", "version": "1.2.3"},
            "values": {"replicas": 3, "image": {"tag": "stable"}},
            "manifest": "---\nkind: Deployment\n",
        }));

    storage.create(&rls).await?;
    assert_eq!(storage.get("web", 1).await?, rls);
    Ok(())
}
