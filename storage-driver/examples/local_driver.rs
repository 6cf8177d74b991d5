use anyhow::Result;
use release_types::{Release, ReleaseStatus};
use storage_driver::{new_driver, Storage, StorageConfig};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    let config = StorageConfig::from_env()?;
    info!("Using storage config: {:?}", config);

    let storage = Storage::new(new_driver(config)?);
    info!("Driver: {}", storage.driver_name());

    // Install
    let install = Release::new("my-app", "production", 1)
        .with_status(ReleaseStatus::PendingInstall)
        .with_label("env", "prod")
        .with_payload(serde_json::json!({
            "chart": {"name": "my-app", "version": "0.1.0"},
            "values": {"replicas": 2}
        }));
    storage.create(&install).await?;
    storage
        .update(&install.clone().with_status(ReleaseStatus::Deployed))
        .await?;

    // Upgrade
    let mut previous = storage.get("my-app", 1).await?;
    previous.status = ReleaseStatus::Superseded;
    storage.update(&previous).await?;

    let upgrade = Release::new("my-app", "production", 2)
        .with_status(ReleaseStatus::Deployed)
        .with_label("env", "prod")
        .with_payload(serde_json::json!({
            "chart": {"name": "my-app", "version": "0.2.0"},
            "values": {"replicas": 3}
        }));
    storage.create(&upgrade).await?;

    for release in storage.history("my-app").await? {
        info!("History: {} [{}]", release, release.status);
    }

    info!("Deployed: {}", storage.deployed("my-app").await?);

    // Uninstall
    for release in storage.history("my-app").await? {
        let removed = storage.delete(&release.name, release.version).await?;
        info!("Removed {}", removed);
    }

    Ok(())
}
