//! # scenehubd — scenehub daemon
//!
//! Composition root that wires all adapters together and runs the scene
//! engine.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Install the `tracing` subscriber
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository implementations and the virtual device integration
//! - Construct the scene manager and scene service, injecting adapters via
//!   port traits
//! - Forward device events from the event bus into the scene manager
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use scenehub_adapter_storage_sqlite_sqlx::{
    SqliteDeviceRepository, SqliteSceneRepository, SqliteTaskLogRepository,
};
use scenehub_adapter_virtual::VirtualIntegration;
use scenehub_app::event_bus::InProcessEventBus;
use scenehub_app::manager::SceneManager;
use scenehub_app::ports::{DeviceControl, DeviceRepository, SceneRepository, TaskLogRepository};
use scenehub_app::services::scene_service::SceneService;
use scenehub_domain::event::DeviceEvent;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Database
    let db = scenehub_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Repositories
    let scene_repo = SqliteSceneRepository::new(pool.clone());
    let device_repo = SqliteDeviceRepository::new(pool.clone());
    let task_log_repo = SqliteTaskLogRepository::new(pool);

    // Event bus and devices
    let event_bus = InProcessEventBus::new(256);
    let control = Arc::new(VirtualIntegration::new(event_bus.clone()));
    if config.integrations.virtual_enabled {
        for device in control.devices()? {
            let device = device_repo.upsert(device).await?;
            tracing::info!(identity = %device.identity, name = %device.name, "virtual device registered");
        }
    }

    // Engine
    let manager = SceneManager::new(
        scene_repo.clone(),
        device_repo,
        task_log_repo.clone(),
        control,
        config.engine_config(),
    );
    let service = SceneService::new(scene_repo, task_log_repo, manager.clone());
    let scenes = service.list_scenes().await?;
    tracing::info!(scenes = scenes.len(), "scenes loaded");

    let cancel = CancellationToken::new();
    let engine = tokio::spawn({
        let manager = manager.clone();
        let cancel = cancel.clone();
        async move { manager.run(cancel).await }
    });
    let events = tokio::spawn(forward_events(
        manager,
        BroadcastStream::new(event_bus.subscribe()),
        cancel.clone(),
    ));

    tracing::info!("scenehubd running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    cancel.cancel();

    events.await?;
    engine.await?;
    Ok(())
}

/// Feed attribute changes from the event bus into the scene manager until
/// `cancel` fires.
async fn forward_events<S, D, L, C>(
    manager: SceneManager<S, D, L, C>,
    mut events: BroadcastStream<DeviceEvent>,
    cancel: CancellationToken,
) where
    S: SceneRepository + Send + Sync + 'static,
    D: DeviceRepository + Send + Sync + 'static,
    L: TaskLogRepository + Send + Sync + 'static,
    C: DeviceControl + Send + Sync + 'static,
{
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => break,
            next = events.next() => next,
        };
        match next {
            Some(Ok(DeviceEvent::AttributeChanged {
                identity,
                attribute,
                ..
            })) => {
                if let Err(err) = manager
                    .on_device_attribute_changed(&identity, &attribute)
                    .await
                {
                    tracing::error!(%identity, %attribute, %err, "failed to handle attribute change");
                }
            }
            Some(Err(err)) => tracing::warn!(%err, "device events dropped"),
            None => break,
        }
    }
}
