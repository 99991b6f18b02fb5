//! Module wiring: in-process client and the background sweep

mod common;

use common::{device_input, test_config, RecordingDispatcher, RecordingPublisher};
use sea_orm::{ConnectOptions, Database};
use smart_orders::config::CompletionPolicyConfig;
use smart_orders::contract::{DeviceFilter, OrderError, Principal};
use smart_orders::domain::Collaborators;
use smart_orders::infra::media::InMemoryObjectStore;
use smart_orders::infra::session::InMemorySessionStore;
use smart_orders::SmartOrdersModule;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn module() -> Arc<SmartOrdersModule> {
    let config = test_config(CompletionPolicyConfig::Sync);
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Arc::new(Database::connect(options).await.unwrap());

    let module = Arc::new(SmartOrdersModule::new(config.clone()));
    module.migrate(&db).await.unwrap();
    module
        .init_with(
            db,
            Collaborators {
                sessions: Arc::new(InMemorySessionStore::new()),
                objects: Arc::new(InMemoryObjectStore::new(&config.object_store)),
                dispatcher: Arc::new(RecordingDispatcher::default()),
                events: Arc::new(RecordingPublisher::default()),
            },
        )
        .unwrap();
    module
}

#[tokio::test]
async fn test_service_requires_init() {
    let module = SmartOrdersModule::default();
    assert!(module.service().is_err());
    assert!(module.client().is_err());
}

#[tokio::test]
async fn test_native_client_reads_catalog() {
    let module = module().await;
    let moderator = Principal::moderator(1, "boss");
    let hub = module
        .service()
        .unwrap()
        .create_device(&moderator, device_input("Smart Hub", 10.0))
        .await
        .unwrap();

    let client = module.client().unwrap();
    let devices = client.list_devices(DeviceFilter::default()).await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(client.get_device(hub.id).await.unwrap().name, "Smart Hub");

    let err = client.authenticate("missing").await.unwrap_err();
    assert!(matches!(err, OrderError::Unauthorized { .. }));
}

#[tokio::test]
async fn test_background_loop_stops_on_cancel() {
    let module = module().await;
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(module.clone().serve(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
