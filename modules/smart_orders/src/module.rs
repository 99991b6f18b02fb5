//! Module declaration and lifecycle implementation

use crate::api::native::NativeClient;
use crate::config::Config;
use crate::contract::SmartOrdersApi;
use crate::domain::{Collaborators, Repositories, Service, TracingEventPublisher};
use crate::infra::media::InMemoryObjectStore;
use crate::infra::session::InMemorySessionStore;
use crate::infra::storage::{
    Migrator, SeaOrmAccountRepository, SeaOrmDeviceRepository, SeaOrmOrderRepository,
};
use crate::infra::traffic_client::HttpTrafficDispatcher;
use anyhow::Result;
use parking_lot::RwLock;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Smart orders module: owns the domain service and its background sweep
pub struct SmartOrdersModule {
    config: Config,
    service: RwLock<Option<Arc<Service>>>,
}

impl Default for SmartOrdersModule {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl SmartOrdersModule {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            service: RwLock::new(None),
        }
    }

    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self, db: &DatabaseConnection) -> Result<()> {
        Migrator::up(db, None).await?;
        tracing::info!("Smart orders migrations completed");
        Ok(())
    }

    /// Wire the service with the default collaborators
    pub fn init(&self, db: Arc<DatabaseConnection>) -> Result<()> {
        let config = self.config();
        let dispatcher = HttpTrafficDispatcher::new(&config.traffic)?;

        if config.traffic.callback_token.is_empty() {
            tracing::warn!("traffic.callback_token is empty; every traffic callback will be rejected");
        }

        self.init_with(
            db,
            Collaborators {
                sessions: Arc::new(InMemorySessionStore::new()),
                objects: Arc::new(InMemoryObjectStore::new(&config.object_store)),
                dispatcher: Arc::new(dispatcher),
                events: Arc::new(TracingEventPublisher),
            },
        )
    }

    /// Wire the service with caller-supplied collaborators
    pub fn init_with(&self, db: Arc<DatabaseConnection>, collaborators: Collaborators) -> Result<()> {
        let config = self.config();

        let repos = Repositories {
            devices: Arc::new(SeaOrmDeviceRepository::new(db.clone())),
            accounts: Arc::new(SeaOrmAccountRepository::new(db.clone())),
            orders: Arc::new(SeaOrmOrderRepository::new(db)),
        };

        let service = Arc::new(Service::new(repos, collaborators, &config));
        *self.service.write() = Some(service);

        tracing::info!(
            completion_policy = ?config.completion_policy,
            "Smart orders service initialized"
        );
        Ok(())
    }

    pub fn service(&self) -> Result<Arc<Service>> {
        self.service
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Service not initialized"))
    }

    /// In-process client for other modules
    pub fn client(&self) -> Result<Arc<dyn SmartOrdersApi>> {
        Ok(Arc::new(NativeClient::new(self.service()?)))
    }

    pub fn register_rest(&self, router: axum::Router) -> Result<axum::Router> {
        let service = self.service()?;
        tracing::info!("Registering smart orders REST routes");
        crate::api::rest::register_routes(router, service)
    }

    /// Background loop reverting stale pending completions and purging
    /// expired sessions until `cancel` fires
    pub async fn serve(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let service = self.service()?;
        // `interval` rejects a zero period
        let period = self.config().sweep_interval.max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match service.sweep_pending(chrono::Utc::now()).await {
                        Ok(0) => {}
                        Ok(reverted) => tracing::info!(reverted, "stale pending completions reverted"),
                        Err(e) => tracing::error!(error = %e, "pending completion sweep failed"),
                    }
                    if let Err(e) = service.purge_sessions().await {
                        tracing::error!(error = %e, "session purge failed");
                    }
                }
            }
        }

        tracing::info!("Smart orders background loop stopped");
        Ok(())
    }
}
