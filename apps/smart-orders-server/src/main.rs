//! Smart orders server binary

use anyhow::{Context, Result};
use axum::Router;
use clap::{Parser, Subcommand};
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use sea_orm::{ConnectOptions, Database};
use serde::Deserialize;
use smart_orders::SmartOrdersModule;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variables override the config file, `__` separating levels:
/// `SMART_ORDERS__SERVER__BIND_ADDR`, `SMART_ORDERS__ORDERS__TRAFFIC__CALLBACK_TOKEN`
const ENV_PREFIX: &str = "SMART_ORDERS__";

#[derive(Parser)]
#[command(name = "smart-orders-server", version, about = "Smart devices catalog and order service")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured database URL
    #[arg(long)]
    database_url: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run migrations and serve HTTP (default)
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Create a moderator account
    CreateModerator {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AppConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    orders: smart_orders::config::Config,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    bind_addr: SocketAddr,
    #[serde(default = "default_database_url")]
    database_url: String,
    #[serde(default = "default_max_connections")]
    max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_database_url() -> String {
    "sqlite://smart_orders.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file {} does not exist", path.display());
        }
        figment = figment.merge(Yaml::file(path));
    }
    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("invalid configuration")
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = load_config(cli.config.as_ref())?;
    if let Some(url) = cli.database_url {
        config.server.database_url = url;
    }

    let mut options = ConnectOptions::new(config.server.database_url.clone());
    options
        .max_connections(config.server.max_connections)
        .sqlx_logging(false);
    let db = Arc::new(
        Database::connect(options)
            .await
            .context("failed to connect to the database")?,
    );

    let module = Arc::new(SmartOrdersModule::new(config.orders));
    module.migrate(&db).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => Ok(()),
        Command::CreateModerator { username, password } => {
            module.init(db)?;
            let account = module
                .service()?
                .create_moderator(&username, &password)
                .await?;
            tracing::info!(account_id = account.id, username = %account.username, "moderator created");
            Ok(())
        }
        Command::Serve => serve(module, db, config.server.bind_addr).await,
    }
}

async fn serve(
    module: Arc<SmartOrdersModule>,
    db: Arc<sea_orm::DatabaseConnection>,
    bind_addr: SocketAddr,
) -> Result<()> {
    module.init(db)?;

    let app = module
        .register_rest(Router::new())?
        .layer(TraceLayer::new_for_http());

    let cancel = CancellationToken::new();
    let background = tokio::spawn(module.clone().serve(cancel.clone()));

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(%bind_addr, "smart orders server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    background.await??;
    tracing::info!("smart orders server stopped");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown requested");
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = Figment::new().extract().unwrap();
        assert_eq!(config.server.bind_addr, default_bind_addr());
        assert_eq!(config.server.database_url, default_database_url());
        assert!(config.orders.traffic.callback_token.is_empty());
    }

    #[test]
    fn test_yaml_overrides_module_config() {
        let yaml = r#"
server:
  bind_addr: "127.0.0.1:9090"
orders:
  completion_policy: async
  pending_completion_timeout: 5m
  traffic:
    callback_token: "s3cret"
"#;
        let config: AppConfig = Figment::new().merge(Yaml::string(yaml)).extract().unwrap();
        assert_eq!(config.server.bind_addr.port(), 9090);
        assert_eq!(config.orders.traffic.callback_token, "s3cret");
        assert_eq!(
            config.orders.pending_completion_timeout,
            std::time::Duration::from_secs(300)
        );
    }

    #[test]
    fn test_cli_parses_create_moderator() {
        let cli = Cli::try_parse_from([
            "smart-orders-server",
            "--config",
            "smart-orders.yaml",
            "create-moderator",
            "--username",
            "admin",
            "--password",
            "secret1",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::CreateModerator { ref username, .. }) if username == "admin"
        ));
    }
}
