//! Database initializer
//!
//! Runs one bootstrap invocation and exits: 0 when the schema, roles, users
//! and both secrets are in place, 1 otherwise. Safe to re-run after a failure.

use anyhow::{Context, Result};
use common::{init_logging, Telemetry, TelemetryEvent};
use db_initializer::db::PgConnector;
use db_initializer::secrets::AwsSecretStore;
use db_initializer::{Bootstrapper, Config};
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _guard = init_logging("db-initializer");

    Telemetry::new("db-initializer").send(TelemetryEvent::ComponentStarted {
        component: "db-initializer".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        admin_secret = %config.admin_secret_name,
        user_secret = %config.user_secret_name,
        table_creator_secret = %config.table_creator_secret_name,
        verify_tables = config.verify_tables,
        "Configuration loaded"
    );

    let store = AwsSecretStore::from_env().await;
    let mut bootstrapper = Bootstrapper::from_store(PgConnector, store, config)
        .await
        .context("Failed to load admin database credentials")?;

    if bootstrapper.handle().await.is_success() {
        info!("Initialization completed");
        Ok(())
    } else {
        error!("Initialization failed");
        std::process::exit(1);
    }
}
