// Shared by the live-database test binaries.

use db_initializer::credentials::{Credentials, DBNAME, HOST, PASSWORD, PORT, USERNAME};
use db_initializer::db::ConnectParams;
use std::env;
use tokio_postgres::{Client, NoTls};

fn var(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Admin bundle built from the usual libpq variables.
pub fn admin_credentials() -> Credentials {
    Credentials::new()
        .with(HOST, var("PGHOST", "localhost"))
        .with(PORT, var("PGPORT", "5432"))
        .with(USERNAME, var("PGUSER", "postgres"))
        .with(PASSWORD, var("PGPASSWORD", "postgres"))
        .with(DBNAME, var("PGDATABASE", "postgres"))
}

pub fn connect_params() -> ConnectParams {
    ConnectParams::from_credentials(&admin_credentials()).unwrap()
}

/// A plain client for assertions, outside the code under test.
pub async fn raw_client() -> Client {
    let params = connect_params();
    let mut config = tokio_postgres::Config::new();
    config
        .host(&params.host)
        .port(params.port)
        .user(&params.username)
        .password(&params.password)
        .dbname(&params.dbname);
    let (client, connection) = config.connect(NoTls).await.unwrap();
    tokio::spawn(async move {
        let _ = connection.await;
    });
    client
}
