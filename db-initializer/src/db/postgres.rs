//! tokio-postgres backend.

use super::{ConnectParams, Connection, Connector, DbError, quote_ident};
use async_trait::async_trait;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, Config, NoTls};
use tracing::{debug, warn};

const APPLICATION_NAME: &str = "db-initializer";

impl From<tokio_postgres::Error> for DbError {
    fn from(err: tokio_postgres::Error) -> Self {
        let message = err
            .as_db_error()
            .map(|db| db.message().to_string())
            .unwrap_or_else(|| err.to_string());

        match err.code() {
            Some(code) if *code == SqlState::DUPLICATE_OBJECT => DbError::DuplicateObject { message },
            Some(code) => DbError::Statement {
                code: Some(code.code().to_string()),
                message,
            },
            None if err.is_closed() => DbError::Closed,
            None => DbError::Statement {
                code: None,
                message,
            },
        }
    }
}

/// Opens plain-TCP sessions with `tokio-postgres`.
#[derive(Debug, Clone, Default)]
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    type Conn = PgConnection;

    async fn connect(&self, params: &ConnectParams) -> Result<PgConnection, DbError> {
        let mut config = Config::new();
        config
            .host(&params.host)
            .port(params.port)
            .dbname(&params.dbname)
            .user(&params.username)
            .password(&params.password)
            .application_name(APPLICATION_NAME);

        let (client, connection) = config.connect(NoTls).await.map_err(|e| DbError::Connect {
            host: params.host.clone(),
            port: params.port,
            dbname: params.dbname.clone(),
            message: e.to_string(),
        })?;

        // The driver task ends when the session does; the client then reports closed.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "Database connection ended with error");
            }
        });

        debug!(host = %params.host, dbname = %params.dbname, "Database connection opened");
        Ok(PgConnection { client })
    }
}

/// A `tokio-postgres` session.
pub struct PgConnection {
    client: Client,
}

#[async_trait]
impl Connection for PgConnection {
    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    async fn batch_execute(&mut self, sql: &str) -> Result<(), DbError> {
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    async fn batch_execute_atomic(&mut self, sql: &str) -> Result<(), DbError> {
        // An uncommitted transaction is rolled back when dropped.
        let transaction = self.client.transaction().await?;
        transaction.batch_execute(sql).await?;
        transaction.commit().await?;
        Ok(())
    }

    async fn role_exists(&mut self, role: &str) -> Result<bool, DbError> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM pg_roles WHERE rolname = $1)",
                &[&role],
            )
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn count_rows(&mut self, table: &str) -> Result<i64, DbError> {
        let sql = format!("SELECT count(*) FROM {}", quote_ident(table));
        let row = self.client.query_one(sql.as_str(), &[]).await?;
        Ok(row.try_get(0)?)
    }
}
