//! Database access
//!
//! [`Connector`] opens sessions and [`Connection`] is the narrow set of
//! operations the initializer needs from one. [`PgConnector`] implements them
//! on top of `tokio-postgres`.

mod postgres;

pub use postgres::{PgConnection, PgConnector};

use crate::credentials::{Credentials, CredentialsError, DBNAME, HOST, PASSWORD, USERNAME};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Errors reported by a database backend.
#[derive(Error, Debug)]
pub enum DbError {
    /// Could not open a session.
    #[error("could not connect to {host}:{port}/{dbname}: {message}")]
    Connect {
        host: String,
        port: u16,
        dbname: String,
        message: String,
    },

    /// The session was closed underneath us.
    #[error("database connection is closed")]
    Closed,

    /// The object being created already exists (SQLSTATE 42710).
    #[error("object already exists: {message}")]
    DuplicateObject { message: String },

    /// Any other statement failure.
    #[error("statement failed{}: {message}", sqlstate_suffix(.code))]
    Statement {
        code: Option<String>,
        message: String,
    },
}

fn sqlstate_suffix(code: &Option<String>) -> String {
    code.as_ref()
        .map(|c| format!(" (SQLSTATE {})", c))
        .unwrap_or_default()
}

/// Everything needed to open a session, taken from the admin credential bundle.
#[derive(Clone, PartialEq)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub username: String,
    pub password: String,
}

impl ConnectParams {
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, CredentialsError> {
        Ok(Self {
            host: credentials.require(HOST)?,
            port: credentials.port()?,
            dbname: credentials.require(DBNAME)?,
            username: credentials.require(USERNAME)?,
            password: credentials.require(PASSWORD)?,
        })
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Opens database sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection;

    async fn connect(&self, params: &ConnectParams) -> Result<Self::Conn, DbError>;
}

/// A live database session. Dropping it closes the session.
#[async_trait]
pub trait Connection: Send {
    /// Whether the session has been closed (server restart, idle timeout, ...).
    fn is_closed(&self) -> bool;

    /// Run one or more `;`-separated statements, each committed as it completes.
    async fn batch_execute(&mut self, sql: &str) -> Result<(), DbError>;

    /// Run one or more statements inside a single transaction.
    ///
    /// Nothing is committed unless every statement succeeds.
    async fn batch_execute_atomic(&mut self, sql: &str) -> Result<(), DbError>;

    /// Whether a role with exactly this name exists in the cluster.
    async fn role_exists(&mut self, role: &str) -> Result<bool, DbError>;

    /// Number of rows currently in `table`.
    async fn count_rows(&mut self, table: &str) -> Result<i64, DbError>;
}

/// Quote an SQL identifier, doubling any embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote an SQL string literal, doubling any embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
