//! Bootstrap orchestration
//!
//! One [`Bootstrapper`] lives for the whole process and runs any number of
//! invocations, strictly one after another. Each invocation:
//! 1. reuses the cached connection if it is still open, otherwise opens one
//! 2. applies the schema
//! 3. ensures both roles and creates one fresh user per role
//! 4. publishes the table-creator bundle, then the application bundle
//! 5. optionally logs row counts of every table
//! 6. releases the connection
//!
//! A failure at any step ends the invocation. The connection is kept for the
//! next attempt and nothing already committed is undone.

use crate::config::Config;
use crate::credentials::Credentials;
use crate::db::{ConnectParams, Connection, Connector};
use crate::error::BootstrapError;
use crate::publisher::publish;
use crate::roles::{self, READ_WRITE, TABLE_CREATOR};
use crate::schema;
use crate::secrets::SecretStore;
use crate::verify::{self, TableCount};
use chrono::{DateTime, Utc};
use common::{Telemetry, TelemetryEvent};
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Where the current (or last) invocation got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    SchemaApplied,
    RolesProvisioned,
    SecretsPublished,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::SchemaApplied => "schema_applied",
            Self::RolesProvisioned => "roles_provisioned",
            Self::SecretsPublished => "secrets_published",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What the trigger gets back. Details only go to the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    Succeeded,
    Failed,
}

impl InvocationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Summary of a successful invocation. Never carries credentials.
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub invocation_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub reopened_connection: bool,
    pub roles: Vec<&'static str>,
    pub secrets_published: Vec<String>,
    pub table_counts: Vec<TableCount>,
}

/// Runs bootstrap invocations against one database and one secret store.
pub struct Bootstrapper<C: Connector, S: SecretStore> {
    connector: C,
    store: S,
    config: Config,
    admin: Credentials,
    params: ConnectParams,
    connection: Option<C::Conn>,
    phase: Phase,
    telemetry: Telemetry,
}

impl<C: Connector, S: SecretStore> Bootstrapper<C, S> {
    /// Fetch the admin bundle named by the config and build a bootstrapper from it.
    pub async fn from_store(connector: C, store: S, config: Config) -> Result<Self, BootstrapError> {
        let admin = store.get_credentials(&config.admin_secret_name).await?;
        info!(secret = %config.admin_secret_name, "Loaded admin credentials");
        Self::new(connector, store, config, admin)
    }

    /// Build a bootstrapper around an already-fetched admin bundle.
    pub fn new(connector: C, store: S, config: Config, admin: Credentials) -> Result<Self, BootstrapError> {
        let params = ConnectParams::from_credentials(&admin).map_err(|source| {
            BootstrapError::AdminCredentials {
                secret: config.admin_secret_name.clone(),
                source,
            }
        })?;

        Ok(Self {
            connector,
            store,
            config,
            admin,
            params,
            connection: None,
            phase: Phase::Disconnected,
            telemetry: Telemetry::new("db-initializer"),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether a connection is being held for the next invocation.
    pub fn holds_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Run one invocation, logging any failure instead of returning it.
    pub async fn handle(&mut self) -> InvocationOutcome {
        let invocation_id = Uuid::new_v4().to_string();
        let span = info_span!("bootstrap", invocation = %invocation_id);

        async {
            match self.run(&invocation_id).await {
                Ok(report) => {
                    self.telemetry.send(TelemetryEvent::BootstrapCompleted {
                        invocation_id: report.invocation_id,
                        duration_ms: report.duration_ms,
                        roles: report.roles.iter().map(|r| r.to_string()).collect(),
                        secrets_published: report.secrets_published,
                    });
                    InvocationOutcome::Succeeded
                }
                Err(e) => {
                    let reached = self.phase;
                    self.phase = Phase::Failed;
                    error!(
                        step = e.step(),
                        reached = %reached,
                        error = %e,
                        "Bootstrap failed"
                    );
                    self.telemetry.send(TelemetryEvent::BootstrapFailed {
                        invocation_id: invocation_id.clone(),
                        error: e.to_string(),
                        phase: e.step().to_string(),
                    });
                    InvocationOutcome::Failed
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run one invocation and return its report or the error that stopped it.
    pub async fn run(&mut self, invocation_id: &str) -> Result<BootstrapReport, BootstrapError> {
        let started_at = Utc::now();
        let start = Instant::now();
        self.telemetry.send(TelemetryEvent::BootstrapStarted {
            invocation_id: invocation_id.to_string(),
        });

        let (mut conn, reopened_connection) = self.acquire_connection(invocation_id).await?;

        let (secrets_published, table_counts) = match self.run_steps(&mut conn).await {
            Ok(done) => done,
            Err(e) => {
                self.connection = Some(conn);
                return Err(e);
            }
        };

        drop(conn);
        self.phase = Phase::Done;
        debug!("Connection released");

        Ok(BootstrapReport {
            invocation_id: invocation_id.to_string(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            reopened_connection,
            roles: vec![READ_WRITE.name, TABLE_CREATOR.name],
            secrets_published,
            table_counts,
        })
    }

    /// Take the cached connection if it is still open, otherwise open a new one.
    ///
    /// Returns the connection and whether a closed one had to be replaced.
    async fn acquire_connection(&mut self, invocation_id: &str) -> Result<(C::Conn, bool), BootstrapError> {
        self.phase = Phase::Connecting;

        let reopened = match self.connection.take() {
            Some(conn) if !conn.is_closed() => {
                debug!("Reusing open connection");
                return Ok((conn, false));
            }
            Some(_) => {
                warn!("Cached connection is closed, reconnecting");
                true
            }
            None => false,
        };

        let conn = self
            .connector
            .connect(&self.params)
            .await
            .map_err(BootstrapError::Connection)?;

        self.telemetry.send(TelemetryEvent::ConnectionOpened {
            invocation_id: invocation_id.to_string(),
            reopened,
        });
        Ok((conn, reopened))
    }

    async fn run_steps(&mut self, conn: &mut C::Conn) -> Result<(Vec<String>, Vec<TableCount>), BootstrapError> {
        schema::apply(conn).await?;
        self.phase = Phase::SchemaApplied;

        let users = roles::provision(conn, &self.params.dbname).await?;
        self.phase = Phase::RolesProvisioned;
        info!(
            roles = ?[READ_WRITE.name, TABLE_CREATOR.name],
            "Login users created; earlier users for these roles are left in place"
        );

        // Both bundles start from the untouched admin bundle.
        let targets = [
            (&users.table_creator, &self.config.table_creator_secret_name),
            (&users.read_write, &self.config.user_secret_name),
        ];
        let mut published = Vec::with_capacity(targets.len());
        for (user, secret_name) in targets {
            publish(&self.store, &self.admin, &user.credentials(), secret_name).await?;
            published.push(secret_name.clone());
        }
        self.phase = Phase::SecretsPublished;

        let counts = if self.config.verify_tables {
            verify::table_counts(conn).await
        } else {
            Vec::new()
        };

        Ok((published, counts))
    }
}
