//! In-memory stand-ins for the database and the secret store.

use crate::db::{ConnectParams, Connection, Connector, DbError};
use crate::secrets::{Result as SecretResult, SecretStore, SecretStoreError};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One statement batch as received by a [`FakeConnection`].
#[derive(Debug, Clone)]
pub struct Executed {
    pub connection: usize,
    pub sql: String,
    pub atomic: bool,
}

#[derive(Default)]
struct FakeDb {
    roles: BTreeSet<String>,
    log: Vec<Executed>,
    // Roles the catalog query pretends not to see, to simulate a racing creator.
    hidden_roles: BTreeSet<String>,
    failure: Option<(String, DbError)>,
    connects: usize,
    connect_failure: Option<String>,
}

impl FakeDb {
    fn take_failure(&mut self, sql: &str) -> Option<DbError> {
        let matches = match &self.failure {
            Some((pattern, _)) => sql.contains(pattern.as_str()),
            None => false,
        };
        if matches {
            self.failure.take().map(|(_, err)| err)
        } else {
            None
        }
    }

    /// Track `CREATE ROLE` / `CREATE USER` the way the server would.
    fn apply(&mut self, sql: &str) -> Result<(), DbError> {
        for line in sql.lines().map(str::trim) {
            let created = line
                .strip_prefix("CREATE ROLE ")
                .or_else(|| line.strip_prefix("CREATE USER "));
            if let Some(rest) = created {
                let name = rest
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .trim_end_matches(';')
                    .trim_matches('"')
                    .to_string();
                if !self.roles.insert(name.clone()) {
                    return Err(DbError::DuplicateObject {
                        message: format!("role \"{}\" already exists", name),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A fake session sharing state with the [`FakeConnector`] that opened it.
pub struct FakeConnection {
    id: usize,
    db: Arc<Mutex<FakeDb>>,
    closed: Arc<AtomicBool>,
}

impl FakeConnection {
    /// A standalone connection with its own empty database.
    pub fn new() -> Self {
        Self {
            id: 0,
            db: Arc::new(Mutex::new(FakeDb::default())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn log(&self) -> Vec<Executed> {
        self.db.lock().unwrap().log.clone()
    }

    pub fn roles(&self) -> BTreeSet<String> {
        self.db.lock().unwrap().roles.clone()
    }

    pub fn fail_next_with(&self, err: DbError) {
        self.db.lock().unwrap().failure = Some((String::new(), err));
    }

    pub fn fail_when(&self, pattern: &str, err: DbError) {
        self.db.lock().unwrap().failure = Some((pattern.to_string(), err));
    }

    pub fn hide_role_from_catalog(&self, role: &str) {
        let mut db = self.db.lock().unwrap();
        db.roles.insert(role.to_string());
        db.hidden_roles.insert(role.to_string());
    }

    fn execute(&mut self, sql: &str, atomic: bool) -> Result<(), DbError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::Closed);
        }
        let mut db = self.db.lock().unwrap();
        db.log.push(Executed {
            connection: self.id,
            sql: sql.to_string(),
            atomic,
        });
        if let Some(err) = db.take_failure(sql) {
            return Err(err);
        }
        db.apply(sql)
    }
}

#[async_trait]
impl Connection for FakeConnection {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn batch_execute(&mut self, sql: &str) -> Result<(), DbError> {
        self.execute(sql, false)
    }

    async fn batch_execute_atomic(&mut self, sql: &str) -> Result<(), DbError> {
        self.execute(sql, true)
    }

    async fn role_exists(&mut self, role: &str) -> Result<bool, DbError> {
        if self.is_closed() {
            return Err(DbError::Closed);
        }
        let db = self.db.lock().unwrap();
        Ok(db.roles.contains(role) && !db.hidden_roles.contains(role))
    }

    async fn count_rows(&mut self, _table: &str) -> Result<i64, DbError> {
        if self.is_closed() {
            return Err(DbError::Closed);
        }
        Ok(0)
    }
}

impl Default for FakeConnection {
    fn default() -> Self {
        Self::new()
    }
}

/// Opens [`FakeConnection`]s onto one shared fake database.
#[derive(Clone, Default)]
pub struct FakeConnector {
    db: Arc<Mutex<FakeDb>>,
    handles: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connects(&self) -> usize {
        self.db.lock().unwrap().connects
    }

    pub fn log(&self) -> Vec<Executed> {
        self.db.lock().unwrap().log.clone()
    }

    pub fn roles(&self) -> BTreeSet<String> {
        self.db.lock().unwrap().roles.clone()
    }

    /// Close every session opened so far, as a server restart would.
    pub fn close_all(&self) {
        for handle in self.handles.lock().unwrap().iter() {
            handle.store(true, Ordering::SeqCst);
        }
    }

    pub fn fail_connect(&self, message: &str) {
        self.db.lock().unwrap().connect_failure = Some(message.to_string());
    }

    pub fn fail_when(&self, pattern: &str, err: DbError) {
        self.db.lock().unwrap().failure = Some((pattern.to_string(), err));
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Conn = FakeConnection;

    async fn connect(&self, params: &ConnectParams) -> Result<FakeConnection, DbError> {
        let mut db = self.db.lock().unwrap();
        if let Some(message) = db.connect_failure.take() {
            return Err(DbError::Connect {
                host: params.host.clone(),
                port: params.port,
                dbname: params.dbname.clone(),
                message,
            });
        }
        db.connects += 1;

        let closed = Arc::new(AtomicBool::new(false));
        self.handles.lock().unwrap().push(Arc::clone(&closed));
        Ok(FakeConnection {
            id: db.connects,
            db: Arc::clone(&self.db),
            closed,
        })
    }
}

/// Secret store holding values in memory and remembering every write.
#[derive(Clone, Default)]
pub struct MemorySecretStore {
    values: Arc<Mutex<BTreeMap<String, String>>>,
    writes: Arc<Mutex<Vec<String>>>,
    fail_writes_to: Arc<Mutex<Option<String>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, name: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    pub fn value(&self, name: &str) -> Option<String> {
        self.values.lock().unwrap().get(name).cloned()
    }

    /// Secret names in the order they were written.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn fail_writes_to(&self, name: &str) {
        *self.fail_writes_to.lock().unwrap() = Some(name.to_string());
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get_secret_string(&self, name: &str) -> SecretResult<String> {
        self.value(name)
            .ok_or_else(|| SecretStoreError::not_found(name))
    }

    async fn put_secret_string(&self, name: &str, value: &str) -> SecretResult<()> {
        if self.fail_writes_to.lock().unwrap().as_deref() == Some(name) {
            return Err(SecretStoreError::backend(name, "AccessDeniedException"));
        }
        self.writes.lock().unwrap().push(name.to_string());
        self.seed(name, value);
        Ok(())
    }
}
