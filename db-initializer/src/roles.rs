//! Least-privilege roles and per-run login users
//!
//! Two group roles are ensured on every run, `readwrite` and `tablecreator`.
//! Each run then creates one brand-new login user per role with random
//! credentials. Users are never reused or removed, so every successful run
//! leaves two more users behind.

use crate::credentials::{Credentials, PASSWORD, USERNAME};
use crate::db::{quote_ident, quote_literal, Connection, DbError};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Schema every grant applies to.
pub const SCHEMA: &str = "public";

/// Random bytes behind a generated username (16 hex characters).
pub const USERNAME_BYTES: usize = 8;
/// Random bytes behind a generated password (32 hex characters).
pub const PASSWORD_BYTES: usize = 16;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("failed to set up role {role}: {source}")]
    Role {
        role: &'static str,
        #[source]
        source: DbError,
    },

    #[error("failed to create login user for role {role}: {source}")]
    User {
        role: &'static str,
        #[source]
        source: DbError,
    },

    #[error("refusing to use generated {what}: expected {expected} lowercase hex characters")]
    UnsafeValue {
        what: &'static str,
        expected: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Select,
    Insert,
    Update,
    Delete,
}

impl Privilege {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// A group role and the privileges it holds in [`SCHEMA`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Role {
    pub name: &'static str,
    pub privileges: &'static [Privilege],
    pub can_create_tables: bool,
}

const DML: &[Privilege] = &[
    Privilege::Select,
    Privilege::Insert,
    Privilege::Update,
    Privilege::Delete,
];

/// Application role: data access only.
pub const READ_WRITE: Role = Role {
    name: "readwrite",
    privileges: DML,
    can_create_tables: false,
};

/// Migration role: data access plus CREATE on the schema.
pub const TABLE_CREATOR: Role = Role {
    name: "tablecreator",
    privileges: DML,
    can_create_tables: true,
};

impl Role {
    fn privilege_list(&self) -> String {
        self.privileges
            .iter()
            .map(Privilege::as_sql)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Grants for this role. Re-granting is a no-op, so this runs every time.
    pub fn grants_sql(&self, dbname: &str) -> String {
        let role = quote_ident(self.name);
        let schema = quote_ident(SCHEMA);
        let schema_privileges = if self.can_create_tables {
            "USAGE, CREATE"
        } else {
            "USAGE"
        };
        let privileges = self.privilege_list();

        [
            format!("GRANT CONNECT ON DATABASE {} TO {};", quote_ident(dbname), role),
            format!("GRANT {} ON SCHEMA {} TO {};", schema_privileges, schema, role),
            format!("GRANT {} ON ALL TABLES IN SCHEMA {} TO {};", privileges, schema, role),
            format!(
                "ALTER DEFAULT PRIVILEGES IN SCHEMA {} GRANT {} ON TABLES TO {};",
                schema, privileges, role
            ),
            format!("GRANT USAGE ON ALL SEQUENCES IN SCHEMA {} TO {};", schema, role),
            format!(
                "ALTER DEFAULT PRIVILEGES IN SCHEMA {} GRANT USAGE ON SEQUENCES TO {};",
                schema, role
            ),
        ]
        .join("\n")
    }
}

/// A login user generated for one run.
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedUser {
    pub role: Role,
    username: String,
    password: String,
}

impl GeneratedUser {
    /// Draw a fresh username and password from the OS random source.
    pub fn generate(role: Role) -> Self {
        Self {
            role,
            username: random_hex(USERNAME_BYTES),
            password: random_hex(PASSWORD_BYTES),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// `{username, password}` bundle for publishing.
    pub fn credentials(&self) -> Credentials {
        Credentials::new()
            .with(USERNAME, self.username.as_str())
            .with(PASSWORD, self.password.as_str())
    }

    /// `CREATE USER` plus membership grant, as one batch.
    ///
    /// Both values are interpolated, so they are checked to be exactly what
    /// [`GeneratedUser::generate`] produces before any SQL is built.
    pub fn create_sql(&self) -> Result<String, ProvisionError> {
        ensure_hex("username", &self.username, USERNAME_BYTES * 2)?;
        ensure_hex("password", &self.password, PASSWORD_BYTES * 2)?;

        let user = quote_ident(&self.username);
        Ok(format!(
            "CREATE USER {} WITH PASSWORD {};\nGRANT {} TO {};",
            user,
            quote_literal(&self.password),
            quote_ident(self.role.name),
            user
        ))
    }
}

impl fmt::Debug for GeneratedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedUser")
            .field("role", &self.role.name)
            .finish_non_exhaustive()
    }
}

/// The two users created by one provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionedUsers {
    pub read_write: GeneratedUser,
    pub table_creator: GeneratedUser,
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

fn ensure_hex(what: &'static str, value: &str, expected: usize) -> Result<(), ProvisionError> {
    let valid = value.len() == expected
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if valid {
        Ok(())
    } else {
        Err(ProvisionError::UnsafeValue { what, expected })
    }
}

/// Make sure `role` exists and holds its grants.
///
/// Existence is checked in the catalog first. A concurrent initializer can
/// still win the race between check and create; its `duplicate_object` error
/// means the role is there, which is all we need.
pub async fn ensure_role<C>(conn: &mut C, role: &Role, dbname: &str) -> Result<(), ProvisionError>
where
    C: Connection + ?Sized,
{
    let role_error = |source: DbError| ProvisionError::Role {
        role: role.name,
        source,
    };

    if conn.role_exists(role.name).await.map_err(role_error)? {
        debug!(role = role.name, "Role already exists");
    } else {
        let create = format!("CREATE ROLE {} NOLOGIN;", quote_ident(role.name));
        match conn.batch_execute(&create).await {
            Ok(()) => info!(role = role.name, "Created role"),
            Err(DbError::DuplicateObject { .. }) => {
                debug!(role = role.name, "Role created concurrently")
            }
            Err(e) => return Err(role_error(e)),
        }
    }

    conn.batch_execute(&role.grants_sql(dbname))
        .await
        .map_err(role_error)?;
    Ok(())
}

/// Create a login user for `user.role`. Never idempotent: always a new user.
pub async fn create_user<C>(conn: &mut C, user: &GeneratedUser) -> Result<(), ProvisionError>
where
    C: Connection + ?Sized,
{
    let sql = user.create_sql()?;
    conn.batch_execute(&sql)
        .await
        .map_err(|source| ProvisionError::User {
            role: user.role.name,
            source,
        })?;
    info!(role = user.role.name, "Created login user");
    Ok(())
}

/// Ensure both roles, then create one fresh user for each.
///
/// Every step commits on its own. A failure part-way leaves the earlier steps
/// in place; re-running is safe for the roles and adds new users.
pub async fn provision<C>(conn: &mut C, dbname: &str) -> Result<ProvisionedUsers, ProvisionError>
where
    C: Connection + ?Sized,
{
    let users = ProvisionedUsers {
        read_write: GeneratedUser::generate(READ_WRITE),
        table_creator: GeneratedUser::generate(TABLE_CREATOR),
    };

    ensure_role(conn, &READ_WRITE, dbname).await?;
    ensure_role(conn, &TABLE_CREATOR, dbname).await?;

    create_user(conn, &users.read_write).await?;
    create_user(conn, &users.table_creator).await?;

    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeConnection;

    #[test]
    fn test_generated_values_are_hex_of_expected_length() {
        let user = GeneratedUser::generate(READ_WRITE);
        assert_eq!(user.username().len(), 16);
        assert_eq!(user.password().len(), 32);
        assert!(ensure_hex("username", user.username(), 16).is_ok());
        assert!(ensure_hex("password", user.password(), 32).is_ok());
    }

    #[test]
    fn test_generated_users_are_distinct() {
        let a = GeneratedUser::generate(READ_WRITE);
        let b = GeneratedUser::generate(READ_WRITE);
        assert_ne!(a.username(), b.username());
        assert_ne!(a.password(), b.password());
    }

    #[test]
    fn test_ensure_hex_rejects_injection() {
        assert!(ensure_hex("username", "abc\"; DROP ROLE x", 16).is_err());
        assert!(ensure_hex("username", "ABCDEF0123456789", 16).is_err());
        assert!(ensure_hex("username", "abcdef", 16).is_err());
    }

    #[test]
    fn test_create_sql_rejects_tampered_user() {
        let mut user = GeneratedUser::generate(TABLE_CREATOR);
        user.username = "robert'); --".to_string();
        assert!(matches!(
            user.create_sql(),
            Err(ProvisionError::UnsafeValue { what: "username", .. })
        ));
    }

    #[test]
    fn test_create_sql_binds_user_to_role() {
        let user = GeneratedUser::generate(TABLE_CREATOR);
        let sql = user.create_sql().unwrap();
        assert!(sql.starts_with(&format!("CREATE USER \"{}\" WITH PASSWORD '", user.username())));
        assert!(sql.ends_with(&format!("GRANT \"tablecreator\" TO \"{}\";", user.username())));
    }

    #[test]
    fn test_grants_differ_only_in_create() {
        let rw = READ_WRITE.grants_sql("postgres");
        let tc = TABLE_CREATOR.grants_sql("postgres");

        assert!(rw.contains("GRANT USAGE ON SCHEMA \"public\" TO \"readwrite\";"));
        assert!(tc.contains("GRANT USAGE, CREATE ON SCHEMA \"public\" TO \"tablecreator\";"));
        assert!(rw.contains("GRANT CONNECT ON DATABASE \"postgres\" TO \"readwrite\";"));
        assert!(rw.contains(
            "GRANT SELECT, INSERT, UPDATE, DELETE ON ALL TABLES IN SCHEMA \"public\" TO \"readwrite\";"
        ));
        assert!(rw.contains("ALTER DEFAULT PRIVILEGES IN SCHEMA \"public\" GRANT USAGE ON SEQUENCES"));
        assert!(!rw.contains("CREATE"));
    }

    #[test]
    fn test_debug_hides_credentials() {
        let user = GeneratedUser::generate(READ_WRITE);
        let rendered = format!("{:?}", user);
        assert!(!rendered.contains(user.username()));
        assert!(!rendered.contains(user.password()));
    }

    #[tokio::test]
    async fn test_provision_twice_keeps_two_roles() {
        let mut conn = FakeConnection::new();

        let first = provision(&mut conn, "postgres").await.unwrap();
        let second = provision(&mut conn, "postgres").await.unwrap();

        let roles = conn.roles();
        assert!(roles.contains("readwrite"));
        assert!(roles.contains("tablecreator"));
        // Two group roles plus two users per run.
        assert_eq!(roles.len(), 2 + 4);

        let create_role_batches = conn
            .log()
            .iter()
            .filter(|e| e.sql.starts_with("CREATE ROLE"))
            .count();
        assert_eq!(create_role_batches, 2);

        assert_ne!(first.read_write.username(), second.read_write.username());
        assert_ne!(first.table_creator.username(), second.table_creator.username());
    }

    #[tokio::test]
    async fn test_concurrent_role_creation_is_not_an_error() {
        let mut conn = FakeConnection::new();
        conn.hide_role_from_catalog("readwrite");

        ensure_role(&mut conn, &READ_WRITE, "postgres").await.unwrap();

        let log = conn.log();
        assert_eq!(log[0].sql, "CREATE ROLE \"readwrite\" NOLOGIN;");
        assert!(log[1].sql.starts_with("GRANT CONNECT"));
    }

    #[tokio::test]
    async fn test_user_creation_failure_reports_role() {
        let mut conn = FakeConnection::new();
        conn.fail_when(
            "CREATE USER",
            DbError::Statement {
                code: Some("42501".to_string()),
                message: "permission denied to create role".to_string(),
            },
        );

        let err = provision(&mut conn, "postgres").await.unwrap_err();
        assert!(matches!(err, ProvisionError::User { role: "readwrite", .. }));
        // Both roles were committed before the failure.
        assert!(conn.roles().contains("tablecreator"));
    }

    #[tokio::test]
    async fn test_each_step_commits_separately() {
        let mut conn = FakeConnection::new();
        provision(&mut conn, "postgres").await.unwrap();
        assert!(conn.log().iter().all(|e| !e.atomic));
    }
}
