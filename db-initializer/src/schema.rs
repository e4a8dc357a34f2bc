//! Fixed application schema
//!
//! The schema is a single versionless target: eleven tables, their foreign
//! keys and one composite unique constraint. Every statement is written so that
//! re-running the whole batch against a database that already has the schema
//! changes nothing:
//! - tables use `CREATE TABLE IF NOT EXISTS`
//! - the extension uses `CREATE EXTENSION IF NOT EXISTS`
//! - constraints are added from a `DO` block only when `pg_constraint` has no
//!   constraint of that name on the table

use crate::db::{quote_ident, quote_literal, Connection, DbError};
use thiserror::Error;
use tracing::{debug, info};

/// Applying the schema batch failed; nothing from the batch was committed.
#[derive(Error, Debug)]
#[error("failed to apply schema: {source}")]
pub struct SchemaError {
    #[source]
    pub source: DbError,
}

/// UUID generator used for every primary key default.
pub const UUID_EXTENSION: &str = "uuid-ossp";

/// A table and its columns, primary key first.
#[derive(Debug, Clone, Copy)]
pub struct Table {
    pub name: &'static str,
    pub primary_key: &'static str,
    /// `(column, type and column constraints)`
    pub columns: &'static [(&'static str, &'static str)],
}

/// A cascading foreign key from `table.column` to `references.referenced_column`.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
    pub references: &'static str,
    pub referenced_column: &'static str,
}

/// A named multi-column unique constraint.
#[derive(Debug, Clone, Copy)]
pub struct UniqueConstraint {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

pub const TABLES: &[Table] = &[
    Table {
        name: "Users",
        primary_key: "user_id",
        columns: &[
            ("user_email", "varchar UNIQUE"),
            ("username", "varchar"),
            ("first_name", "varchar"),
            ("last_name", "varchar"),
            ("preferred_name", "varchar"),
            ("time_account_created", "timestamp"),
            ("roles", "varchar[]"),
            ("last_sign_in", "timestamp"),
        ],
    },
    Table {
        name: "Courses",
        primary_key: "course_id",
        columns: &[
            ("course_name", "varchar"),
            ("course_department", "varchar"),
            ("course_number", "integer"),
            ("course_access_code", "varchar"),
            ("course_student_access", "bool"),
            ("system_prompt", "text"),
        ],
    },
    Table {
        name: "Course_Modules",
        primary_key: "module_id",
        columns: &[
            ("concept_id", "uuid"),
            ("module_name", "varchar"),
            ("module_number", "integer"),
        ],
    },
    Table {
        name: "Enrolments",
        primary_key: "enrolment_id",
        columns: &[
            ("user_id", "uuid"),
            ("course_id", "uuid"),
            ("enrolment_type", "varchar"),
            ("course_completion_percentage", "integer"),
            ("time_spent", "integer"),
            ("time_enroled", "timestamp"),
        ],
    },
    Table {
        name: "Module_Files",
        primary_key: "file_id",
        columns: &[
            ("module_id", "uuid"),
            ("filetype", "varchar"),
            ("s3_bucket_reference", "varchar"),
            ("filepath", "varchar"),
            ("filename", "varchar"),
            ("time_uploaded", "timestamp"),
            ("metadata", "text"),
        ],
    },
    Table {
        name: "Student_Modules",
        primary_key: "student_module_id",
        columns: &[
            ("course_module_id", "uuid"),
            ("enrolment_id", "uuid"),
            ("module_score", "integer"),
            ("last_accessed", "timestamp"),
            ("module_context_embedding", "float[]"),
        ],
    },
    Table {
        name: "Sessions",
        primary_key: "session_id",
        columns: &[
            ("student_module_id", "uuid"),
            ("session_name", "varchar"),
            ("session_context_embeddings", "float[]"),
            ("last_accessed", "timestamp"),
        ],
    },
    Table {
        name: "Messages",
        primary_key: "message_id",
        columns: &[
            ("session_id", "uuid"),
            ("student_sent", "bool"),
            ("message_content", "varchar"),
            ("time_sent", "timestamp"),
        ],
    },
    Table {
        name: "Course_Concepts",
        primary_key: "concept_id",
        columns: &[
            ("course_id", "uuid"),
            ("concept_name", "varchar"),
            ("concept_number", "integer"),
        ],
    },
    Table {
        name: "User_Engagement_Log",
        primary_key: "log_id",
        columns: &[
            ("user_id", "uuid"),
            ("course_id", "uuid"),
            ("module_id", "uuid"),
            ("enrolment_id", "uuid"),
            ("timestamp", "timestamp"),
            ("engagement_type", "varchar"),
            ("engagement_details", "text"),
        ],
    },
    Table {
        name: "chatlogs_notifications",
        primary_key: "id",
        columns: &[
            ("course_id", "uuid NOT NULL"),
            ("instructor_email", "varchar NOT NULL"),
            ("request_id", "uuid NOT NULL"),
            ("completion", "boolean DEFAULT FALSE"),
        ],
    },
];

const fn fk(
    table: &'static str,
    column: &'static str,
    references: &'static str,
    referenced_column: &'static str,
) -> ForeignKey {
    ForeignKey {
        table,
        column,
        references,
        referenced_column,
    }
}

pub const FOREIGN_KEYS: &[ForeignKey] = &[
    fk("User_Engagement_Log", "enrolment_id", "Enrolments", "enrolment_id"),
    fk("User_Engagement_Log", "user_id", "Users", "user_id"),
    fk("User_Engagement_Log", "course_id", "Courses", "course_id"),
    fk("User_Engagement_Log", "module_id", "Course_Modules", "module_id"),
    fk("Course_Concepts", "course_id", "Courses", "course_id"),
    fk("Course_Modules", "concept_id", "Course_Concepts", "concept_id"),
    fk("Enrolments", "course_id", "Courses", "course_id"),
    fk("Enrolments", "user_id", "Users", "user_id"),
    fk("Module_Files", "module_id", "Course_Modules", "module_id"),
    fk("Student_Modules", "course_module_id", "Course_Modules", "module_id"),
    fk("Student_Modules", "enrolment_id", "Enrolments", "enrolment_id"),
    fk("Sessions", "student_module_id", "Student_Modules", "student_module_id"),
    fk("Messages", "session_id", "Sessions", "session_id"),
    fk("chatlogs_notifications", "course_id", "Courses", "course_id"),
    fk("chatlogs_notifications", "instructor_email", "Users", "user_email"),
];

pub const UNIQUE_CONSTRAINTS: &[UniqueConstraint] = &[UniqueConstraint {
    name: "unique_course_user",
    table: "Enrolments",
    columns: &["course_id", "user_id"],
}];

impl Table {
    pub fn create_sql(&self) -> String {
        let mut lines = vec![format!(
            "    {} uuid PRIMARY KEY DEFAULT (uuid_generate_v4())",
            quote_ident(self.primary_key)
        )];
        lines.extend(
            self.columns
                .iter()
                .map(|(column, ty)| format!("    {} {}", quote_ident(column), ty)),
        );
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            quote_ident(self.name),
            lines.join(",\n")
        )
    }
}

impl ForeignKey {
    /// Same name PostgreSQL generates for an unnamed single-column foreign key,
    /// so keys created without an explicit name are recognised as present.
    pub fn constraint_name(&self) -> String {
        format!("{}_{}_fkey", self.table, self.column)
    }

    pub fn add_sql(&self) -> String {
        let ddl = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) \
             ON DELETE CASCADE ON UPDATE CASCADE",
            quote_ident(self.table),
            quote_ident(&self.constraint_name()),
            quote_ident(self.column),
            quote_ident(self.references),
            quote_ident(self.referenced_column),
        );
        guarded_constraint(self.table, &self.constraint_name(), &ddl)
    }
}

impl UniqueConstraint {
    pub fn add_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let ddl = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
            quote_ident(self.table),
            quote_ident(self.name),
            columns
        );
        guarded_constraint(self.table, self.name, &ddl)
    }
}

/// Wrap `ddl` so it only runs when `table` has no constraint called `name`.
fn guarded_constraint(table: &str, name: &str, ddl: &str) -> String {
    format!(
        r#"DO $$
BEGIN
    IF NOT EXISTS (
        SELECT 1
        FROM pg_constraint
        WHERE conname = {name}
        AND conrelid = {relation}::regclass
    ) THEN
        {ddl};
    END IF;
END
$$;"#,
        name = quote_literal(name),
        relation = quote_literal(&quote_ident(table)),
        ddl = ddl,
    )
}

/// The full schema as one SQL batch: extension, tables, then constraints.
pub fn schema_sql() -> String {
    let mut statements = vec![format!(
        "CREATE EXTENSION IF NOT EXISTS {};",
        quote_ident(UUID_EXTENSION)
    )];
    statements.extend(TABLES.iter().map(Table::create_sql));
    statements.extend(FOREIGN_KEYS.iter().map(ForeignKey::add_sql));
    statements.extend(UNIQUE_CONSTRAINTS.iter().map(UniqueConstraint::add_sql));
    statements.join("\n\n")
}

/// Bring the database up to the schema in one transaction.
pub async fn apply<C>(conn: &mut C) -> Result<(), SchemaError>
where
    C: Connection + ?Sized,
{
    let sql = schema_sql();
    debug!(bytes = sql.len(), "Applying schema batch");

    conn.batch_execute_atomic(&sql)
        .await
        .map_err(|source| SchemaError { source })?;

    info!(
        tables = TABLES.len(),
        foreign_keys = FOREIGN_KEYS.len(),
        "Schema applied"
    );
    Ok(())
}
