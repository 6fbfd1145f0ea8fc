// Schema creation and ordered, idempotent migrations
use crate::types::Result;
use rusqlite::Connection;
use std::collections::HashSet;
use tracing::{debug, info};

pub const TEMPLATES_TABLE: &str = "templates";

/// Columns present in every store, including the oldest files on disk
pub const BASE_COLUMNS: &[&str] = &[
    "id",
    "name",
    "description",
    "regions",
    "column_lines",
    "config",
    "creation_date",
];

const BASE_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS templates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        regions TEXT NOT NULL,
        column_lines TEXT,
        config TEXT,
        creation_date TEXT NOT NULL
    );
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Adds `column` with the given declaration unless it already exists
    AddColumn {
        column: &'static str,
        declaration: &'static str,
    },
    /// Statement that must be safe to re-run
    Backfill { sql: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub step: Step,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "template_type",
        step: Step::AddColumn { column: "template_type", declaration: "TEXT DEFAULT 'single'" },
    },
    Migration {
        version: 2,
        name: "page_count",
        step: Step::AddColumn { column: "page_count", declaration: "INTEGER DEFAULT 1" },
    },
    Migration {
        version: 3,
        name: "page_regions",
        step: Step::AddColumn { column: "page_regions", declaration: "TEXT" },
    },
    Migration {
        version: 4,
        name: "page_column_lines",
        step: Step::AddColumn { column: "page_column_lines", declaration: "TEXT" },
    },
    Migration {
        version: 5,
        name: "page_configs",
        step: Step::AddColumn { column: "page_configs", declaration: "TEXT" },
    },
    Migration {
        version: 6,
        name: "last_modified",
        step: Step::AddColumn { column: "last_modified", declaration: "TEXT" },
    },
    Migration {
        version: 7,
        name: "backfill_last_modified",
        step: Step::Backfill {
            sql: "UPDATE templates SET last_modified = creation_date WHERE last_modified IS NULL",
        },
    },
    Migration {
        version: 8,
        name: "validation_rules",
        step: Step::AddColumn { column: "validation_rules", declaration: "TEXT" },
    },
];

pub fn schema_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Columns that migrations may add, in migration order
pub fn optional_columns() -> impl Iterator<Item = &'static str> {
    MIGRATIONS.iter().filter_map(|m| match m.step {
        Step::AddColumn { column, .. } => Some(column),
        Step::Backfill { .. } => None,
    })
}

pub fn current_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

pub fn existing_columns(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('templates')")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(names)
}

/// Bring the schema up to date. Safe to run on every open: column additions
/// check the physical table first, so a file whose version marker is ahead
/// of its columns is still repaired. Returns the number of steps applied.
pub fn run_migrations(conn: &mut Connection) -> Result<usize> {
    let tx = conn.transaction()?;
    tx.execute_batch(BASE_SCHEMA)?;

    let from = current_version(&tx)?;
    let target = schema_version();
    let mut columns = existing_columns(&tx)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        let ran = match migration.step {
            Step::AddColumn { column, declaration } => {
                if columns.contains(column) {
                    false
                } else {
                    tx.execute_batch(&format!(
                        "ALTER TABLE {TEMPLATES_TABLE} ADD COLUMN {column} {declaration}"
                    ))?;
                    columns.insert(column.to_string());
                    true
                }
            }
            Step::Backfill { sql } => {
                if migration.version > from {
                    let rows = tx.execute(sql, [])?;
                    debug!(migration = migration.name, rows, "backfill");
                    true
                } else {
                    false
                }
            }
        };
        if ran {
            info!(version = migration.version, name = migration.name, "applied migration");
            applied += 1;
        }
    }

    if from < target {
        tx.pragma_update(None, "user_version", target)?;
        info!(from, to = target, "template schema upgraded");
    }
    tx.commit()?;
    Ok(applied)
}
