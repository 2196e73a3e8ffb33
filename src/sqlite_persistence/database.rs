//! The single SQLite connection every store goes through.
//!
//! Reads go through [`Database::query`], writes through [`Database::execute`],
//! which runs each statement in its own transaction and rolls back on failure.

use super::versioned_schema::{VersionedSchema, BASE_DB_VERSION};
use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{Connection, OpenFlags, Params, Row, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the database at `db_path`, creating it with the latest schema if
    /// the file does not exist, or validating and migrating it otherwise.
    pub fn open<T: AsRef<Path>>(db_path: T, schemas: &'static [VersionedSchema]) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = if db_path.exists() {
            Connection::open_with_flags(
                db_path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .with_context(|| format!("Failed to open database {:?}", db_path))?
        } else {
            info!("Creating new database at {:?}", db_path);
            let conn = Connection::open(db_path)
                .with_context(|| format!("Failed to create database {:?}", db_path))?;
            latest(schemas)?.create(&conn)?;
            conn
        };
        Self::from_connection(conn, schemas)
    }

    pub fn open_in_memory(schemas: &'static [VersionedSchema]) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        latest(schemas)?.create(&conn)?;
        Self::from_connection(conn, schemas)
    }

    fn from_connection(conn: Connection, schemas: &'static [VersionedSchema]) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        let db_version = conn
            .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
            .context("Failed to read database version")?
            - BASE_DB_VERSION as i64;

        if db_version < 0 {
            bail!(
                "Database version {} is too old, does not contain base db version {}",
                db_version,
                BASE_DB_VERSION
            );
        }
        if db_version >= schemas.len() as i64 {
            bail!("Database version {} is too new", db_version);
        }
        let version = db_version as usize;
        schemas
            .get(version)
            .context("Failed to get schema")?
            .validate(&conn)?;

        Self::migrate_if_needed(&conn, schemas, version)?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(
        conn: &Connection,
        schemas: &'static [VersionedSchema],
        version: usize,
    ) -> Result<()> {
        let mut latest_from = version;
        for schema in schemas.iter().skip(version + 1) {
            if let Some(migration_fn) = schema.migration {
                info!(
                    "Migrating db from version {} to {}",
                    latest_from, schema.version
                );
                migration_fn(conn)?;
                latest_from = schema.version;
            }
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest_from),
            [],
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))
    }

    /// Runs a read statement and maps every returned row.
    pub fn query<T, P, F>(&self, sql: &str, params: P, mapper: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Like [`Database::query`] but for statements yielding at most one row.
    pub fn query_one<T, P, F>(&self, sql: &str, params: P, mapper: F) -> Result<Option<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        Ok(self.query(sql, params, mapper)?.into_iter().next())
    }

    /// Runs a single write statement and returns the number of affected rows.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        self.transaction(|tx| Ok(tx.execute(sql, params)?))
    }

    /// Runs `f` inside a transaction, committing on `Ok` and rolling back on `Err`.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    error!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

fn latest(schemas: &'static [VersionedSchema]) -> Result<&'static VersionedSchema> {
    schemas.last().context("No schema versions declared")
}
