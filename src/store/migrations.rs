//! Schema versions for the snapshot database.
//!
//! Applied versions are recorded in `_migrations`. Each pending version runs in
//! its own transaction together with its record, so a crash never leaves a
//! schema change without its version row.

use libsql::Connection;
use tracing::{debug, info};

use crate::error::StorageError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Append only.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "key_value_store",
    sql: "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
}];

fn migration_error(context: &str, e: libsql::Error) -> StorageError {
    StorageError::Migration(format!("{context}: {e}"))
}

/// Bring the schema behind `conn` up to the latest version.
pub async fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| migration_error("creating _migrations", e))?;

    let applied = schema_version(conn).await?;
    let pending = MIGRATIONS.iter().filter(|m| m.version > applied);

    for m in pending {
        info!(version = m.version, name = m.name, "Applying migration");
        let context = format!("V{} ({})", m.version, m.name);
        let tx = conn
            .transaction()
            .await
            .map_err(|e| migration_error(&context, e))?;
        tx.execute_batch(m.sql)
            .await
            .map_err(|e| migration_error(&context, e))?;
        tx.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            libsql::params![m.version, m.name],
        )
        .await
        .map_err(|e| migration_error(&context, e))?;
        tx.commit().await.map_err(|e| migration_error(&context, e))?;
    }

    debug!(from = applied, to = schema_version(conn).await?, "Schema up to date");
    Ok(())
}

/// Highest applied version, 0 for a fresh database.
async fn schema_version(conn: &Connection) -> Result<i64, StorageError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| migration_error("reading schema version", e))?;
    match rows
        .next()
        .await
        .map_err(|e| migration_error("reading schema version", e))?
    {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| migration_error("decoding schema version", e)),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_conn() -> Connection {
        libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap()
            .connect()
            .unwrap()
    }

    #[tokio::test]
    async fn fresh_database_gets_kv_table_and_version_row() {
        let conn = memory_conn().await;
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query("SELECT name FROM _migrations WHERE version = 1", ())
            .await
            .unwrap();
        let name: String = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(name, "key_value_store");

        conn.execute(
            "INSERT INTO kv_store (key, value) VALUES ('onboarding.profile', '{}')",
            (),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn rerun_keeps_data_and_version() {
        let conn = memory_conn().await;
        run_migrations(&conn).await.unwrap();
        conn.execute("INSERT INTO kv_store (key, value) VALUES ('session.token', 't')", ())
            .await
            .unwrap();

        run_migrations(&conn).await.unwrap();

        assert_eq!(schema_version(&conn).await.unwrap(), 1);
        let mut rows = conn
            .query("SELECT value FROM kv_store WHERE key = 'session.token'", ())
            .await
            .unwrap();
        let value: String = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(value, "t");
    }
}
