//! Opening the store and bringing its schema up to date.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use std::path::Path;

use super::Database;

/// Schema versions in order; each one is applied in its own transaction
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "registry records",
    statements: &[
        r#"
        CREATE TABLE registry_records (
            registration_number TEXT PRIMARY KEY
                CHECK (length(trim(registration_number)) > 0),
            legal_name TEXT NOT NULL,
            trade_name TEXT NOT NULL,
            activity_description TEXT NOT NULL,
            operations_start_date TEXT,
            status TEXT NOT NULL,
            payment_regime TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
        "CREATE INDEX idx_registry_records_status ON registry_records(status)",
    ],
}];

struct Migration {
    version: i64,
    name: &'static str,
    statements: &'static [&'static str],
}

fn connection_failed(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Database(DatabaseError::ConnectionFailed(format!("{context}: {e}")))
}

fn migration_failed(version: i64, e: impl std::fmt::Display) -> Error {
    Error::Database(DatabaseError::MigrationFailed(format!(
        "migration v{version}: {e}"
    )))
}

impl Database {
    /// Open (creating if needed) the SQLite file at `path` and migrate it
    ///
    /// Missing parent directories are created. The file is opened in WAL mode.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| connection_failed("Failed to create database directory", e))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| connection_failed("Failed to connect to database", e))?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Apply every migration newer than the recorded schema version
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| connection_failed("Failed to acquire connection", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_failed(0, e))?;

        let current: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to query schema version: {e}"
                )))
            })?;
        let current = current.unwrap_or(0);

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            Self::apply(&mut conn, migration).await?;
        }

        Ok(())
    }

    async fn apply(conn: &mut SqliteConnection, migration: &Migration) -> Result<()> {
        let version = migration.version;
        tracing::info!(version, name = migration.name, "applying database migration");

        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| migration_failed(version, e))?;

        let result = async {
            for statement in migration.statements {
                sqlx::query(*statement).execute(&mut *conn).await?;
            }
            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(chrono::Utc::now().timestamp())
                .execute(&mut *conn)
                .await?;
            Ok::<(), sqlx::Error>(())
        }
        .await;

        if let Err(e) = result {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            return Err(migration_failed(version, e));
        }

        sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map_err(|e| migration_failed(version, e))?;

        tracing::info!(version, "database migration complete");
        Ok(())
    }

    /// Close every pooled connection; later queries fail
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
