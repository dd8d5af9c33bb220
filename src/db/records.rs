//! Registry record upserts and lookups.

use crate::error::DatabaseError;
use crate::persister::RegistryStore;
use crate::types::RegistryRecord;
use crate::{Error, Result};
use async_trait::async_trait;

use super::{Database, RegistryRow, STORED_DATE_FORMAT};

/// SQLite default SQLITE_MAX_VARIABLE_NUMBER is 999 and each record binds
/// 9 values, so at most 111 records fit one statement.
const MAX_RECORDS_PER_STATEMENT: usize = 110;

impl Database {
    /// Insert or update a batch of records in a single transaction
    ///
    /// Rows are keyed by `registration_number`. On conflict every data column
    /// is overwritten and `updated_at` refreshed while `created_at` keeps the
    /// time of the first import. Any failure rolls the whole batch back.
    pub async fn upsert_records(&self, records: &[RegistryRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::TransactionFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let mut written = 0u64;
        for chunk in records.chunks(MAX_RECORDS_PER_STATEMENT) {
            let mut query_builder = sqlx::QueryBuilder::new(
                "INSERT INTO registry_records (registration_number, legal_name, trade_name, activity_description, operations_start_date, status, payment_regime, created_at, updated_at) ",
            );

            query_builder.push_values(chunk, |mut b, record| {
                b.push_bind(&record.registration_number)
                    .push_bind(&record.legal_name)
                    .push_bind(&record.trade_name)
                    .push_bind(&record.activity_description)
                    .push_bind(
                        record
                            .operations_start_date
                            .map(|d| d.format(STORED_DATE_FORMAT).to_string()),
                    )
                    .push_bind(&record.status)
                    .push_bind(&record.payment_regime)
                    .push_bind(now)
                    .push_bind(now);
            });

            query_builder.push(
                r#"
                ON CONFLICT(registration_number) DO UPDATE SET
                    legal_name = excluded.legal_name,
                    trade_name = excluded.trade_name,
                    activity_description = excluded.activity_description,
                    operations_start_date = excluded.operations_start_date,
                    status = excluded.status,
                    payment_regime = excluded.payment_regime,
                    updated_at = excluded.updated_at
                "#,
            );

            // Dropping `tx` on the error path rolls the batch back
            let result = query_builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to upsert registry records: {}",
                        e
                    )))
                })?;

            written += result.rows_affected();
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::TransactionFailed(format!(
                "Failed to commit registry batch: {}",
                e
            )))
        })?;

        Ok(written)
    }

    /// Look up one record by registration number
    pub async fn get_record(&self, registration_number: &str) -> Result<Option<RegistryRow>> {
        let row = sqlx::query_as::<_, RegistryRow>(
            r#"
            SELECT registration_number, legal_name, trade_name, activity_description,
                   operations_start_date, status, payment_regime, created_at, updated_at
            FROM registry_records
            WHERE registration_number = ?
            "#,
        )
        .bind(registration_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get registry record: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Number of stored records
    pub async fn count_records(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM registry_records")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count registry records: {}",
                    e
                )))
            })?;

        Ok(count as u64)
    }
}

#[async_trait]
impl RegistryStore for Database {
    async fn upsert_batch(&self, records: &[RegistryRecord]) -> Result<u64> {
        self.upsert_records(records).await
    }
}
