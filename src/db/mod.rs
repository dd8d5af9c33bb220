//! Database layer for rnc-importer
//!
//! Default SQLite implementation of the [`RegistryStore`](crate::persister::RegistryStore)
//! collaborator.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`records`] - Registry record upserts and lookups

use crate::error::DatabaseError;
use crate::types::RegistryRecord;
use crate::{Error, Result};
use chrono::NaiveDate;
use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod records;

/// Storage layout for `operations_start_date`
const STORED_DATE_FORMAT: &str = "%Y-%m-%d";

/// Registry record as stored, including bookkeeping timestamps
#[derive(Debug, Clone, FromRow)]
pub struct RegistryRow {
    /// Taxpayer registration number (primary key)
    pub registration_number: String,
    /// Registered legal name
    pub legal_name: String,
    /// Trade name
    pub trade_name: String,
    /// Economic activity description
    pub activity_description: String,
    /// Start of operations as `YYYY-MM-DD`
    pub operations_start_date: Option<String>,
    /// Registry status text
    pub status: String,
    /// Payment regime text
    pub payment_regime: Option<String>,
    /// Unix timestamp of the first import of this key
    pub created_at: i64,
    /// Unix timestamp of the latest import of this key
    pub updated_at: i64,
}

impl RegistryRow {
    /// Convert back into the pipeline's record type
    pub fn into_record(self) -> Result<RegistryRecord> {
        let operations_start_date = self
            .operations_start_date
            .as_deref()
            .map(|s| NaiveDate::parse_from_str(s, STORED_DATE_FORMAT))
            .transpose()
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "stored start date for {} is invalid: {}",
                    self.registration_number, e
                )))
            })?;

        Ok(RegistryRecord {
            registration_number: self.registration_number,
            legal_name: self.legal_name,
            trade_name: self.trade_name,
            activity_description: self.activity_description,
            operations_start_date,
            status: self.status,
            payment_regime: self.payment_regime,
        })
    }
}

/// Database handle for rnc-importer
pub struct Database {
    pool: SqlitePool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
