//! SQLite-based reward storage.
//!
//! Provides persistent storage for:
//! - Per-user login streak ledgers
//! - The append-only transaction ledger
//! - Profiles, the task catalog and referrals (see `catalog.rs`)
//!
//! Writes that must be atomic run inside `BEGIN IMMEDIATE` transactions so
//! that concurrent writers on other connections serialize on the database
//! lock instead of interleaving read-modify-write cycles.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::error::DatabaseError;
use crate::store::{CommitOutcome, RewardStore};
use crate::streak::StreakLedger;
use crate::transaction::{Page, PageRequest, Transaction};

use super::{data_dir, migrations};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database for reward storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/streakroom.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, crate::error::CoreError> {
        let path = data_dir()?.join("streakroom.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) a database file at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, DatabaseError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    pub(super) fn begin_immediate(&self) -> Result<rusqlite::Transaction<'_>, DatabaseError> {
        Ok(rusqlite::Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl RewardStore for Database {
    fn get_streak(&self, user_id: &str) -> Result<Option<StreakLedger>, DatabaseError> {
        let raw = self
            .conn
            .query_row(
                "SELECT current_day, days_completed, last_claimed_at, cycle
                 FROM login_streaks WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, u8>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, u32>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((current_day, days_json, last_claimed, cycle)) = raw else {
            return Ok(None);
        };

        let days_completed: BTreeSet<u8> =
            serde_json::from_str(&days_json).map_err(|e| DatabaseError::Corrupt {
                table: "login_streaks".into(),
                message: format!("days_completed for {user_id}: {e}"),
            })?;
        let last_claimed_at = last_claimed
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|message| DatabaseError::Corrupt {
                table: "login_streaks".into(),
                message,
            })?;

        Ok(Some(StreakLedger {
            user_id: user_id.to_string(),
            current_day,
            days_completed,
            last_claimed_at,
            cycle,
        }))
    }

    fn upsert_streak(
        &self,
        ledger: &StreakLedger,
        expected: Option<DateTime<Utc>>,
    ) -> Result<CommitOutcome, DatabaseError> {
        let tx = self.begin_immediate()?;
        if write_streak(&tx, ledger, expected)? == 0 {
            return Ok(CommitOutcome::Conflict);
        }
        tx.commit()?;
        Ok(CommitOutcome::Committed)
    }

    fn append_transaction(&self, tx: &Transaction) -> Result<(), DatabaseError> {
        insert_transaction(&self.conn, tx, None)?;
        tracing::debug!(id = %tx.id, user_id = %tx.user_id, "transaction appended");
        Ok(())
    }

    fn commit_claim(
        &self,
        ledger: &StreakLedger,
        expected: Option<DateTime<Utc>>,
        claim_day: &str,
        tx: &Transaction,
    ) -> Result<CommitOutcome, DatabaseError> {
        let db_tx = self.begin_immediate()?;

        if write_streak(&db_tx, ledger, expected)? == 0 {
            tracing::debug!(user_id = %ledger.user_id, "streak compare-and-swap lost");
            return Ok(CommitOutcome::Conflict);
        }
        match insert_transaction(&db_tx, tx, Some(claim_day)) {
            Ok(()) => {}
            Err(e) if is_constraint_violation(&e) => {
                tracing::debug!(user_id = %ledger.user_id, claim_day, "claim day already taken");
                return Ok(CommitOutcome::Conflict);
            }
            Err(e) => return Err(e.into()),
        }

        db_tx.commit()?;
        Ok(CommitOutcome::Committed)
    }

    fn list_transactions(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> Result<Page<Transaction>, DatabaseError> {
        let total: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, amount, token, transaction_type, created_at, description, reference_id
             FROM transactions
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2 OFFSET ?3",
        )?;
        let items = stmt
            .query_map(
                params![user_id, page.page_size, page.offset()],
                row_to_transaction,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            page: page.page,
            page_size: page.page_size,
            total,
        })
    }
}

/// Conditional ledger upsert. Returns the number of rows written (0 or 1).
fn write_streak(
    conn: &Connection,
    ledger: &StreakLedger,
    expected: Option<DateTime<Utc>>,
) -> rusqlite::Result<usize> {
    let days = serde_json::to_string(&ledger.days_completed)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT INTO login_streaks
            (user_id, current_day, days_completed, last_claimed_at, cycle, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(user_id) DO UPDATE SET
            current_day = excluded.current_day,
            days_completed = excluded.days_completed,
            last_claimed_at = excluded.last_claimed_at,
            cycle = excluded.cycle,
            updated_at = excluded.updated_at
         WHERE login_streaks.last_claimed_at IS ?7",
        params![
            ledger.user_id,
            ledger.current_day,
            days,
            ledger.last_claimed_at.map(format_timestamp),
            ledger.cycle,
            format_timestamp(Utc::now()),
            expected.map(format_timestamp),
        ],
    )
}

pub(super) fn insert_transaction(
    conn: &Connection,
    tx: &Transaction,
    claim_day: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO transactions
            (id, user_id, amount, token, transaction_type, created_at, description, reference_id, claim_day)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            tx.id,
            tx.user_id,
            tx.amount,
            tx.token.as_str(),
            tx.transaction_type.as_str(),
            format_timestamp(tx.created_at),
            tx.description,
            tx.reference_id,
            claim_day,
        ],
    )?;
    Ok(())
}

pub(super) fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        token: parse_column(row, 3)?,
        transaction_type: parse_column(row, 4)?,
        created_at: timestamp_column(row, 5)?,
        description: row.get(6)?,
        reference_id: row.get(7)?,
    })
}

pub(super) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Timestamps are stored as fixed-precision RFC 3339 so that text ordering
/// matches time ordering and equality checks are exact.
pub(super) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(super) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{s}': {e}"))
}

pub(super) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

pub(super) fn optional_timestamp_column(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.as_deref()
        .map(parse_timestamp)
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

pub(super) fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
