//! Database schema migrations for streakroom.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: streak ledgers and the transaction ledger.
///
/// `claim_day` is set only on daily-reward rows; the partial unique index
/// makes a second daily grant for the same user and day impossible.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS login_streaks (
            user_id          TEXT PRIMARY KEY,
            current_day      INTEGER NOT NULL DEFAULT 0
                             CHECK (current_day BETWEEN 0 AND 6),
            days_completed   TEXT NOT NULL DEFAULT '[]',
            last_claimed_at  TEXT,
            cycle            INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS transactions (
            id               TEXT PRIMARY KEY,
            user_id          TEXT NOT NULL,
            amount           REAL NOT NULL,
            token            TEXT NOT NULL,
            transaction_type TEXT NOT NULL,
            created_at       TEXT NOT NULL,
            description      TEXT,
            reference_id     TEXT,
            claim_day        TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_transactions_user_created
            ON transactions(user_id, created_at);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_daily_claim
            ON transactions(user_id, claim_day) WHERE claim_day IS NOT NULL;",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: profiles, the task catalog, completions and referrals.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS user_profiles (
            user_id               TEXT PRIMARY KEY,
            display_name          TEXT,
            referral_code         TEXT NOT NULL UNIQUE,
            total_tasks_completed INTEGER NOT NULL DEFAULT 0,
            created_at            TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id            TEXT PRIMARY KEY,
            title         TEXT NOT NULL,
            description   TEXT NOT NULL DEFAULT '',
            reward_amount REAL NOT NULL,
            reward_token  TEXT NOT NULL,
            task_type     TEXT NOT NULL,
            redirect_url  TEXT,
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS task_completions (
            user_id      TEXT NOT NULL,
            task_id      TEXT NOT NULL REFERENCES tasks(id),
            completed_at TEXT NOT NULL,
            PRIMARY KEY (user_id, task_id)
        );

        CREATE TABLE IF NOT EXISTS referrals (
            id             TEXT PRIMARY KEY,
            referrer_id    TEXT NOT NULL,
            referee_id     TEXT NOT NULL UNIQUE,
            created_at     TEXT NOT NULL,
            reward_claimed INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_referrals_referrer ON referrals(referrer_id);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: profile avatars and achievements.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE user_profiles ADD COLUMN avatar_url TEXT;

        CREATE TABLE IF NOT EXISTS achievements (
            user_id           TEXT NOT NULL,
            achievement_type  TEXT NOT NULL,
            achievement_level INTEGER NOT NULL DEFAULT 0
                              CHECK (achievement_level BETWEEN 0 AND 7),
            current_progress  INTEGER NOT NULL DEFAULT 0,
            next_target       INTEGER NOT NULL,
            unlocked_at       TEXT,
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL,
            PRIMARY KEY (user_id, achievement_type)
        );",
    )?;

    set_schema_version(&tx, 3)?;
    tx.commit()
}
