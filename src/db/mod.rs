use chrono::Local;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqlitePool};
use thiserror::Error;

pub mod auth;
pub mod ledger;
pub mod models;

/// Timestamp format used for every persisted date/time column. Lexicographic
/// order equals chronological order, which the range and month queries rely on.
pub const DB_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Month key format used by the insights queries ("YYYY-MM").
pub const MONTH_KEY_FORMAT: &str = "%Y-%m";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("corrupt amount column: {0}")]
    Decimal(#[from] rust_decimal::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Current local time formatted for storage.
pub fn now_for_db() -> String {
    Local::now().format(DB_DATETIME_FORMAT).to_string()
}

/// Current month key ("YYYY-MM") for insights defaults.
pub fn current_month() -> String {
    Local::now().format(MONTH_KEY_FORMAT).to_string()
}

/// Open (creating if missing) the database at `url` and make sure the schema
/// exists. All tables are keyed by the owning account id; monetary columns are
/// decimal TEXT, never REAL.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool, StoreError> {
    if !Sqlite::database_exists(url).await.unwrap_or(false) {
        Sqlite::create_database(url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;

    setup_schema(&pool).await?;

    Ok(pool)
}

async fn setup_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    const TABLES: [&str; 5] = [
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            username      TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            full_name     TEXT NOT NULL,
            phone         TEXT NOT NULL UNIQUE,
            account_no    TEXT NOT NULL UNIQUE,
            balance       TEXT NOT NULL DEFAULT '0',
            created_at    TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id       INTEGER NOT NULL,
            type          TEXT NOT NULL,
            category      TEXT,
            amount        TEXT NOT NULL,
            description   TEXT,
            to_from_name  TEXT,
            to_from_phone TEXT,
            date_time     TEXT NOT NULL,
            latitude      REAL NOT NULL DEFAULT 0.0,
            longitude     REAL NOT NULL DEFAULT 0.0,
            status        TEXT NOT NULL DEFAULT 'SUCCESS',
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS bills (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id   INTEGER NOT NULL,
            bill_type TEXT NOT NULL,
            amount    TEXT NOT NULL,
            paid_at   TEXT NOT NULL,
            status    TEXT NOT NULL DEFAULT 'PAID',
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS savings_goals (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id        INTEGER NOT NULL,
            goal_name      TEXT NOT NULL,
            target_amount  TEXT NOT NULL,
            current_amount TEXT NOT NULL DEFAULT '0',
            created_at     TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS refresh_tokens (
            token      TEXT PRIMARY KEY,
            user_id    INTEGER NOT NULL,
            expires_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    ];

    for ddl in TABLES {
        sqlx::query(ddl).execute(pool).await?;
    }

    Ok(())
}

/// Fresh shared-cache in-memory database with a unique name, so parallel
/// tests never see each other's state.
#[cfg(test)]
pub async fn connect_test() -> SqlitePool {
    let url = format!(
        "sqlite:file:memdb_{}?mode=memory&cache=shared",
        uuid::Uuid::new_v4().simple()
    );
    connect(&url, 5).await.expect("failed to create test database")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_is_idempotent() {
        let pool = connect_test().await;
        // Re-running the bootstrap against an existing database is a no-op.
        setup_schema(&pool).await.expect("second bootstrap failed");
    }

    #[test]
    fn db_timestamps_sort_chronologically() {
        assert!("2026-02-19 10:30:00" < "2026-02-19 10:30:01");
        assert!("2026-01-31 23:59:59" < "2026-02-01 00:00:00");
    }

    #[test]
    fn now_matches_storage_format() {
        let now = now_for_db();
        assert_eq!(now.len(), 19);
        assert_eq!(&now[4..5], "-");
        assert_eq!(&now[10..11], " ");
        assert!(now.starts_with(&current_month()));
    }
}
