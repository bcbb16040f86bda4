//! Database connection and schema management.
//!
//! Supports multiple backends:
//! - Local SQLite file: `path/to/db.sqlite` or `file:path` or `sqlite://path`
//! - In-memory: `:memory:`
//! - Remote Turso: `libsql://...` or `https://...` (requires TURSO_AUTH_TOKEN env var)
//!
//! [`migrate`] is idempotent and runs before every `serve`. [`reset`] and
//! [`seed`] are destructive or data-changing and only run when asked for.

use libsql::{Builder, Connection, Database};
use tracing::info;

/// Ranking stored when a flavor is created without one.
pub const DEFAULT_RANKING: i64 = 3;

/// SQL expression producing the current UTC time as an RFC 3339 string with
/// millisecond precision.
pub(crate) const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// SQL expression for a refreshed `updated_at`: the current time, or one
/// millisecond past the stored value when the clock has not moved beyond it.
pub(crate) const TOUCHED: &str = "CASE WHEN strftime('%Y-%m-%dT%H:%M:%fZ', 'now') > updated_at \
     THEN strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
     ELSE strftime('%Y-%m-%dT%H:%M:%fZ', updated_at, '+0.001 seconds') END";

/// Connect to the database.
///
/// # URL formats
/// - Local file: `flavors.db`, `file:path/to/db.sqlite`, `sqlite://path`
/// - In-memory: `:memory:`
/// - Remote Turso: `libsql://your-db.turso.io` (requires `TURSO_AUTH_TOKEN` env var)
pub async fn connect(url: &str) -> crate::Result<Database> {
    let db = if url.starts_with("libsql://") || url.starts_with("https://") {
        let token = std::env::var("TURSO_AUTH_TOKEN").map_err(|_| {
            crate::Error::Config("TURSO_AUTH_TOKEN not set for remote database".into())
        })?;
        Builder::new_remote(url.to_string(), token).build().await?
    } else if url == ":memory:" {
        Builder::new_local(":memory:").build().await?
    } else {
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("file:"))
            .unwrap_or(url);
        Builder::new_local(path).build().await?
    };

    Ok(db)
}

/// Get a connection from the database.
pub fn connection(db: &Database) -> crate::Result<Connection> {
    Ok(db.connect()?)
}

fn create_table_sql() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS flavors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text TEXT NOT NULL,
            ranking INTEGER NOT NULL DEFAULT {DEFAULT_RANKING},
            created_at TEXT NOT NULL DEFAULT ({NOW}),
            updated_at TEXT NOT NULL DEFAULT ({NOW})
        )"
    )
}

/// Create the `flavors` table if it does not exist yet.
pub async fn migrate(conn: &Connection) -> crate::Result<()> {
    conn.execute(&create_table_sql(), ()).await?;
    info!("flavors table ready");
    Ok(())
}

/// Drop the `flavors` table and recreate it empty. Destroys all rows.
pub async fn reset(conn: &Connection) -> crate::Result<()> {
    conn.execute("DROP TABLE IF EXISTS flavors", ()).await?;
    info!("flavors table dropped");
    migrate(conn).await
}

/// Insert the three sample flavors.
pub async fn seed(conn: &Connection) -> crate::Result<()> {
    conn.execute_batch(
        "INSERT INTO flavors (text, ranking) VALUES ('pickle', 5);
         INSERT INTO flavors (text) VALUES ('bread');
         INSERT INTO flavors (text, ranking) VALUES ('yellow', 1);",
    )
    .await?;
    info!("seeded flavors table");
    Ok(())
}
