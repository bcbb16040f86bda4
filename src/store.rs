//! Flavor persistence.
//!
//! [`Store`] is the seam between the HTTP layer and the database: one method
//! per statement shape. [`SqlStore`] implements it over a single shared
//! libsql connection.

use std::future::Future;

use libsql::{Connection, Database, Row, Value};

use crate::db::TOUCHED;
use crate::flavor::{Flavor, FlavorUpdate, NewFlavor};
use crate::{Error, Result};

/// Storage operations backing the flavors API.
///
/// `get` and `update` return `None` when no row has the id; `delete` returns
/// whether a row was removed.
pub trait Store: Send + Sync + 'static {
    fn list(&self) -> impl Future<Output = Result<Vec<Flavor>>> + Send;

    fn get(&self, id: i64) -> impl Future<Output = Result<Option<Flavor>>> + Send;

    fn create(&self, new: NewFlavor) -> impl Future<Output = Result<Flavor>> + Send;

    fn update(
        &self,
        id: i64,
        update: FlavorUpdate,
    ) -> impl Future<Output = Result<Option<Flavor>>> + Send;

    fn delete(&self, id: i64) -> impl Future<Output = Result<bool>> + Send;
}

const COLUMNS: &str = "id, text, ranking, created_at, updated_at";

/// libsql-backed store sharing one connection across all requests.
pub struct SqlStore {
    // Keeps the database alive for in-memory and embedded backends.
    _db: Database,
    conn: Connection,
}

impl SqlStore {
    /// Open the store's connection on `db`.
    pub fn new(db: Database) -> Result<Self> {
        let conn = crate::db::connection(&db)?;
        Ok(Self { _db: db, conn })
    }

    /// The shared connection, for schema management.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    async fn query_one(&self, sql: &str, params: Vec<Value>) -> Result<Option<Flavor>> {
        let mut rows = self.conn.query(sql, params).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(from_row(&row)?)),
            None => Ok(None),
        }
    }
}

fn from_row(row: &Row) -> Result<Flavor> {
    Ok(Flavor {
        id: row.get(0)?,
        text: row.get(1)?,
        ranking: row.get(2)?,
        created_at: parse_timestamp(row.get(3)?)?,
        updated_at: parse_timestamp(row.get(4)?)?,
    })
}

fn parse_timestamp(raw: String) -> Result<jiff::Timestamp> {
    raw.parse()
        .map_err(|e| Error::Internal(format!("Malformed timestamp {raw:?}: {e}")))
}

impl Store for SqlStore {
    async fn list(&self) -> Result<Vec<Flavor>> {
        let mut rows = self
            .conn
            .query(&format!("SELECT {COLUMNS} FROM flavors"), ())
            .await?;
        let mut flavors = Vec::new();
        while let Some(row) = rows.next().await? {
            flavors.push(from_row(&row)?);
        }
        Ok(flavors)
    }

    async fn get(&self, id: i64) -> Result<Option<Flavor>> {
        self.query_one(
            &format!("SELECT {COLUMNS} FROM flavors WHERE id = ?1"),
            vec![Value::Integer(id)],
        )
        .await
    }

    async fn create(&self, new: NewFlavor) -> Result<Flavor> {
        // Without a ranking the column default applies.
        let (sql, params) = match new.ranking {
            Some(ranking) => (
                format!("INSERT INTO flavors (text, ranking) VALUES (?1, ?2) RETURNING {COLUMNS}"),
                vec![Value::Text(new.text), Value::Integer(ranking)],
            ),
            None => (
                format!("INSERT INTO flavors (text) VALUES (?1) RETURNING {COLUMNS}"),
                vec![Value::Text(new.text)],
            ),
        };
        self.query_one(&sql, params)
            .await?
            .ok_or_else(|| Error::Internal("INSERT returned no row".into()))
    }

    async fn update(&self, id: i64, update: FlavorUpdate) -> Result<Option<Flavor>> {
        self.query_one(
            &format!(
                "UPDATE flavors SET text = ?1, ranking = ?2, updated_at = {TOUCHED} \
                 WHERE id = ?3 RETURNING {COLUMNS}"
            ),
            vec![
                Value::Text(update.text),
                Value::Integer(update.ranking),
                Value::Integer(id),
            ],
        )
        .await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM flavors WHERE id = ?1", vec![Value::Integer(id)])
            .await?;
        Ok(affected > 0)
    }
}
