//! The flavor record and its request bodies.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A labeled, ranked row of the `flavors` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    pub id: i64,
    pub text: String,
    pub ranking: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Body of `POST /api/flavors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFlavor {
    pub text: String,
    /// Left to the store's default when absent.
    #[serde(default)]
    pub ranking: Option<i64>,
}

/// Body of `PUT /api/flavors/{id}`. Replaces both fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlavorUpdate {
    pub text: String,
    pub ranking: i64,
}

impl NewFlavor {
    pub fn validate(&self) -> Result<()> {
        validate_text(&self.text)
    }
}

impl FlavorUpdate {
    pub fn validate(&self) -> Result<()> {
        validate_text(&self.text)
    }
}

fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::BadRequest("text must not be empty".into()));
    }
    Ok(())
}

/// Parse a flavor id from a path segment.
pub fn parse_id(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| Error::BadRequest(format!("Invalid flavor id: {raw}")))
}
