//! Flavors - a small JSON CRUD service over a single `flavors` table.
//!
//! - **Config**: Layered configuration (file → env → CLI)
//! - **Database**: libsql/Turso connection plus explicit migrate/reset/seed steps
//! - **Store**: The [`Store`] trait and its libsql implementation
//! - **Router**: HTTP routing with path parameters
//! - **Server**: Hyper-based HTTP server
//! - **Api**: The `/api/flavors` module
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use flavors::{Flavors, Loader, Module, Router, SqlStore};
//!
//! #[tokio::main]
//! async fn main() -> flavors::Result<()> {
//!     let config = Loader::default().load(None, Default::default())?;
//!
//!     let store = SqlStore::new(flavors::db::connect(&config.database.url).await?)?;
//!     flavors::db::migrate(store.connection()).await?;
//!
//!     let mut router = Router::new();
//!     Flavors::new(Arc::new(store)).routes(&mut router);
//!
//!     flavors::server::run(config, router.into_handle()).await
//! }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod flavor;
pub mod module;
pub mod response;
pub mod router;
pub mod server;
pub mod store;

// Re-export main types at crate root
pub use api::Flavors;
pub use config::{Config, Loader};
pub use error::{Error, Result};
pub use flavor::{Flavor, FlavorUpdate, NewFlavor};
pub use module::Module;
pub use router::{Context, Router};
pub use store::{SqlStore, Store};
