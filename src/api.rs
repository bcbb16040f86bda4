//! The `/api/flavors` routes.

use std::sync::Arc;

use crate::flavor::{FlavorUpdate, NewFlavor, parse_id};
use crate::module::Module;
use crate::response;
use crate::router::{Context, Router};
use crate::store::Store;
use crate::{Error, Result};

const COLLECTION: &str = "/api/flavors";
const MEMBER: &str = "/api/flavors/{id}";

/// CRUD module over a [`Store`] handed in at construction.
pub struct Flavors<S> {
    store: Arc<S>,
}

impl<S: Store> Flavors<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

fn id_param(ctx: &Context) -> Result<i64> {
    parse_id(ctx.require_param("id")?)
}

fn not_found() -> Error {
    Error::NotFound("Flavor".into())
}

impl<S: Store> Module for Flavors<S> {
    fn name(&self) -> &'static str {
        "flavors"
    }

    fn routes(&self, router: &mut Router) {
        let store = Arc::clone(&self.store);
        router.get(COLLECTION, move |_ctx| {
            let store = Arc::clone(&store);
            async move { response::ok(&store.list().await?) }
        });

        let store = Arc::clone(&self.store);
        router.get(MEMBER, move |ctx| {
            let store = Arc::clone(&store);
            async move {
                let id = id_param(&ctx)?;
                let flavor = store.get(id).await?.ok_or_else(not_found)?;
                response::ok(&flavor)
            }
        });

        let store = Arc::clone(&self.store);
        router.post(COLLECTION, move |ctx| {
            let store = Arc::clone(&store);
            async move {
                let new: NewFlavor = ctx.json()?;
                new.validate()?;
                let flavor = store.create(new).await?;
                tracing::debug!(id = flavor.id, "flavor created");
                response::created(&flavor)
            }
        });

        let store = Arc::clone(&self.store);
        router.put(MEMBER, move |ctx| {
            let store = Arc::clone(&store);
            async move {
                let id = id_param(&ctx)?;
                let update: FlavorUpdate = ctx.json()?;
                update.validate()?;
                let flavor = store.update(id, update).await?.ok_or_else(not_found)?;
                response::ok(&flavor)
            }
        });

        let store = Arc::clone(&self.store);
        router.delete(MEMBER, move |ctx| {
            let store = Arc::clone(&store);
            async move {
                let id = id_param(&ctx)?;
                if !store.delete(id).await? {
                    return Err(not_found());
                }
                tracing::debug!(id, "flavor deleted");
                Ok(response::no_content())
            }
        });
    }
}
