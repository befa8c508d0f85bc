//! HTTP surface: catalog browsing and the authenticated cart resource.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    routing::{get, post, put},
    Json, Router,
};
use serde::de::DeserializeOwned;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use validator::Validate;

use crate::service::{CartService, EventPublisher};
use crate::store::{CartStore, CatalogStore, IdentityStore};
use crate::ShopError;

pub mod cart;
pub mod catalog;
pub mod error;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub identities: Arc<dyn IdentityStore>,
    pub cart: CartService,
    pub page_size: u32,
}

impl AppState {
    pub fn new<S>(store: Arc<S>, events: EventPublisher, page_size: u32) -> Self
    where
        S: CatalogStore + CartStore + IdentityStore + 'static,
    {
        Self {
            catalog: store.clone(),
            identities: store.clone(),
            cart: CartService::new(store, events),
            page_size,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/categories", get(catalog::list_categories))
        .route("/categories/:id", get(catalog::get_category))
        .route("/subcategories", get(catalog::list_subcategories))
        .route("/subcategories/:id", get(catalog::get_subcategory))
        .route("/products", get(catalog::list_products))
        .route("/products/:id", get(catalog::get_product))
        .route("/cart/lines", get(cart::list_lines).post(cart::create_line))
        .route("/cart/lines/:id", put(cart::update_line).delete(cart::delete_line))
        .route("/cart/summary", get(cart::summary))
        .route("/cart/reduce", post(cart::reduce))
        .route("/cart/clear", axum::routing::delete(cart::clear));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "food-shop"}))
}

/// Unwraps a JSON body and runs its `validator` rules.
pub(crate) fn valid_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ShopError>
where
    T: DeserializeOwned + Validate,
{
    let Json(value) = body.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "rejected request body");
        ShopError::Validation("malformed request body".into())
    })?;
    value.validate()?;
    Ok(value)
}

pub(crate) fn valid_path<T>(path: Result<Path<T>, PathRejection>) -> Result<T, ShopError> {
    let Path(value) = path.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "rejected request path");
        ShopError::Validation("malformed request path".into())
    })?;
    Ok(value)
}

pub(crate) fn valid_query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ShopError> {
    let Query(value) = query.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "rejected query string");
        ShopError::Validation("malformed query".into())
    })?;
    Ok(value)
}
