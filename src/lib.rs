//! Food Shop
//!
//! Grocery catalog and per-user shopping cart service.
//!
//! ## Features
//! - Read-only catalog: categories, subcategories, products
//! - Shopping cart with accumulate-on-add, reduce, clear
//! - Cart summary computed in a single aggregate pass
//! - Cart events published to NATS when configured

use thiserror::Error;

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod fixtures;
pub mod service;
pub mod store;

pub use config::Config;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum ShopError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("authentication required")]
    Unauthorized,

    #[error("not allowed to modify this cart line")]
    Forbidden,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for ShopError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(m) => m.to_string(),
                    None => format!("invalid value for {}", field),
                })
            })
            .collect();
        messages.sort();
        ShopError::Validation(messages.join("; "))
    }
}

pub type Result<T> = std::result::Result<T, ShopError>;
