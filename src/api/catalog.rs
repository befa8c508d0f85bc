//! Read-only catalog endpoints; no authentication.

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{valid_path, valid_query, AppState};
use crate::domain::aggregates::{CategoryView, ProductView, SubcategoryView};
use crate::store::{Page, PageRequest};
use crate::{Result, ShopError};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListParams {
    fn resolve(&self, default_per_page: u32) -> PageRequest { PageRequest::new(self.page, self.per_page, default_per_page) }
}

type IdPath = std::result::Result<Path<Uuid>, PathRejection>;
type ListQuery = std::result::Result<Query<ListParams>, QueryRejection>;

pub async fn list_categories(State(s): State<AppState>, params: ListQuery) -> Result<Json<Page<CategoryView>>> {
    let p = valid_query(params)?;
    Ok(Json(s.catalog.list_categories(p.resolve(s.page_size)).await?))
}

pub async fn get_category(State(s): State<AppState>, id: IdPath) -> Result<Json<CategoryView>> {
    let id = valid_path(id)?;
    s.catalog.get_category(id).await?.map(Json).ok_or(ShopError::NotFound("category"))
}

pub async fn list_subcategories(State(s): State<AppState>, params: ListQuery) -> Result<Json<Page<SubcategoryView>>> {
    let p = valid_query(params)?;
    Ok(Json(s.catalog.list_subcategories(p.resolve(s.page_size)).await?))
}

pub async fn get_subcategory(State(s): State<AppState>, id: IdPath) -> Result<Json<SubcategoryView>> {
    let id = valid_path(id)?;
    s.catalog.get_subcategory(id).await?.map(Json).ok_or(ShopError::NotFound("subcategory"))
}

pub async fn list_products(State(s): State<AppState>, params: ListQuery) -> Result<Json<Page<ProductView>>> {
    let p = valid_query(params)?;
    Ok(Json(s.catalog.list_products(p.resolve(s.page_size)).await?))
}

pub async fn get_product(State(s): State<AppState>, id: IdPath) -> Result<Json<ProductView>> {
    let id = valid_path(id)?;
    s.catalog.get_product(id).await?.map(Json).ok_or(ShopError::NotFound("product"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_resolution() {
        let req = ListParams::default().resolve(10);
        assert_eq!((req.page, req.per_page, req.offset()), (1, 10, 0));
        let req = ListParams { page: Some(3), per_page: Some(500) }.resolve(10);
        assert_eq!((req.page, req.per_page, req.offset()), (3, 100, 200));
        let req = ListParams { page: Some(0), per_page: Some(0) }.resolve(10);
        assert_eq!((req.page, req.per_page), (1, 1));
    }
}
