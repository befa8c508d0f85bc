//! Storage seams. Every cart mutation is a single atomic unit inside the
//! implementation; callers never compose read-then-write sequences.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Identity;
use crate::domain::aggregates::{
    CartLineView, CartTotals, Category, CategoryDraft, CategoryView, Decremented, Product,
    ProductDraft, ProductView, Subcategory, SubcategoryDraft, SubcategoryView,
};
use crate::domain::value_objects::Amount;
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(default_per_page).clamp(1, crate::Config::MAX_PAGE_SIZE),
        }
    }

    pub fn limit(&self) -> i64 { i64::from(self.per_page) }
    pub fn offset(&self) -> i64 { i64::from(self.page - 1) * i64::from(self.per_page) }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, req: PageRequest) -> Self {
        Self { data, total, page: req.page, per_page: req.per_page }
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_categories(&self, page: PageRequest) -> Result<Page<CategoryView>>;
    async fn get_category(&self, id: Uuid) -> Result<Option<CategoryView>>;
    async fn list_subcategories(&self, page: PageRequest) -> Result<Page<SubcategoryView>>;
    async fn get_subcategory(&self, id: Uuid) -> Result<Option<SubcategoryView>>;
    async fn list_products(&self, page: PageRequest) -> Result<Page<ProductView>>;
    async fn get_product(&self, id: Uuid) -> Result<Option<ProductView>>;

    // Get-or-create by name, used by fixture import.
    async fn ensure_category(&self, draft: CategoryDraft) -> Result<Category>;
    async fn ensure_subcategory(&self, draft: SubcategoryDraft) -> Result<Subcategory>;
    async fn ensure_product(&self, draft: ProductDraft) -> Result<Product>;
    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>>;
    async fn find_subcategory_by_name(&self, name: &str) -> Result<Option<Subcategory>>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Get-or-create the cart and the line, accumulating into an existing line.
    async fn add_or_increment(&self, user_id: Uuid, product_id: Uuid, amount: Amount) -> Result<CartLineView>;
    async fn decrement(&self, user_id: Uuid, product_id: Uuid, amount: Amount) -> Result<Decremented>;
    async fn line_owner(&self, line_id: Uuid) -> Result<Option<Uuid>>;
    async fn set_amount(&self, line_id: Uuid, amount: Amount) -> Result<Option<CartLineView>>;
    async fn remove_line(&self, line_id: Uuid) -> Result<bool>;
    /// `None` when the user never had a cart.
    async fn clear(&self, user_id: Uuid) -> Result<Option<u64>>;
    async fn list_lines(&self, user_id: Uuid) -> Result<Vec<CartLineView>>;
    async fn totals(&self, user_id: Uuid) -> Result<CartTotals>;
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn resolve_token(&self, token: &str) -> Result<Option<Identity>>;
}
