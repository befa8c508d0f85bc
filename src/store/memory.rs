//! In-process store. One async mutex guards the whole state, so every
//! operation is atomic with respect to every other.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CartStore, CatalogStore, IdentityStore, Page, PageRequest};
use crate::auth::Identity;
use crate::domain::aggregates::{
    Cart, CartLine, CartLineView, CartTotals, Category, CategoryDraft, CategoryView, Decremented,
    Product, ProductDraft, ProductView, Subcategory, SubcategoryDraft, SubcategoryView,
};
use crate::domain::value_objects::{Amount, Reduction, Slug};
use crate::{Result, ShopError};

#[derive(Default)]
struct State {
    categories: Vec<Category>,
    subcategories: Vec<Subcategory>,
    products: Vec<Product>,
    carts: HashMap<Uuid, Cart>,
    lines: Vec<CartLine>,
    tokens: HashMap<String, Identity>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn insert_token(&self, token: impl Into<String>, identity: Identity) {
        self.state.lock().await.tokens.insert(token.into(), identity);
    }

    pub async fn cart_of(&self, user_id: Uuid) -> Option<Cart> {
        self.state.lock().await.carts.get(&user_id).cloned()
    }

    /// Removing a product cascades to every cart line pointing at it.
    pub async fn delete_product(&self, product_id: Uuid) -> bool {
        let mut s = self.state.lock().await;
        let before = s.products.len();
        s.products.retain(|p| p.id != product_id);
        s.lines.retain(|l| l.product_id != product_id);
        s.products.len() != before
    }
}

fn unique_slug<'a>(base: &Slug, taken: impl Iterator<Item = &'a str> + Clone) -> String {
    (1..)
        .map(|n| base.with_suffix(n))
        .find(|candidate| !taken.clone().any(|t| t == candidate.as_str()))
        .map(Slug::into_string)
        .unwrap_or_else(|| base.to_string())
}

fn paginate<T: Clone>(items: &[T], req: PageRequest) -> (Vec<T>, i64) {
    let start = usize::try_from(req.offset()).unwrap_or(usize::MAX);
    let data = items.iter().skip(start).take(req.per_page as usize).cloned().collect();
    (data, items.len() as i64)
}

impl State {
    fn category(&self, id: Uuid) -> Result<&Category> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| ShopError::Internal(format!("dangling category {}", id)))
    }

    fn subcategory(&self, id: Uuid) -> Result<&Subcategory> {
        self.subcategories
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| ShopError::Internal(format!("dangling subcategory {}", id)))
    }

    fn subcategory_view(&self, sub: &Subcategory) -> Result<SubcategoryView> {
        Ok(SubcategoryView::new(sub, self.category(sub.category_id)?))
    }

    fn category_view(&self, category: &Category) -> Result<CategoryView> {
        let mut subcategories: Vec<SubcategoryView> = self
            .subcategories
            .iter()
            .filter(|s| s.category_id == category.id)
            .map(|s| SubcategoryView::new(s, category))
            .collect();
        subcategories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(CategoryView {
            id: category.id,
            name: category.name.clone(),
            slug: category.slug.clone(),
            icon: category.icon.clone(),
            subcategories,
        })
    }

    fn product_view(&self, product: &Product) -> Result<ProductView> {
        let sub = self.subcategory(product.subcategory_id)?;
        Ok(ProductView::new(product, sub, self.category(sub.category_id)?))
    }

    fn line_view(&self, line: &CartLine) -> Result<CartLineView> {
        let product = self
            .products
            .iter()
            .find(|p| p.id == line.product_id)
            .ok_or_else(|| ShopError::Internal(format!("dangling product {}", line.product_id)))?;
        Ok(CartLineView::new(
            line.id,
            product.id,
            product.name.clone(),
            product.price,
            product.measurement_unit,
            line.amount,
            line.created_at,
        ))
    }

    fn cart_id(&self, user_id: Uuid) -> Option<Uuid> { self.carts.get(&user_id).map(|c| c.id) }

    fn user_lines(&self, user_id: Uuid) -> Vec<&CartLine> {
        match self.cart_id(user_id) {
            Some(cart_id) => self.lines.iter().filter(|l| l.cart_id == cart_id).collect(),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_categories(&self, req: PageRequest) -> Result<Page<CategoryView>> {
        let s = self.state.lock().await;
        let mut sorted = s.categories.clone();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        let (page, total) = paginate(&sorted, req);
        let data = page.iter().map(|c| s.category_view(c)).collect::<Result<_>>()?;
        Ok(Page::new(data, total, req))
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<CategoryView>> {
        let s = self.state.lock().await;
        s.categories.iter().find(|c| c.id == id).map(|c| s.category_view(c)).transpose()
    }

    async fn list_subcategories(&self, req: PageRequest) -> Result<Page<SubcategoryView>> {
        let s = self.state.lock().await;
        let mut sorted = s.subcategories.clone();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        let (page, total) = paginate(&sorted, req);
        let data = page.iter().map(|sub| s.subcategory_view(sub)).collect::<Result<_>>()?;
        Ok(Page::new(data, total, req))
    }

    async fn get_subcategory(&self, id: Uuid) -> Result<Option<SubcategoryView>> {
        let s = self.state.lock().await;
        s.subcategories.iter().find(|sub| sub.id == id).map(|sub| s.subcategory_view(sub)).transpose()
    }

    async fn list_products(&self, req: PageRequest) -> Result<Page<ProductView>> {
        let s = self.state.lock().await;
        let mut sorted = s.products.clone();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let (page, total) = paginate(&sorted, req);
        let data = page.iter().map(|p| s.product_view(p)).collect::<Result<_>>()?;
        Ok(Page::new(data, total, req))
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<ProductView>> {
        let s = self.state.lock().await;
        s.products.iter().find(|p| p.id == id).map(|p| s.product_view(p)).transpose()
    }

    async fn ensure_category(&self, draft: CategoryDraft) -> Result<Category> {
        let mut s = self.state.lock().await;
        if let Some(existing) = s.categories.iter().find(|c| c.name == draft.name) {
            return Ok(existing.clone());
        }
        let slug = unique_slug(&draft.slug, s.categories.iter().map(|c| c.slug.as_str()));
        let category = Category { id: Uuid::now_v7(), name: draft.name, slug, icon: draft.icon };
        s.categories.push(category.clone());
        Ok(category)
    }

    async fn ensure_subcategory(&self, draft: SubcategoryDraft) -> Result<Subcategory> {
        let mut s = self.state.lock().await;
        if let Some(existing) = s.subcategories.iter().find(|c| c.name == draft.name) {
            return Ok(existing.clone());
        }
        if !s.categories.iter().any(|c| c.id == draft.category_id) {
            return Err(ShopError::NotFound("category"));
        }
        let slug = unique_slug(&draft.slug, s.subcategories.iter().map(|c| c.slug.as_str()));
        let sub = Subcategory {
            id: Uuid::now_v7(),
            name: draft.name,
            slug,
            icon: draft.icon,
            category_id: draft.category_id,
        };
        s.subcategories.push(sub.clone());
        Ok(sub)
    }

    async fn ensure_product(&self, draft: ProductDraft) -> Result<Product> {
        let mut s = self.state.lock().await;
        if let Some(existing) = s.products.iter().find(|p| p.name == draft.name) {
            return Ok(existing.clone());
        }
        if !s.subcategories.iter().any(|c| c.id == draft.subcategory_id) {
            return Err(ShopError::NotFound("subcategory"));
        }
        let slug = unique_slug(&draft.slug, s.products.iter().map(|p| p.slug.as_str()));
        let product = Product {
            id: Uuid::now_v7(),
            name: draft.name,
            slug,
            price: draft.price.amount(),
            measurement_unit: draft.measurement_unit,
            icons: draft.icons,
            subcategory_id: draft.subcategory_id,
            created_at: Utc::now(),
        };
        s.products.push(product.clone());
        Ok(product)
    }

    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        Ok(self.state.lock().await.categories.iter().find(|c| c.name == name).cloned())
    }

    async fn find_subcategory_by_name(&self, name: &str) -> Result<Option<Subcategory>> {
        Ok(self.state.lock().await.subcategories.iter().find(|c| c.name == name).cloned())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn add_or_increment(&self, user_id: Uuid, product_id: Uuid, amount: Amount) -> Result<CartLineView> {
        let mut s = self.state.lock().await;
        if !s.products.iter().any(|p| p.id == product_id) {
            return Err(ShopError::NotFound("product"));
        }
        let cart_id = s.carts.entry(user_id).or_insert_with(|| Cart::for_user(user_id)).id;
        let idx = match s.lines.iter().position(|l| l.cart_id == cart_id && l.product_id == product_id) {
            Some(idx) => {
                let line = &mut s.lines[idx];
                line.amount = line.amount.accumulate(amount)?;
                idx
            }
            None => {
                s.lines.push(CartLine::new(cart_id, product_id, amount));
                s.lines.len() - 1
            }
        };
        s.line_view(&s.lines[idx])
    }

    async fn decrement(&self, user_id: Uuid, product_id: Uuid, amount: Amount) -> Result<Decremented> {
        let mut s = self.state.lock().await;
        let cart_id = s.cart_id(user_id).ok_or(ShopError::NotFound("cart line"))?;
        let idx = s
            .lines
            .iter()
            .position(|l| l.cart_id == cart_id && l.product_id == product_id)
            .ok_or(ShopError::NotFound("cart line"))?;
        match s.lines[idx].amount.reduce(amount) {
            Reduction::Remaining(rest) => {
                s.lines[idx].amount = rest;
                Ok(Decremented::Reduced { line: s.line_view(&s.lines[idx])? })
            }
            Reduction::Emptied => Ok(Decremented::Removed { line_id: s.lines.remove(idx).id }),
            Reduction::Overdrawn { held } => Err(ShopError::Validation(format!(
                "cannot reduce by {}: only {} in cart",
                amount, held
            ))),
        }
    }

    async fn line_owner(&self, line_id: Uuid) -> Result<Option<Uuid>> {
        let s = self.state.lock().await;
        let Some(line) = s.lines.iter().find(|l| l.id == line_id) else {
            return Ok(None);
        };
        Ok(s.carts.values().find(|c| c.id == line.cart_id).map(|c| c.user_id))
    }

    async fn set_amount(&self, line_id: Uuid, amount: Amount) -> Result<Option<CartLineView>> {
        let mut s = self.state.lock().await;
        let Some(idx) = s.lines.iter().position(|l| l.id == line_id) else {
            return Ok(None);
        };
        s.lines[idx].amount = amount;
        s.line_view(&s.lines[idx]).map(Some)
    }

    async fn remove_line(&self, line_id: Uuid) -> Result<bool> {
        let mut s = self.state.lock().await;
        let before = s.lines.len();
        s.lines.retain(|l| l.id != line_id);
        Ok(s.lines.len() != before)
    }

    async fn clear(&self, user_id: Uuid) -> Result<Option<u64>> {
        let mut s = self.state.lock().await;
        let Some(cart_id) = s.cart_id(user_id) else {
            return Ok(None);
        };
        let before = s.lines.len();
        s.lines.retain(|l| l.cart_id != cart_id);
        Ok(Some((before - s.lines.len()) as u64))
    }

    async fn list_lines(&self, user_id: Uuid) -> Result<Vec<CartLineView>> {
        let s = self.state.lock().await;
        let mut lines = s.user_lines(user_id);
        lines.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        lines.into_iter().map(|l| s.line_view(l)).collect()
    }

    async fn totals(&self, user_id: Uuid) -> Result<CartTotals> {
        let s = self.state.lock().await;
        let products: HashMap<Uuid, &Product> = s.products.iter().map(|p| (p.id, p)).collect();
        let rows = s
            .user_lines(user_id)
            .into_iter()
            .filter_map(|l| products.get(&l.product_id).map(|p| (p.name.as_str(), p.price, l.amount)))
            .collect::<Vec<_>>();
        Ok(CartTotals::fold(rows))
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn resolve_token(&self, token: &str) -> Result<Option<Identity>> {
        Ok(self.state.lock().await.tokens.get(token).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::MeasurementUnit;
    use rust_decimal::Decimal;

    async fn seeded() -> (MemoryStore, Product) {
        let store = MemoryStore::new();
        let cat = store.ensure_category(CategoryDraft::new("Фрукты", None).unwrap()).await.unwrap();
        let sub = store.ensure_subcategory(SubcategoryDraft::new("Ягоды", cat.id, None).unwrap()).await.unwrap();
        let product = store
            .ensure_product(ProductDraft::new("Клубника", sub.id, Decimal::new(100, 0), MeasurementUnit::Kg).unwrap())
            .await
            .unwrap();
        (store, product)
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent_and_slugs_unique() {
        let store = MemoryStore::new();
        let a = store.ensure_category(CategoryDraft::new("Хлеб", None).unwrap()).await.unwrap();
        let again = store.ensure_category(CategoryDraft::new("Хлеб", None).unwrap()).await.unwrap();
        assert_eq!(a.id, again.id);
        let b = store.ensure_category(CategoryDraft::new("Хлеб!", None).unwrap()).await.unwrap();
        assert_eq!(a.slug, "hleb");
        assert_eq!(b.slug, "hleb-2");
    }

    #[tokio::test]
    async fn test_slug_collisions_at_length_limit() {
        let store = MemoryStore::new();
        let names = ["ж".repeat(75), format!("Ж{}", "ж".repeat(74)), format!("ЖЖ{}", "ж".repeat(73))];
        let mut slugs = Vec::new();
        for name in &names {
            slugs.push(store.ensure_category(CategoryDraft::new(name, None).unwrap()).await.unwrap().slug);
        }
        assert_eq!(slugs[0], "zh".repeat(75));
        assert_eq!(slugs[1], format!("{}-2", "zh".repeat(74)));
        assert_eq!(slugs[2], format!("{}-3", "zh".repeat(74)));
    }

    #[tokio::test]
    async fn test_delete_product_cascades_to_lines() {
        let (store, product) = seeded().await;
        let user = Uuid::new_v4();
        store.add_or_increment(user, product.id, Amount::new(2).unwrap()).await.unwrap();
        assert!(store.delete_product(product.id).await);
        assert!(store.list_lines(user).await.unwrap().is_empty());
        assert!(store.cart_of(user).await.is_some());
    }

    #[tokio::test]
    async fn test_overdrawn_decrement_leaves_line_alone() {
        let (store, product) = seeded().await;
        let user = Uuid::new_v4();
        store.add_or_increment(user, product.id, Amount::new(2).unwrap()).await.unwrap();
        let err = store.decrement(user, product.id, Amount::new(3).unwrap()).await.unwrap_err();
        assert!(matches!(err, ShopError::Validation(_)));
        assert_eq!(store.list_lines(user).await.unwrap()[0].amount.value(), 2);
    }
}
