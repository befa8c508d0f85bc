//! Cart mutation and aggregation service.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use super::publisher::EventPublisher;
use crate::auth::{CartAction, Identity};
use crate::domain::aggregates::{CartLineView, CartSummary, Decremented};
use crate::domain::events::CartEvent;
use crate::domain::value_objects::Amount;
use crate::store::CartStore;
use crate::{Result, ShopError};

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn CartStore>,
    events: EventPublisher,
}

impl CartService {
    pub fn new(store: Arc<dyn CartStore>, events: EventPublisher) -> Self { Self { store, events } }

    #[instrument(skip(self, who), fields(user_id = %who.user_id))]
    pub async fn add_or_increment(&self, who: Identity, product_id: Uuid, amount: i32) -> Result<CartLineView> {
        let amount = Amount::new(amount)?;
        let line = self.store.add_or_increment(who.user_id, product_id, amount).await?;
        info!(line_id = %line.id, amount = %line.amount, "product added to cart");
        self.events
            .publish(CartEvent::LineAdded { user_id: who.user_id, line_id: line.id, product_id, amount: amount.value() })
            .await;
        Ok(line)
    }

    #[instrument(skip(self, who), fields(user_id = %who.user_id))]
    pub async fn decrement(&self, who: Identity, product_id: Uuid, amount: i32) -> Result<Decremented> {
        if amount <= 0 {
            return Err(ShopError::Validation("amount must be positive".into()));
        }
        let amount = Amount::new(amount)?;
        let outcome = self.store.decrement(who.user_id, product_id, amount).await?;
        let line_id = match &outcome {
            Decremented::Reduced { line } => line.id,
            Decremented::Removed { line_id } => *line_id,
        };
        info!(%line_id, removed = matches!(outcome, Decremented::Removed { .. }), "cart line reduced");
        self.events
            .publish(CartEvent::LineReduced { user_id: who.user_id, line_id, product_id, amount: amount.value() })
            .await;
        Ok(outcome)
    }

    #[instrument(skip(self, who), fields(user_id = %who.user_id))]
    pub async fn set_amount(&self, who: Identity, line_id: Uuid, amount: i32) -> Result<CartLineView> {
        let amount = Amount::new(amount)?;
        self.owned_line(CartAction::Update, &who, line_id).await?;
        let line = self.store.set_amount(line_id, amount).await?.ok_or(ShopError::NotFound("cart line"))?;
        info!(%line_id, %amount, "cart line amount set");
        self.events
            .publish(CartEvent::LineAmountSet { user_id: who.user_id, line_id, amount: amount.value() })
            .await;
        Ok(line)
    }

    #[instrument(skip(self, who), fields(user_id = %who.user_id))]
    pub async fn remove(&self, who: Identity, line_id: Uuid) -> Result<Uuid> {
        self.owned_line(CartAction::Delete, &who, line_id).await?;
        if !self.store.remove_line(line_id).await? {
            return Err(ShopError::NotFound("cart line"));
        }
        info!(%line_id, "cart line removed");
        self.events.publish(CartEvent::LineRemoved { user_id: who.user_id, line_id }).await;
        Ok(line_id)
    }

    #[instrument(skip(self, who), fields(user_id = %who.user_id))]
    pub async fn clear(&self, who: Identity) -> Result<u64> {
        let removed = self.store.clear(who.user_id).await?.ok_or(ShopError::NotFound("cart"))?;
        info!(removed, "cart cleared");
        self.events.publish(CartEvent::CartCleared { user_id: who.user_id, removed }).await;
        Ok(removed)
    }

    pub async fn list_lines(&self, who: Identity) -> Result<Vec<CartLineView>> {
        self.store.list_lines(who.user_id).await
    }

    pub async fn summarize(&self, who: Identity) -> Result<CartSummary> {
        Ok(self.store.totals(who.user_id).await?.into())
    }

    async fn owned_line(&self, action: CartAction, who: &Identity, line_id: Uuid) -> Result<()> {
        let owner = self.store.line_owner(line_id).await?.ok_or(ShopError::NotFound("cart line"))?;
        action.check_owner(who, owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{CategoryDraft, Product, ProductDraft, SubcategoryDraft};
    use crate::domain::value_objects::MeasurementUnit;
    use crate::store::{CatalogStore, MemoryStore};
    use rust_decimal::Decimal;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: CartService,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let service = CartService::new(store.clone(), EventPublisher::disabled());
            Self { store, service }
        }

        async fn product(&self, name: &str, price: i64) -> Product {
            let cat = self.store.ensure_category(CategoryDraft::new("Продукты", None).unwrap()).await.unwrap();
            let sub = self.store.ensure_subcategory(SubcategoryDraft::new("Разное", cat.id, None).unwrap()).await.unwrap();
            self.store
                .ensure_product(ProductDraft::new(name, sub.id, Decimal::new(price, 0), MeasurementUnit::Pcs).unwrap())
                .await
                .unwrap()
        }
    }

    fn user() -> Identity { Identity::user(Uuid::new_v4()) }

    #[tokio::test]
    async fn test_add_twice_accumulates() {
        let f = Fixture::new();
        let p = f.product("Чернослив", 100).await;
        let me = user();
        f.service.add_or_increment(me, p.id, 3).await.unwrap();
        let line = f.service.add_or_increment(me, p.id, 4).await.unwrap();
        assert_eq!(line.amount.value(), 7);
        assert_eq!(line.total_price, Decimal::new(700, 0));
        assert_eq!(f.service.list_lines(me).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_accumulate_past_ceiling_rejected() {
        let f = Fixture::new();
        let p = f.product("Соль", 10).await;
        let me = user();
        f.service.add_or_increment(me, p.id, 999).await.unwrap();
        assert!(matches!(f.service.add_or_increment(me, p.id, 2).await, Err(ShopError::Validation(_))));
        assert_eq!(f.service.list_lines(me).await.unwrap()[0].amount.value(), 999);
    }

    #[tokio::test]
    async fn test_unknown_product_creates_nothing() {
        let f = Fixture::new();
        let me = user();
        let err = f.service.add_or_increment(me, Uuid::new_v4(), 1).await.unwrap_err();
        assert!(matches!(err, ShopError::NotFound("product")));
        assert!(f.store.cart_of(me.user_id).await.is_none());
    }

    #[tokio::test]
    async fn test_amount_out_of_range() {
        let f = Fixture::new();
        let p = f.product("Сахар", 80).await;
        assert!(matches!(f.service.add_or_increment(user(), p.id, 0).await, Err(ShopError::Validation(_))));
        assert!(matches!(f.service.add_or_increment(user(), p.id, 1001).await, Err(ShopError::Validation(_))));
    }

    #[tokio::test]
    async fn test_summary_totals() {
        let f = Fixture::new();
        let p = f.product("P", 100).await;
        let q = f.product("Q", 50).await;
        let me = user();
        f.service.add_or_increment(me, p.id, 3).await.unwrap();
        f.service.add_or_increment(me, q.id, 2).await.unwrap();
        let summary = f.service.summarize(me).await.unwrap();
        assert_eq!(summary.total_amount, 5);
        assert_eq!(summary.total_price, "400.00 рублей");
        assert_eq!(summary.products, "P, Q");
    }

    #[tokio::test]
    async fn test_empty_summary() {
        let f = Fixture::new();
        let summary = f.service.summarize(user()).await.unwrap();
        assert_eq!(summary.total_amount, 0);
        assert_eq!(summary.total_price, "0.00 рублей");
    }

    #[tokio::test]
    async fn test_decrement_policy() {
        let f = Fixture::new();
        let p = f.product("Кефир", 90).await;
        let me = user();
        f.service.add_or_increment(me, p.id, 5).await.unwrap();

        assert!(matches!(f.service.decrement(me, p.id, 0).await, Err(ShopError::Validation(m)) if m == "amount must be positive"));
        assert!(matches!(f.service.decrement(me, p.id, -3).await, Err(ShopError::Validation(_))));
        assert!(matches!(f.service.decrement(me, p.id, 6).await, Err(ShopError::Validation(_))));

        match f.service.decrement(me, p.id, 2).await.unwrap() {
            Decremented::Reduced { line } => assert_eq!(line.amount.value(), 3),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(f.service.decrement(me, p.id, 3).await.unwrap(), Decremented::Removed { .. }));
        assert!(f.service.list_lines(me).await.unwrap().is_empty());
        assert!(matches!(f.service.decrement(me, p.id, 1).await, Err(ShopError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_clear_keeps_cart() {
        let f = Fixture::new();
        let p = f.product("Хлеб", 40).await;
        let me = user();
        assert!(matches!(f.service.clear(me).await, Err(ShopError::NotFound("cart"))));
        f.service.add_or_increment(me, p.id, 2).await.unwrap();
        assert_eq!(f.service.clear(me).await.unwrap(), 1);
        assert!(f.service.list_lines(me).await.unwrap().is_empty());
        assert!(f.store.cart_of(me.user_id).await.is_some());
        assert_eq!(f.service.clear(me).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_and_remove_require_owner_or_admin() {
        let f = Fixture::new();
        let p = f.product("Масло", 200).await;
        let owner = user();
        let line = f.service.add_or_increment(owner, p.id, 1).await.unwrap();

        assert!(matches!(f.service.set_amount(user(), line.id, 9).await, Err(ShopError::Forbidden)));
        assert!(matches!(f.service.remove(user(), line.id).await, Err(ShopError::Forbidden)));

        let admin = Identity::admin(Uuid::new_v4());
        assert_eq!(f.service.set_amount(admin, line.id, 9).await.unwrap().amount.value(), 9);
        assert_eq!(f.service.remove(owner, line.id).await.unwrap(), line.id);
        assert!(matches!(f.service.remove(owner, line.id).await, Err(ShopError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_adds_do_not_lose_updates() {
        let f = Fixture::new();
        let p = f.product("Яблоки", 120).await;
        let me = user();
        let (service, product_id) = (f.service.clone(), p.id);
        let tasks: Vec<_> = (0..50)
            .map(move |_| {
                let service = service.clone();
                tokio::spawn(async move { service.add_or_increment(me, product_id, 1).await })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        assert_eq!(f.service.list_lines(me).await.unwrap()[0].amount.value(), 50);
    }
}
