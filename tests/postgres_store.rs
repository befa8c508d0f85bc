//! Store behaviour against a real PostgreSQL. Needs `DATABASE_URL`; run with
//! `cargo test -- --ignored`.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use food_shop::auth::Role;
use food_shop::domain::aggregates::{CategoryDraft, Decremented, ProductDraft, SubcategoryDraft};
use food_shop::domain::value_objects::{Amount, MeasurementUnit};
use food_shop::store::{CartStore, CatalogStore, IdentityStore, PageRequest, PgStore};
use food_shop::ShopError;

async fn user(pool: &PgPool, name: &str, role: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, username, email, role) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(name)
        .bind(format!("{}@example.com", name))
        .bind(role)
        .execute(pool)
        .await
        .unwrap();
    id
}

async fn product(store: &PgStore, name: &str, price: i64) -> Uuid {
    let cat = store.ensure_category(CategoryDraft::new("Овощи", None).unwrap()).await.unwrap();
    let sub = store.ensure_subcategory(SubcategoryDraft::new("Корнеплоды", cat.id, None).unwrap()).await.unwrap();
    store
        .ensure_product(ProductDraft::new(name, sub.id, Decimal::new(price, 0), MeasurementUnit::Kg).unwrap())
        .await
        .unwrap()
        .id
}

fn amount(n: i32) -> Amount { Amount::new(n).unwrap() }

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_accumulate_and_totals(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let me = user(&pool, "alice", "user").await;
    let p = product(&store, "Морковь", 100).await;
    let q = product(&store, "Свёкла", 50).await;

    store.add_or_increment(me, p, amount(1)).await.unwrap();
    let line = store.add_or_increment(me, p, amount(2)).await.unwrap();
    assert_eq!(line.amount.value(), 3);
    store.add_or_increment(me, q, amount(2)).await.unwrap();

    let totals = store.totals(me).await.unwrap();
    assert_eq!(totals.total_amount, 5);
    assert_eq!(totals.total_price, Decimal::new(400, 0));
    assert_eq!(totals.product_names, vec!["Морковь".to_string(), "Свёкла".to_string()]);

    assert!(matches!(store.add_or_increment(me, p, amount(998)).await, Err(ShopError::Validation(_))));
    assert_eq!(store.list_lines(me).await.unwrap().iter().find(|l| l.product_id == p).unwrap().amount.value(), 3);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_unknown_product_leaves_no_cart(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let me = user(&pool, "bob", "user").await;
    assert!(matches!(store.add_or_increment(me, Uuid::new_v4(), amount(1)).await, Err(ShopError::NotFound(_))));
    let carts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM carts").fetch_one(&pool).await.unwrap();
    assert_eq!(carts, 0);
    assert_eq!(store.clear(me).await.unwrap(), None);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_decrement_and_clear(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let me = user(&pool, "carol", "user").await;
    let p = product(&store, "Репа", 30).await;
    store.add_or_increment(me, p, amount(4)).await.unwrap();

    assert!(matches!(store.decrement(me, p, amount(5)).await, Err(ShopError::Validation(_))));
    assert!(matches!(store.decrement(me, p, amount(1)).await.unwrap(), Decremented::Reduced { .. }));
    assert!(matches!(store.decrement(me, p, amount(3)).await.unwrap(), Decremented::Removed { .. }));

    store.add_or_increment(me, p, amount(2)).await.unwrap();
    assert_eq!(store.clear(me).await.unwrap(), Some(1));
    assert_eq!(store.clear(me).await.unwrap(), Some(0));
    assert_eq!(store.totals(me).await.unwrap().total_amount, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_concurrent_adds(pool: PgPool) {
    let store = std::sync::Arc::new(PgStore::new(pool.clone()));
    let me = user(&pool, "dave", "user").await;
    let p = product(&store, "Редис", 60).await;

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.add_or_increment(me, p, Amount::new(1).unwrap()).await })
        })
        .collect();
    for t in tasks {
        t.await.unwrap().unwrap();
    }
    assert_eq!(store.list_lines(me).await.unwrap()[0].amount.value(), 20);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_catalog_slugs_and_tokens(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let cat = store.ensure_category(CategoryDraft::new("Овощи", None).unwrap()).await.unwrap();
    let again = store.ensure_category(CategoryDraft::new("Овощи", None).unwrap()).await.unwrap();
    assert_eq!(cat.id, again.id);
    assert_eq!(cat.slug, "ovoschi");

    product(&store, "Лук", 20).await;
    let page = store.list_products(PageRequest::new(Some(1), Some(10), 10)).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].category, "Овощи");

    let admin = user(&pool, "root", "admin").await;
    sqlx::query("INSERT INTO auth_tokens (key, user_id) VALUES ('secret', $1)")
        .bind(admin)
        .execute(&pool)
        .await
        .unwrap();
    let who = store.resolve_token("secret").await.unwrap().unwrap();
    assert_eq!(who.user_id, admin);
    assert_eq!(who.role, Role::Admin);
    assert!(store.resolve_token("nope").await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_slug_collisions_at_length_limit(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    // Each name transliterates to the same 150-char slug ("zh" x 75).
    let names = ["ж".repeat(75), format!("Ж{}", "ж".repeat(74)), format!("ЖЖ{}", "ж".repeat(73))];
    let mut slugs = Vec::new();
    for name in &names {
        slugs.push(store.ensure_category(CategoryDraft::new(name, None).unwrap()).await.unwrap().slug);
    }
    assert_eq!(slugs[0].len(), 150);
    assert!(slugs[1].ends_with("-2") && slugs[1].len() <= 150);
    assert!(slugs[2].ends_with("-3") && slugs[2].len() <= 150);
}
