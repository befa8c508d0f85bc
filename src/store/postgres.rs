//! PostgreSQL store. Cart mutations run inside one transaction each; the
//! add path increments server-side so concurrent adds never lose updates.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{CartStore, CatalogStore, IdentityStore, Page, PageRequest};
use crate::auth::{Identity, Role};
use crate::domain::aggregates::{
    CartLineView, CartTotals, Category, CategoryDraft, CategoryView, Decremented, Product,
    ProductDraft, ProductIcons, ProductView, Subcategory, SubcategoryDraft, SubcategoryView,
};
use crate::domain::value_objects::{Amount, MeasurementUnit, Reduction, Slug};
use crate::{Result, ShopError};

const SUBCATEGORY_SELECT: &str = "SELECT s.id, s.name, s.slug, s.icon, s.category_id, c.name AS category_name \
     FROM subcategories s JOIN categories c ON c.id = s.category_id";

const PRODUCT_SELECT: &str = "SELECT p.id, p.name, p.slug, p.price, p.measurement_unit, \
     p.icon_small, p.icon_middle, p.icon_big, p.created_at, \
     s.id AS sub_id, s.name AS sub_name, s.slug AS sub_slug, s.icon AS sub_icon, c.name AS category_name \
     FROM products p JOIN subcategories s ON s.id = p.subcategory_id JOIN categories c ON c.id = s.category_id";

const LINE_SELECT: &str = "SELECT l.id, l.product_id, p.name AS product_name, p.price, p.measurement_unit, l.amount, l.created_at \
     FROM cart_lines l JOIN carts c ON c.id = l.cart_id JOIN products p ON p.id = l.product_id";

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow { id: Uuid, name: String, slug: String, icon: Option<String> }

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self { Category { id: r.id, name: r.name, slug: r.slug, icon: r.icon } }
}

#[derive(Debug, sqlx::FromRow)]
struct SubcategoryRow { id: Uuid, name: String, slug: String, icon: Option<String>, category_id: Uuid, category_name: String }

impl SubcategoryRow {
    fn into_view(self) -> SubcategoryView {
        SubcategoryView { id: self.id, name: self.name, slug: self.slug, category: self.category_name, icon: self.icon }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid, name: String, slug: String, price: Decimal, measurement_unit: String,
    icon_small: Option<String>, icon_middle: Option<String>, icon_big: Option<String>, created_at: DateTime<Utc>,
    sub_id: Uuid, sub_name: String, sub_slug: String, sub_icon: Option<String>, category_name: String,
}

impl ProductRow {
    fn into_view(self) -> Result<ProductView> {
        Ok(ProductView {
            id: self.id,
            name: self.name,
            slug: self.slug,
            subcategory: SubcategoryView {
                id: self.sub_id,
                name: self.sub_name,
                slug: self.sub_slug,
                category: self.category_name.clone(),
                icon: self.sub_icon,
            },
            price: self.price,
            measurement_unit: unit(&self.measurement_unit)?,
            icons: ProductIcons { icon_small: self.icon_small, icon_middle: self.icon_middle, icon_big: self.icon_big },
            category: self.category_name,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    id: Uuid, product_id: Uuid, product_name: String, price: Decimal,
    measurement_unit: String, amount: i32, created_at: DateTime<Utc>,
}

impl LineRow {
    fn into_view(self) -> Result<CartLineView> {
        Ok(CartLineView::new(
            self.id,
            self.product_id,
            self.product_name,
            self.price,
            unit(&self.measurement_unit)?,
            stored_amount(self.amount)?,
            self.created_at,
        ))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TotalsRow { total_amount: i64, total_price: Decimal, product_names: Vec<String> }

fn unit(raw: &str) -> Result<MeasurementUnit> {
    raw.parse().map_err(|_| ShopError::Internal(format!("unexpected measurement unit {:?} in store", raw)))
}

fn stored_amount(raw: i32) -> Result<Amount> {
    Amount::new(raw).map_err(|_| ShopError::Internal(format!("stored cart line amount {} out of range", raw)))
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    async fn subcategories_of(&self, category_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<SubcategoryView>>> {
        let rows = sqlx::query_as::<_, SubcategoryRow>(&format!(
            "{} WHERE s.category_id = ANY($1) ORDER BY s.name",
            SUBCATEGORY_SELECT
        ))
        .bind(category_ids)
        .fetch_all(&self.pool)
        .await?;
        let mut grouped: HashMap<Uuid, Vec<SubcategoryView>> = HashMap::new();
        for row in rows {
            grouped.entry(row.category_id).or_default().push(row.into_view());
        }
        Ok(grouped)
    }

    /// First of `base`, `base-2`, `base-3`... not yet used in `table`.
    /// Candidates are matched exactly; near the length limit the suffixed
    /// forms truncate `base`.
    async fn free_slug(&self, table: &'static str, base: &Slug) -> Result<String> {
        const BATCH: u32 = 32;
        let mut from = 1;
        loop {
            let candidates: Vec<String> = (from..from + BATCH).map(|n| base.with_suffix(n).into_string()).collect();
            let taken: HashSet<String> =
                sqlx::query_scalar::<_, String>(&format!("SELECT slug FROM {} WHERE slug = ANY($1)", table))
                    .bind(&candidates)
                    .fetch_all(&self.pool)
                    .await?
                    .into_iter()
                    .collect();
            if let Some(free) = candidates.into_iter().find(|c| !taken.contains(c)) {
                return Ok(free);
            }
            from += BATCH;
        }
    }

    async fn line_view(tx: &mut Transaction<'_, Postgres>, line_id: Uuid) -> Result<CartLineView> {
        sqlx::query_as::<_, LineRow>(&format!("{} WHERE l.id = $1", LINE_SELECT))
            .bind(line_id)
            .fetch_one(&mut **tx)
            .await?
            .into_view()
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_categories(&self, req: PageRequest) -> Result<Page<CategoryView>> {
        let rows = sqlx::query_as::<_, CategoryRow>("SELECT id, name, slug, icon FROM categories ORDER BY name, id LIMIT $1 OFFSET $2")
            .bind(req.limit())
            .bind(req.offset())
            .fetch_all(&self.pool)
            .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories").fetch_one(&self.pool).await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut subs = self.subcategories_of(&ids).await?;
        let data = rows
            .into_iter()
            .map(|r| CategoryView {
                subcategories: subs.remove(&r.id).unwrap_or_default(),
                id: r.id,
                name: r.name,
                slug: r.slug,
                icon: r.icon,
            })
            .collect();
        Ok(Page::new(data, total, req))
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<CategoryView>> {
        let Some(row) = sqlx::query_as::<_, CategoryRow>("SELECT id, name, slug, icon FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };
        let mut subs = self.subcategories_of(&[id]).await?;
        Ok(Some(CategoryView {
            subcategories: subs.remove(&id).unwrap_or_default(),
            id: row.id,
            name: row.name,
            slug: row.slug,
            icon: row.icon,
        }))
    }

    async fn list_subcategories(&self, req: PageRequest) -> Result<Page<SubcategoryView>> {
        let rows = sqlx::query_as::<_, SubcategoryRow>(&format!("{} ORDER BY s.name LIMIT $1 OFFSET $2", SUBCATEGORY_SELECT))
            .bind(req.limit())
            .bind(req.offset())
            .fetch_all(&self.pool)
            .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subcategories").fetch_one(&self.pool).await?;
        Ok(Page::new(rows.into_iter().map(SubcategoryRow::into_view).collect(), total, req))
    }

    async fn get_subcategory(&self, id: Uuid) -> Result<Option<SubcategoryView>> {
        let row = sqlx::query_as::<_, SubcategoryRow>(&format!("{} WHERE s.id = $1", SUBCATEGORY_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(SubcategoryRow::into_view))
    }

    async fn list_products(&self, req: PageRequest) -> Result<Page<ProductView>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "{} ORDER BY p.created_at DESC, p.id DESC LIMIT $1 OFFSET $2",
            PRODUCT_SELECT
        ))
        .bind(req.limit())
        .bind(req.offset())
        .fetch_all(&self.pool)
        .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products").fetch_one(&self.pool).await?;
        let data = rows.into_iter().map(ProductRow::into_view).collect::<Result<_>>()?;
        Ok(Page::new(data, total, req))
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<ProductView>> {
        sqlx::query_as::<_, ProductRow>(&format!("{} WHERE p.id = $1", PRODUCT_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(ProductRow::into_view)
            .transpose()
    }

    async fn ensure_category(&self, draft: CategoryDraft) -> Result<Category> {
        if let Some(existing) = self.find_category_by_name(&draft.name).await? {
            return Ok(existing);
        }
        let slug = self.free_slug("categories", &draft.slug).await?;
        let row = sqlx::query_as::<_, CategoryRow>(
            "INSERT INTO categories (id, name, slug, icon) VALUES ($1, $2, $3, $4) RETURNING id, name, slug, icon",
        )
        .bind(Uuid::now_v7())
        .bind(&draft.name)
        .bind(&slug)
        .bind(&draft.icon)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(category = %row.name, slug = %row.slug, "category created");
        Ok(row.into())
    }

    async fn ensure_subcategory(&self, draft: SubcategoryDraft) -> Result<Subcategory> {
        if let Some(existing) = self.find_subcategory_by_name(&draft.name).await? {
            return Ok(existing);
        }
        let parent: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)")
            .bind(draft.category_id)
            .fetch_one(&self.pool)
            .await?;
        if !parent {
            return Err(ShopError::NotFound("category"));
        }
        let slug = self.free_slug("subcategories", &draft.slug).await?;
        let id = Uuid::now_v7();
        sqlx::query("INSERT INTO subcategories (id, name, slug, icon, category_id) VALUES ($1, $2, $3, $4, $5)")
            .bind(id)
            .bind(&draft.name)
            .bind(&slug)
            .bind(&draft.icon)
            .bind(draft.category_id)
            .execute(&self.pool)
            .await?;
        tracing::info!(subcategory = %draft.name, %slug, "subcategory created");
        Ok(Subcategory { id, name: draft.name, slug, icon: draft.icon, category_id: draft.category_id })
    }

    async fn ensure_product(&self, draft: ProductDraft) -> Result<Product> {
        let existing: Option<Uuid> = sqlx::query_scalar("SELECT id FROM products WHERE name = $1")
            .bind(&draft.name)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(id) = existing {
            let view = self.get_product(id).await?.ok_or(ShopError::NotFound("product"))?;
            return Ok(Product {
                id: view.id,
                name: view.name,
                slug: view.slug,
                price: view.price,
                measurement_unit: view.measurement_unit,
                icons: view.icons,
                subcategory_id: view.subcategory.id,
                created_at: view.created_at,
            });
        }
        let parent: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM subcategories WHERE id = $1)")
            .bind(draft.subcategory_id)
            .fetch_one(&self.pool)
            .await?;
        if !parent {
            return Err(ShopError::NotFound("subcategory"));
        }
        let slug = self.free_slug("products", &draft.slug).await?;
        let id = Uuid::now_v7();
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            "INSERT INTO products (id, name, slug, price, measurement_unit, icon_small, icon_middle, icon_big, subcategory_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW()) RETURNING created_at",
        )
        .bind(id)
        .bind(&draft.name)
        .bind(&slug)
        .bind(draft.price.amount())
        .bind(draft.measurement_unit.as_str())
        .bind(&draft.icons.icon_small)
        .bind(&draft.icons.icon_middle)
        .bind(&draft.icons.icon_big)
        .bind(draft.subcategory_id)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(product = %draft.name, %slug, "product created");
        Ok(Product {
            id,
            name: draft.name,
            slug,
            price: draft.price.amount(),
            measurement_unit: draft.measurement_unit,
            icons: draft.icons,
            subcategory_id: draft.subcategory_id,
            created_at,
        })
    }

    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT id, name, slug, icon FROM categories WHERE name = $1 ORDER BY id LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Category::from))
    }

    async fn find_subcategory_by_name(&self, name: &str) -> Result<Option<Subcategory>> {
        let row = sqlx::query_as::<_, SubcategoryRow>(&format!("{} WHERE s.name = $1", SUBCATEGORY_SELECT))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Subcategory { id: r.id, name: r.name, slug: r.slug, icon: r.icon, category_id: r.category_id }))
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn add_or_increment(&self, user_id: Uuid, product_id: Uuid, amount: Amount) -> Result<CartLineView> {
        let mut tx = self.pool.begin().await?;

        let product: Option<(String, Decimal, String)> =
            sqlx::query_as("SELECT name, price, measurement_unit FROM products WHERE id = $1")
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((name, price, measurement_unit)) = product else {
            return Err(ShopError::NotFound("product"));
        };

        // Upsert that always yields the cart id and row-locks the cart for this transaction.
        let cart_id: Uuid = sqlx::query_scalar(
            "INSERT INTO carts (id, user_id, created_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id RETURNING id",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let line: Option<(Uuid, i32, DateTime<Utc>)> = sqlx::query_as(
            "INSERT INTO cart_lines (id, cart_id, product_id, amount, created_at) VALUES ($1, $2, $3, $4, NOW()) \
             ON CONFLICT (cart_id, product_id) DO UPDATE SET amount = cart_lines.amount + EXCLUDED.amount \
             WHERE cart_lines.amount + EXCLUDED.amount <= $5 \
             RETURNING id, amount, created_at",
        )
        .bind(Uuid::now_v7())
        .bind(cart_id)
        .bind(product_id)
        .bind(amount.value())
        .bind(Amount::MAX)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((line_id, total, created_at)) = line else {
            return Err(ShopError::Validation(format!("cart line cannot hold more than {}", Amount::MAX)));
        };

        tx.commit().await?;
        Ok(CartLineView::new(line_id, product_id, name, price, unit(&measurement_unit)?, stored_amount(total)?, created_at))
    }

    async fn decrement(&self, user_id: Uuid, product_id: Uuid, amount: Amount) -> Result<Decremented> {
        let mut tx = self.pool.begin().await?;
        let held: Option<(Uuid, i32)> = sqlx::query_as(
            "SELECT l.id, l.amount FROM cart_lines l JOIN carts c ON c.id = l.cart_id \
             WHERE c.user_id = $1 AND l.product_id = $2 FOR UPDATE OF l",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((line_id, held)) = held else {
            return Err(ShopError::NotFound("cart line"));
        };

        let outcome = match stored_amount(held)?.reduce(amount) {
            Reduction::Remaining(rest) => {
                sqlx::query("UPDATE cart_lines SET amount = $2 WHERE id = $1")
                    .bind(line_id)
                    .bind(rest.value())
                    .execute(&mut *tx)
                    .await?;
                Decremented::Reduced { line: Self::line_view(&mut tx, line_id).await? }
            }
            Reduction::Emptied => {
                sqlx::query("DELETE FROM cart_lines WHERE id = $1").bind(line_id).execute(&mut *tx).await?;
                Decremented::Removed { line_id }
            }
            Reduction::Overdrawn { held } => {
                return Err(ShopError::Validation(format!("cannot reduce by {}: only {} in cart", amount, held)));
            }
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn line_owner(&self, line_id: Uuid) -> Result<Option<Uuid>> {
        let owner = sqlx::query_scalar("SELECT c.user_id FROM cart_lines l JOIN carts c ON c.id = l.cart_id WHERE l.id = $1")
            .bind(line_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner)
    }

    async fn set_amount(&self, line_id: Uuid, amount: Amount) -> Result<Option<CartLineView>> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("UPDATE cart_lines SET amount = $2 WHERE id = $1")
            .bind(line_id)
            .bind(amount.value())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Ok(None);
        }
        let view = Self::line_view(&mut tx, line_id).await?;
        tx.commit().await?;
        Ok(Some(view))
    }

    async fn remove_line(&self, line_id: Uuid) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM cart_lines WHERE id = $1")
            .bind(line_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn clear(&self, user_id: Uuid) -> Result<Option<u64>> {
        let mut tx = self.pool.begin().await?;
        let cart_id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM carts WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(cart_id) = cart_id else {
            return Ok(None);
        };
        let removed = sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(Some(removed))
    }

    async fn list_lines(&self, user_id: Uuid) -> Result<Vec<CartLineView>> {
        sqlx::query_as::<_, LineRow>(&format!("{} WHERE c.user_id = $1 ORDER BY l.created_at DESC, l.id DESC", LINE_SELECT))
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(LineRow::into_view)
            .collect()
    }

    async fn totals(&self, user_id: Uuid) -> Result<CartTotals> {
        let row = sqlx::query_as::<_, TotalsRow>(
            "SELECT COALESCE(SUM(l.amount), 0)::BIGINT AS total_amount, \
                    COALESCE(SUM(l.amount * p.price), 0)::NUMERIC(14, 2) AS total_price, \
                    COALESCE(ARRAY_AGG(DISTINCT p.name::TEXT ORDER BY p.name::TEXT), ARRAY[]::TEXT[]) AS product_names \
             FROM cart_lines l JOIN carts c ON c.id = l.cart_id JOIN products p ON p.id = l.product_id \
             WHERE c.user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(CartTotals { total_amount: row.total_amount, total_price: row.total_price, product_names: row.product_names })
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn resolve_token(&self, token: &str) -> Result<Option<Identity>> {
        let row: Option<(Uuid, String)> =
            sqlx::query_as("SELECT u.id, u.role FROM auth_tokens t JOIN users u ON u.id = t.user_id WHERE t.key = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(user_id, role)| Identity { user_id, role: if role == "admin" { Role::Admin } else { Role::User } }))
    }
}
