//! Catalog fixture import: a JSON document of categories, subcategories and
//! products, applied get-or-create by name so it can be re-run safely.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::aggregates::{CategoryDraft, ProductDraft, ProductIcons, SubcategoryDraft};
use crate::domain::value_objects::MeasurementUnit;
use crate::store::CatalogStore;
use crate::{Result, ShopError};

#[derive(Debug, Default, Deserialize)]
pub struct CatalogFixture {
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
    #[serde(default)]
    pub subcategories: Vec<SubcategoryEntry>,
    #[serde(default)]
    pub products: Vec<ProductEntry>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubcategoryEntry {
    pub name: String,
    pub category: String,
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProductEntry {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub measurement_unit: MeasurementUnit,
    pub subcategory: String,
    #[serde(flatten)]
    pub icons: ProductIcons,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub categories: usize,
    pub subcategories: usize,
    pub products: usize,
    pub skipped: usize,
}

impl CatalogFixture {
    pub fn from_json(raw: &str) -> Result<Self> {
        // Fixture files exported from spreadsheets often carry a BOM.
        serde_json::from_str(raw.trim_start_matches('\u{feff}'))
            .map_err(|e| ShopError::Validation(format!("malformed catalog fixture: {}", e)))
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ShopError::Internal(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }
}

pub async fn import(store: &dyn CatalogStore, fixture: CatalogFixture) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for entry in fixture.categories {
        store.ensure_category(CategoryDraft::new(&entry.name, entry.icon)?).await?;
        report.categories += 1;
    }

    for entry in fixture.subcategories {
        let Some(category) = store.find_category_by_name(entry.category.trim()).await? else {
            tracing::warn!(subcategory = %entry.name, category = %entry.category, "unknown category, skipping");
            report.skipped += 1;
            continue;
        };
        store.ensure_subcategory(SubcategoryDraft::new(&entry.name, category.id, entry.icon)?).await?;
        report.subcategories += 1;
    }

    for entry in fixture.products {
        let Some(sub) = store.find_subcategory_by_name(entry.subcategory.trim()).await? else {
            tracing::warn!(product = %entry.name, subcategory = %entry.subcategory, "unknown subcategory, skipping");
            report.skipped += 1;
            continue;
        };
        let draft = ProductDraft::new(&entry.name, sub.id, entry.price, entry.measurement_unit)?.with_icons(entry.icons);
        store.ensure_product(draft).await?;
        report.products += 1;
    }

    tracing::info!(?report, "catalog fixture imported");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, PageRequest};

    const FIXTURE: &str = r#"{
        "categories": [{"name": "Фрукты"}, {"name": "Молочка", "icon": "categories/milk.png"}],
        "subcategories": [
            {"name": "Ягоды", "category": "Фрукты"},
            {"name": "Сыры", "category": "Нет такой"}
        ],
        "products": [
            {"name": "Клубника", "price": "350.50", "subcategory": "Ягоды", "icon_small": "products_small/k.png"},
            {"name": "Малина", "price": 420, "measurement_unit": "kg", "subcategory": "Ягоды"},
            {"name": "Бри", "price": 900, "subcategory": "Сыры"}
        ]
    }"#;

    #[tokio::test]
    async fn test_import_and_rerun() {
        let store = MemoryStore::new();
        let report = import(&store, CatalogFixture::from_json(FIXTURE).unwrap()).await.unwrap();
        assert_eq!(report, ImportReport { categories: 2, subcategories: 1, products: 2, skipped: 2 });

        import(&store, CatalogFixture::from_json(FIXTURE).unwrap()).await.unwrap();
        let products = store.list_products(PageRequest::new(None, None, 10)).await.unwrap();
        assert_eq!(products.total, 2);
        let strawberry = products.data.iter().find(|p| p.name == "Клубника").unwrap();
        assert_eq!(strawberry.slug, "klubnika");
        assert_eq!(strawberry.category, "Фрукты");
        assert_eq!(strawberry.icons.icon_small.as_deref(), Some("products_small/k.png"));
    }

    #[tokio::test]
    async fn test_invalid_price_fails_import() {
        let store = MemoryStore::new();
        let fixture = CatalogFixture::from_json(
            r#"{"categories": [{"name": "A"}], "subcategories": [{"name": "B", "category": "A"}],
                "products": [{"name": "C", "price": 0.5, "subcategory": "B"}]}"#,
        )
        .unwrap();
        assert!(matches!(import(&store, fixture).await, Err(ShopError::Validation(_))));
    }

    #[test]
    fn test_bom_and_malformed() {
        assert!(CatalogFixture::from_json("\u{feff}{}").is_ok());
        assert!(CatalogFixture::from_json("[").is_err());
    }
}
