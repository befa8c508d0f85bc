//! Catalog Aggregates: Category → Subcategory → Product

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::{entity_name, MeasurementUnit, Price, Slug};
use crate::ShopError;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub icon: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Subcategory {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub icon: Option<String>,
    pub category_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub measurement_unit: MeasurementUnit,
    #[serde(flatten)]
    pub icons: ProductIcons,
    pub subcategory_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Three pre-sized renditions of the product picture, stored as paths.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductIcons {
    pub icon_small: Option<String>,
    pub icon_middle: Option<String>,
    pub icon_big: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CategoryDraft {
    pub name: String,
    pub slug: Slug,
    pub icon: Option<String>,
}

impl CategoryDraft {
    pub fn new(name: &str, icon: Option<String>) -> Result<Self, ShopError> {
        let name = entity_name(name)?;
        Ok(Self { slug: Slug::from_name(&name), name, icon })
    }
}

#[derive(Clone, Debug)]
pub struct SubcategoryDraft {
    pub name: String,
    pub slug: Slug,
    pub icon: Option<String>,
    pub category_id: Uuid,
}

impl SubcategoryDraft {
    pub fn new(name: &str, category_id: Uuid, icon: Option<String>) -> Result<Self, ShopError> {
        let name = entity_name(name)?;
        Ok(Self { slug: Slug::from_name(&name), name, icon, category_id })
    }
}

#[derive(Clone, Debug)]
pub struct ProductDraft {
    pub name: String,
    pub slug: Slug,
    pub price: Price,
    pub measurement_unit: MeasurementUnit,
    pub icons: ProductIcons,
    pub subcategory_id: Uuid,
}

impl ProductDraft {
    pub fn new(
        name: &str,
        subcategory_id: Uuid,
        price: Decimal,
        measurement_unit: MeasurementUnit,
    ) -> Result<Self, ShopError> {
        let name = entity_name(name)?;
        Ok(Self {
            slug: Slug::from_name(&name),
            name,
            price: Price::new(price)?,
            measurement_unit,
            icons: ProductIcons::default(),
            subcategory_id,
        })
    }

    pub fn with_icons(mut self, icons: ProductIcons) -> Self {
        self.icons = icons;
        self
    }
}

// =============================================================================
// Read models (parent names denormalized for display)
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubcategoryView {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub category: String,
    pub icon: Option<String>,
}

impl SubcategoryView {
    pub fn new(sub: &Subcategory, category: &Category) -> Self {
        Self {
            id: sub.id,
            name: sub.name.clone(),
            slug: sub.slug.clone(),
            category: category.name.clone(),
            icon: sub.icon.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryView {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub icon: Option<String>,
    pub subcategories: Vec<SubcategoryView>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub subcategory: SubcategoryView,
    pub price: Decimal,
    pub measurement_unit: MeasurementUnit,
    #[serde(flatten)]
    pub icons: ProductIcons,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

impl ProductView {
    pub fn new(product: &Product, sub: &Subcategory, category: &Category) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            subcategory: SubcategoryView::new(sub, category),
            price: product.price,
            measurement_unit: product.measurement_unit,
            icons: product.icons.clone(),
            category: category.name.clone(),
            created_at: product.created_at,
        }
    }
}
