//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::{format_rubles, Amount, MeasurementUnit};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Cart {
    pub fn for_user(user_id: Uuid) -> Self {
        Self { id: Uuid::now_v7(), user_id, created_at: Utc::now() }
    }
}

/// One product within a cart; unique per (cart, product).
#[derive(Clone, Debug, PartialEq)]
pub struct CartLine {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl CartLine {
    pub fn new(cart_id: Uuid, product_id: Uuid, amount: Amount) -> Self {
        Self { id: Uuid::now_v7(), cart_id, product_id, amount, created_at: Utc::now() }
    }
}

/// A cart line joined with the product it points at.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub price: Decimal,
    pub measurement_unit: MeasurementUnit,
    pub amount: Amount,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl CartLineView {
    pub fn new(
        id: Uuid,
        product_id: Uuid,
        product_name: String,
        price: Decimal,
        measurement_unit: MeasurementUnit,
        amount: Amount,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id,
            product_name,
            price,
            measurement_unit,
            amount,
            total_price: amount.priced_at(price),
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decremented {
    Reduced { line: CartLineView },
    Removed { line_id: Uuid },
}

/// Raw per-user aggregate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CartTotals {
    pub total_amount: i64,
    pub total_price: Decimal,
    pub product_names: Vec<String>,
}

impl CartTotals {
    /// Single pass over (name, price, amount) triples.
    pub fn fold<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Decimal, Amount)>,
    {
        let mut totals = Self::default();
        for (name, price, amount) in lines {
            totals.total_amount += i64::from(amount.value());
            totals.total_price += amount.priced_at(price);
            totals.product_names.push(name.to_string());
        }
        totals.product_names.sort();
        totals.product_names.dedup();
        totals
    }
}

/// The summary as shown to the client; same shape whether the cart is empty or not.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartSummary {
    pub products: String,
    pub product_names: Vec<String>,
    pub total_amount: i64,
    pub total_price: String,
}

impl From<CartTotals> for CartSummary {
    fn from(t: CartTotals) -> Self {
        Self {
            products: t.product_names.join(", "),
            total_amount: t.total_amount,
            total_price: format_rubles(t.total_price),
            product_names: t.product_names,
        }
    }
}
