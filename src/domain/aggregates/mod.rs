//! Aggregates module
pub mod catalog;
pub mod cart;

pub use catalog::{
    Category, CategoryDraft, CategoryView, Product, ProductDraft, ProductIcons, ProductView,
    Subcategory, SubcategoryDraft, SubcategoryView,
};
pub use cart::{Cart, CartLine, CartLineView, CartSummary, CartTotals, Decremented};
