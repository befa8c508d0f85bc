//! Shop domain: catalog entities, the cart aggregate and their value objects.
pub mod aggregates;
pub mod events;
pub mod value_objects;
