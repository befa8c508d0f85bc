//! Application services sitting between the HTTP layer and the stores.
pub mod cart;
pub mod publisher;

pub use cart::CartService;
pub use publisher::EventPublisher;
