//! SeaORM entities backing the storefront tables.

pub mod address;
pub mod order;
pub mod order_item;
pub mod product;
pub mod user;
