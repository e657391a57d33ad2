// Order workflow and its collaborators
pub mod orders;
pub mod payment_gateway;
pub mod pricing;

// Storefront collaborators
pub mod addresses;
pub mod carts;
pub mod catalog;
pub mod users;
