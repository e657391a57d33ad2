pub mod addresses;
pub mod cart;
pub mod common;
pub mod health;
pub mod orders;
pub mod payment_webhooks;
pub mod products;
pub mod seller;
pub mod users;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    services::{
        addresses::AddressService, carts::CartService, catalog::ProductService,
        orders::OrderWorkflow, payment_gateway::PaymentGateway, users::UserService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductService>,
    pub carts: Arc<CartService>,
    pub addresses: Arc<AddressService>,
    pub users: Arc<UserService>,
    pub orders: Arc<OrderWorkflow>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        auth_service: Arc<AuthService>,
        config: &AppConfig,
    ) -> Self {
        Self {
            products: Arc::new(ProductService::new(db_pool.clone())),
            carts: Arc::new(CartService::new(db_pool.clone())),
            addresses: Arc::new(AddressService::new(db_pool.clone())),
            users: Arc::new(UserService::new(db_pool.clone(), auth_service)),
            orders: Arc::new(OrderWorkflow::new(
                db_pool,
                gateway,
                config.tax_rate(),
                config.currency.clone(),
                config.storefront_url.clone(),
            )),
        }
    }
}
