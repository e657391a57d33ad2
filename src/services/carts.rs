use crate::{
    db::DbPool,
    entities::user::{self, Entity as UserEntity},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Product id to quantity
pub type Cart = BTreeMap<Uuid, u32>;

/// Drops entries with a non-positive quantity.
pub fn normalize_cart(items: &BTreeMap<String, i64>) -> Result<Cart, ServiceError> {
    let mut cart = Cart::new();
    for (key, quantity) in items {
        let product_id = Uuid::parse_str(key.trim()).map_err(|_| {
            ServiceError::ValidationError(format!("Invalid product id in cart: {}", key))
        })?;
        if *quantity <= 0 {
            continue;
        }
        let quantity = u32::try_from(*quantity).map_err(|_| {
            ServiceError::ValidationError(format!("Quantity for {} is too large", key))
        })?;
        cart.insert(product_id, quantity);
    }
    Ok(cart)
}

fn cart_to_json(cart: &Cart) -> serde_json::Value {
    serde_json::Value::Object(
        cart.iter()
            .map(|(id, qty)| (id.to_string(), serde_json::Value::from(*qty)))
            .collect(),
    )
}

/// Reads a stored cart, ignoring entries that are not well formed.
pub fn cart_from_json(value: &serde_json::Value) -> Cart {
    value
        .as_object()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(key, qty)| {
                    let id = Uuid::parse_str(key).ok()?;
                    let qty = u32::try_from(qty.as_u64()?).ok()?;
                    (qty > 0).then_some((id, qty))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Carts are stored on the user row
#[derive(Clone)]
pub struct CartService {
    db_pool: Arc<DbPool>,
}

impl CartService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn write_cart(&self, user_id: Uuid, cart: serde_json::Value) -> Result<u64, ServiceError> {
        let result = UserEntity::update_many()
            .col_expr(user::Column::CartItems, Expr::value(cart))
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(user_id))
            .exec(&*self.db_pool)
            .await?;
        Ok(result.rows_affected)
    }

    /// Replaces the user's cart.
    #[instrument(skip(self, items), fields(user_id = %user_id))]
    pub async fn update_cart(
        &self,
        user_id: Uuid,
        items: &BTreeMap<String, i64>,
    ) -> Result<Cart, ServiceError> {
        let cart = normalize_cart(items)?;
        let updated = self.write_cart(user_id, cart_to_json(&cart)).await?;
        if updated == 0 {
            return Err(ServiceError::NotFound(format!("User {} not found", user_id)));
        }
        info!(user_id = %user_id, entries = cart.len(), "Cart updated");
        Ok(cart)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<Cart, ServiceError> {
        let user = UserEntity::find_by_id(user_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;
        Ok(cart_from_json(&user.cart_items))
    }

    /// Resets the cart to an empty mapping.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.write_cart(user_id, serde_json::json!({})).await?;
        info!(user_id = %user_id, "Cart cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_quantities_are_dropped() {
        let keep = Uuid::new_v4();
        let zero = Uuid::new_v4();
        let negative = Uuid::new_v4();
        let items = BTreeMap::from([
            (keep.to_string(), 3),
            (zero.to_string(), 0),
            (negative.to_string(), -2),
        ]);

        let cart = normalize_cart(&items).unwrap();
        assert_eq!(cart, Cart::from([(keep, 3)]));
    }

    #[test]
    fn non_uuid_keys_are_rejected() {
        let items = BTreeMap::from([("apple".to_string(), 1)]);
        assert!(matches!(
            normalize_cart(&items),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn stored_cart_round_trips_and_skips_junk() {
        let id = Uuid::new_v4();
        let cart = Cart::from([(id, 2)]);
        assert_eq!(cart_from_json(&cart_to_json(&cart)), cart);

        let junk = serde_json::json!({"not-a-uuid": 1, id.to_string(): "two"});
        assert!(cart_from_json(&junk).is_empty());
        assert!(cart_from_json(&serde_json::json!([])).is_empty());
    }
}
