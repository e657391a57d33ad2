use crate::{
    db::DbPool,
    entities::address::{self, Entity as AddressEntity},
    errors::ServiceError,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddressInput {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, max = 20, message = "Zipcode is required"))]
    pub zipcode: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
    #[validate(length(min = 5, max = 32, message = "A valid phone number is required"))]
    pub phone: String,
}

/// Per-user shipping addresses
#[derive(Clone)]
pub struct AddressService {
    db_pool: Arc<DbPool>,
}

impl AddressService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn add_address(
        &self,
        user_id: Uuid,
        input: AddressInput,
    ) -> Result<address::Model, ServiceError> {
        input.validate()?;

        let model = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            email: Set(input.email),
            street: Set(input.street),
            city: Set(input.city),
            state: Set(input.state),
            zipcode: Set(input.zipcode),
            country: Set(input.country),
            phone: Set(input.phone),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(address_id = %model.id, "Address added");
        Ok(model)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_addresses(&self, user_id: Uuid) -> Result<Vec<address::Model>, ServiceError> {
        Ok(AddressEntity::find()
            .filter(address::Column::UserId.eq(user_id))
            .order_by_asc(address::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }

    /// Fetches an address only if it belongs to `user_id`.
    pub async fn find_owned(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<Option<address::Model>, ServiceError> {
        Ok(AddressEntity::find_by_id(address_id)
            .filter(address::Column::UserId.eq(user_id))
            .one(&*self.db_pool)
            .await?)
    }
}
