use crate::{
    db::DbPool,
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Product name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: Vec<String>,
    #[schema(value_type = String, example = "120.00")]
    pub price: Decimal,
    #[schema(value_type = String, example = "99.00")]
    pub offer_price: Decimal,
    #[validate(length(min = 1, max = 100, message = "Category is required"))]
    pub category: String,
    /// Already-hosted image URLs
    #[validate(custom = "validate_image_urls")]
    pub images: Vec<String>,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
}

fn default_in_stock() -> bool {
    true
}

fn validate_image_urls(images: &Vec<String>) -> Result<(), ValidationError> {
    if images.is_empty() {
        let mut err = ValidationError::new("images");
        err.message = Some("At least one product image is required".into());
        return Err(err);
    }
    if images
        .iter()
        .any(|url| !(url.starts_with("https://") || url.starts_with("http://")))
    {
        let mut err = ValidationError::new("images");
        err.message = Some("Image references must be http(s) URLs".into());
        return Err(err);
    }
    Ok(())
}

impl CreateProductRequest {
    fn validate_prices(&self) -> Result<(), ServiceError> {
        if self.price < Decimal::ZERO || self.offer_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Prices must not be negative".into(),
            ));
        }
        if self.offer_price > self.price {
            return Err(ServiceError::ValidationError(
                "Offer price must not exceed the list price".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Vec<String>,
    #[schema(value_type = String)]
    pub price: Decimal,
    #[schema(value_type = String)]
    pub offer_price: Decimal,
    pub category: String,
    pub images: Vec<String>,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn string_list(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            description: string_list(&model.description),
            images: string_list(&model.images),
            name: model.name,
            price: model.price,
            offer_price: model.offer_price,
            category: model.category,
            in_stock: model.in_stock,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Product catalog backed by the `products` table
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn add_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;
        request.validate_prices()?;

        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(serde_json::json!(request.description)),
            price: Set(request.price),
            offer_price: Set(request.offer_price),
            category: Set(request.category),
            images: Set(serde_json::json!(request.images)),
            in_stock: Set(request.in_stock),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert product");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = %model.id, "Product added");
        Ok(model.into())
    }

    /// All products, newest first
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<ProductResponse>, ServiceError> {
        let products = ProductEntity::find()
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;

        Ok(products.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductResponse, ServiceError> {
        ProductEntity::find_by_id(product_id)
            .one(&*self.db_pool)
            .await?
            .map(Into::into)
            .ok_or_else(|| ServiceError::NotFound(format!("Product with ID {} not found", product_id)))
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn set_stock(
        &self,
        product_id: Uuid,
        in_stock: bool,
    ) -> Result<ProductResponse, ServiceError> {
        let existing = ProductEntity::find_by_id(product_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product with ID {} not found", product_id)))?;

        let mut active: product::ActiveModel = existing.into();
        active.in_stock = Set(in_stock);
        let updated = active.update(&*self.db_pool).await?;

        info!(product_id = %product_id, in_stock, "Product stock updated");
        Ok(updated.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> CreateProductRequest {
        CreateProductRequest {
            name: "Organic Apples".into(),
            description: vec!["Crisp".into(), "Locally grown".into()],
            price: dec!(120),
            offer_price: dec!(100),
            category: "Fruits".into(),
            images: vec!["https://cdn.example.com/apple.png".into()],
            in_stock: true,
        }
    }

    #[test]
    fn valid_request_passes() {
        let req = request();
        assert!(req.validate().is_ok());
        assert!(req.validate_prices().is_ok());
    }

    #[test]
    fn images_are_required() {
        let mut req = request();
        req.images.clear();
        assert!(req.validate().is_err());

        req.images = vec!["file:///tmp/apple.png".into()];
        assert!(req.validate().is_err());
    }

    #[test]
    fn offer_price_above_list_price_is_rejected() {
        let mut req = request();
        req.offer_price = dec!(130);
        assert!(req.validate_prices().is_err());

        req.offer_price = dec!(-1);
        assert!(req.validate_prices().is_err());
    }
}
