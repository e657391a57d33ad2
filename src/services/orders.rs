use crate::{
    db::DbPool,
    entities::{
        address::{self, Entity as AddressEntity},
        order::{self, Entity as OrderEntity, PaymentType, STATUS_CONFIRMED},
        order_item::{self, Entity as OrderItemEntity},
        product::{self, Entity as ProductEntity},
    },
    errors::ServiceError,
    services::{
        addresses::AddressService,
        carts::CartService,
        catalog::ProductResponse,
        payment_gateway::{CheckoutLineItem, CheckoutSessionRequest, PaymentGateway},
        pricing::{price_lines, tax_label, to_minor_units, OrderPricing, PricedLine},
    },
    webhooks::{
        transition, CheckoutMetadata, GatewayEvent, GatewayNotification, NoopReason,
        PaymentState, Transition,
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// One requested line; the client never supplies a price
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemInput {
    /// Product id
    pub product: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderItemInput>,
    /// Id of one of the caller's saved addresses
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemView {
    pub product_id: Uuid,
    /// `null` when the product no longer exists
    pub product: Option<ProductResponse>,
    pub quantity: i32,
}

/// An order expanded with its products and shipping address
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderItemView>,
    #[schema(value_type = String, example = "204")]
    pub amount: Decimal,
    pub address_id: Uuid,
    /// `null` when the address no longer exists
    #[schema(value_type = Option<Object>)]
    pub address: Option<address::Model>,
    pub payment_type: PaymentType,
    pub is_paid: bool,
    pub status: String,
    pub payment_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of placing an online order: the order and the hosted checkout URL
#[derive(Debug, Clone)]
pub struct OnlineCheckout {
    pub order: OrderView,
    pub url: String,
}

/// What a verified notification did to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Confirmed { order_id: Uuid },
    Expired { order_id: Uuid },
    Skipped { reason: SkipReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Transition(NoopReason),
    /// Expiry for an order that is already gone
    OrderNotFound,
    /// Expiry without a usable order id
    MissingOrderReference,
}

/// Checked and priced order, ready to persist
struct ValidatedOrder {
    address: address::Model,
    products: HashMap<Uuid, product::Model>,
    lines: Vec<PricedLine>,
    pricing: OrderPricing,
}

const MISSING_INPUT: &str = "Please add address and items";

/// Order placement, payment confirmation and order history
#[derive(Clone)]
pub struct OrderWorkflow {
    db_pool: Arc<DbPool>,
    gateway: Arc<dyn PaymentGateway>,
    carts: CartService,
    addresses: AddressService,
    tax_rate: Decimal,
    currency: String,
    storefront_url: Option<String>,
}

impl OrderWorkflow {
    pub fn new(
        db_pool: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        tax_rate: Decimal,
        currency: impl Into<String>,
        storefront_url: Option<String>,
    ) -> Self {
        Self {
            carts: CartService::new(db_pool.clone()),
            addresses: AddressService::new(db_pool.clone()),
            db_pool,
            gateway,
            tax_rate,
            currency: currency.into(),
            storefront_url,
        }
    }

    /// Validates input against the current catalog. Nothing is written.
    async fn validate_and_price(
        &self,
        user_id: Uuid,
        request: &PlaceOrderRequest,
    ) -> Result<ValidatedOrder, ServiceError> {
        let address_ref = request
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty());
        let address_ref = match address_ref {
            Some(address) if !request.items.is_empty() => address,
            _ => return Err(ServiceError::ValidationError(MISSING_INPUT.into())),
        };

        let mut requested = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let product_id = Uuid::parse_str(item.product.trim()).map_err(|_| {
                ServiceError::NotFound(format!("Product with ID {} not found", item.product))
            })?;
            requested.push((product_id, item));
        }

        let ids: HashSet<Uuid> = requested.iter().map(|(id, _)| *id).collect();
        let products: HashMap<Uuid, product::Model> = ProductEntity::find()
            .filter(product::Column::Id.is_in(ids))
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut lines = Vec::with_capacity(requested.len());
        for (product_id, item) in requested {
            let product = products.get(&product_id).ok_or_else(|| {
                ServiceError::NotFound(format!("Product with ID {} not found", item.product))
            })?;
            if !product.in_stock {
                return Err(ServiceError::OutOfStock(format!(
                    "Product {} is out of stock",
                    product.name
                )));
            }
            let quantity = u32::try_from(item.quantity)
                .ok()
                .filter(|q| *q >= 1 && i32::try_from(*q).is_ok())
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Quantity for product {} must be at least 1",
                        product.name
                    ))
                })?;
            lines.push(PricedLine::from_product(product, quantity));
        }

        let address_id = Uuid::parse_str(address_ref)
            .map_err(|_| ServiceError::ValidationError("Address not found".into()))?;
        let address = self
            .addresses
            .find_owned(user_id, address_id)
            .await?
            .ok_or_else(|| ServiceError::ValidationError("Address not found".into()))?;

        let pricing = price_lines(lines.clone(), self.tax_rate);
        Ok(ValidatedOrder {
            address,
            products,
            lines,
            pricing,
        })
    }

    /// Inserts the order and its lines in one transaction.
    async fn persist(
        &self,
        user_id: Uuid,
        validated: &ValidatedOrder,
        payment_type: PaymentType,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let order_id = Uuid::new_v4();
        let txn = self.db_pool.begin().await?;

        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            address_id: Set(validated.address.id),
            amount: Set(validated.pricing.total),
            payment_type: Set(payment_type),
            is_paid: Set(false),
            payment_session_id: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to insert order");
            ServiceError::DatabaseError(e)
        })?;

        let mut items = Vec::with_capacity(validated.lines.len());
        for (position, line) in validated.lines.iter().enumerate() {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity as i32),
                position: Set(position as i32),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        txn.commit().await?;
        Ok((order, items))
    }

    fn view_of(
        &self,
        order: order::Model,
        items: Vec<order_item::Model>,
        validated: &ValidatedOrder,
    ) -> OrderView {
        build_view(
            order,
            items,
            &validated.products,
            &HashMap::from([(validated.address.id, validated.address.clone())]),
        )
    }

    /// Cart clearing never fails the caller.
    async fn clear_cart_best_effort(&self, user_id: Uuid, order_id: Uuid) {
        if let Err(e) = self.carts.clear_cart(user_id).await {
            warn!(
                user_id = %user_id,
                order_id = %order_id,
                error = %e,
                "Failed to clear cart; order stands"
            );
        }
    }

    /// Places a cash-on-delivery order and empties the cart.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn place_cod_order(
        &self,
        user_id: Uuid,
        request: &PlaceOrderRequest,
    ) -> Result<OrderView, ServiceError> {
        let validated = self.validate_and_price(user_id, request).await?;
        let (order, items) = self
            .persist(user_id, &validated, PaymentType::CashOnDelivery)
            .await?;

        info!(order_id = %order.id, amount = %order.amount, "Cash-on-delivery order placed");
        self.clear_cart_best_effort(user_id, order.id).await;

        Ok(self.view_of(order, items, &validated))
    }

    fn redirect_base(&self, origin: Option<&str>) -> Result<String, ServiceError> {
        origin
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .or(self.storefront_url.as_deref())
            .map(|base| base.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                ServiceError::ValidationError("Missing Origin for payment redirect".into())
            })
    }

    fn checkout_request(
        &self,
        validated: &ValidatedOrder,
        base: &str,
        metadata: CheckoutMetadata,
    ) -> Result<CheckoutSessionRequest, ServiceError> {
        let mut line_items = validated
            .lines
            .iter()
            .map(|line| {
                Ok(CheckoutLineItem {
                    name: line.name.clone(),
                    unit_amount: to_minor_units(line.unit_price)?,
                    quantity: line.quantity,
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        line_items.push(CheckoutLineItem {
            name: tax_label(self.tax_rate),
            unit_amount: to_minor_units(validated.pricing.tax)?,
            quantity: 1,
        });

        Ok(CheckoutSessionRequest {
            currency: self.currency.clone(),
            line_items,
            success_url: format!("{}/loader?next=my-orders", base),
            cancel_url: format!("{}/cart", base),
            metadata,
        })
    }

    /// Places an online order and opens a hosted checkout session.
    /// The cart is left alone until the gateway confirms payment.
    #[instrument(skip(self, request, origin), fields(user_id = %user_id))]
    pub async fn place_online_order(
        &self,
        user_id: Uuid,
        request: &PlaceOrderRequest,
        origin: Option<&str>,
    ) -> Result<OnlineCheckout, ServiceError> {
        let base = self.redirect_base(origin)?;
        let validated = self.validate_and_price(user_id, request).await?;
        let (mut order, items) = self.persist(user_id, &validated, PaymentType::Online).await?;

        let metadata = CheckoutMetadata {
            order_id: order.id,
            user_id,
        };
        let checkout = self.checkout_request(&validated, &base, metadata)?;

        // The unpaid order stays behind for reconciliation when this fails
        let session = self
            .gateway
            .create_checkout_session(&checkout)
            .await
            .map_err(|e| {
                error!(order_id = %order.id, error = %e, "Checkout session creation failed");
                e
            })?;

        let updated_at = Utc::now();
        OrderEntity::update_many()
            .col_expr(
                order::Column::PaymentSessionId,
                Expr::value(session.id.clone()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(updated_at))
            .filter(order::Column::Id.eq(order.id))
            .exec(&*self.db_pool)
            .await?;
        order.payment_session_id = Some(session.id.clone());
        order.updated_at = updated_at;

        info!(
            order_id = %order.id,
            session_id = %session.id,
            amount = %order.amount,
            "Online order placed; awaiting payment"
        );

        Ok(OnlineCheckout {
            order: self.view_of(order, items, &validated),
            url: session.url,
        })
    }

    /// Applies a verified gateway notification. Safe to replay.
    #[instrument(skip(self, notification), fields(event_type = %notification.event.event_type(), event_id = ?notification.id))]
    pub async fn handle_notification(
        &self,
        notification: &GatewayNotification,
    ) -> Result<NotificationOutcome, ServiceError> {
        match &notification.event {
            GatewayEvent::CheckoutCompleted(reference) => {
                let metadata = reference.require_metadata()?;
                let order = OrderEntity::find_by_id(metadata.order_id)
                    .one(&*self.db_pool)
                    .await?
                    .ok_or_else(|| {
                        warn!(order_id = %metadata.order_id, "Payment completed for unknown order");
                        ServiceError::NotFound(format!("Order {} not found", metadata.order_id))
                    })?;

                if order.user_id != metadata.user_id {
                    warn!(order_id = %order.id, "Notification user does not own the order");
                    return Err(ServiceError::MalformedNotification(
                        "metadata userId does not match the order".into(),
                    ));
                }

                self.apply(&order, transition(PaymentState::of(&order), &notification.event))
                    .await
            }
            GatewayEvent::CheckoutExpired(reference) => {
                let Some(order_id) = reference.order_id() else {
                    warn!("Checkout expired without an order reference");
                    return Ok(NotificationOutcome::Skipped {
                        reason: SkipReason::MissingOrderReference,
                    });
                };

                match OrderEntity::find_by_id(order_id).one(&*self.db_pool).await? {
                    Some(order) => {
                        self.apply(&order, transition(PaymentState::of(&order), &notification.event))
                            .await
                    }
                    None => {
                        info!(order_id = %order_id, "Expired order already removed");
                        Ok(NotificationOutcome::Skipped {
                            reason: SkipReason::OrderNotFound,
                        })
                    }
                }
            }
            GatewayEvent::Other(event_type) => {
                info!(event_type = %event_type, "Ignoring unhandled gateway event");
                Ok(NotificationOutcome::Skipped {
                    reason: SkipReason::Transition(NoopReason::UnhandledEvent),
                })
            }
        }
    }

    async fn apply(
        &self,
        order: &order::Model,
        transition: Transition,
    ) -> Result<NotificationOutcome, ServiceError> {
        match transition {
            Transition::Confirm => self.confirm_payment(order).await,
            Transition::Expire => self.expire_order(order).await,
            Transition::Noop(reason) => {
                info!(order_id = %order.id, reason = ?reason, "Notification left order unchanged");
                Ok(NotificationOutcome::Skipped {
                    reason: SkipReason::Transition(reason),
                })
            }
        }
    }

    /// Conditional update: only the delivery that flips `is_paid` clears the cart.
    async fn confirm_payment(
        &self,
        order: &order::Model,
    ) -> Result<NotificationOutcome, ServiceError> {
        let result = OrderEntity::update_many()
            .col_expr(order::Column::IsPaid, Expr::value(true))
            .col_expr(order::Column::Status, Expr::value(STATUS_CONFIRMED))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::IsPaid.eq(false))
            .filter(order::Column::PaymentType.eq(PaymentType::Online))
            .exec(&*self.db_pool)
            .await?;

        if result.rows_affected == 0 {
            info!(order_id = %order.id, "Payment already confirmed by another delivery");
            return Ok(NotificationOutcome::Skipped {
                reason: SkipReason::Transition(NoopReason::AlreadyConfirmed),
            });
        }

        info!(order_id = %order.id, user_id = %order.user_id, "Payment confirmed");
        self.clear_cart_best_effort(order.user_id, order.id).await;

        Ok(NotificationOutcome::Confirmed { order_id: order.id })
    }

    /// Deletes an abandoned online order, unless it was paid meanwhile.
    async fn expire_order(
        &self,
        order: &order::Model,
    ) -> Result<NotificationOutcome, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let result = OrderEntity::delete_many()
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::IsPaid.eq(false))
            .filter(order::Column::PaymentType.eq(PaymentType::Online))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            info!(order_id = %order.id, "Expired order was paid or removed concurrently");
            return Ok(NotificationOutcome::Skipped {
                reason: SkipReason::OrderNotFound,
            });
        }

        OrderItemEntity::delete_many()
            .filter(order_item::Column::OrderId.eq(order.id))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        info!(order_id = %order.id, "Abandoned checkout removed");
        Ok(NotificationOutcome::Expired { order_id: order.id })
    }

    fn visible_orders() -> Condition {
        Condition::any()
            .add(order::Column::PaymentType.eq(PaymentType::CashOnDelivery))
            .add(order::Column::IsPaid.eq(true))
    }

    /// The caller's orders, newest first; unpaid online orders are hidden.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_user_orders(&self, user_id: Uuid) -> Result<Vec<OrderView>, ServiceError> {
        let orders = OrderEntity::find()
            .filter(order::Column::UserId.eq(user_id))
            .filter(Self::visible_orders())
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        self.expand(orders).await
    }

    /// Every customer's orders for the operator, same visibility rule.
    #[instrument(skip(self))]
    pub async fn list_all_orders(&self) -> Result<Vec<OrderView>, ServiceError> {
        let orders = OrderEntity::find()
            .filter(Self::visible_orders())
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        self.expand(orders).await
    }

    async fn expand(&self, orders: Vec<order::Model>) -> Result<Vec<OrderView>, ServiceError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let address_ids: HashSet<Uuid> = orders.iter().map(|o| o.address_id).collect();

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .order_by_asc(order_item::Column::Position)
            .all(&*self.db_pool)
            .await?;

        let product_ids: HashSet<Uuid> = items.iter().map(|i| i.product_id).collect();
        let products: HashMap<Uuid, product::Model> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            ProductEntity::find()
                .filter(product::Column::Id.is_in(product_ids))
                .all(&*self.db_pool)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        let addresses: HashMap<Uuid, address::Model> = AddressEntity::find()
            .filter(address::Column::Id.is_in(address_ids))
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let mut items_by_order: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
        for item in items {
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = items_by_order.remove(&order.id).unwrap_or_default();
                build_view(order, items, &products, &addresses)
            })
            .collect())
    }
}

fn build_view(
    order: order::Model,
    items: Vec<order_item::Model>,
    products: &HashMap<Uuid, product::Model>,
    addresses: &HashMap<Uuid, address::Model>,
) -> OrderView {
    let items = items
        .into_iter()
        .map(|item| OrderItemView {
            product_id: item.product_id,
            product: products.get(&item.product_id).cloned().map(Into::into),
            quantity: item.quantity,
        })
        .collect();

    OrderView {
        id: order.id,
        user_id: order.user_id,
        items,
        amount: order.amount,
        address_id: order.address_id,
        address: addresses.get(&order.address_id).cloned(),
        payment_type: order.payment_type,
        is_paid: order.is_paid,
        status: order.status,
        payment_session_id: order.payment_session_id,
        created_at: order.created_at,
        updated_at: order.updated_at,
    }
}
