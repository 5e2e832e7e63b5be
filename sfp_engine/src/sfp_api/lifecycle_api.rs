use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{CustomerDetails, NewOrder, Order, OrderStatusType},
    sfp_api::{
        errors::LifecycleError,
        order_objects::{OrderQueryResult, ReconcileOutcome, TransitionOutcome},
    },
    traits::{
        GatewayPaymentStatus,
        NewPaymentIntent,
        PaymentGateway,
        PaymentIntent,
        PaymentMetadata,
        StorefrontDatabase,
    },
};

/// `OrderLifecycleApi` is the order state machine.
///
/// ```text
///   NONE ──create_provisional──▶ PROVISIONAL ──confirm──▶ COMPLETED ──refund──▶ REFUNDED
///     │                               └────────fail─────▶ FAILED ─────refund──▶ REFUNDED
///     └───confirm (fallback)────────────────────────────▶ COMPLETED
/// ```
///
/// Three writers call into this API for the same order: the storefront's request path, the gateway webhook and the
/// reconciliation sweeper. None of them coordinate. Every operation here is idempotent, and every state change is a
/// single conditional store update, so any interleaving of the writers converges on one order with the gateway's
/// final answer.
pub struct OrderLifecycleApi<B> {
    db: B,
}

impl<B> Debug for OrderLifecycleApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderLifecycleApi")
    }
}

impl<B: Clone> Clone for OrderLifecycleApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<B> OrderLifecycleApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderLifecycleApi<B>
where B: StorefrontDatabase
{
    /// Records a purchase that the buyer has paid for on the client side, but that the gateway has not confirmed yet.
    ///
    /// Create-or-get: if an order for the payment reference already exists (a retry, or the webhook got there first)
    /// it is returned unchanged along with `false`.
    pub async fn create_provisional(
        &self,
        payment_reference: &str,
        product_id: i64,
        quantity: i64,
        customer: CustomerDetails,
    ) -> Result<(Order, bool), LifecycleError> {
        if quantity <= 0 {
            return Err(LifecycleError::InvalidQuantity(quantity));
        }
        if let Some(existing) = self.db.fetch_order_by_payment_reference(payment_reference).await? {
            debug!("🔄️📦️ Order [{payment_reference}] already exists as {existing}. Not creating a provisional order.");
            return Ok((existing, false));
        }
        let product = self.db.fetch_product(product_id).await?.ok_or(LifecycleError::ProductNotFound(product_id))?;
        let order = NewOrder::provisional(payment_reference, &product, quantity, customer)
            .ok_or(LifecycleError::InvalidQuantity(quantity))?;
        let user_id = self.db.fetch_or_create_user(&order.customer).await?.map(|u| u.id);
        let order = order.with_user_id(user_id);
        trace!("🔄️📦️ Inserting provisional order {order}");
        let (order, created) = self.db.insert_order(order).await?;
        if created {
            info!("🔄️📦️ Provisional order {order} created");
        } else {
            debug!("🔄️📦️ Lost the race to create [{payment_reference}]. Using {order}");
        }
        Ok((order, created))
    }

    /// Opens a payment with the gateway for `quantity` units of a product. The price comes from the catalogue, never
    /// from the client, and the order facts ride along as metadata so the order can be rebuilt from the gateway's
    /// records alone.
    pub async fn new_payment_intent<G: PaymentGateway>(
        &self,
        product_id: i64,
        quantity: i64,
        customer: CustomerDetails,
        gateway: &G,
    ) -> Result<PaymentIntent, LifecycleError> {
        if quantity <= 0 {
            return Err(LifecycleError::InvalidQuantity(quantity));
        }
        let product = self.db.fetch_product(product_id).await?.ok_or(LifecycleError::ProductNotFound(product_id))?;
        let amount = product.price_for(quantity).ok_or(LifecycleError::InvalidQuantity(quantity))?;
        let currency = product.currency.to_lowercase();
        let metadata = PaymentMetadata::new(product_id, quantity, customer);
        let intent = gateway.create_payment_intent(NewPaymentIntent { amount, currency, metadata }).await?;
        info!("🔄️💳️ Payment intent {} opened for product {product_id} x{quantity} ({amount})", intent.id);
        Ok(intent)
    }

    /// The gateway says the payment succeeded.
    ///
    /// * A provisional order is completed.
    /// * An order that is already final is left alone. Gateways redeliver events, so this is the common duplicate case.
    /// * If no order exists (the storefront's provisional write was lost), a completed order is built from the
    ///   metadata carried on the payment. Missing metadata or an unknown product is reported as a terminal error.
    pub async fn confirm_from_gateway(
        &self,
        payment_reference: &str,
        gateway_amount: i64,
        gateway_currency: &str,
        metadata: &PaymentMetadata,
    ) -> Result<TransitionOutcome, LifecycleError> {
        if let Some(order) = self.db.complete_order(payment_reference).await? {
            info!("🔄️✅️ Order {order} confirmed by the gateway");
            return Ok(TransitionOutcome::Transitioned(order));
        }
        if let Some(order) = self.db.fetch_order_by_payment_reference(payment_reference).await? {
            if order.status != OrderStatusType::Completed {
                warn!(
                    "🔄️✅️ The gateway reports payment [{payment_reference}] succeeded, but {order} is already final. \
                     Leaving it as is."
                );
            } else {
                debug!("🔄️✅️ {order} is already confirmed. Nothing to do.");
            }
            return Ok(TransitionOutcome::Unchanged(order));
        }
        info!("🔄️✅️ No order exists for confirmed payment [{payment_reference}]. Creating it from payment metadata.");
        let new_order = self.order_from_metadata(payment_reference, gateway_amount, gateway_currency, metadata).await?;
        let (order, created) = self.db.insert_order(new_order).await?;
        if created {
            info!("🔄️✅️ Order {order} created from gateway confirmation");
            return Ok(TransitionOutcome::Created(order));
        }
        // The storefront's provisional write landed between our lookup and our insert.
        debug!("🔄️✅️ {order} appeared while handling the confirmation. Completing it.");
        match self.db.complete_order(payment_reference).await? {
            Some(order) => Ok(TransitionOutcome::Transitioned(order)),
            None => Ok(TransitionOutcome::Unchanged(order)),
        }
    }

    async fn order_from_metadata(
        &self,
        payment_reference: &str,
        amount: i64,
        currency: &str,
        metadata: &PaymentMetadata,
    ) -> Result<NewOrder, LifecycleError> {
        let (Some(product_id), Some(quantity)) = (metadata.product_id, metadata.quantity) else {
            error!("🔄️✅️ Payment [{payment_reference}] has no product or quantity metadata. The order is lost.");
            return Err(LifecycleError::MalformedMetadata(payment_reference.to_string()));
        };
        if quantity <= 0 {
            error!("🔄️✅️ Payment [{payment_reference}] carries an invalid quantity ({quantity}). The order is lost.");
            return Err(LifecycleError::MalformedMetadata(payment_reference.to_string()));
        }
        if self.db.fetch_product_including_inactive(product_id).await?.is_none() {
            error!("🔄️✅️ Payment [{payment_reference}] refers to unknown product {product_id}. The order is lost.");
            return Err(LifecycleError::ProductNotFound(product_id));
        }
        let user_id = self.db.fetch_or_create_user(&metadata.customer).await?.map(|u| u.id);
        let customer = metadata.customer.clone();
        let order = NewOrder::confirmed(payment_reference, product_id, quantity, amount, currency, customer);
        Ok(order.with_user_id(user_id))
    }

    /// The gateway says the payment failed or was cancelled. Only orders that are still processing are failed. An
    /// order that was already confirmed is not downgraded by a late or out-of-order failure event.
    pub async fn fail_from_gateway(&self, payment_reference: &str) -> Result<TransitionOutcome, LifecycleError> {
        if let Some(order) = self.db.fail_order(payment_reference).await? {
            info!("🔄️❌️ Order {order} failed at the gateway");
            return Ok(TransitionOutcome::Transitioned(order));
        }
        match self.db.fetch_order_by_payment_reference(payment_reference).await? {
            Some(order) => {
                debug!("🔄️❌️ {order} is already final. Ignoring the failure notice.");
                Ok(TransitionOutcome::Unchanged(order))
            },
            None => {
                debug!("🔄️❌️ There is no order for failed payment [{payment_reference}]. Nothing to fail.");
                Ok(TransitionOutcome::NoOrder)
            },
        }
    }

    /// The gateway says the money went back to the buyer.
    pub async fn refund_from_gateway(&self, payment_reference: &str) -> Result<TransitionOutcome, LifecycleError> {
        if let Some(order) = self.db.refund_order(payment_reference).await? {
            info!("🔄️💸️ Order {order} was refunded");
            return Ok(TransitionOutcome::Transitioned(order));
        }
        match self.db.fetch_order_by_payment_reference(payment_reference).await? {
            Some(order) => {
                if order.status == OrderStatusType::Processing {
                    warn!("🔄️💸️ Refund received for {order}, which has not settled yet. Ignoring it.");
                }
                Ok(TransitionOutcome::Unchanged(order))
            },
            None => {
                warn!("🔄️💸️ Refund received for payment [{payment_reference}], but there is no such order.");
                Ok(TransitionOutcome::NoOrder)
            },
        }
    }

    /// Bookkeeping for the sweeper's backoff. The order's status is not touched.
    pub async fn mark_sync_attempt(&self, order_id: i64, success: bool) -> Result<Order, LifecycleError> {
        let order = self.db.record_sync_attempt(order_id, chrono::Utc::now()).await?;
        if success {
            trace!("🔄️🔁️ Sync attempt #{} recorded for {order}", order.sync_attempts);
        } else {
            debug!("🔄️🔁️ Failed sync attempt #{} recorded for {order}", order.sync_attempts);
        }
        Ok(order)
    }

    /// Drives the order for `intent` towards the gateway's view of the payment.
    pub async fn apply_gateway_status(&self, intent: &PaymentIntent) -> Result<ReconcileOutcome, LifecycleError> {
        let outcome = match intent.status {
            GatewayPaymentStatus::Succeeded => {
                self.confirm_from_gateway(&intent.id, intent.amount, &intent.currency, &intent.metadata).await?
            },
            GatewayPaymentStatus::Failed => self.fail_from_gateway(&intent.id).await?,
            GatewayPaymentStatus::Pending => match self.db.fetch_order_by_payment_reference(&intent.id).await? {
                Some(order) => TransitionOutcome::Unchanged(order),
                None => TransitionOutcome::NoOrder,
            },
        };
        let result = match outcome.into_order() {
            Some(order) if order.status.is_final() => ReconcileOutcome::Synced(order),
            Some(order) => ReconcileOutcome::Pending(order),
            None => ReconcileOutcome::NoOrder,
        };
        Ok(result)
    }

    /// Looks up an order for a buyer who is waiting on it.
    ///
    /// Orders that are still processing are checked against the gateway, and the gateway's answer is applied
    /// before responding. A gateway that cannot be reached leaves the order pending.
    pub async fn order_status<G: PaymentGateway>(
        &self,
        payment_reference: &str,
        gateway: &G,
    ) -> Result<OrderQueryResult, LifecycleError> {
        let Some(order) = self.db.fetch_order_by_payment_reference(payment_reference).await? else {
            return Ok(OrderQueryResult::NotFound);
        };
        match order.status {
            OrderStatusType::Completed | OrderStatusType::Refunded => return Ok(OrderQueryResult::Confirmed(order)),
            OrderStatusType::Failed => return Ok(OrderQueryResult::NeverCompleted(order)),
            OrderStatusType::Processing => {},
        }
        let intent = match gateway.retrieve_payment_intent(payment_reference).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!("🔄️🔍️ Could not check payment [{payment_reference}] with the gateway. {e}");
                return Ok(OrderQueryResult::Pending(order));
            },
        };
        let result = match self.apply_gateway_status(&intent).await? {
            ReconcileOutcome::Synced(o) if o.status == OrderStatusType::Failed => OrderQueryResult::NeverCompleted(o),
            ReconcileOutcome::Synced(o) => OrderQueryResult::Confirmed(o),
            ReconcileOutcome::Pending(o) => OrderQueryResult::Pending(o),
            ReconcileOutcome::NoOrder => OrderQueryResult::Pending(order),
        };
        Ok(result)
    }
}
