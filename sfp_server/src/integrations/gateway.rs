//! Glue between the gateway's REST client and webhook events on one side, and the order lifecycle engine on the
//! other.
use gateway_tools::{webhook::EventPayload, GatewayApi, GatewayApiError, GatewayPaymentIntent, IntentStatus};
use log::*;
use sfp_common::Secret;
use sfp_engine::{
    order_objects::TransitionOutcome,
    traits::{GatewayError, GatewayPaymentStatus, NewPaymentIntent, PaymentGateway, PaymentIntent, PaymentMetadata},
    LifecycleError,
    OrderLifecycleApi,
    StorefrontDatabase,
};

/// [`PaymentGateway`] backed by the gateway's REST API.
#[derive(Clone)]
pub struct GatewayClient {
    api: GatewayApi,
}

impl GatewayClient {
    pub fn new(api: GatewayApi) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &GatewayApi {
        &self.api
    }
}

impl PaymentGateway for GatewayClient {
    async fn create_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, GatewayError> {
        let mut metadata = intent.metadata.to_pairs().into_iter().collect::<Vec<_>>();
        metadata.sort();
        let created =
            self.api.create_payment_intent(intent.amount, &intent.currency, &metadata).await.map_err(gateway_error)?;
        Ok(to_payment_intent(created))
    }

    async fn retrieve_payment_intent(&self, payment_reference: &str) -> Result<PaymentIntent, GatewayError> {
        let intent = self.api.get_payment_intent(payment_reference).await.map_err(gateway_error)?;
        Ok(to_payment_intent(intent))
    }
}

/// Reduces the gateway's intent status to what the order lifecycle cares about.
///
/// A declined attempt sends an intent back to `requires_payment_method`, which is also the status of an intent that
/// nobody has tried to pay yet. Only the former counts as a failure.
pub fn payment_status(intent: &GatewayPaymentIntent) -> GatewayPaymentStatus {
    match intent.status {
        IntentStatus::Succeeded => GatewayPaymentStatus::Succeeded,
        _ if intent.attempt_failed() => GatewayPaymentStatus::Failed,
        _ => GatewayPaymentStatus::Pending,
    }
}

pub fn to_payment_intent(intent: GatewayPaymentIntent) -> PaymentIntent {
    let status = payment_status(&intent);
    PaymentIntent {
        status,
        metadata: PaymentMetadata::from_pairs(&intent.metadata),
        client_secret: intent.client_secret.map(Secret::new),
        amount: intent.amount,
        currency: intent.currency.to_lowercase(),
        id: intent.id,
    }
}

fn gateway_error(e: GatewayApiError) -> GatewayError {
    match e {
        GatewayApiError::Timeout => GatewayError::Timeout,
        GatewayApiError::NotFound(s) => GatewayError::NotFound(s),
        GatewayApiError::JsonError(s) => GatewayError::InvalidResponse(s),
        GatewayApiError::QueryError { status, message } if (400..500).contains(&status) => {
            GatewayError::Rejected(format!("{status}. {message}"))
        },
        e => GatewayError::Unavailable(e.to_string()),
    }
}

/// What the webhook handler did with an event.
#[derive(Debug, Clone)]
pub enum WebhookAction {
    Confirmed(TransitionOutcome),
    Failed(TransitionOutcome),
    Refunded(TransitionOutcome),
    Ignored(String),
}

/// Applies a verified gateway event to the order it concerns.
pub async fn dispatch_event<B: StorefrontDatabase>(
    api: &OrderLifecycleApi<B>,
    payload: EventPayload,
) -> Result<WebhookAction, LifecycleError> {
    let action = match payload {
        EventPayload::PaymentSucceeded(intent) => {
            let intent = to_payment_intent(intent);
            let outcome =
                api.confirm_from_gateway(&intent.id, intent.amount, &intent.currency, &intent.metadata).await?;
            WebhookAction::Confirmed(outcome)
        },
        EventPayload::PaymentFailed(intent) | EventPayload::PaymentCanceled(intent) => {
            WebhookAction::Failed(api.fail_from_gateway(&intent.id).await?)
        },
        EventPayload::ChargeRefunded(charge) => match charge.payment_intent.as_deref() {
            Some(reference) if charge.fully_refunded() => {
                WebhookAction::Refunded(api.refund_from_gateway(reference).await?)
            },
            Some(reference) => {
                info!(
                    "🪝️ Charge {} on [{reference}] was partially refunded ({} of {}). The order is unchanged.",
                    charge.id, charge.amount_refunded, charge.amount
                );
                WebhookAction::Ignored(format!("partial refund of {}", charge.id))
            },
            None => {
                warn!("🪝️ Refunded charge {} is not linked to a payment intent. Ignoring it.", charge.id);
                WebhookAction::Ignored(format!("refund of unlinked charge {}", charge.id))
            },
        },
        EventPayload::Other(kind) => {
            debug!("🪝️ Ignoring gateway event of kind {kind}");
            WebhookAction::Ignored(kind)
        },
    };
    Ok(action)
}
