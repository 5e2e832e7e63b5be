//----------------------------------------------   Gateway webhook  ----------------------------------------------
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use gateway_tools::{
    webhook::{verify_signature, GatewayEvent, SIGNATURE_HEADER},
    GatewayConfig,
};
use log::*;
use sfp_engine::{OrderLifecycleApi, StorefrontDatabase};

use crate::{
    data_objects::WebhookReceipt,
    errors::ServerError,
    integrations::gateway::{dispatch_event, WebhookAction},
    route,
};

route!(gateway_webhook => Post "/gateway" impl StorefrontDatabase);
/// Receives payment events from the gateway.
///
/// The signature is checked against the raw body before anything is parsed. Once the signature is good, the answer is
/// a 200 unless the store or the gateway failed. Events that can never be applied (an unknown product, missing
/// metadata, an event kind we do not handle) are logged and acknowledged.
pub async fn gateway_webhook<B: StorefrontDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<OrderLifecycleApi<B>>,
    config: web::Data<GatewayConfig>,
) -> Result<HttpResponse, ServerError> {
    trace!("🪝️ Received gateway webhook ({} bytes)", body.len());
    let secret = config.webhook_secret.reveal();
    if secret.is_empty() {
        error!("🪝️ A gateway webhook arrived, but SFP_GATEWAY_WEBHOOK_SECRET is not set. Rejecting it.");
        return Err(ServerError::InvalidWebhookSignature("No webhook secret is configured".into()));
    }
    let header = req.headers().get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
    let tolerance = i64::try_from(config.webhook_tolerance.as_secs()).unwrap_or(i64::MAX);
    verify_signature(secret, header, body.as_ref(), tolerance, Utc::now()).map_err(|e| {
        warn!("🪝️ Rejecting gateway webhook. {e}");
        ServerError::InvalidWebhookSignature(e.to_string())
    })?;
    let event = serde_json::from_slice::<GatewayEvent>(body.as_ref()).map_err(|e| {
        warn!("🪝️ Could not parse gateway event. {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    let payload = event.payload().map_err(|e| {
        warn!("🪝️ Gateway event {} ({}) has an unexpected shape. {e}", event.id, event.kind);
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    debug!("🪝️ Gateway event {} ({})", event.id, event.kind);
    match dispatch_event(api.as_ref(), payload).await {
        Ok(WebhookAction::Ignored(reason)) => trace!("🪝️ Event {} ignored: {reason}", event.id),
        Ok(action) => info!("🪝️ Event {} applied: {action:?}", event.id),
        Err(e) if e.is_terminal() => {
            error!("🪝️ Event {} ({}) cannot be applied and will not be retried. {e}", event.id, event.kind)
        },
        Err(e) => {
            warn!("🪝️ Event {} ({}) failed. The gateway will redeliver it. {e}", event.id, event.kind);
            return Err(e.into());
        },
    }
    Ok(HttpResponse::Ok().json(WebhookReceipt { received: true }))
}
