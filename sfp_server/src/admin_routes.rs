//! Operator endpoints for the reconciliation sweeper. The `/admin` scope is wrapped in the admin middleware, so every
//! handler here can assume the caller is an administrator.
use actix_web::{web, HttpResponse};
use log::*;
use sfp_engine::{traits::PaymentGateway, ReconciliationSweeper, StorefrontDatabase};

use crate::{errors::ServerError, route};

route!(trigger_sweep => Post "/sync" impl StorefrontDatabase, PaymentGateway);
/// Runs a sweep now and returns its counters. Answers 409 if a sweep (scheduled or manual) is already running.
pub async fn trigger_sweep<B: StorefrontDatabase, G: PaymentGateway>(
    sweeper: web::Data<ReconciliationSweeper<B, G>>,
) -> Result<HttpResponse, ServerError> {
    info!("💻️ Manual reconciliation sweep requested");
    let result = sweeper.sweep().await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(sync_statistics => Get "/sync/stats" impl StorefrontDatabase, PaymentGateway);
pub async fn sync_statistics<B: StorefrontDatabase, G: PaymentGateway>(
    sweeper: web::Data<ReconciliationSweeper<B, G>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET sync statistics");
    let stats = sweeper.statistics().await?;
    Ok(HttpResponse::Ok().json(stats))
}

route!(resync_order => Post "/sync/{payment_reference}" impl StorefrontDatabase, PaymentGateway);
/// Reconciles one order with the gateway, whether or not it is due.
pub async fn resync_order<B: StorefrontDatabase, G: PaymentGateway>(
    path: web::Path<String>,
    sweeper: web::Data<ReconciliationSweeper<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let payment_reference = path.into_inner();
    info!("💻️ Manual resync of [{payment_reference}] requested");
    let outcome = sweeper.resync_order(&payment_reference).await?;
    Ok(HttpResponse::Ok().json(outcome))
}
