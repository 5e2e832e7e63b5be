use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use gateway_tools::GatewayApi;
use log::*;
use sfp_engine::{OrderLifecycleApi, ReconciliationSweeper, SqliteDatabase, SweepConfig};

use crate::{
    admin_routes::{ResyncOrderRoute, SyncStatisticsRoute, TriggerSweepRoute},
    auth::{HttpIdentityProvider, MemoryNonceLedger, NonceLedger, SignedRequestAuthenticator},
    config::ServerConfig,
    errors::ServerError,
    gateway_routes::GatewayWebhookRoute,
    integrations::gateway::GatewayClient,
    middleware::{AdminMiddlewareFactory, SignedRequestMiddlewareFactory},
    routes::{health, CreatePaymentIntentRoute, CreateProvisionalOrderRoute, GetOrderRoute},
    sweep_worker::start_sweep_worker,
};

type Sweeper = ReconciliationSweeper<SqliteDatabase, GatewayClient>;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let api = GatewayApi::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = GatewayClient::new(api);
    let sweep_config =
        SweepConfig { min_retry_gap: config.sweep.min_retry_gap, gateway_timeout: config.sweep.gateway_timeout };
    let sweeper = ReconciliationSweeper::new(db.clone(), gateway.clone(), sweep_config);
    let _worker = start_sweep_worker(sweeper.clone(), config.sweep.interval);
    let identity =
        HttpIdentityProvider::new(config.identity.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db, gateway, sweeper, identity)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: GatewayClient,
    sweeper: Sweeper,
    identity: HttpIdentityProvider,
) -> Result<Server, ServerError> {
    // Shared by all workers
    let ledger: Arc<dyn NonceLedger> = Arc::new(MemoryNonceLedger::new(config.auth.window));
    let authenticator = SignedRequestAuthenticator::new(&config.auth, ledger);
    if !authenticator.has_keys() {
        warn!("🔐️ No API keys are configured. Every /api request will be answered with 503.");
    }
    let ServerConfig { host, port, gateway: gateway_config, use_x_forwarded_for, use_forwarded, .. } = config;
    let srv = HttpServer::new(move || {
        let lifecycle = OrderLifecycleApi::new(db.clone());
        let api_scope = web::scope("/api")
            .wrap(SignedRequestMiddlewareFactory::new(
                authenticator.clone(),
                use_x_forwarded_for,
                use_forwarded,
            ))
            .service(CreateProvisionalOrderRoute::<SqliteDatabase>::new())
            .service(CreatePaymentIntentRoute::<SqliteDatabase, GatewayClient>::new())
            .service(GetOrderRoute::<SqliteDatabase, GatewayClient>::new());
        let webhook_scope = web::scope("/webhook").service(GatewayWebhookRoute::<SqliteDatabase>::new());
        let admin_scope = web::scope("/admin")
            .wrap(AdminMiddlewareFactory::new(identity.clone()))
            .service(SyncStatisticsRoute::<SqliteDatabase, GatewayClient>::new())
            .service(TriggerSweepRoute::<SqliteDatabase, GatewayClient>::new())
            .service(ResyncOrderRoute::<SqliteDatabase, GatewayClient>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sfp::access_log"))
            .app_data(web::Data::new(lifecycle))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(sweeper.clone()))
            .app_data(web::Data::new(gateway_config.clone()))
            .service(health)
            .service(api_scope)
            .service(webhook_scope)
            .service(admin_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
