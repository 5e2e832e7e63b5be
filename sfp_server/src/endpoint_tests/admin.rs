use std::time::Duration;

use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use serde_json::Value;
use sfp_engine::{
    db_types::{CustomerDetails, OrderStatusType, Role},
    test_utils::fake_gateway::FakeGateway,
    traits::GatewayPaymentStatus,
    OrderLifecycleApi,
    OrderManagement,
    ReconciliationSweeper,
    SqliteDatabase,
    SweepConfig,
};

use super::{
    helpers::{database_with_products, send},
    mocks::MockIdentity,
};
use crate::{
    admin_routes::{ResyncOrderRoute, SyncStatisticsRoute, TriggerSweepRoute},
    auth::IdentityError,
    middleware::AdminMiddlewareFactory,
};

macro_rules! admin_app {
    ($identity:expr, $sweeper:expr) => {
        test::init_service(
            App::new().app_data(web::Data::new($sweeper.clone())).service(
                web::scope("/admin")
                    .wrap(AdminMiddlewareFactory::new($identity))
                    .service(SyncStatisticsRoute::<SqliteDatabase, FakeGateway>::new())
                    .service(TriggerSweepRoute::<SqliteDatabase, FakeGateway>::new())
                    .service(ResyncOrderRoute::<SqliteDatabase, FakeGateway>::new()),
            ),
        )
        .await
    };
}

fn identity() -> MockIdentity {
    let mut identity = MockIdentity::new();
    identity.expect_verify_token().returning(|token| match token {
        "admin-token" => Ok("user-admin".to_string()),
        "customer-token" => Ok("user-customer".to_string()),
        "orphan-token" => Ok("user-gone".to_string()),
        _ => Err(IdentityError::InvalidToken("expired".into())),
    });
    identity.expect_fetch_role().returning(|user| match user {
        "user-admin" => Ok(Role::Admin),
        "user-gone" => Err(IdentityError::UnknownUser(user.to_string())),
        _ => Ok(Role::Customer),
    });
    identity
}

fn admin_request(req: TestRequest, token: &str) -> TestRequest {
    req.insert_header(("Authorization", format!("Bearer {token}")))
}

fn sweeper(db: &SqliteDatabase, gateway: &FakeGateway) -> ReconciliationSweeper<SqliteDatabase, FakeGateway> {
    let config = SweepConfig { min_retry_gap: Duration::from_secs(300), gateway_timeout: Duration::from_secs(5) };
    ReconciliationSweeper::new(db.clone(), gateway.clone(), config)
}

async fn provisional_order(db: &SqliteDatabase, reference: &str) {
    let api = OrderLifecycleApi::new(db.clone());
    api.create_provisional(reference, 7, 1, CustomerDetails::default()).await.expect("Error creating order");
}

#[actix_web::test]
async fn admin_endpoints_need_an_admin() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let gateway = FakeGateway::new();
    let sweeper = sweeper(&db, &gateway);
    let app = admin_app!(identity(), sweeper);

    let req = TestRequest::post().uri("/admin/sync").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::post().uri("/admin/sync").insert_header(("Authorization", "Basic YWRtaW46YWRtaW4="));
    let req = req.to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = admin_request(TestRequest::post().uri("/admin/sync"), "stale-token").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = admin_request(TestRequest::post().uri("/admin/sync"), "customer-token").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = admin_request(TestRequest::get().uri("/admin/sync/stats"), "orphan-token").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn identity_provider_outage() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let gateway = FakeGateway::new();
    let sweeper = sweeper(&db, &gateway);
    let mut identity = MockIdentity::new();
    identity.expect_verify_token().returning(|_| Err(IdentityError::Unavailable("connection refused".into())));
    identity.expect_fetch_role().never();
    let app = admin_app!(identity, sweeper);
    let req = admin_request(TestRequest::post().uri("/admin/sync"), "admin-token").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn manual_sweep_and_statistics() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let gateway = FakeGateway::new();
    provisional_order(&db, "pi_1").await;
    provisional_order(&db, "pi_2").await;
    gateway.set_payment("pi_1", GatewayPaymentStatus::Succeeded, 7, 1, 700);
    gateway.set_payment("pi_2", GatewayPaymentStatus::Pending, 7, 1, 700);
    let sweeper = sweeper(&db, &gateway);
    let app = admin_app!(identity(), sweeper);

    let req = admin_request(TestRequest::post().uri("/admin/sync"), "admin-token").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, r#"{"synced":1,"failed":0,"skipped":1}"#);

    let order = db.fetch_order_by_payment_reference("pi_1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Completed);
    assert!(!order.is_provisional);

    let req = admin_request(TestRequest::get().uri("/admin/sync/stats"), "admin-token").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let stats: Vec<Value> = serde_json::from_str(&body).unwrap();
    let count = |status: &str, provisional: bool| {
        stats
            .iter()
            .find(|s| s["status"] == status && s["isProvisional"] == provisional)
            .and_then(|s| s["count"].as_i64())
            .unwrap_or(0)
    };
    assert_eq!(count("completed", false), 1);
    assert_eq!(count("processing", true), 1);
}

#[actix_web::test]
async fn resync_single_order() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let gateway = FakeGateway::new();
    provisional_order(&db, "pi_1").await;
    gateway.set_payment("pi_1", GatewayPaymentStatus::Failed, 7, 1, 700);
    // Paid at the gateway but never recorded by the storefront
    gateway.set_payment("pi_lost", GatewayPaymentStatus::Succeeded, 3, 2, 600);
    let sweeper = sweeper(&db, &gateway);
    let app = admin_app!(identity(), sweeper);

    let req = admin_request(TestRequest::post().uri("/admin/sync/pi_1"), "admin-token").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let outcome: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(outcome["outcome"], "synced");
    assert_eq!(outcome["order"]["status"], "failed");

    let req = admin_request(TestRequest::post().uri("/admin/sync/pi_lost"), "admin-token").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order = db.fetch_order_by_payment_reference("pi_lost").await.unwrap().expect("order was not rebuilt");
    assert_eq!(order.status, OrderStatusType::Completed);
    assert_eq!(order.product_id, 3);
    assert_eq!(order.quantity, 2);

    let req = admin_request(TestRequest::post().uri("/admin/sync/pi_nobody"), "admin-token").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn only_one_sweep_at_a_time() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let gateway = FakeGateway::new().with_delay(Duration::from_millis(500));
    provisional_order(&db, "pi_1").await;
    gateway.set_payment("pi_1", GatewayPaymentStatus::Succeeded, 7, 1, 700);
    let sweeper = sweeper(&db, &gateway);
    let app = admin_app!(identity(), sweeper);

    let first = admin_request(TestRequest::post().uri("/admin/sync"), "admin-token").to_request();
    let second = admin_request(TestRequest::post().uri("/admin/sync"), "admin-token").to_request();
    let ((s1, _), (s2, _)) = futures::join!(send(&app, first), send(&app, second));
    let mut statuses = [s1, s2];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

    // The flag is cleared once the sweep finishes
    let req = admin_request(TestRequest::post().uri("/admin/sync"), "admin-token").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"synced":0,"failed":0,"skipped":0}"#);
}
