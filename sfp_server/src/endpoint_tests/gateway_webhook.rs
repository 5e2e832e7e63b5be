use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use chrono::Utc;
use gateway_tools::{
    webhook::{sign_payload, SIGNATURE_HEADER},
    GatewayConfig,
};
use serde_json::{json, Value};
use sfp_common::Secret;
use sfp_engine::{
    db_types::{CustomerDetails, OrderStatusType},
    OrderLifecycleApi,
    OrderManagement,
    SqliteDatabase,
};

use super::helpers::{database_with_products, send};
use crate::gateway_routes::GatewayWebhookRoute;

const WEBHOOK_SECRET: &str = "whsec_test_secret";

fn gateway_config() -> GatewayConfig {
    GatewayConfig { webhook_secret: Secret::new(WEBHOOK_SECRET.into()), ..GatewayConfig::default() }
}

macro_rules! webhook_app {
    ($db:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(OrderLifecycleApi::new($db.clone())))
                .app_data(web::Data::new(gateway_config()))
                .service(web::scope("/webhook").service(GatewayWebhookRoute::<SqliteDatabase>::new())),
        )
        .await
    };
}

fn intent_event(kind: &str, reference: &str, status: &str, metadata: Value) -> String {
    json!({
        "id": format!("evt_{reference}_{status}"),
        "type": kind,
        "created": Utc::now().timestamp(),
        "data": { "object": {
            "id": reference,
            "object": "payment_intent",
            "amount": 700,
            "currency": "usd",
            "status": status,
            "metadata": metadata
        }}
    })
    .to_string()
}

fn succeeded(reference: &str) -> String {
    intent_event("payment_intent.succeeded", reference, "succeeded", json!({"productId": "7", "quantity": "1"}))
}

fn refunded(reference: &str, amount_refunded: i64) -> String {
    json!({
        "id": format!("evt_refund_{reference}_{amount_refunded}"),
        "type": "charge.refunded",
        "data": { "object": {
            "id": format!("ch_{reference}"),
            "object": "charge",
            "payment_intent": reference,
            "amount": 700,
            "amount_refunded": amount_refunded,
            "refunded": amount_refunded >= 700,
            "currency": "usd"
        }}
    })
    .to_string()
}

fn webhook(body: &str) -> TestRequest {
    let signature = sign_payload(WEBHOOK_SECRET, Utc::now().timestamp(), body.as_bytes());
    TestRequest::post()
        .uri("/webhook/gateway")
        .insert_header((SIGNATURE_HEADER, signature))
        .insert_header(("content-type", "application/json"))
        .set_payload(body.to_string())
}

async fn provisional_order(db: &SqliteDatabase, reference: &str) {
    let api = OrderLifecycleApi::new(db.clone());
    api.create_provisional(reference, 7, 1, CustomerDetails::default()).await.expect("Error creating order");
}

#[actix_web::test]
async fn payment_succeeded_completes_provisional_order() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    provisional_order(&db, "pi_1").await;
    let app = webhook_app!(db);
    let (status, body) = send(&app, webhook(&succeeded("pi_1")).to_request()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, r#"{"received":true}"#);
    let order = db.fetch_order_by_payment_reference("pi_1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Completed);
    assert!(!order.is_provisional);

    // Redelivery changes nothing
    let (status, _) = send(&app, webhook(&succeeded("pi_1")).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    let again = db.fetch_order_by_payment_reference("pi_1").await.unwrap().unwrap();
    assert_eq!(again, order);
}

#[actix_web::test]
async fn payment_succeeded_without_provisional_order() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let app = webhook_app!(db);
    let (status, _) = send(&app, webhook(&succeeded("pi_lost")).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    let order = db.fetch_order_by_payment_reference("pi_lost").await.unwrap().expect("order was not created");
    assert_eq!(order.status, OrderStatusType::Completed);
    assert_eq!(order.product_id, 7);
    assert_eq!(order.amount, 700);
    assert!(!order.is_provisional);
}

#[actix_web::test]
async fn unknown_product_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let app = webhook_app!(db);
    let metadata = json!({"productId": "99", "quantity": "1"});
    let body = intent_event("payment_intent.succeeded", "pi_1", "succeeded", metadata);
    let (status, _) = send(&app, webhook(&body).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(db.fetch_order_by_payment_reference("pi_1").await.unwrap().is_none());
}

#[actix_web::test]
async fn payment_failed() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    provisional_order(&db, "pi_1").await;
    provisional_order(&db, "pi_2").await;
    let app = webhook_app!(db);
    let failed = intent_event("payment_intent.payment_failed", "pi_1", "requires_payment_method", json!({}));
    let (status, _) = send(&app, webhook(&failed).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    let canceled = intent_event("payment_intent.canceled", "pi_2", "canceled", json!({}));
    let (status, _) = send(&app, webhook(&canceled).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    for reference in ["pi_1", "pi_2"] {
        let order = db.fetch_order_by_payment_reference(reference).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatusType::Failed);
    }
    // A failure for a payment we have never heard of is a no-op
    let unknown = intent_event("payment_intent.payment_failed", "pi_3", "requires_payment_method", json!({}));
    let (status, _) = send(&app, webhook(&unknown).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(db.fetch_order_by_payment_reference("pi_3").await.unwrap().is_none());
}

#[actix_web::test]
async fn refunds() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    provisional_order(&db, "pi_1").await;
    let app = webhook_app!(db);
    send(&app, webhook(&succeeded("pi_1")).to_request()).await;

    let (status, _) = send(&app, webhook(&refunded("pi_1", 300)).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    let order = db.fetch_order_by_payment_reference("pi_1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Completed);

    let (status, _) = send(&app, webhook(&refunded("pi_1", 700)).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    let order = db.fetch_order_by_payment_reference("pi_1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Refunded);
}

#[actix_web::test]
async fn other_event_kinds_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let app = webhook_app!(db);
    let body = json!({"id": "evt_1", "type": "customer.created", "data": {"object": {"id": "cus_1"}}}).to_string();
    let (status, body) = send(&app, webhook(&body).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true}"#);
}

#[actix_web::test]
async fn bad_signatures_are_rejected() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    provisional_order(&db, "pi_1").await;
    let app = webhook_app!(db);

    // Signed with the wrong secret
    let body = succeeded("pi_1");
    let signature = sign_payload("whsec_other", Utc::now().timestamp(), body.as_bytes());
    let req = webhook(&body).insert_header((SIGNATURE_HEADER, signature)).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Signed too long ago
    let signature = sign_payload(WEBHOOK_SECRET, Utc::now().timestamp() - 3600, body.as_bytes());
    let req = webhook(&body).insert_header((SIGNATURE_HEADER, signature)).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Body swapped after signing
    let req = webhook(&body).set_payload(succeeded("pi_2")).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // No signature at all
    let req = TestRequest::post().uri("/webhook/gateway").set_payload(body.clone()).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let order = db.fetch_order_by_payment_reference("pi_1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Processing);
    assert!(db.fetch_order_by_payment_reference("pi_2").await.unwrap().is_none());
}
