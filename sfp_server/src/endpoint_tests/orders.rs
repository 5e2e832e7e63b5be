use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};
use sfp_common::Secret;
use sfp_engine::{
    db_types::{CustomerDetails, OrderStatusType},
    traits::{GatewayError, GatewayPaymentStatus, PaymentIntent, PaymentMetadata},
    OrderLifecycleApi,
    OrderManagement,
    SqliteDatabase,
};

use super::{
    helpers::{auth_config, authenticator, database_with_products, send, signed_request},
    mocks::MockGateway,
};
use crate::{
    data_objects::PaymentIntentResponse,
    middleware::SignedRequestMiddlewareFactory,
    routes::{CreatePaymentIntentRoute, CreateProvisionalOrderRoute, GetOrderRoute},
};

macro_rules! api_app {
    ($db:expr, $gateway:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(OrderLifecycleApi::new($db.clone())))
                .app_data(web::Data::new($gateway))
                .service(
                    web::scope("/api")
                        .wrap(SignedRequestMiddlewareFactory::new(authenticator(&auth_config()), false, false))
                        .service(CreateProvisionalOrderRoute::<SqliteDatabase>::new())
                        .service(CreatePaymentIntentRoute::<SqliteDatabase, MockGateway>::new())
                        .service(GetOrderRoute::<SqliteDatabase, MockGateway>::new()),
                ),
        )
        .await
    };
}

fn intent(reference: &str, status: GatewayPaymentStatus, product_id: i64, quantity: i64) -> PaymentIntent {
    PaymentIntent {
        id: reference.to_string(),
        status,
        amount: product_id * 100 * quantity,
        currency: "usd".into(),
        client_secret: None,
        metadata: PaymentMetadata::new(product_id, quantity, CustomerDetails::default()),
    }
}

async fn provisional_order(db: &SqliteDatabase, reference: &str) {
    let api = OrderLifecycleApi::new(db.clone());
    api.create_provisional(reference, 7, 1, CustomerDetails::default()).await.expect("Error creating order");
}

#[actix_web::test]
async fn create_payment_intent() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_create_payment_intent()
        .withf(|i| i.amount == 1000 && i.currency == "usd" && i.metadata.product_id == Some(5))
        .times(1)
        .returning(|i| {
            Ok(PaymentIntent {
                id: "pi_new".into(),
                status: GatewayPaymentStatus::Pending,
                amount: i.amount,
                currency: i.currency,
                client_secret: Some(Secret::new("pi_new_secret_123".into())),
                metadata: i.metadata,
            })
        });
    let app = api_app!(db, gateway);
    let body = json!({"productId": 5, "quantity": 2, "customerEmail": "buyer@example.com"}).to_string();
    let req = signed_request("POST", "/api/create-payment-intent", &body, "n1").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let response: PaymentIntentResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(response, PaymentIntentResponse {
        client_secret: Some("pi_new_secret_123".into()),
        payment_intent_id: "pi_new".into(),
        amount: 1000,
        currency: "usd".into(),
    });
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["clientSecret"], "pi_new_secret_123");
}

#[actix_web::test]
async fn create_payment_intent_for_unknown_product() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_payment_intent().never();
    let app = api_app!(db, gateway);
    let body = json!({"productId": 99, "quantity": 1}).to_string();
    let req = signed_request("POST", "/api/create-payment-intent", &body, "n1").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");
}

#[actix_web::test]
async fn gateway_outage_when_creating_payment_intent() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_payment_intent().returning(|_| Err(GatewayError::Timeout));
    let app = api_app!(db, gateway);
    let body = json!({"productId": 1}).to_string();
    let req = signed_request("POST", "/api/create-payment-intent", &body, "n1").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn provisional_order_with_bad_quantity() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let app = api_app!(db, MockGateway::new());
    let body = json!({"paymentReference": "pi_1", "productId": 7, "quantity": 0}).to_string();
    let req = signed_request("POST", "/api/create-provisional-order", &body, "n1").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    // Large enough that the total would overflow
    let body = json!({"paymentReference": "pi_1", "productId": 7, "quantity": i64::MAX / 2}).to_string();
    let req = signed_request("POST", "/api/create-provisional-order", &body, "n2").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(db.fetch_order_by_payment_reference("pi_1").await.unwrap().is_none());
}

#[actix_web::test]
async fn payment_intent_with_oversized_quantity() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_payment_intent().never();
    let app = api_app!(db, gateway);
    let body = json!({"productId": 7, "quantity": i64::MAX / 2}).to_string();
    let req = signed_request("POST", "/api/create-payment-intent", &body, "n1").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[actix_web::test]
async fn unknown_order() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let mut gateway = MockGateway::new();
    gateway.expect_retrieve_payment_intent().never();
    let app = api_app!(db, gateway);
    let req = signed_request("GET", "/api/order/pi_nope", "", "n1").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn pending_order() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    provisional_order(&db, "pi_1").await;
    let mut gateway = MockGateway::new();
    gateway.expect_retrieve_payment_intent().returning(|r| Ok(intent(r, GatewayPaymentStatus::Pending, 7, 1)));
    let app = api_app!(db, gateway);
    let req = signed_request("GET", "/api/order/pi_1", "", "n1").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "processing");
    assert_eq!(json["order"]["paymentReference"], "pi_1");
    assert_eq!(json["order"]["isProvisional"], true);
}

#[actix_web::test]
async fn order_confirmed_while_polling() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    provisional_order(&db, "pi_1").await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_retrieve_payment_intent()
        .times(1)
        .returning(|r| Ok(intent(r, GatewayPaymentStatus::Succeeded, 7, 1)));
    let app = api_app!(db, gateway);
    let req = signed_request("GET", "/api/order/pi_1", "", "n1").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["isProvisional"], false);

    // Completed orders are answered from the store; the gateway is not asked again
    let req = signed_request("GET", "/api/order/pi_1", "", "n2").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let order = db.fetch_order_by_payment_reference("pi_1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Completed);
}

#[actix_web::test]
async fn payment_never_completed() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    provisional_order(&db, "pi_1").await;
    let mut gateway = MockGateway::new();
    gateway.expect_retrieve_payment_intent().returning(|r| Ok(intent(r, GatewayPaymentStatus::Failed, 7, 1)));
    let app = api_app!(db, gateway);
    let req = signed_request("GET", "/api/order/pi_1", "", "n1").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body.contains("never completed"));
    let order = db.fetch_order_by_payment_reference("pi_1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Failed);
}

#[actix_web::test]
async fn gateway_outage_leaves_order_pending() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    provisional_order(&db, "pi_1").await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_retrieve_payment_intent()
        .returning(|_| Err(GatewayError::Unavailable("connection refused".into())));
    let app = api_app!(db, gateway);
    let req = signed_request("GET", "/api/order/pi_1", "", "n1").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}
