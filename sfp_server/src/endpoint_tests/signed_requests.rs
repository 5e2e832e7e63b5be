use actix_web::{http::StatusCode, test, web, App};
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::json;
use sfp_engine::{db_types::OrderStatusType, OrderLifecycleApi, OrderManagement, SqliteDatabase};

use super::helpers::{
    auth_config,
    authenticator,
    database_with_products,
    send,
    signed_request,
    signed_request_at,
    API_KEY,
};
use crate::{
    config::AuthConfig,
    data_objects::ProvisionalOrderResponse,
    middleware::SignedRequestMiddlewareFactory,
    routes::CreateProvisionalOrderRoute,
};

const PATH: &str = "/api/create-provisional-order";

fn order_body(reference: &str, product_id: i64, quantity: i64) -> String {
    json!({
        "paymentReference": reference,
        "productId": product_id,
        "quantity": quantity,
        "customerEmail": "buyer@example.com",
        "customerName": "Buyer"
    })
    .to_string()
}

macro_rules! api_app {
    ($db:expr, $config:expr) => {
        test::init_service(
            App::new().app_data(web::Data::new(OrderLifecycleApi::new($db.clone()))).service(
                web::scope("/api")
                    .wrap(SignedRequestMiddlewareFactory::new(authenticator(&$config), false, false))
                    .service(CreateProvisionalOrderRoute::<SqliteDatabase>::new()),
            ),
        )
        .await
    };
}

#[actix_web::test]
async fn storefront_scenario_then_replay() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let app = api_app!(db, auth_config());

    let body = r#"{"paymentReference":"pay_1","productId":7,"quantity":1}"#;
    let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
    let req = signed_request_at("POST", PATH, body, "nonce-1", &ts).to_request();
    let (status, response) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    let response: ProvisionalOrderResponse = serde_json::from_str(&response).unwrap();
    assert!(response.success);
    assert!(response.is_provisional);
    assert!(response.created);

    let order = db.fetch_order_by_payment_reference("pay_1").await.unwrap().expect("order should exist");
    assert_eq!(order.id, response.order_id);
    assert_eq!(order.product_id, 7);
    assert_eq!(order.amount, 700);
    assert_eq!(order.status, OrderStatusType::Processing);

    // The identical request, byte for byte
    let req = signed_request_at("POST", PATH, body, "nonce-1", &ts).to_request();
    let (status, response) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT, "{response}");
    assert!(response.contains("already been processed"));
}

#[actix_web::test]
async fn retries_with_a_fresh_nonce_are_idempotent() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let app = api_app!(db, auth_config());
    let body = order_body("pi_retry", 3, 2);
    let (status, first) = send(&app, signed_request("POST", PATH, &body, "a").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = send(&app, signed_request("POST", PATH, &body, "b").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    let first: ProvisionalOrderResponse = serde_json::from_str(&first).unwrap();
    let second: ProvisionalOrderResponse = serde_json::from_str(&second).unwrap();
    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.order_id, second.order_id);
}

#[actix_web::test]
async fn no_keys_configured() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let app = api_app!(db, AuthConfig::default());
    let req = signed_request("POST", PATH, &order_body("pi_1", 7, 1), "n1").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{body}");
    assert!(db.fetch_order_by_payment_reference("pi_1").await.unwrap().is_none());
}

#[actix_web::test]
async fn missing_credentials() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let app = api_app!(db, auth_config());
    let req = test::TestRequest::post()
        .uri(PATH)
        .insert_header(actix_web::http::header::ContentType::json())
        .insert_header(("x-api-key", API_KEY))
        .set_payload(order_body("pi_1", 7, 1))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("x-api-key, x-timestamp, x-nonce and x-signature"), "{body}");
}

#[actix_web::test]
async fn tampered_body() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let app = api_app!(db, auth_config());
    let req = signed_request("POST", PATH, &order_body("pi_1", 7, 1), "n1")
        .set_payload(order_body("pi_1", 7, 100))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("signature is invalid"), "{body}");
    assert!(db.fetch_order_by_payment_reference("pi_1").await.unwrap().is_none());
}

#[actix_web::test]
async fn stale_timestamp() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let app = api_app!(db, auth_config());
    let ts = (Utc::now() - Duration::minutes(10)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let req = signed_request_at("POST", PATH, &order_body("pi_1", 7, 1), "n1", &ts).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("outside the allowed window"), "{body}");
}

#[actix_web::test]
async fn unknown_key() {
    let _ = env_logger::try_init().ok();
    let db = database_with_products().await;
    let app = api_app!(db, auth_config());
    let req = signed_request("POST", PATH, &order_body("pi_1", 7, 1), "n1")
        .insert_header(("x-api-key", "shop:abc124"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Unknown API key"), "{body}");
}
