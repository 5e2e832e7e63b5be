use std::{sync::Arc, time::Duration};

use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
};
use chrono::{SecondsFormat, Utc};
use sfp_common::Secret;
use sfp_engine::{test_utils::prepare_env::test_database, SqliteDatabase};

use crate::{
    auth::{sign_request, MemoryNonceLedger, SignedRequestAuthenticator},
    config::{ApiKeyRecord, AuthConfig},
};

// Test credentials. DO NOT re-use these anywhere.
pub const API_KEY: &str = "shop:abc123";
pub const API_SECRET: &str = "s3cr3t";

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        api_keys: vec![ApiKeyRecord {
            label: "shop".into(),
            key: Secret::new(API_KEY.into()),
            secret: Secret::new(API_SECRET.into()),
        }],
        window: Duration::from_secs(300),
    }
}

pub fn authenticator(config: &AuthConfig) -> SignedRequestAuthenticator {
    SignedRequestAuthenticator::new(config, Arc::new(MemoryNonceLedger::new(config.window)))
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A request signed with the test credentials.
pub fn signed_request(method: &str, path: &str, body: &str, nonce: &str) -> TestRequest {
    signed_request_at(method, path, body, nonce, &now_rfc3339())
}

pub fn signed_request_at(method: &str, path: &str, body: &str, nonce: &str, timestamp: &str) -> TestRequest {
    let signature = sign_request(API_SECRET, method, path, timestamp, nonce, body.as_bytes());
    let req = match method {
        "GET" => TestRequest::get(),
        _ => TestRequest::post().insert_header(ContentType::json()).set_payload(body.to_string()),
    };
    req.uri(path)
        .insert_header(("x-api-key", API_KEY))
        .insert_header(("x-timestamp", timestamp.to_string()))
        .insert_header(("x-nonce", nonce.to_string()))
        .insert_header(("x-signature", signature))
}

/// A test database holding products 1 to 7. Product `n` costs `n * 100` USD cents.
pub async fn database_with_products() -> SqliteDatabase {
    let db = test_database().await;
    for n in 1..=7 {
        db.insert_product(&format!("Product {n}"), n * 100, "USD").await.expect("Error inserting product");
    }
    db
}

/// Sends the request and returns the status and body. Errors raised by middleware are rendered the same way the
/// server would render them.
pub async fn send<S, B>(service: &S, req: Request) -> (StatusCode, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    match test::try_call_service(service, req).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = actix_web::body::to_bytes(res.into_body()).await.unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}
