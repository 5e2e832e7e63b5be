//! Signed-request middleware for Actix Web.
//!
//! Wrap the storefront API scope with [`SignedRequestMiddlewareFactory`]. The middleware buffers the request body,
//! runs the [`SignedRequestAuthenticator`] over it, and puts the body back for the handler. Admitted requests carry
//! an [`ApiClient`] in their extensions; rejected ones never reach the handler.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
    HttpMessage,
};
use chrono::Utc;
use futures::future::LocalBoxFuture;
use log::*;

use crate::{
    auth::{
        SignedRequest,
        SignedRequestAuthenticator,
        API_KEY_HEADER,
        NONCE_HEADER,
        SIGNATURE_HEADER,
        TIMESTAMP_HEADER,
    },
    errors::ServerError,
    helpers::get_remote_ip,
};

pub struct SignedRequestMiddlewareFactory {
    authenticator: SignedRequestAuthenticator,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
}

impl SignedRequestMiddlewareFactory {
    pub fn new(authenticator: SignedRequestAuthenticator, use_x_forwarded_for: bool, use_forwarded: bool) -> Self {
        Self { authenticator, use_x_forwarded_for, use_forwarded }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SignedRequestMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SignedRequestMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SignedRequestMiddlewareService {
            authenticator: Rc::new(self.authenticator.clone()),
            use_x_forwarded_for: self.use_x_forwarded_for,
            use_forwarded: self.use_forwarded,
            service: Rc::new(service),
        }))
    }
}

pub struct SignedRequestMiddlewareService<S> {
    authenticator: Rc<SignedRequestAuthenticator>,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SignedRequestMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let authenticator = Rc::clone(&self.authenticator);
        let use_x_forwarded_for = self.use_x_forwarded_for;
        let use_forwarded = self.use_forwarded;
        Box::pin(async move {
            let remote_ip = get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded);
            trace!("🔐️ Checking request signature for {} {} from {remote_ip:?}", req.method(), req.path());
            let body = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {e:?}");
                ServerError::InvalidRequestBody("Failed to extract request data.".into())
            })?;
            let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());
            let signed = SignedRequest {
                method: req.method().as_str(),
                path: req.path(),
                api_key: header(API_KEY_HEADER),
                timestamp: header(TIMESTAMP_HEADER),
                nonce: header(NONCE_HEADER),
                signature: header(SIGNATURE_HEADER),
                body: body.as_ref(),
            };
            let client = match authenticator.authenticate(&signed, Utc::now()) {
                Ok(client) => client,
                Err(e) => {
                    info!("🔐️ Refused {} {} from {remote_ip:?}. {e}", req.method(), req.path());
                    return Err(e.into());
                },
            };
            debug!("🔐️ {} {} admitted for {} ({remote_ip:?})", req.method(), req.path(), client.label);
            req.extensions_mut().insert(client);
            req.set_payload(bytes_to_payload(body));
            service.call(req).await
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
