//! Operator access control for the admin endpoints.
//!
//! The middleware reads the `Authorization: Bearer <token>` header, asks the [`IdentityProvider`] who the token
//! belongs to, and only lets the request through if that user holds the [`Role::Admin`] role. A missing or rejected
//! token is a 401, a valid token without the admin role is a 403.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error,
};
use futures::future::LocalBoxFuture;
use log::*;
use sfp_engine::db_types::Role;

use crate::{
    auth::{IdentityError, IdentityProvider},
    errors::{AuthError, ServerError},
};

pub struct AdminMiddlewareFactory<I> {
    identity: Rc<I>,
}

impl<I> AdminMiddlewareFactory<I> {
    pub fn new(identity: I) -> Self {
        Self { identity: Rc::new(identity) }
    }
}

impl<S, B, I> Transform<S, ServiceRequest> for AdminMiddlewareFactory<I>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    I: IdentityProvider + 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AdminMiddlewareService<S, I>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminMiddlewareService { identity: Rc::clone(&self.identity), service: Rc::new(service) }))
    }
}

pub struct AdminMiddlewareService<S, I> {
    identity: Rc<I>,
    service: Rc<S>,
}

impl<S, B, I> Service<ServiceRequest> for AdminMiddlewareService<S, I>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    I: IdentityProvider + 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let identity = Rc::clone(&self.identity);
        Box::pin(async move {
            let token = bearer_token(&req).ok_or_else(|| {
                debug!("🔐️ No bearer token on admin request {}", req.path());
                ServerError::from(AuthError::InvalidBearerToken)
            })?;
            let user_id = identity.verify_token(&token).await.map_err(|e| {
                info!("🔐️ Admin request {} refused. {e}", req.path());
                identity_error(e)
            })?;
            let role = identity.fetch_role(&user_id).await.map_err(|e| {
                warn!("🔐️ Could not fetch the role for {user_id}. {e}");
                identity_error(e)
            })?;
            if role != Role::Admin {
                warn!("🔐️ {user_id} tried to call {} without the admin role", req.path());
                let err = AuthError::InsufficientPermissions(format!("{} requires the admin role", req.path()));
                return Err(ServerError::from(err).into());
            }
            debug!("🔐️ Admin request {} from {user_id}", req.path());
            service.call(req).await
        })
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

fn identity_error(e: IdentityError) -> ServerError {
    match e {
        IdentityError::InvalidToken(_) => AuthError::InvalidBearerToken.into(),
        IdentityError::UnknownUser(u) => AuthError::InsufficientPermissions(format!("Unknown user {u}")).into(),
        IdentityError::Unavailable(s) => AuthError::IdentityProviderUnavailable(s).into(),
    }
}
