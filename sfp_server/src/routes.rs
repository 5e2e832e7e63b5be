//! Request handler definitions for the storefront API.
//!
//! Handlers that are more than a line or two go into their own module (see [`crate::gateway_routes`] and
//! [`crate::admin_routes`]).
//!
//! Each worker thread processes its requests sequentially, so a handler must never block the thread. Database and
//! gateway calls are all async and are awaited; nothing here sleeps or does blocking I/O.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use sfp_engine::{
    db_types::CustomerDetails,
    order_objects::OrderQueryResult,
    traits::PaymentGateway,
    OrderLifecycleApi,
    StorefrontDatabase,
};

use crate::{
    auth::ApiClient,
    data_objects::{
        PaymentIntentRequest,
        PaymentIntentResponse,
        PendingOrderResponse,
        ProvisionalOrderRequest,
        ProvisionalOrderResponse,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_provisional_order => Post "/create-provisional-order" impl StorefrontDatabase);
/// Called by the storefront as soon as the buyer's payment is confirmed on the client side, before the gateway has
/// settled it. Creates a provisional order, or returns the existing order for the payment if there is one.
pub async fn create_provisional_order<B: StorefrontDatabase>(
    client: web::ReqData<ApiClient>,
    body: web::Json<ProvisionalOrderRequest>,
    api: web::Data<OrderLifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST create-provisional-order [{}] from {}", req.payment_reference, client.label);
    if req.payment_reference.trim().is_empty() {
        return Err(ServerError::InvalidRequestBody("paymentReference is required".into()));
    }
    let customer = CustomerDetails::from(req.customer);
    let (order, created) =
        api.create_provisional(req.payment_reference.trim(), req.product_id, req.quantity, customer).await?;
    Ok(HttpResponse::Ok().json(ProvisionalOrderResponse::new(&order, created)))
}

route!(create_payment_intent => Post "/create-payment-intent" impl StorefrontDatabase, PaymentGateway);
/// Opens a payment with the gateway. The client secret in the response lets the buyer's browser complete the payment
/// directly with the gateway.
pub async fn create_payment_intent<B: StorefrontDatabase, G: PaymentGateway>(
    client: web::ReqData<ApiClient>,
    body: web::Json<PaymentIntentRequest>,
    api: web::Data<OrderLifecycleApi<B>>,
    gateway: web::Data<G>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST create-payment-intent for product {} x{} from {}", req.product_id, req.quantity, client.label);
    let customer = CustomerDetails::from(req.customer);
    let intent = api.new_payment_intent(req.product_id, req.quantity, customer, gateway.get_ref()).await?;
    Ok(HttpResponse::Ok().json(PaymentIntentResponse::from(intent)))
}

route!(get_order => Get "/order/{payment_reference}" impl StorefrontDatabase, PaymentGateway);
/// Looks up the order for a payment.
///
/// * 200 with the order if the payment went through (refunded orders included).
/// * 202 if the gateway has not settled the payment yet.
/// * 400 if the payment never completed.
/// * 404 if there is no order for the payment.
pub async fn get_order<B: StorefrontDatabase, G: PaymentGateway>(
    path: web::Path<String>,
    api: web::Data<OrderLifecycleApi<B>>,
    gateway: web::Data<G>,
) -> Result<HttpResponse, ServerError> {
    let payment_reference = path.into_inner();
    debug!("💻️ GET order [{payment_reference}]");
    match api.order_status(&payment_reference, gateway.get_ref()).await? {
        OrderQueryResult::Confirmed(order) => Ok(HttpResponse::Ok().json(order)),
        OrderQueryResult::Pending(order) => Ok(HttpResponse::Accepted().json(PendingOrderResponse {
            status: order.status.to_string(),
            message: "The payment is still being processed".into(),
            order,
        })),
        OrderQueryResult::NeverCompleted(_) => Err(ServerError::PaymentNeverCompleted(payment_reference)),
        OrderQueryResult::NotFound => {
            Err(ServerError::NoRecordFound(format!("No order for payment {payment_reference}")))
        },
    }
}
