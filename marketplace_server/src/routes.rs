//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two belong in the engine's API
//! objects, not here.
//!
//! Every handler is async. Anything that touches the database or the network must be awaited rather than blocking the
//! worker thread, since each actix worker processes its requests sequentially.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use marketplace_engine::{PaymentApi, PaymentManagement};

use crate::{
    config::WebhookConfig,
    data_objects::{PaymentCallback, PaymentCallbackResult},
    errors::ServerError,
};

pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

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

//----------------------------------------------   Payments  ----------------------------------------------------
route!(payment_webhook => Post "/webhook/payment" impl PaymentManagement);
/// Route handler for the payment gateway callback.
///
/// The gateway must send the shared callback token in the `x-callback-token` header. The body is a
/// [`PaymentCallback`]: the payment id the gateway issued at checkout, the amount it collected, and whether the
/// payment succeeded.
///
/// Engine errors are mapped onto status codes by their kind. In particular, a repeated callback for a payment that
/// was already settled is a `409 Conflict`, so gateways that retry on 5xx do not retry it.
pub async fn payment_webhook<B: PaymentManagement>(
    req: HttpRequest,
    body: web::Json<PaymentCallback>,
    webhook: web::Data<WebhookConfig>,
    api: web::Data<PaymentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received payment callback");
    let token = req.headers().get(CALLBACK_TOKEN_HEADER).and_then(|v| v.to_str().ok());
    if !webhook.authorizes(token) {
        warn!("💻️ Payment callback rejected. The callback token was missing or did not match.");
        return Err(ServerError::InvalidCallbackToken);
    }
    let callback = body.into_inner();
    debug!(
        "💻️ Payment callback for [{}]: {} ({})",
        callback.payment_id,
        callback.amount,
        if callback.success { "success" } else { "failure" }
    );
    let settlement = api.update_payment_status(&callback.payment_id, callback.amount, callback.success).await?;
    let canceled = settlement.canceled.iter().map(|o| o.transaction.invoice_code.to_string()).collect();
    Ok(HttpResponse::Ok().json(PaymentCallbackResult { payment: settlement.payment, canceled }))
}
