//! HTTP handlers, one per engine operation.
//!
//! Handlers stay thin: extract the caller and the body, call the engine API, serialise the result. All storage and
//! gateway work is async, so a slow request never blocks the worker thread it runs on.
//!
//! Every route under `/api` is wrapped in the ACL middleware. The role list in each `route!` invocation is the set of
//! roles allowed to call it; an empty list admits any identified caller. Finer-grained checks (is this caller a party
//! to the order?) happen in the handler or in the engine.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use trustchain_engine::{
    db_types::{Order, OrderStatusType, Role, TrackingId},
    fraud_objects::FraudCheckRequest,
    insurance_objects::PolicyRequest,
    traits::{DeliveryLedger, InsuranceManagement, LedgerError, PaymentGateway, ProfileManagement},
    DeliveryApi,
    EscrowApi,
    FraudDetectionApi,
    InsuranceApi,
    NotificationDispatcher,
    OrderLifecycleApi,
    ProfileApi,
};

use crate::{
    data_objects::{
        AvailableOrdersParams,
        CancelOrderRequest,
        CompleteDeliveryRequest,
        CreateOrderRequest,
        InitiatePaymentRequest,
        LocationUpdateRequest,
        NewOrderResponse,
        NotificationParams,
        OrderSearchParams,
        PaymentConfirmation,
        ProfileUpdateRequest,
        RatingRequest,
    },
    errors::ServerError,
    helpers::parse_id,
    identity::Identity,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+ where requires [$($roles:expr),*]) => {
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
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),*]));
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
route!(create_order => Post "/orders" impl DeliveryLedger where requires [Role::Customer]);
/// Places a new order for the caller. The response is the only place the delivery code is ever returned.
pub async fn create_order<B: DeliveryLedger>(
    identity: Identity,
    api: web::Data<OrderLifecycleApi<B>>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST create order for {}", identity.user_id);
    let result = api.create_order(body.into_inner().into_new_order(&identity.user_id)).await?;
    let delivery_otp = result.order.delivery_otp().to_string();
    Ok(HttpResponse::Created().json(NewOrderResponse { order: result.order, payment: result.payment, delivery_otp }))
}

route!(available_orders => Get "/orders/available" impl DeliveryLedger where requires [Role::Driver, Role::Admin]);
pub async fn available_orders<B: DeliveryLedger>(
    api: web::Data<OrderLifecycleApi<B>>,
    params: web::Query<AvailableOrdersParams>,
) -> Result<HttpResponse, ServerError> {
    let orders = api.available_orders(params.limit).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(search_orders => Get "/orders/search" impl DeliveryLedger where requires []);
/// Administrators can search every order. Everyone else only sees orders they are a party to, or, for drivers, the
/// orders assigned to them.
pub async fn search_orders<B: DeliveryLedger>(
    identity: Identity,
    api: web::Data<OrderLifecycleApi<B>>,
    params: web::Query<OrderSearchParams>,
) -> Result<HttpResponse, ServerError> {
    let filter = params.into_inner().into_filter(&identity)?;
    let orders = api.search_orders(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_tracking_id => Get "/orders/tracking/{tracking_id}" impl DeliveryLedger where requires []);
pub async fn order_by_tracking_id<B: DeliveryLedger>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<OrderLifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let tracking_id = TrackingId::from(path.into_inner());
    let order = api
        .order_by_tracking_id(&tracking_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No order has tracking id {tracking_id}")))?;
    let order = visible_order(&identity, order.id, &api).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_by_id => Get "/orders/{id}" impl DeliveryLedger where requires []);
pub async fn order_by_id<B: DeliveryLedger>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<OrderLifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_id(&path, "order")?;
    let order = visible_order(&identity, order_id, &api).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_activity => Get "/orders/{id}/activity" impl DeliveryLedger where requires [Role::Admin]);
pub async fn order_activity<B: DeliveryLedger>(
    path: web::Path<String>,
    api: web::Data<OrderLifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_id(&path, "order")?;
    let entries = api.activity(order_id).await?;
    Ok(HttpResponse::Ok().json(entries))
}

route!(accept_order => Post "/orders/{id}/accept" impl DeliveryLedger where requires [Role::Driver]);
pub async fn accept_order<B: DeliveryLedger>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<OrderLifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_id(&path, "order")?;
    let accepted = api.accept_order(order_id, &identity.user_id).await?;
    Ok(HttpResponse::Ok().json(accepted))
}

route!(start_transit => Post "/orders/{id}/start_transit" impl DeliveryLedger where requires [Role::Driver]);
pub async fn start_transit<B: DeliveryLedger>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<OrderLifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_id(&path, "order")?;
    let started = api.start_transit(order_id, &identity.user_id).await?;
    Ok(HttpResponse::Ok().json(started))
}

route!(complete_delivery => Post "/orders/{id}/complete" impl DeliveryLedger where requires [Role::Driver]);
pub async fn complete_delivery<B: DeliveryLedger>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<DeliveryApi<B>>,
    body: web::Json<CompleteDeliveryRequest>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_id(&path, "order")?;
    let completed = api.complete_delivery(order_id, &identity.user_id, &body.otp).await?;
    Ok(HttpResponse::Ok().json(completed))
}

route!(cancel_order => Post "/orders/{id}/cancel" impl DeliveryLedger where requires [Role::Customer, Role::Merchant, Role::Admin]);
/// The order's customer or merchant, or an administrator, may cancel until the order is in transit.
pub async fn cancel_order<B: DeliveryLedger>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<OrderLifecycleApi<B>>,
    body: Option<web::Json<CancelOrderRequest>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_id(&path, "order")?;
    let reason = body.and_then(|b| b.into_inner().reason);
    let cancelled = api.cancel_order(order_id, &identity.user_id, identity.role, reason).await?;
    Ok(HttpResponse::Ok().json(cancelled))
}

route!(reset_otp_attempts => Post "/orders/{id}/otp/reset" impl DeliveryLedger where requires [Role::Admin]);
pub async fn reset_otp_attempts<B: DeliveryLedger>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<DeliveryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_id(&path, "order")?;
    let delivery = api.reset_otp_attempts(order_id, &identity.user_id).await?;
    Ok(HttpResponse::Ok().json(delivery))
}

//----------------------------------------------  Deliveries  ----------------------------------------------------
route!(update_location => Post "/deliveries/{id}/location" impl DeliveryLedger where requires [Role::Driver]);
/// Stale readings are not an error. The response says whether the reading was `applied` or `stale`.
pub async fn update_location<B: DeliveryLedger>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<DeliveryApi<B>>,
    body: web::Json<LocationUpdateRequest>,
) -> Result<HttpResponse, ServerError> {
    let delivery_id = parse_id(&path, "delivery")?;
    let result = api.update_location(&identity.user_id, body.into_inner().into_update(delivery_id)).await?;
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(initiate_payment => Post "/orders/{id}/payment" impl DeliveryLedger, PaymentGateway where requires [Role::Customer]);
pub async fn initiate_payment<B: DeliveryLedger, G: PaymentGateway>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<EscrowApi<B, G>>,
    profiles: web::Data<ProfileApi<B>>,
    body: Option<web::Json<InitiatePaymentRequest>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_id(&path, "order")?;
    let phone = match body.and_then(|b| b.into_inner().phone) {
        Some(phone) => phone,
        None => profiles
            .profile(&identity.user_id)
            .await?
            .and_then(|p| p.phone)
            .ok_or_else(|| LedgerError::Validation("A phone number is required to pay for an order".into()))?,
    };
    let transition = api.initiate_capture(order_id, &identity.user_id, &phone).await?;
    Ok(HttpResponse::Accepted().json(transition))
}

route!(payment_for_order => Get "/orders/{id}/payment" impl DeliveryLedger, PaymentGateway where requires []);
pub async fn payment_for_order<B: DeliveryLedger, G: PaymentGateway>(
    identity: Identity,
    path: web::Path<String>,
    orders: web::Data<OrderLifecycleApi<B>>,
    api: web::Data<EscrowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_id(&path, "order")?;
    visible_order(&identity, order_id, &orders).await?;
    let payment = api.payment_for_order(order_id).await?.ok_or(LedgerError::PaymentNotFound(order_id))?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(confirm_payment => Post "/payments/confirm" impl DeliveryLedger, PaymentGateway where requires [Role::Admin]);
/// The gateway callback. A failed capture moves the payment to `failed`.
pub async fn confirm_payment<B: DeliveryLedger, G: PaymentGateway>(
    api: web::Data<EscrowApi<B, G>>,
    body: web::Json<PaymentConfirmation>,
) -> Result<HttpResponse, ServerError> {
    let confirmation = body.into_inner();
    let transition = if confirmation.success {
        api.confirm_capture(confirmation.order_id, &confirmation.transaction_ref).await?
    } else {
        let reason = confirmation.reason.unwrap_or_else(|| format!("Capture {} failed", confirmation.transaction_ref));
        api.fail_capture(confirmation.order_id, &reason).await?
    };
    Ok(HttpResponse::Ok().json(transition))
}

route!(release_escrow => Post "/orders/{id}/release" impl DeliveryLedger, PaymentGateway where requires [Role::Driver]);
pub async fn release_escrow<B: DeliveryLedger, G: PaymentGateway>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<EscrowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_id(&path, "order")?;
    let release = api.release_escrow(order_id, &identity.user_id).await?;
    Ok(HttpResponse::Ok().json(release))
}

//----------------------------------------------    Fraud    ----------------------------------------------------
route!(fraud_check => Post "/fraud/check" impl DeliveryLedger where requires [Role::Admin]);
pub async fn fraud_check<B: DeliveryLedger>(
    api: web::Data<FraudDetectionApi<B>>,
    body: web::Json<FraudCheckRequest>,
) -> Result<HttpResponse, ServerError> {
    let report = api.run_check(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(report))
}

route!(fraud_alerts => Get "/fraud/alerts" impl DeliveryLedger where requires [Role::Admin]);
pub async fn fraud_alerts<B: DeliveryLedger>(api: web::Data<FraudDetectionApi<B>>) -> Result<HttpResponse, ServerError> {
    let alerts = api.open_alerts().await?;
    Ok(HttpResponse::Ok().json(alerts))
}

route!(resolve_fraud_alert => Post "/fraud/alerts/{id}/resolve" impl DeliveryLedger where requires [Role::Admin]);
pub async fn resolve_fraud_alert<B: DeliveryLedger>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<FraudDetectionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let alert_id = parse_id(&path, "fraud alert")?;
    let alert = api.resolve_alert(alert_id, &identity.user_id).await?;
    Ok(HttpResponse::Ok().json(alert))
}

//----------------------------------------------  Notifications  ----------------------------------------------------
route!(my_notifications => Get "/notifications" impl DeliveryLedger where requires []);
pub async fn my_notifications<B: DeliveryLedger>(
    identity: Identity,
    api: web::Data<NotificationDispatcher<B>>,
    params: web::Query<NotificationParams>,
) -> Result<HttpResponse, ServerError> {
    let notifications = api.notifications_for(&identity.user_id, params.unread_only).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

route!(mark_notification_read => Post "/notifications/{id}/read" impl DeliveryLedger where requires []);
pub async fn mark_notification_read<B: DeliveryLedger>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<NotificationDispatcher<B>>,
) -> Result<HttpResponse, ServerError> {
    let notification_id = parse_id(&path, "notification")?;
    let notification = api.mark_read(notification_id, &identity.user_id).await?;
    Ok(HttpResponse::Ok().json(notification))
}

//----------------------------------------------   Profiles  ----------------------------------------------------
route!(my_profile => Get "/profile" impl ProfileManagement where requires []);
pub async fn my_profile<B: ProfileManagement>(
    identity: Identity,
    api: web::Data<ProfileApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let profile =
        api.profile(&identity.user_id).await?.ok_or_else(|| LedgerError::ProfileNotFound(identity.user_id.clone()))?;
    Ok(HttpResponse::Ok().json(profile))
}

route!(update_profile => Put "/profile" impl ProfileManagement where requires []);
/// Creates or updates the caller's profile. The role comes from the identity provider, and the verified flag can only
/// be set by an administrator, so neither is taken from the body.
pub async fn update_profile<B: ProfileManagement>(
    identity: Identity,
    api: web::Data<ProfileApi<B>>,
    body: web::Json<ProfileUpdateRequest>,
) -> Result<HttpResponse, ServerError> {
    let verified = api.profile(&identity.user_id).await?.map(|p| p.verified).unwrap_or(false);
    let profile = body.into_inner().into_new_profile(&identity.user_id, identity.role, verified);
    let profile = api.upsert_profile(profile).await?;
    Ok(HttpResponse::Ok().json(profile))
}

route!(rate_order => Post "/orders/{id}/rating" impl ProfileManagement where requires [Role::Customer]);
pub async fn rate_order<B: ProfileManagement>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<ProfileApi<B>>,
    body: web::Json<RatingRequest>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_id(&path, "order")?;
    let rating = api.submit_rating(body.into_inner().into_new_rating(order_id, &identity.user_id)).await?;
    Ok(HttpResponse::Created().json(rating))
}

//----------------------------------------------   Insurance  ----------------------------------------------------
route!(purchase_insurance => Post "/orders/{id}/insurance" impl InsuranceManagement where requires [Role::Customer]);
pub async fn purchase_insurance<B: InsuranceManagement>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<InsuranceApi<B>>,
    body: web::Json<PolicyRequest>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_id(&path, "order")?;
    let policy = api.purchase_policy(order_id, &identity.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(policy))
}

route!(insurance_policy => Get "/insurance/{id}" impl InsuranceManagement where requires []);
pub async fn insurance_policy<B: InsuranceManagement>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<InsuranceApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let policy_id = parse_id(&path, "policy")?;
    let policy = api.policy(policy_id).await?.ok_or(LedgerError::PolicyNotFound(policy_id))?;
    if policy.purchased_by != identity.user_id && !identity.is_admin() {
        return Err(ServerError::InsufficientPermissions(format!("Policy {} is not yours", policy.policy_number)));
    }
    Ok(HttpResponse::Ok().json(policy))
}

route!(claim_insurance => Post "/insurance/{id}/claim" impl InsuranceManagement where requires [Role::Customer]);
pub async fn claim_insurance<B: InsuranceManagement>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<InsuranceApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let policy_id = parse_id(&path, "policy")?;
    let policy = api.claim_policy(policy_id, &identity.user_id).await?;
    Ok(HttpResponse::Ok().json(policy))
}

route!(cancel_insurance => Post "/insurance/{id}/cancel" impl InsuranceManagement where requires [Role::Customer]);
pub async fn cancel_insurance<B: InsuranceManagement>(
    identity: Identity,
    path: web::Path<String>,
    api: web::Data<InsuranceApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let policy_id = parse_id(&path, "policy")?;
    let policy = api.cancel_policy(policy_id, &identity.user_id).await?;
    Ok(HttpResponse::Ok().json(policy))
}

/// Administrators see every order. Customers and merchants see their own. Drivers see orders that are still up for
/// grabs and the ones assigned to them.
async fn visible_order<B: DeliveryLedger>(
    identity: &Identity,
    order_id: i64,
    api: &OrderLifecycleApi<B>,
) -> Result<Order, ServerError> {
    let order = api.order(order_id).await?.ok_or(LedgerError::OrderNotFound(order_id))?;
    if identity.is_admin() || order.is_party(&identity.user_id) {
        return Ok(order);
    }
    if identity.role == Role::Driver {
        if order.status == OrderStatusType::Pending {
            return Ok(order);
        }
        let assigned = api.active_delivery(order_id).await?.is_some_and(|d| d.driver_id == identity.user_id);
        if assigned {
            return Ok(order);
        }
    }
    debug!("💻️ {} may not view order #{order_id}", identity.user_id);
    Err(ServerError::InsufficientPermissions(format!("Order {order_id} is not visible to {}", identity.user_id)))
}
