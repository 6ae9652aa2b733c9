use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer, Scope};
use log::*;
use trustchain_engine::{
    events::EventProducers,
    traits::{DeliveryLedger, InsuranceManagement, PaymentGateway},
    DeliveryApi,
    EscrowApi,
    FraudDetectionApi,
    InsuranceApi,
    NotificationDispatcher,
    OrderLifecycleApi,
    ProfileApi,
    SqliteDatabase,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    fraud_check_worker::create_fraud_check_handlers,
    insurance_expiry_worker::start_insurance_expiry_worker,
    integrations::{
        mpesa::MpesaGateway,
        sms::{create_sms_event_handlers, LoggingSmsTransport},
    },
    routes::{
        health,
        AcceptOrderRoute,
        AvailableOrdersRoute,
        CancelInsuranceRoute,
        CancelOrderRoute,
        ClaimInsuranceRoute,
        CompleteDeliveryRoute,
        ConfirmPaymentRoute,
        CreateOrderRoute,
        FraudAlertsRoute,
        FraudCheckRoute,
        InitiatePaymentRoute,
        InsurancePolicyRoute,
        MarkNotificationReadRoute,
        MyNotificationsRoute,
        MyProfileRoute,
        OrderActivityRoute,
        OrderByIdRoute,
        OrderByTrackingIdRoute,
        PaymentForOrderRoute,
        PurchaseInsuranceRoute,
        RateOrderRoute,
        ReleaseEscrowRoute,
        ResetOtpAttemptsRoute,
        ResolveFraudAlertRoute,
        SearchOrdersRoute,
        StartTransitRoute,
        UpdateLocationRoute,
        UpdateProfileRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_db_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;

    let transport = LoggingSmsTransport::new(config.sms.clone());
    let handlers = create_sms_event_handlers(transport, db.clone(), config.event_buffer_size);
    let mut producers = handlers.producers();
    handlers.start_handlers().await;
    // The worker publishes alerts and texts on the bus above, but does not queue checks of its own
    let worker_api =
        FraudDetectionApi::new(db.clone(), producers.clone()).with_thresholds(config.fraud_thresholds);
    let fraud_handlers = create_fraud_check_handlers(worker_api, config.event_buffer_size);
    producers.fraud_check_producer = fraud_handlers.producers().fraud_check_producer;
    fraud_handlers.start_handlers().await;
    info!("📬️ Event handlers started");

    let _worker = start_insurance_expiry_worker(db.clone(), config.insurance_expiry_interval);

    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let gateway = MpesaGateway::new(config.mpesa.clone());
    let options = ServerOptions::from_config(&config);
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let lifecycle_api = OrderLifecycleApi::new(db.clone(), producers.clone())
            .with_fraud_thresholds(config.fraud_thresholds);
        let delivery_api = DeliveryApi::new(db.clone(), producers.clone())
            .with_config(config.order_flow)
            .with_fraud_thresholds(config.fraud_thresholds);
        let escrow_api = EscrowApi::new(db.clone(), gateway.clone(), producers.clone())
            .with_fraud_thresholds(config.fraud_thresholds);
        let fraud_api =
            FraudDetectionApi::new(db.clone(), producers.clone()).with_thresholds(config.fraud_thresholds);
        let notifications = NotificationDispatcher::new(db.clone(), producers.clone());
        let profile_api = ProfileApi::new(db.clone());
        let insurance_api = InsuranceApi::new(db.clone()).with_config(config.insurance);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("tc::access_log"))
            .app_data(web::Data::new(lifecycle_api))
            .app_data(web::Data::new(delivery_api))
            .app_data(web::Data::new(escrow_api))
            .app_data(web::Data::new(fraud_api))
            .app_data(web::Data::new(notifications))
            .app_data(web::Data::new(profile_api))
            .app_data(web::Data::new(insurance_api))
            .app_data(web::Data::new(options))
            .service(health)
            .service(api_scope::<SqliteDatabase, MpesaGateway>())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Every route under `/api`. Literal paths such as `/orders/available` are registered ahead of `/orders/{id}` so that
/// they are not swallowed by it.
pub fn api_scope<B, G>() -> Scope
where
    B: DeliveryLedger + InsuranceManagement + 'static,
    G: PaymentGateway + 'static,
{
    web::scope("/api")
        // Orders
        .service(CreateOrderRoute::<B>::new())
        .service(AvailableOrdersRoute::<B>::new())
        .service(SearchOrdersRoute::<B>::new())
        .service(OrderByTrackingIdRoute::<B>::new())
        .service(OrderByIdRoute::<B>::new())
        .service(OrderActivityRoute::<B>::new())
        .service(AcceptOrderRoute::<B>::new())
        .service(StartTransitRoute::<B>::new())
        .service(CompleteDeliveryRoute::<B>::new())
        .service(CancelOrderRoute::<B>::new())
        .service(ResetOtpAttemptsRoute::<B>::new())
        .service(RateOrderRoute::<B>::new())
        // Deliveries
        .service(UpdateLocationRoute::<B>::new())
        // Payments
        .service(InitiatePaymentRoute::<B, G>::new())
        .service(PaymentForOrderRoute::<B, G>::new())
        .service(ConfirmPaymentRoute::<B, G>::new())
        .service(ReleaseEscrowRoute::<B, G>::new())
        // Fraud
        .service(FraudCheckRoute::<B>::new())
        .service(FraudAlertsRoute::<B>::new())
        .service(ResolveFraudAlertRoute::<B>::new())
        // Notifications and profiles
        .service(MyNotificationsRoute::<B>::new())
        .service(MarkNotificationReadRoute::<B>::new())
        .service(MyProfileRoute::<B>::new())
        .service(UpdateProfileRoute::<B>::new())
        // Insurance
        .service(PurchaseInsuranceRoute::<B>::new())
        .service(InsurancePolicyRoute::<B>::new())
        .service(ClaimInsuranceRoute::<B>::new())
        .service(CancelInsuranceRoute::<B>::new())
}
