use actix_web::{
    body::to_bytes,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    App,
};
use log::debug;
use serde_json::Value;
use trustchain_engine::{
    db_types::Role,
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::PaymentGateway,
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
    config::ServerOptions,
    identity::{USER_ID_HEADER, USER_ROLE_HEADER},
    server::api_scope,
};

/// A fresh, migrated database in the temp directory.
pub async fn test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database")
}

/// Adds the identity headers the upstream identity provider would set.
pub fn as_user(req: TestRequest, user_id: &str, role: Role) -> TestRequest {
    req.insert_header((USER_ID_HEADER, user_id)).insert_header((USER_ROLE_HEADER, role.as_str()))
}

/// Sends a single request through the `/api` scope, with every engine API backed by `db` and `gateway`.
/// Errors raised in middleware are turned into responses the same way the HTTP server does it.
pub async fn send<G>(db: &SqliteDatabase, gateway: G, req: TestRequest) -> (StatusCode, String)
where G: PaymentGateway + 'static {
    let producers = EventProducers::default();
    let app = App::new()
        .app_data(web::Data::new(OrderLifecycleApi::new(db.clone(), producers.clone())))
        .app_data(web::Data::new(DeliveryApi::new(db.clone(), producers.clone())))
        .app_data(web::Data::new(EscrowApi::new(db.clone(), gateway, producers.clone())))
        .app_data(web::Data::new(FraudDetectionApi::new(db.clone(), producers.clone())))
        .app_data(web::Data::new(NotificationDispatcher::new(db.clone(), producers.clone())))
        .app_data(web::Data::new(ProfileApi::new(db.clone())))
        .app_data(web::Data::new(InsuranceApi::new(db.clone())))
        .app_data(web::Data::new(ServerOptions::default()))
        .service(api_scope::<SqliteDatabase, G>());
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => res.into_parts().1.map_into_boxed_body(),
        Err(e) => e.error_response(),
    };
    let status = res.status();
    let body = to_bytes(res.into_body()).await.map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default();
    (status, body)
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response is not JSON ({e}): {body}"))
}
