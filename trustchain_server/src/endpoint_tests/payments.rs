use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;
use tc_common::Money;
use trustchain_engine::{
    db_types::Role,
    traits::{CaptureReceipt, GatewayError},
};

use super::{
    helpers::{as_user, json, send, test_db},
    mocks::MockGateway,
    orders::place_order,
};

fn gateway_returning(transaction_ref: &'static str) -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway
        .expect_initiate_capture()
        .withf(|_, account, amount| account == "254712345678" && *amount == Money::from_units(1250))
        .times(1)
        .returning(move |_, _, _| Ok(CaptureReceipt { transaction_ref: transaction_ref.to_string() }));
    gateway
}

#[actix_web::test]
async fn gateway_failures_are_bad_gateway() {
    let db = test_db().await;
    let (order_id, _) = place_order(&db, "alice").await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_initiate_capture()
        .times(1)
        .returning(|_, _, _| Err(GatewayError::Unavailable("connection reset".into())));
    let req = TestRequest::post().uri(&format!("/api/orders/{order_id}/payment")).set_json(json!({"phone": "0712345678"}));
    let (status, body) = send(&db, gateway, as_user(req, "alice", Role::Customer)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY, "{body}");

    let req = as_user(TestRequest::get().uri(&format!("/api/orders/{order_id}/payment")), "alice", Role::Customer);
    let (status, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "pending");
}

#[actix_web::test]
async fn a_phone_number_is_needed_to_pay() {
    let db = test_db().await;
    let (order_id, _) = place_order(&db, "alice").await;
    let req = as_user(TestRequest::post().uri(&format!("/api/orders/{order_id}/payment")), "alice", Role::Customer);
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = TestRequest::put().uri("/api/profile").set_json(json!({"full_name": "Alice W.", "phone": "0712345678"}));
    let (status, _) = send(&db, MockGateway::new(), as_user(req, "alice", Role::Customer)).await;
    assert_eq!(status, StatusCode::OK);

    let req = as_user(TestRequest::post().uri(&format!("/api/orders/{order_id}/payment")), "alice", Role::Customer);
    let (status, body) = send(&db, gateway_returning("CHK17000000000000001"), req).await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
    assert_eq!(json(&body)["payment"]["transaction_ref"], "CHK17000000000000001");
}

#[actix_web::test]
async fn escrow_is_only_released_after_delivery() {
    let db = test_db().await;
    let (order_id, otp) = place_order(&db, "alice").await;

    let req = TestRequest::post().uri(&format!("/api/orders/{order_id}/payment")).set_json(json!({"phone": "+254 712 345 678"}));
    let (status, body) = send(&db, gateway_returning("CHK17000000000000002"), as_user(req, "alice", Role::Customer)).await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");

    // Only an administrator can relay the gateway's callback
    let confirmation = json!({"order_id": order_id, "transaction_ref": "CHK17000000000000002"});
    let req = TestRequest::post().uri("/api/payments/confirm").set_json(confirmation.clone());
    let (status, _) = send(&db, MockGateway::new(), as_user(req, "alice", Role::Customer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let req = TestRequest::post().uri("/api/payments/confirm").set_json(confirmation);
    let (status, body) = send(&db, MockGateway::new(), as_user(req, "root", Role::Admin)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["payment"]["status"], "held_escrow");

    let req = as_user(TestRequest::post().uri(&format!("/api/orders/{order_id}/accept")), "dave", Role::Driver);
    assert_eq!(send(&db, MockGateway::new(), req).await.0, StatusCode::OK);

    let release = format!("/api/orders/{order_id}/release");
    let req = as_user(TestRequest::post().uri(&release), "dave", Role::Driver);
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = as_user(TestRequest::post().uri(&format!("/api/orders/{order_id}/start_transit")), "dave", Role::Driver);
    assert_eq!(send(&db, MockGateway::new(), req).await.0, StatusCode::OK);
    let req = TestRequest::post().uri(&format!("/api/orders/{order_id}/complete")).set_json(json!({ "otp": otp }));
    assert_eq!(send(&db, MockGateway::new(), as_user(req, "dave", Role::Driver)).await.0, StatusCode::OK);

    let req = as_user(TestRequest::post().uri(&release), "dave", Role::Driver);
    let (status, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let released = json(&body);
    assert_eq!(released["payment"]["status"], "released");
    assert_eq!(released["driver_total_deliveries"], 1);
}
