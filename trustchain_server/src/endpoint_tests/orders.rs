use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;
use trustchain_engine::db_types::Role;

use super::{
    helpers::{as_user, json, send, test_db},
    mocks::MockGateway,
};

/// Places an order for `customer` and returns its id and delivery code.
pub async fn place_order(db: &trustchain_engine::SqliteDatabase, customer: &str) -> (i64, String) {
    let body = json!({
        "pickup_address": "Gikomba Market, Stall 14",
        "delivery_address": "Kilimani, Argwings Kodhek Rd",
        "amount": 125000
    });
    let req = as_user(TestRequest::post().uri("/api/orders").set_json(body), customer, Role::Customer);
    let (status, body) = send(db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let result = json(&body);
    let order_id = result["order"]["id"].as_i64().expect("order id");
    let otp = result["delivery_otp"].as_str().expect("delivery code").to_string();
    (order_id, otp)
}

#[actix_web::test]
async fn requests_without_identity_are_rejected() {
    let db = test_db().await;
    let req = TestRequest::get().uri("/api/orders/available");
    let (status, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json(&body)["error"].is_string());
}

#[actix_web::test]
async fn drivers_cannot_place_orders() {
    let db = test_db().await;
    let body = json!({"pickup_address": "A", "delivery_address": "B", "amount": 1000});
    let req = as_user(TestRequest::post().uri("/api/orders").set_json(body), "dave", Role::Driver);
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn new_orders_return_the_delivery_code_once() {
    let db = test_db().await;
    let (order_id, otp) = place_order(&db, "alice").await;
    assert_eq!(otp.len(), 4);
    assert!(otp.chars().all(|c| c.is_ascii_digit()));

    let req = as_user(TestRequest::get().uri(&format!("/api/orders/{order_id}")), "alice", Role::Customer);
    let (status, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::OK);
    let order = json(&body);
    assert_eq!(order["status"], "pending");
    assert!(order.get("delivery_otp").is_none());
}

#[actix_web::test]
async fn invalid_order_ids_are_bad_requests() {
    let db = test_db().await;
    let req = as_user(TestRequest::get().uri("/api/orders/abc"), "alice", Role::Customer);
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let req = as_user(TestRequest::get().uri("/api/orders/999"), "alice", Role::Customer);
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn customers_only_see_their_own_orders() {
    let db = test_db().await;
    let (order_id, _) = place_order(&db, "alice").await;
    let req = as_user(TestRequest::get().uri(&format!("/api/orders/{order_id}")), "bob", Role::Customer);
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let req = as_user(TestRequest::get().uri(&format!("/api/orders/{order_id}")), "root", Role::Admin);
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn only_one_driver_wins_an_order() {
    let db = test_db().await;
    let (order_id, _) = place_order(&db, "alice").await;

    let req = as_user(TestRequest::get().uri("/api/orders/available"), "dave", Role::Driver);
    let (status, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().map(|a| a.len()), Some(1));

    let uri = format!("/api/orders/{order_id}/accept");
    let req = as_user(TestRequest::post().uri(&uri), "dave", Role::Driver);
    let (status, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["order"]["status"], "assigned");

    let req = as_user(TestRequest::post().uri(&uri), "erin", Role::Driver);
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The losing driver can no longer see the order, the winner can
    let req = as_user(TestRequest::get().uri(&format!("/api/orders/{order_id}")), "erin", Role::Driver);
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let req = as_user(TestRequest::get().uri(&format!("/api/orders/{order_id}")), "dave", Role::Driver);
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn wrong_delivery_codes_are_refused() {
    let db = test_db().await;
    let (order_id, otp) = place_order(&db, "alice").await;
    for step in ["accept", "start_transit"] {
        let req = as_user(TestRequest::post().uri(&format!("/api/orders/{order_id}/{step}")), "dave", Role::Driver);
        let (status, body) = send(&db, MockGateway::new(), req).await;
        assert_eq!(status, StatusCode::OK, "{step}: {body}");
    }
    let wrong = if otp == "0000" { "1111" } else { "0000" };
    let uri = format!("/api/orders/{order_id}/complete");
    let req = as_user(TestRequest::post().uri(&uri).set_json(json!({"otp": wrong})), "dave", Role::Driver);
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = as_user(TestRequest::post().uri(&uri).set_json(json!({"otp": otp})), "erin", Role::Driver);
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = as_user(TestRequest::post().uri(&uri).set_json(json!({"otp": otp})), "dave", Role::Driver);
    let (status, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[actix_web::test]
async fn searches_are_limited_to_the_caller() {
    let db = test_db().await;
    place_order(&db, "alice").await;
    place_order(&db, "bob").await;
    let req = as_user(TestRequest::get().uri("/api/orders/search?customer_id=bob"), "alice", Role::Customer);
    let (status, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::OK);
    let orders = json(&body);
    let orders = orders.as_array().expect("a list of orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["customer_id"], "alice");

    let req = as_user(TestRequest::get().uri("/api/orders/search?status=pending"), "root", Role::Admin);
    let (_, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(json(&body).as_array().map(|a| a.len()), Some(2));
}

#[actix_web::test]
async fn merchants_can_cancel_their_own_orders() {
    let db = test_db().await;
    let body = json!({
        "merchant_id": "mama_mboga",
        "pickup_address": "Gikomba Market, Stall 14",
        "delivery_address": "Kilimani, Argwings Kodhek Rd",
        "amount": 125000
    });
    let req = as_user(TestRequest::post().uri("/api/orders").set_json(body), "alice", Role::Customer);
    let (status, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order_id = json(&body)["order"]["id"].as_i64().expect("order id");
    let uri = format!("/api/orders/{order_id}/cancel");

    let req = as_user(TestRequest::post().uri(&uri), "kiosk_ya_juma", Role::Merchant);
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = as_user(TestRequest::post().uri(&uri).set_json(json!({"reason": "Out of stock"})), "mama_mboga", Role::Merchant);
    let (status, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["order"]["status"], "cancelled");
}
