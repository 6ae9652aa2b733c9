use std::str::FromStr;

use cucumber::{given, then, when};
use trustchain_engine::db_types::{OrderStatusType, PaymentStatusType, Role};

use crate::{
    cucumber::EscrowWorld,
    support::{wrong_code, CUSTOMER},
};

#[given(expr = "the customer has placed order {word} for {int} KES")]
async fn placed_order(world: &mut EscrowWorld, name: String, amount: i64) {
    place_order(world, name, amount).await;
}

#[when(expr = "the customer places order {word} for {int} KES")]
async fn place_order(world: &mut EscrowWorld, name: String, amount: i64) {
    let order = world.system().new_order(amount).await;
    world.orders.insert(name, order);
}

#[given(expr = "the customer has paid for order {word}")]
async fn paid(world: &mut EscrowWorld, name: String) {
    pay(world, name).await;
}

#[when(expr = "the customer pays for order {word}")]
async fn pay(world: &mut EscrowWorld, name: String) {
    let id = world.order(&name).id;
    let result = world.system().escrow.confirm_capture(id, &format!("REF-{name}")).await;
    world.record(result).expect("Error confirming capture");
}

#[when(expr = "driver {word} accepts order {word}")]
async fn accept(world: &mut EscrowWorld, driver: String, name: String) {
    let id = world.order(&name).id;
    let result = world.system().orders.accept_order(id, &driver).await;
    world.record(result);
}

#[when(expr = "driver {word} picks up order {word}")]
async fn pick_up(world: &mut EscrowWorld, driver: String, name: String) {
    let id = world.order(&name).id;
    let result = world.system().orders.start_transit(id, &driver).await;
    world.record(result);
}

#[when(expr = "driver {word} enters the correct code for order {word}")]
async fn correct_code(world: &mut EscrowWorld, driver: String, name: String) {
    let order = world.order(&name).clone();
    let result = world.system().deliveries.complete_delivery(order.id, &driver, order.delivery_otp()).await;
    world.record(result);
}

#[when(expr = "driver {word} enters a wrong code for order {word}")]
async fn wrong_code_entered(world: &mut EscrowWorld, driver: String, name: String) {
    let order = world.order(&name).clone();
    let code = wrong_code(order.delivery_otp());
    let result = world.system().deliveries.complete_delivery(order.id, &driver, code).await;
    world.record(result);
}

#[when(expr = "driver {word} asks for the payment on order {word}")]
async fn release(world: &mut EscrowWorld, driver: String, name: String) {
    let id = world.order(&name).id;
    let result = world.system().escrow.release_escrow(id, &driver).await;
    world.record(result);
}

#[when(expr = "the customer cancels order {word}")]
async fn cancel(world: &mut EscrowWorld, name: String) {
    let id = world.order(&name).id;
    let result = world.system().orders.cancel_order(id, CUSTOMER, Role::Customer, None).await;
    world.record(result);
}

#[then(expr = "order {word} is {word}")]
async fn order_status(world: &mut EscrowWorld, name: String, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not an order status");
    let id = world.order(&name).id;
    let order = world.system().orders.order(id).await.unwrap().expect("Order has disappeared");
    assert_eq!(order.status, expected);
}

#[then(expr = "the payment for order {word} is {word}")]
async fn payment_status(world: &mut EscrowWorld, name: String, status: String) {
    let expected = PaymentStatusType::from_str(&status).expect("Not a payment status");
    let id = world.order(&name).id;
    let payment = world.system().escrow.payment_for_order(id).await.unwrap().expect("No payment record");
    assert_eq!(payment.status, expected);
    let order = world.system().orders.order(id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, expected, "Order and payment disagree");
}

#[then(expr = "the request is refused with {word}")]
async fn refused(world: &mut EscrowWorld, variant: String) {
    let err = world.last_error.as_ref().expect("The last request succeeded");
    let debug = format!("{err:?}");
    assert!(debug.starts_with(variant.as_str()), "Expected {variant}, got {debug}");
}

#[then("the request succeeds")]
async fn succeeded(world: &mut EscrowWorld) {
    assert!(world.last_error.is_none(), "{:?}", world.last_error);
}

#[then(expr = "driver {word} has completed {int} deliveries")]
async fn deliveries(world: &mut EscrowWorld, driver: String, count: i64) {
    let profile = world.system().profiles.profile(&driver).await.unwrap().expect("No such driver");
    assert_eq!(profile.total_deliveries, count);
}

#[then(expr = "there is/are {int} open fraud alert(s)")]
async fn open_alerts(world: &mut EscrowWorld, count: usize) {
    let alerts = world.system().fraud.open_alerts().await.unwrap();
    assert_eq!(alerts.len(), count, "{alerts:?}");
}
