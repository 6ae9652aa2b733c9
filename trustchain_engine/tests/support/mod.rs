#![allow(dead_code)]
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use chrono::{Duration, Utc};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tc_common::Money;
use trustchain_engine::{
    db_types::{NewOrder, NewProfile, Order, Role},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{CaptureReceipt, GatewayError, PaymentGateway},
    DeliveryApi,
    EscrowApi,
    FraudDetectionApi,
    InsuranceApi,
    NotificationDispatcher,
    OrderLifecycleApi,
    ProfileApi,
    SqliteDatabase,
};

pub const CUSTOMER: &str = "alice";
pub const CUSTOMER_PHONE: &str = "0712345678";
pub const MERCHANT: &str = "mama_mboga";
pub const DRIVER: &str = "dave";
pub const OTHER_DRIVER: &str = "dina";
pub const ADMIN: &str = "root";

/// A gateway that accepts every capture request, unless told to fail.
#[derive(Debug, Clone, Default)]
pub struct TestGateway {
    pub fail: bool,
    pub requests: Arc<AtomicUsize>,
}

impl TestGateway {
    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PaymentGateway for TestGateway {
    async fn initiate_capture(
        &self,
        order_id: i64,
        _account: &str,
        _amount: Money,
    ) -> Result<CaptureReceipt, GatewayError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(GatewayError::Unavailable("connection refused".into()));
        }
        Ok(CaptureReceipt { transaction_ref: format!("CHK-TEST-{order_id}") })
    }
}

pub struct TestSystem {
    pub url: String,
    pub db: SqliteDatabase,
    pub orders: OrderLifecycleApi<SqliteDatabase>,
    pub deliveries: DeliveryApi<SqliteDatabase>,
    pub escrow: EscrowApi<SqliteDatabase, TestGateway>,
    pub fraud: FraudDetectionApi<SqliteDatabase>,
    pub notifications: NotificationDispatcher<SqliteDatabase>,
    pub profiles: ProfileApi<SqliteDatabase>,
    pub insurance: InsuranceApi<SqliteDatabase>,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_producers(EventProducers::default(), TestGateway::default()).await
    }

    pub async fn with_producers(producers: EventProducers, gateway: TestGateway) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        debug!("🚀️ Test database at {url}");
        let system = Self {
            orders: OrderLifecycleApi::new(db.clone(), producers.clone()),
            deliveries: DeliveryApi::new(db.clone(), producers.clone()),
            escrow: EscrowApi::new(db.clone(), gateway, producers.clone()),
            fraud: FraudDetectionApi::new(db.clone(), producers.clone()),
            notifications: NotificationDispatcher::new(db.clone(), producers),
            profiles: ProfileApi::new(db.clone()),
            insurance: InsuranceApi::new(db.clone()),
            url,
            db,
        };
        system.seed_profiles().await;
        system
    }

    async fn seed_profiles(&self) {
        let profiles = [
            NewProfile::new(CUSTOMER, Role::Customer, "Alice Wanjiru").with_phone(CUSTOMER_PHONE),
            NewProfile::new(MERCHANT, Role::Merchant, "Mama Mboga"),
            NewProfile::new(DRIVER, Role::Driver, "Dave Otieno"),
            NewProfile::new(OTHER_DRIVER, Role::Driver, "Dina Achieng"),
            NewProfile::new(ADMIN, Role::Admin, "Ops"),
        ];
        for p in profiles {
            self.profiles.upsert_profile(p).await.expect("Error seeding profile");
        }
    }

    pub async fn tear_down(self) {
        self.db.close().await;
        if let Err(e) = Sqlite::drop_database(&self.url).await {
            warn!("🚀️ Could not remove test database {}: {e}", self.url);
        }
    }

    pub async fn new_order(&self, amount_units: i64) -> Order {
        let amount = Money::from_units(amount_units);
        let order = NewOrder::new(CUSTOMER, "Sarit Centre, Westlands", "Argwings Kodhek Rd, Kilimani", amount)
            .with_merchant(MERCHANT);
        self.orders.create_order(order).await.expect("Error creating order").order
    }

    /// An order that has been paid into escrow and picked up by [`DRIVER`].
    pub async fn order_in_transit(&self, amount_units: i64) -> Order {
        let order = self.new_order(amount_units).await;
        self.escrow.confirm_capture(order.id, &format!("REF{}", order.id)).await.expect("Error confirming capture");
        self.orders.accept_order(order.id, DRIVER).await.expect("Error accepting order");
        self.orders.start_transit(order.id, DRIVER).await.expect("Error starting transit");
        order
    }

    /// An escrowed order that [`DRIVER`] has handed over, with the delivery code verified.
    pub async fn delivered_order(&self, amount_units: i64) -> Order {
        let order = self.order_in_transit(amount_units).await;
        self.deliveries
            .complete_delivery(order.id, DRIVER, order.delivery_otp())
            .await
            .expect("Error completing delivery")
            .order
    }

    /// Moves the assignment time of the order's delivery into the past.
    pub async fn backdate_assignment(&self, order_id: i64, minutes: i64) {
        let assigned_at = Utc::now() - Duration::minutes(minutes);
        sqlx::query("UPDATE deliveries SET assigned_at = $1 WHERE order_id = $2 AND voided = 0")
            .bind(assigned_at)
            .bind(order_id)
            .execute(self.db.pool())
            .await
            .expect("Error backdating delivery");
    }
}

pub fn wrong_code(otp: &str) -> &'static str {
    if otp == "0000" {
        "9999"
    } else {
        "0000"
    }
}
