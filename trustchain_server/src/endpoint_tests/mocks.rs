use mockall::mock;
use tc_common::Money;
use trustchain_engine::traits::{CaptureReceipt, GatewayError, PaymentGateway};

mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        async fn initiate_capture(&self, order_id: i64, account: &str, amount: Money) -> Result<CaptureReceipt, GatewayError>;
    }
}
