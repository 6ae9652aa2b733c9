//! Backend capabilities required by the workflow APIs.
//!
//! The engine never talks to a database directly. Instead, each API is generic over one or more of these traits, and a
//! backend (currently [`crate::SqliteDatabase`]) implements them. Every state transition is expressed as a single trait
//! method so that a backend can make it atomic.
mod collaborators;
mod data_objects;
mod delivery_ledger;
mod fraud_management;
mod insurance_management;
mod notification_management;
mod order_management;
mod profile_management;

pub use collaborators::{CaptureReceipt, GatewayError, PaymentGateway, SmsReceipt, SmsTransport, TransportError};
pub use data_objects::{
    AcceptedOrder,
    CancelledOrder,
    CompletedDelivery,
    EscrowRelease,
    LocationUpdateResult,
    NewOrderResult,
    PaymentTransition,
    TransitStarted,
};
pub use delivery_ledger::{DeliveryLedger, ErrorKind, LedgerError};
pub use fraud_management::FraudManagement;
pub use insurance_management::InsuranceManagement;
pub use notification_management::NotificationManagement;
pub use order_management::OrderManagement;
pub use profile_management::ProfileManagement;
