use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{OrderStatusType, TrackingId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub customer_id: Option<String>,
    pub merchant_id: Option<String>,
    /// Matches orders whose active delivery belongs to this driver.
    pub driver_id: Option<String>,
    pub tracking_id: Option<TrackingId>,
    pub status: Option<Vec<OrderStatusType>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl OrderQueryFilter {
    pub fn with_customer_id<S: Into<String>>(mut self, customer_id: S) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_merchant_id<S: Into<String>>(mut self, merchant_id: S) -> Self {
        self.merchant_id = Some(merchant_id.into());
        self
    }

    pub fn with_driver_id<S: Into<String>>(mut self, driver_id: S) -> Self {
        self.driver_id = Some(driver_id.into());
        self
    }

    pub fn with_tracking_id(mut self, tracking_id: TrackingId) -> Self {
        self.tracking_id = Some(tracking_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        let mut statuses = self.status.take().unwrap_or_default();
        if !statuses.contains(&status) {
            statuses.push(status);
        }
        self.status = Some(statuses);
        self
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True if no filter criteria are set. A limit on its own does not count as a criterion.
    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none() &&
            self.merchant_id.is_none() &&
            self.driver_id.is_none() &&
            self.tracking_id.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("all orders");
        }
        let mut parts = vec![];
        if let Some(c) = &self.customer_id {
            parts.push(format!("customer={c}"));
        }
        if let Some(m) = &self.merchant_id {
            parts.push(format!("merchant={m}"));
        }
        if let Some(d) = &self.driver_id {
            parts.push(format!("driver={d}"));
        }
        if let Some(t) = &self.tracking_id {
            parts.push(format!("tracking_id={t}"));
        }
        if let Some(s) = self.status.as_ref().filter(|s| !s.is_empty()) {
            let s = s.iter().map(|s| s.to_string()).collect::<Vec<_>>().join("|");
            parts.push(format!("status={s}"));
        }
        if let Some(since) = self.since {
            parts.push(format!("since={since}"));
        }
        if let Some(until) = self.until {
            parts.push(format!("until={until}"));
        }
        f.write_str(&parts.join(", "))
    }
}

//--------------------------------------   OrderFlowConfig   ---------------------------------------------------------
pub const DEFAULT_MAX_OTP_ATTEMPTS: u32 = 5;

/// Tunables for the delivery confirmation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFlowConfig {
    /// Incorrect delivery codes tolerated per delivery before an administrator must reset the lockout.
    pub max_otp_attempts: u32,
}

impl Default for OrderFlowConfig {
    fn default() -> Self {
        Self { max_otp_attempts: DEFAULT_MAX_OTP_ATTEMPTS }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builder() {
        let filter = OrderQueryFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.to_string(), "all orders");
        let filter = filter.with_limit(5);
        assert!(filter.is_empty());
        let filter = filter
            .with_customer_id("alice")
            .with_status(OrderStatusType::Pending)
            .with_status(OrderStatusType::Assigned)
            .with_status(OrderStatusType::Pending);
        assert!(!filter.is_empty());
        assert_eq!(filter.status.as_ref().unwrap().len(), 2);
        assert_eq!(filter.to_string(), "customer=alice, status=pending|assigned");
    }
}
