use serde::{Deserialize, Serialize};

use crate::db_types::{FraudAlert, NewFraudAlert};

/// A request to score a user and/or an order. `action` records what prompted the check, e.g. `order_created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudCheckRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub order_id: Option<i64>,
    pub action: String,
}

impl FraudCheckRequest {
    pub fn new<S: Into<String>>(action: S) -> Self {
        Self { user_id: None, order_id: None, action: action.into() }
    }

    pub fn for_user<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn for_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudCheckReport {
    /// Every rule that fired, in rule order.
    pub fired: Vec<NewFraudAlert>,
    /// The alerts that were stored. Rules that fired while an identical alert was still open are not stored again.
    pub recorded: Vec<FraudAlert>,
}

impl FraudCheckReport {
    pub fn alerts_generated(&self) -> usize {
        self.fired.len()
    }
}
