use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use trustchain_engine::{db_types::Order, traits::LedgerError};

use crate::support::TestSystem;

#[derive(Default, World)]
pub struct EscrowWorld {
    pub system: Option<TestSystem>,
    /// Orders by the name the scenario gave them.
    pub orders: HashMap<String, Order>,
    pub last_error: Option<LedgerError>,
}

impl Debug for EscrowWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscrowWorld")
            .field("db", &self.system.as_ref().map(|s| s.url.as_str()))
            .field("orders", &self.orders.keys().collect::<Vec<_>>())
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl EscrowWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("Marketplace not initialised")
    }

    pub fn order(&self, name: &str) -> &Order {
        self.orders.get(name).unwrap_or_else(|| panic!("No order called {name}"))
    }

    /// Keeps the error (if any) for a later `Then` step.
    pub fn record<T>(&mut self, result: Result<T, LedgerError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            },
            Err(e) => {
                self.last_error = Some(e);
                None
            },
        }
    }
}
