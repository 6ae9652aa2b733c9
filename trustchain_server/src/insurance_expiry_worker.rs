use std::time::Duration;

use log::*;
use trustchain_engine::{db_types::InsurancePolicy, InsuranceApi, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the insurance expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_insurance_expiry_worker(db: SqliteDatabase, interval: Duration) -> JoinHandle<()> {
    let interval = interval.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = InsuranceApi::new(db);
        info!("🕰️ Insurance expiry worker started. Running every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running insurance expiry job");
            match api.expire_policies().await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No insurance policies are due to expire"),
                Ok(expired) => {
                    info!("🕰️ {} insurance policies expired", expired.len());
                    debug!("🕰️ Expired policies: {}", policy_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running insurance expiry job: {e}");
                },
            }
        }
    })
}

fn policy_list(policies: &[InsurancePolicy]) -> String {
    policies
        .iter()
        .map(|p| format!("[{}] {} order: {}", p.id, p.policy_number, p.order_id))
        .collect::<Vec<String>>()
        .join(", ")
}
