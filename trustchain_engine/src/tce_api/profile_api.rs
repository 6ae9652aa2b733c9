use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewProfile, NewRating, Rating, UserProfile},
    helpers::normalize_msisdn,
    traits::{LedgerError, ProfileManagement},
};

/// `ProfileApi` keeps the local copy of each user's profile: role, contact number and reputation.
///
/// The delivery count is not writable here. It only moves when escrow is released.
pub struct ProfileApi<B> {
    db: B,
}

impl<B> Debug for ProfileApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProfileApi")
    }
}

impl<B> ProfileApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ProfileApi<B>
where B: ProfileManagement
{
    /// Creates or updates a profile. Phone numbers are stored in international form.
    pub async fn upsert_profile(&self, mut profile: NewProfile) -> Result<UserProfile, LedgerError> {
        if profile.id.trim().is_empty() {
            return Err(LedgerError::Validation("A profile needs a user id".into()));
        }
        if profile.full_name.trim().is_empty() {
            return Err(LedgerError::Validation("full_name cannot be empty".into()));
        }
        profile.phone = match profile.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(phone) => Some(normalize_msisdn(phone).map_err(|e| LedgerError::Validation(e.to_string()))?),
            None => None,
        };
        let profile = self.db.upsert_profile(profile).await?;
        debug!("👤️ Profile for {} ({}) saved", profile.id, profile.role);
        Ok(profile)
    }

    pub async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>, LedgerError> {
        self.db.fetch_profile(user_id).await
    }

    /// Rates the driver and/or merchant of a delivered order. Only the order's customer may rate it, once.
    pub async fn submit_rating(&self, rating: NewRating) -> Result<Rating, LedgerError> {
        rating.validate().map_err(LedgerError::Validation)?;
        let rating = self.db.submit_rating(rating).await?;
        info!(
            "👤️ Order #{} rated by {} (driver: {:?}, merchant: {:?})",
            rating.order_id, rating.customer_id, rating.driver_rating, rating.merchant_rating
        );
        Ok(rating)
    }
}
