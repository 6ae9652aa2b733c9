use crate::{
    db_types::{NewProfile, NewRating, Rating, UserProfile},
    traits::LedgerError,
};

#[allow(async_fn_in_trait)]
pub trait ProfileManagement {
    /// Creates the profile, or updates the name, role, phone and verified flag of an existing one. Rating and delivery
    /// count are never touched.
    async fn upsert_profile(&self, profile: NewProfile) -> Result<UserProfile, LedgerError>;

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>, LedgerError>;

    /// The ids of every administrator profile.
    async fn fetch_admin_ids(&self) -> Result<Vec<String>, LedgerError>;

    /// Stores the customer's rating for a delivered order (one per order) and recomputes the driver's and merchant's
    /// average rating.
    async fn submit_rating(&self, rating: NewRating) -> Result<Rating, LedgerError>;
}
