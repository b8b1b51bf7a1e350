use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;

/// Denormalized copy of the processor's subscription, embedded in the user record.
///
/// Always written as a whole; the only partial write is the past-due status flip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    pub id: String,
    pub status: SubscriptionStatus,
    pub price_id: String,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
}
