use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::domain::value_objects::{
    enums::subscription_statuses::SubscriptionStatus, subscriptions::SubscriptionSnapshot,
};

/// A reference Stripe may send either as a bare id or as the expanded object.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object { id } => id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub mode: Option<String>,
    pub customer: Option<Expandable>,
    pub subscription: Option<Expandable>,
}

impl StripeCheckoutSession {
    pub fn is_subscription_mode(&self) -> bool {
        self.mode.as_deref() == Some("subscription")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: Expandable,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    pub price: Option<StripePrice>,
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

impl StripeSubscriptionItems {
    /// Price of the first line item, or an empty string when there is none.
    pub fn first_price_id(&self) -> String {
        self.data
            .first()
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.clone())
            .unwrap_or_default()
    }

    fn first_period_end(&self) -> Option<i64> {
        self.data.first().and_then(|item| item.current_period_end)
    }
}

/// Newer API versions only carry the period end on the items.
fn period_end(
    subscription_id: &str,
    current_period_end: Option<i64>,
    items: &StripeSubscriptionItems,
) -> Result<DateTime<Utc>> {
    let period_end = current_period_end
        .or_else(|| items.first_period_end())
        .ok_or_else(|| anyhow!("subscription {subscription_id} has no current period end"))?;

    Utc.timestamp_opt(period_end, 0)
        .single()
        .ok_or_else(|| anyhow!("subscription {subscription_id} has an invalid period end"))
}

impl StripeSubscription {
    pub fn to_snapshot(&self) -> Result<SubscriptionSnapshot> {
        Ok(SubscriptionSnapshot {
            id: self.id.clone(),
            status: self.status,
            price_id: self.items.first_price_id(),
            current_period_end: period_end(&self.id, self.current_period_end, &self.items)?,
            cancel_at_period_end: self.cancel_at_period_end,
        })
    }
}

/// Payload of `customer.subscription.deleted`.
///
/// Status and cancel flag are not read: whatever Stripe sends, a deleted
/// subscription is stored as canceled at period end.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeDeletedSubscription {
    pub id: String,
    pub customer: Expandable,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

impl StripeDeletedSubscription {
    pub fn to_canceled_snapshot(&self) -> Result<SubscriptionSnapshot> {
        Ok(SubscriptionSnapshot {
            id: self.id.clone(),
            status: SubscriptionStatus::Canceled,
            price_id: self.items.first_price_id(),
            current_period_end: period_end(&self.id, self.current_period_end, &self.items)?,
            cancel_at_period_end: true,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    pub id: Option<String>,
    pub customer: Option<Expandable>,
    pub subscription: Option<Expandable>,
    pub parent: Option<StripeInvoiceParent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceParent {
    pub subscription_details: Option<StripeInvoiceSubscriptionDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceSubscriptionDetails {
    pub subscription: Option<Expandable>,
}

impl StripeInvoice {
    pub fn customer_id(&self) -> Option<&str> {
        self.customer.as_ref().map(Expandable::id)
    }

    /// Subscription the invoice bills; newer API versions nest it under `parent`.
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription
            .as_ref()
            .or_else(|| {
                self.parent
                    .as_ref()
                    .and_then(|parent| parent.subscription_details.as_ref())
                    .and_then(|details| details.subscription.as_ref())
            })
            .map(Expandable::id)
    }
}
