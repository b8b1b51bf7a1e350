use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    entities::users::{UpdateUserProfileEntity, UserEntity},
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus, subscriptions::SubscriptionSnapshot,
    },
};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserDto {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub subscription: Option<SubscriptionSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserEntity> for UserDto {
    fn from(value: UserEntity) -> Self {
        Self {
            uid: value.uid,
            email: value.email,
            display_name: value.display_name,
            photo_url: value.photo_url,
            stripe_customer_id: value.stripe_customer_id,
            subscription: value.subscription,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Body of the create-or-update call made right after sign-in.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpsertUserModel {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserProfileModel {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl UpdateUserProfileModel {
    pub fn to_entity(&self) -> UpdateUserProfileEntity {
        UpdateUserProfileEntity {
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.photo_url.is_none()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AdminSubscriptionSummary {
    pub status: SubscriptionStatus,
    pub price_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AdminUserDto {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub subscription: Option<AdminSubscriptionSummary>,
}

impl From<UserEntity> for AdminUserDto {
    fn from(value: UserEntity) -> Self {
        Self {
            uid: value.uid,
            email: value.email,
            display_name: value.display_name,
            created_at: value.created_at,
            subscription: value.subscription.map(|snapshot| AdminSubscriptionSummary {
                status: snapshot.status,
                price_id: snapshot.price_id,
            }),
        }
    }
}
