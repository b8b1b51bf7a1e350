use anyhow::Context;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::{
    domain::value_objects::subscriptions::SubscriptionSnapshot,
    infra::db::postgres::schema::users,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub subscription: Option<SubscriptionSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw row used for Diesel queries. The snapshot stays as JSON and is parsed into SubscriptionSnapshot.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = users)]
#[diesel(primary_key(uid))]
pub struct UserRow {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub subscription: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserEntity {
    type Error = anyhow::Error;

    fn try_from(value: UserRow) -> anyhow::Result<Self> {
        let subscription = value
            .subscription
            .map(serde_json::from_value::<SubscriptionSnapshot>)
            .transpose()
            .with_context(|| format!("stored subscription of user {} is malformed", value.uid))?;

        Ok(Self {
            uid: value.uid,
            email: value.email,
            display_name: value.display_name,
            photo_url: value.photo_url,
            stripe_customer_id: value.stripe_customer_id,
            subscription,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = users)]
pub struct InsertUserEntity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// Profile fields the owner may change. `None` leaves the column untouched.
#[derive(Debug, Clone, PartialEq, Eq, AsChangeset)]
#[diesel(table_name = users)]
pub struct UpdateUserProfileEntity {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}
