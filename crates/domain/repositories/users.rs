use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::{
    entities::users::{InsertUserEntity, UpdateUserProfileEntity, UserEntity},
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus,
        subscriptions::SubscriptionSnapshot,
    },
};

#[automock]
#[async_trait]
pub trait UserRepository {
    async fn find_by_uid(&self, uid: &str) -> Result<Option<UserEntity>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>>;

    async fn find_by_stripe_customer_id(&self, customer_id: &str) -> Result<Option<UserEntity>>;

    async fn create(&self, insert_user_entity: InsertUserEntity) -> Result<UserEntity>;

    async fn update_profile(
        &self,
        uid: &str,
        update_user_profile_entity: UpdateUserProfileEntity,
    ) -> Result<UserEntity>;

    /// Stores the processor customer id. Returns `false` when one was already set.
    async fn set_stripe_customer_id(&self, uid: &str, customer_id: &str) -> Result<bool>;

    /// Replaces the whole embedded subscription snapshot.
    async fn replace_subscription(&self, uid: &str, snapshot: SubscriptionSnapshot) -> Result<()>;

    /// Changes only the status of an existing snapshot; no-op when none is stored.
    async fn update_subscription_status(&self, uid: &str, status: SubscriptionStatus)
    -> Result<()>;

    async fn list_users(&self, limit: i64) -> Result<Vec<UserEntity>>;
}
