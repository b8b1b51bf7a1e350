use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    OptionalExtension, RunQueryDsl, insert_into, prelude::*, sql_query, sql_types::Text, update,
};
use std::sync::Arc;

use crate::{
    domain::{
        entities::users::{InsertUserEntity, UpdateUserProfileEntity, UserEntity, UserRow},
        repositories::users::UserRepository,
        value_objects::{
            enums::subscription_statuses::SubscriptionStatus,
            subscriptions::SubscriptionSnapshot,
        },
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::users},
};

pub struct UserPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserRepository for UserPostgres {
    async fn find_by_uid(&self, uid: &str) -> Result<Option<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = users::table
            .filter(users::uid.eq(uid))
            .select(UserRow::as_select())
            .first::<UserRow>(&mut conn)
            .optional()?;

        row.map(UserEntity::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = users::table
            .filter(users::email.eq(email))
            .select(UserRow::as_select())
            .first::<UserRow>(&mut conn)
            .optional()?;

        row.map(UserEntity::try_from).transpose()
    }

    async fn find_by_stripe_customer_id(&self, customer_id: &str) -> Result<Option<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = users::table
            .filter(users::stripe_customer_id.eq(customer_id))
            .select(UserRow::as_select())
            .first::<UserRow>(&mut conn)
            .optional()?;

        row.map(UserEntity::try_from).transpose()
    }

    async fn create(&self, insert_user_entity: InsertUserEntity) -> Result<UserEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = insert_into(users::table)
            .values(&insert_user_entity)
            .returning(UserRow::as_returning())
            .get_result::<UserRow>(&mut conn)?;

        row.try_into()
    }

    async fn update_profile(
        &self,
        uid: &str,
        update_user_profile_entity: UpdateUserProfileEntity,
    ) -> Result<UserEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = update(users::table.filter(users::uid.eq(uid)))
            .set(&update_user_profile_entity)
            .returning(UserRow::as_returning())
            .get_result::<UserRow>(&mut conn)?;

        row.try_into()
    }

    async fn set_stripe_customer_id(&self, uid: &str, customer_id: &str) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Conditional on NULL so an existing customer id is never replaced.
        let updated = update(
            users::table
                .filter(users::uid.eq(uid))
                .filter(users::stripe_customer_id.is_null()),
        )
        .set((
            users::stripe_customer_id.eq(customer_id),
            users::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated == 1)
    }

    async fn replace_subscription(&self, uid: &str, snapshot: SubscriptionSnapshot) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let document = serde_json::to_value(&snapshot)?;

        update(users::table.filter(users::uid.eq(uid)))
            .set((
                users::subscription.eq(Some(document)),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn update_subscription_status(
        &self,
        uid: &str,
        status: SubscriptionStatus,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        sql_query(
            "UPDATE users \
             SET subscription = jsonb_set(subscription, '{status}', to_jsonb($1::text)), \
                 updated_at = NOW() \
             WHERE uid = $2 AND subscription IS NOT NULL",
        )
        .bind::<Text, _>(status.as_str())
        .bind::<Text, _>(uid)
        .execute(&mut conn)?;

        Ok(())
    }

    async fn list_users(&self, limit: i64) -> Result<Vec<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = users::table
            .order(users::created_at.desc())
            .limit(limit)
            .select(UserRow::as_select())
            .load::<UserRow>(&mut conn)?;

        rows.into_iter().map(UserEntity::try_from).collect()
    }
}
