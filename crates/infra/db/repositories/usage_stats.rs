use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;

use crate::{
    domain::{
        entities::usage_stats::{InsertUsageStatsEntity, UsageDelta, UsageStatsEntity},
        repositories::usage_stats::UsageStatsRepository,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::usage_stats},
};

pub struct UsageStatsPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UsageStatsPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UsageStatsRepository for UsageStatsPostgres {
    async fn find(&self, user_id: &str, period: &str) -> Result<Option<UsageStatsEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = usage_stats::table
            .find((user_id, period))
            .select(UsageStatsEntity::as_select())
            .first::<UsageStatsEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn insert_if_absent(
        &self,
        insert_usage_stats_entity: InsertUsageStatsEntity,
    ) -> Result<UsageStatsEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Two first requests in the same period race here; the loser keeps the winner's row.
        insert_into(usage_stats::table)
            .values(&insert_usage_stats_entity)
            .on_conflict((usage_stats::user_id, usage_stats::period))
            .do_nothing()
            .execute(&mut conn)?;

        let stored = usage_stats::table
            .find((
                insert_usage_stats_entity.user_id.as_str(),
                insert_usage_stats_entity.period.as_str(),
            ))
            .select(UsageStatsEntity::as_select())
            .first::<UsageStatsEntity>(&mut conn)?;

        Ok(stored)
    }

    async fn apply_delta(
        &self,
        user_id: &str,
        period: &str,
        delta: UsageDelta,
    ) -> Result<Option<UsageStatsEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let now = Utc::now();
        let calls = delta.api_calls.unwrap_or(0);
        let bandwidth = delta.bandwidth_used.unwrap_or(0);

        let result = match delta.storage_used {
            Some(storage) => update(usage_stats::table.find((user_id, period)))
                .set((
                    usage_stats::api_calls.eq(usage_stats::api_calls + calls),
                    usage_stats::bandwidth_used.eq(usage_stats::bandwidth_used + bandwidth),
                    usage_stats::storage_used.eq(storage),
                    usage_stats::updated_at.eq(now),
                ))
                .returning(UsageStatsEntity::as_returning())
                .get_result::<UsageStatsEntity>(&mut conn)
                .optional()?,
            None => update(usage_stats::table.find((user_id, period)))
                .set((
                    usage_stats::api_calls.eq(usage_stats::api_calls + calls),
                    usage_stats::bandwidth_used.eq(usage_stats::bandwidth_used + bandwidth),
                    usage_stats::updated_at.eq(now),
                ))
                .returning(UsageStatsEntity::as_returning())
                .get_result::<UsageStatsEntity>(&mut conn)
                .optional()?,
        };

        Ok(result)
    }
}
