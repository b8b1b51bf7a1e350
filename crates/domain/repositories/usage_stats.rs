use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::usage_stats::{
    InsertUsageStatsEntity, UsageDelta, UsageStatsEntity,
};

#[automock]
#[async_trait]
pub trait UsageStatsRepository {
    async fn find(&self, user_id: &str, period: &str) -> Result<Option<UsageStatsEntity>>;

    /// Inserts the record unless one already exists for the pair, then returns the stored one.
    async fn insert_if_absent(
        &self,
        insert_usage_stats_entity: InsertUsageStatsEntity,
    ) -> Result<UsageStatsEntity>;

    /// Applies the delta to an existing record; `None` when there is no record for the pair.
    async fn apply_delta(
        &self,
        user_id: &str,
        period: &str,
        delta: UsageDelta,
    ) -> Result<Option<UsageStatsEntity>>;
}
