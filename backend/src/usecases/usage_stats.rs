use std::sync::Arc;

use crates::domain::{
    entities::usage_stats::{InsertUsageStatsEntity, UsageStatsEntity},
    repositories::{usage_stats::UsageStatsRepository, users::UserRepository},
    value_objects::{
        plans::{PlanCatalog, PlanLimits},
        usage_stats::{RecordUsageModel, UsagePeriod, UsageStatsDto},
    },
};
use rand::Rng;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl UsageError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            UsageError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            UsageError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UsageResult<T> = std::result::Result<T, UsageError>;

/// Placeholder counters for a period nobody has reported usage for yet.
pub fn sample_usage(user_id: &str, period: &UsagePeriod) -> InsertUsageStatsEntity {
    let mut rng = rand::thread_rng();
    InsertUsageStatsEntity {
        user_id: user_id.to_string(),
        period: period.as_str().to_string(),
        api_calls: rng.gen_range(0..1_000),
        storage_used: rng.gen_range(0..100),
        bandwidth_used: rng.gen_range(0..500),
    }
}

pub struct UsageStatsUseCase<S, U>
where
    S: UsageStatsRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    usage_repo: Arc<S>,
    user_repo: Arc<U>,
    catalog: Arc<PlanCatalog>,
}

impl<S, U> UsageStatsUseCase<S, U>
where
    S: UsageStatsRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    pub fn new(usage_repo: Arc<S>, user_repo: Arc<U>, catalog: Arc<PlanCatalog>) -> Self {
        Self {
            usage_repo,
            user_repo,
            catalog,
        }
    }

    pub async fn current_usage(&self, user_id: &str) -> UsageResult<UsageStatsDto> {
        let period = UsagePeriod::current();

        let stats = match self
            .usage_repo
            .find(user_id, period.as_str())
            .await
            .map_err(|err| self.storage_error(user_id, "failed to load usage", err))?
        {
            Some(stats) => stats,
            None => {
                let seeded = self
                    .usage_repo
                    .insert_if_absent(sample_usage(user_id, &period))
                    .await
                    .map_err(|err| self.storage_error(user_id, "failed to seed usage", err))?;
                info!(%user_id, period = %period, "usage: seeded usage record");
                seeded
            }
        };

        let limits = self.limits_for(user_id).await?;
        Ok(UsageStatsDto::new(stats, limits))
    }

    /// Adds to the call and bandwidth counters and replaces storage for the period.
    pub async fn record_usage(
        &self,
        user_id: &str,
        model: RecordUsageModel,
    ) -> UsageResult<UsageStatsDto> {
        let period = match model.period.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                UsagePeriod::parse(raw).map_err(|err| UsageError::InvalidInput(err.to_string()))?
            }
            _ => UsagePeriod::current(),
        };
        let delta = model
            .to_delta()
            .map_err(|err| UsageError::InvalidInput(err.to_string()))?;

        // Lazily create an empty record so the delta below is the only write that counts.
        self.usage_repo
            .insert_if_absent(InsertUsageStatsEntity {
                user_id: user_id.to_string(),
                period: period.as_str().to_string(),
                api_calls: 0,
                storage_used: 0,
                bandwidth_used: 0,
            })
            .await
            .map_err(|err| self.storage_error(user_id, "failed to create usage record", err))?;

        let stats: UsageStatsEntity = self
            .usage_repo
            .apply_delta(user_id, period.as_str(), delta)
            .await
            .map_err(|err| self.storage_error(user_id, "failed to record usage", err))?
            .ok_or_else(|| {
                anyhow::anyhow!("usage record for {user_id} in {period} disappeared")
            })?;

        info!(%user_id, period = %period, "usage: usage recorded");

        let limits = self.limits_for(user_id).await?;
        Ok(UsageStatsDto::new(stats, limits))
    }

    async fn limits_for(&self, user_id: &str) -> UsageResult<PlanLimits> {
        let user = self
            .user_repo
            .find_by_uid(user_id)
            .await
            .map_err(|err| self.storage_error(user_id, "failed to load user", err))?;

        Ok(self
            .catalog
            .limits_for(user.as_ref().and_then(|u| u.subscription.as_ref())))
    }

    fn storage_error(&self, user_id: &str, what: &str, err: anyhow::Error) -> UsageError {
        error!(%user_id, db_error = ?err, "usage: {what}");
        UsageError::Internal(err)
    }
}
