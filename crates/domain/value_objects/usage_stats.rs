use std::fmt::Display;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    entities::usage_stats::{UsageDelta, UsageStatsEntity},
    value_objects::plans::PlanLimits,
};

/// Calendar month a usage record belongs to, formatted `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsagePeriod(String);

impl UsagePeriod {
    pub fn containing(instant: DateTime<Utc>) -> Self {
        Self(instant.format("%Y-%m").to_string())
    }

    pub fn current() -> Self {
        Self::containing(Utc::now())
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let Some((year, month)) = raw.split_once('-') else {
            bail!("period must be formatted YYYY-MM");
        };
        if year.len() != 4 || month.len() != 2 {
            bail!("period must be formatted YYYY-MM");
        }
        if !year.chars().all(|c| c.is_ascii_digit()) {
            bail!("period year must be numeric");
        }
        match month.parse::<u32>() {
            Ok(1..=12) => Ok(Self(raw.to_string())),
            _ => bail!("period month must be between 01 and 12"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UsagePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordUsageModel {
    pub api_calls: Option<i64>,
    pub storage_used: Option<i64>,
    pub bandwidth_used: Option<i64>,
    pub period: Option<String>,
}

impl RecordUsageModel {
    pub fn to_delta(&self) -> Result<UsageDelta> {
        for (field, value) in [
            ("api_calls", self.api_calls),
            ("storage_used", self.storage_used),
            ("bandwidth_used", self.bandwidth_used),
        ] {
            if value.is_some_and(|v| v < 0) {
                bail!("{field} must not be negative");
            }
        }

        Ok(UsageDelta {
            api_calls: self.api_calls,
            storage_used: self.storage_used,
            bandwidth_used: self.bandwidth_used,
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UsageStatsDto {
    pub period: String,
    pub api_calls: i64,
    pub storage_used: i64,
    pub bandwidth_used: i64,
    pub limits: PlanLimits,
}

impl UsageStatsDto {
    pub fn new(entity: UsageStatsEntity, limits: PlanLimits) -> Self {
        Self {
            period: entity.period,
            api_calls: entity.api_calls,
            storage_used: entity.storage_used,
            bandwidth_used: entity.bandwidth_used,
            limits,
        }
    }
}
