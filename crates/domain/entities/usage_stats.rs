use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::usage_stats;

#[derive(Debug, Clone, PartialEq, Eq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = usage_stats)]
#[diesel(primary_key(user_id, period))]
pub struct UsageStatsEntity {
    pub user_id: String,
    pub period: String,
    pub api_calls: i64,
    pub storage_used: i64,
    pub bandwidth_used: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = usage_stats)]
pub struct InsertUsageStatsEntity {
    pub user_id: String,
    pub period: String,
    pub api_calls: i64,
    pub storage_used: i64,
    pub bandwidth_used: i64,
}

/// Counter changes for one period: calls and bandwidth add, storage replaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageDelta {
    pub api_calls: Option<i64>,
    pub storage_used: Option<i64>,
    pub bandwidth_used: Option<i64>,
}
