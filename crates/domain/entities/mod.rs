pub mod usage_stats;
pub mod users;
