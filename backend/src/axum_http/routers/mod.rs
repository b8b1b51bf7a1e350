pub mod admin;
pub mod billing;
pub mod plans;
pub mod usage_stats;
pub mod users;
pub mod webhooks;
