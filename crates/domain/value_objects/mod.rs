pub mod billing;
pub mod enums;
pub mod iam;
pub mod plans;
pub mod subscriptions;
pub mod usage_stats;
pub mod users;
