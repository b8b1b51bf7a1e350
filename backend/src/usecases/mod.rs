pub mod billing;
pub mod stripe_gateway;
pub mod subscription_reconciler;
pub mod usage_stats;
pub mod users;
