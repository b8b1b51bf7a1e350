use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::iam::VerifiedIdentity;

/// Validates a bearer token and yields the stable user identifier behind it.
#[automock]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity>;

    fn strategy_name(&self) -> &'static str;
}
