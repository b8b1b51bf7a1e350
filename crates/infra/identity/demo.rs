use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::domain::{
    interfaces::identity::IdentityVerifier, value_objects::iam::VerifiedIdentity,
};

pub const DEMO_USER_UID: &str = "demo-user-123";
pub const DEMO_USER_EMAIL: &str = "demo@flowlaunch.com";
pub const DEMO_USER_NAME: &str = "Demo User";

/// Accepts any non-empty bearer token as the single demo account.
///
/// Only meant for local walkthroughs without identity-provider credentials.
#[derive(Debug, Default, Clone)]
pub struct DemoIdentityVerifier;

#[async_trait]
impl IdentityVerifier for DemoIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity> {
        if token.trim().is_empty() {
            bail!("empty bearer token");
        }

        Ok(VerifiedIdentity {
            uid: DEMO_USER_UID.to_string(),
            email: Some(DEMO_USER_EMAIL.to_string()),
            name: Some(DEMO_USER_NAME.to_string()),
            picture: None,
        })
    }

    fn strategy_name(&self) -> &'static str {
        "demo"
    }
}
