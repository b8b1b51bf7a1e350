use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub stripe: Stripe,
    pub identity: Identity,
    pub admin: Admin,
    pub stage: Stage,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// Megabytes.
    pub body_limit: u64,
    /// Seconds.
    pub timeout: u64,
    pub frontend_url: String,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub price_id_monthly: Option<String>,
    pub price_id_annual: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Firebase { project_id: String },
    Demo,
}

#[derive(Debug, Clone, Default)]
pub struct Admin {
    pub uids: Vec<String>,
}

impl Admin {
    pub fn is_admin(&self, uid: &str) -> bool {
        self.uids.iter().any(|admin| admin == uid)
    }
}
