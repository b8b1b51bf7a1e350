use anyhow::{Context, Result, bail};

use super::{
    config_model::{Admin, BackendServer, Database, DotEnvyConfig, Identity, Stripe},
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Builds the configuration from any key lookup; `load` passes the process environment.
pub fn from_lookup<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let optional = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let required = |key: &str| optional(key).with_context(|| format!("{key} is not set"));

    let stage = match optional("STAGE") {
        Some(raw) => Stage::try_from(&raw)?,
        None => Stage::default(),
    };

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: optional("SERVER_BODY_LIMIT")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: optional("SERVER_TIMEOUT")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
        frontend_url: optional("FRONTEND_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string(),
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: optional("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS is invalid")?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        price_id_monthly: optional("STRIPE_PRICE_ID_MONTHLY"),
        price_id_annual: optional("STRIPE_PRICE_ID_ANNUAL"),
    };

    let identity = match optional("AUTH_MODE").as_deref().unwrap_or("firebase") {
        "firebase" => Identity::Firebase {
            project_id: required("FIREBASE_PROJECT_ID")?,
        },
        "demo" => {
            if stage.is_production() {
                bail!("AUTH_MODE=demo is not allowed in {stage}");
            }
            Identity::Demo
        }
        other => bail!("AUTH_MODE `{other}` is invalid (expected firebase or demo)"),
    };

    let admin = Admin {
        uids: optional("ADMIN_UIDS")
            .map(|raw| {
                raw.split(',')
                    .map(|uid| uid.trim().to_string())
                    .filter(|uid| !uid.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        stripe,
        identity,
        admin,
        stage,
    })
}
