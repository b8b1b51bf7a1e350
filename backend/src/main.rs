use anyhow::Result;
use backend::{
    auth::SharedIdentityVerifier,
    axum_http::http_serve,
    config::{config_loader, config_model::Identity},
};
use crates::infra::{
    db::postgres::postgres_connection,
    identity::{demo::DemoIdentityVerifier, firebase::FirebaseIdentityVerifier},
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // No subscriber is installed yet, so this failure can only go to stderr.
    if let Err(error) = crates::observability::init_observability("backend") {
        eprintln!("Failed to initialise tracing: {error:?}");
        std::process::exit(1);
    }

    if let Err(error) = run().await {
        error!("Backend exited with error: {:?}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let dotenvy_env = config_loader::load()?;
    info!(stage = %dotenvy_env.stage, "ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("Postgres connection has been established");

    let verifier: SharedIdentityVerifier = match &dotenvy_env.identity {
        Identity::Firebase { project_id } => {
            Arc::new(FirebaseIdentityVerifier::new(project_id.clone())?)
        }
        Identity::Demo => {
            warn!("AUTH_MODE=demo, every bearer token maps to the demo user");
            Arc::new(DemoIdentityVerifier)
        }
    };
    info!(strategy = verifier.strategy_name(), "Identity verifier is ready");

    http_serve::start(Arc::new(dotenvy_env), Arc::new(postgres_pool), verifier).await?;

    Ok(())
}
