use crate::{
    auth::SharedIdentityVerifier,
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
    usecases::{
        billing::{BillingRedirects, BillingUseCase},
        stripe_gateway::StripeGateway,
        subscription_reconciler::SubscriptionReconciler,
        usage_stats::UsageStatsUseCase,
        users::UserUseCase,
    },
};
use anyhow::Result;
use axum::{
    Extension, Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    domain::{
        repositories::{usage_stats::UsageStatsRepository, users::UserRepository},
        value_objects::plans::PlanCatalog,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{usage_stats::UsageStatsPostgres, users::UserPostgres},
    },
    payments::stripe_client::StripeClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Everything the routers need, already wired to concrete storage and Stripe implementations.
pub struct AppComponents<U, S, G>
where
    U: UserRepository + Send + Sync + 'static,
    S: UsageStatsRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    pub reconciler: Arc<SubscriptionReconciler<U, G>>,
    pub users: Arc<UserUseCase<U>>,
    pub billing: Arc<BillingUseCase<U, G>>,
    pub usage_stats: Arc<UsageStatsUseCase<S, U>>,
    pub catalog: Arc<PlanCatalog>,
    pub verifier: SharedIdentityVerifier,
}

impl<U, S, G> AppComponents<U, S, G>
where
    U: UserRepository + Send + Sync + 'static,
    S: UsageStatsRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        config: &DotEnvyConfig,
        user_repo: Arc<U>,
        usage_repo: Arc<S>,
        stripe: Arc<G>,
        verifier: SharedIdentityVerifier,
    ) -> Self {
        let catalog = Arc::new(PlanCatalog::new(
            config.stripe.price_id_monthly.clone(),
            config.stripe.price_id_annual.clone(),
        ));

        Self {
            reconciler: Arc::new(SubscriptionReconciler::new(
                Arc::clone(&user_repo),
                Arc::clone(&stripe),
            )),
            users: Arc::new(UserUseCase::new(
                Arc::clone(&user_repo),
                config.admin.clone(),
            )),
            billing: Arc::new(BillingUseCase::new(
                Arc::clone(&user_repo),
                Arc::clone(&stripe),
                BillingRedirects::from_frontend_url(&config.backend_server.frontend_url),
            )),
            usage_stats: Arc::new(UsageStatsUseCase::new(
                usage_repo,
                Arc::clone(&user_repo),
                Arc::clone(&catalog),
            )),
            catalog,
            verifier,
        }
    }
}

/// Routes under `/api/v1` with the identity verifier attached; no transport layers.
pub fn api_router<U, S, G>(components: AppComponents<U, S, G>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    S: UsageStatsRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/webhooks",
            routers::webhooks::routes(components.reconciler),
        )
        .nest("/api/v1/user", routers::users::routes(Arc::clone(&components.users)))
        .nest("/api/v1/admin", routers::admin::routes(components.users))
        .nest("/api/v1/billing", routers::billing::routes(components.billing))
        .nest(
            "/api/v1/usage-stats",
            routers::usage_stats::routes(components.usage_stats),
        )
        .nest("/api/v1/plans", routers::plans::routes(components.catalog))
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(Extension(components.verifier))
}

pub async fn start(
    config: Arc<DotEnvyConfig>,
    db_pool: Arc<PgPoolSquad>,
    verifier: SharedIdentityVerifier,
) -> Result<()> {
    let stripe_client = StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
    );

    let components = AppComponents::new(
        &config,
        Arc::new(UserPostgres::new(Arc::clone(&db_pool))),
        Arc::new(UsageStatsPostgres::new(Arc::clone(&db_pool))),
        Arc::new(stripe_client),
        verifier,
    );

    let app = api_router(components)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::PUT,
                    Method::DELETE,
                ])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(
        port = config.backend_server.port,
        stage = %config.stage,
        "Server is running"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
