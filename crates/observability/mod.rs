mod alert_layer;
mod dispatcher;
mod ops_webhook;
mod settings;

use alert_layer::AlertLayer;
use anyhow::Result;
use dispatcher::AlertDispatcher;
use ops_webhook::OpsWebhookSink;
use settings::ObservabilitySettings;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Installs the global subscriber: local-time fmt output filtered by `RUST_LOG`
/// (default `info`), plus an ops-webhook alert layer when `ALERT_WEBHOOK_URL` is set.
///
/// Must be called from inside a tokio runtime when alerts are enabled.
pub fn init_observability(component: &str) -> Result<()> {
    let settings = ObservabilitySettings::from_env(component);

    let alert_layer = match settings.alerts.as_ref() {
        Some(target) => {
            let sink = OpsWebhookSink::new(target.webhook_url.clone())?;
            let dispatcher = AlertDispatcher::spawn(Arc::new(sink));
            Some(
                AlertLayer::new(dispatcher, settings.labels.clone(), target.threshold)
                    .with_filter(LevelFilter::from_level(target.threshold)),
            )
        }
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for note in &settings.notes {
        warn!(component = %settings.labels.component, "observability: {note}");
    }

    info!(
        service = %settings.labels.service,
        stage = %settings.labels.stage,
        component = %settings.labels.component,
        alerts = settings.alerts.is_some(),
        "observability: tracing initialised"
    );

    Ok(())
}
