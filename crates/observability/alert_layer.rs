use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

use super::dispatcher::{Alert, AlertDispatcher};
use super::settings::ServiceLabels;

const REDACTED: &str = "[redacted]";
const SENSITIVE_MARKERS: [&str; 6] = [
    "secret",
    "token",
    "signature",
    "authorization",
    "webhook",
    "password",
];

/// Forwards events at or above `threshold` to the alert dispatcher.
pub(crate) struct AlertLayer {
    dispatcher: AlertDispatcher,
    labels: ServiceLabels,
    threshold: Level,
    dropped: AtomicU64,
}

impl AlertLayer {
    pub(crate) fn new(dispatcher: AlertDispatcher, labels: ServiceLabels, threshold: Level) -> Self {
        Self {
            dispatcher,
            labels,
            threshold,
            dropped: AtomicU64::new(0),
        }
    }
}

impl<S> Layer<S> for AlertLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // Level ordering is inverted: ERROR is the "smallest".
        if *metadata.level() > self.threshold {
            return;
        }

        let mut fields = RedactingVisitor::default();
        event.record(&mut fields);
        let message = fields.values.remove("message").unwrap_or_default();

        let span_path = ctx
            .event_scope(event)
            .map(|scope| {
                scope
                    .from_root()
                    .map(|span| span.name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let alert = Alert {
            level: *metadata.level(),
            at: Utc::now(),
            labels: self.labels.clone(),
            target: metadata.target().to_string(),
            message,
            fields: fields.values,
            span_path,
        };

        if !self.dispatcher.submit(alert) {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            eprintln!("alert queue unavailable; {total} alert(s) dropped");
        }
    }
}

#[derive(Default)]
struct RedactingVisitor {
    values: BTreeMap<String, String>,
}

impl RedactingVisitor {
    fn put(&mut self, field: &Field, value: String) {
        let value = if is_sensitive(field.name()) {
            REDACTED.to_string()
        } else {
            value
        };
        self.values.insert(field.name().to_string(), value);
    }
}

impl Visit for RedactingVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        self.put(field, format!("{value:?}"));
    }
}

pub(crate) fn is_sensitive(field_name: &str) -> bool {
    let name = field_name.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| name.contains(marker))
}
