use tracing::Level;
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ServiceLabels {
    pub(crate) service: String,
    pub(crate) stage: String,
    pub(crate) component: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct AlertTarget {
    pub(crate) webhook_url: Url,
    pub(crate) threshold: Level,
}

#[derive(Clone, Debug)]
pub(crate) struct ObservabilitySettings {
    pub(crate) labels: ServiceLabels,
    pub(crate) alerts: Option<AlertTarget>,
    /// Reported once the subscriber is installed.
    pub(crate) notes: Vec<String>,
}

impl ObservabilitySettings {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(component: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let component = component.trim().to_string();
        let labels = ServiceLabels {
            service: read("SERVICE_NAME").unwrap_or_else(|| component.clone()),
            stage: read("STAGE").unwrap_or_else(|| "local".to_string()),
            component,
        };

        let mut notes = Vec::new();

        let webhook_url = match read("ALERT_WEBHOOK_URL") {
            None => None,
            Some(raw) => match Url::parse(&raw) {
                Ok(url) => Some(url),
                Err(err) => {
                    notes.push(format!(
                        "ALERT_WEBHOOK_URL could not be parsed ({err}); alerts disabled"
                    ));
                    None
                }
            },
        };

        let alerts = webhook_url.map(|webhook_url| {
            let threshold = match read("ALERT_LEVEL") {
                None => Level::ERROR,
                Some(raw) => parse_level(&raw).unwrap_or_else(|| {
                    notes.push(format!("ALERT_LEVEL `{raw}` is not a level; using error"));
                    Level::ERROR
                }),
            };
            AlertTarget {
                webhook_url,
                threshold,
            }
        });

        Self {
            labels,
            alerts,
            notes,
        }
    }
}

fn parse_level(input: &str) -> Option<Level> {
    match input.to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
