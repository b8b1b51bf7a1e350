use anyhow::{Result, anyhow, bail};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use tracing::error;

use crate::payments::stripe_objects::StripeSubscription;

type HmacSha256 = Hmac<Sha256>;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum age, in seconds, of a signed webhook delivery.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

#[derive(Deserialize)]
struct IdResp {
    id: String,
}

#[derive(Deserialize)]
struct UrlResp {
    url: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self::with_api_base(secret_key, webhook_secret, STRIPE_API_BASE.to_string())
    }

    pub fn with_api_base(secret_key: String, webhook_secret: String, api_base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
            webhook_secret,
        }
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .map(|envelope| envelope.error)
            .ok();

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            context = %context,
            "stripe api request failed"
        );

        bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    async fn post_form(&self, path: &str, body: &[(String, String)], context: &str) -> Result<reqwest::Response> {
        let resp = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body)
            .send()
            .await?;
        Self::ensure_success(resp, context).await
    }

    /// Creates a Stripe customer. https://stripe.com/docs/api/customers/create
    pub async fn create_customer(&self, email: &str, name: Option<&str>) -> Result<String> {
        let mut body = vec![("email".to_string(), email.to_string())];
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            body.push(("name".to_string(), name.to_string()));
        }

        let resp = self.post_form("/customers", &body, "create customer").await?;
        let parsed: IdResp = resp.json().await?;
        Ok(parsed.id)
    }

    /// Creates a subscription-mode Checkout Session and returns its URL.
    /// https://stripe.com/docs/api/checkout/sessions/create
    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String> {
        let body = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("customer".to_string(), customer_id.to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("line_items[0][price]".to_string(), price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), success_url.to_string()),
            ("cancel_url".to_string(), cancel_url.to_string()),
        ];

        let resp = self
            .post_form("/checkout/sessions", &body, "create checkout session")
            .await?;
        let parsed: UrlResp = resp.json().await?;
        parsed
            .url
            .ok_or_else(|| anyhow!("Stripe Checkout session URL is missing"))
    }

    /// Creates a billing portal session. https://stripe.com/docs/api/customer_portal/sessions/create
    pub async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String> {
        let body = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];

        let resp = self
            .post_form("/billing_portal/sessions", &body, "create billing portal session")
            .await?;
        let parsed: UrlResp = resp.json().await?;
        parsed
            .url
            .ok_or_else(|| anyhow!("Stripe billing portal session URL is missing"))
    }

    /// https://stripe.com/docs/api/subscriptions/retrieve
    pub async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        let resp = self
            .http
            .get(format!("{}/subscriptions/{}", self.api_base, subscription_id))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve subscription").await?;

        let subscription: StripeSubscription = resp.json().await?;
        Ok(subscription)
    }

    /// Verifies the `stripe-signature` header against the raw body.
    /// https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(&self, payload: &[u8], signature_header: &str) -> Result<()> {
        verify_signature_at(
            &self.webhook_secret,
            payload,
            signature_header,
            Utc::now().timestamp(),
        )
    }
}

pub fn verify_signature_at(
    webhook_secret: &str,
    payload: &[u8],
    signature_header: &str,
    now: i64,
) -> Result<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| anyhow!("missing timestamp in stripe-signature"))?;
    if signatures.is_empty() {
        bail!("missing v1 in stripe-signature");
    }

    let sent_at: i64 = timestamp
        .parse()
        .map_err(|_| anyhow!("invalid timestamp in stripe-signature"))?;
    if (now - sent_at).abs() > WEBHOOK_TOLERANCE_SECS {
        bail!("stripe-signature timestamp outside tolerance");
    }

    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
        .map_err(|err| anyhow!("invalid webhook secret: {err}"))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Several v1 entries are sent while a secret is being rolled.
    let matched = signatures.iter().any(|signature| {
        hex::decode(signature)
            .map(|provided| mac.clone().verify_slice(&provided).is_ok())
            .unwrap_or(false)
    });

    if !matched {
        bail!("invalid webhook signature");
    }

    Ok(())
}

/// Builds a `stripe-signature` header value for the given body.
pub fn sign_payload(webhook_secret: &str, payload: &[u8], timestamp: i64) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
        .map_err(|err| anyhow!("invalid webhook secret: {err}"))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={timestamp},v1={signature}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"customer.created","data":{"object":{}}}"#;
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn matching_signature_is_accepted() {
        let header = sign_payload(SECRET, BODY, NOW).unwrap();
        verify_signature_at(SECRET, BODY, &header, NOW + 10).unwrap();
    }

    #[test]
    fn signature_from_other_secret_is_rejected() {
        let header = sign_payload("whsec_other", BODY, NOW).unwrap();
        let err = verify_signature_at(SECRET, BODY, &header, NOW).unwrap_err();
        assert!(err.to_string().contains("invalid webhook signature"));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let header = sign_payload(SECRET, BODY, NOW).unwrap();
        assert!(verify_signature_at(SECRET, b"{\"id\":\"evt_2\"}", &header, NOW).is_err());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let header = sign_payload(SECRET, BODY, NOW).unwrap();
        let err = verify_signature_at(SECRET, BODY, &header, NOW + WEBHOOK_TOLERANCE_SECS + 1)
            .unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn any_of_several_v1_entries_may_match() {
        let valid = sign_payload(SECRET, BODY, NOW).unwrap();
        let signature = valid.split("v1=").nth(1).unwrap();
        let header = format!("t={NOW},v1={},v1={signature},v0=ignored", "00".repeat(32));
        verify_signature_at(SECRET, BODY, &header, NOW).unwrap();
    }

    #[test]
    fn header_without_parts_is_rejected() {
        assert!(verify_signature_at(SECRET, BODY, "garbage", NOW).is_err());
        assert!(verify_signature_at(SECRET, BODY, &format!("t={NOW}"), NOW).is_err());
        assert!(verify_signature_at(SECRET, BODY, "v1=abcd", NOW).is_err());
    }

    #[test]
    fn client_verification_uses_configured_secret() {
        let client = StripeClient::new("sk_test".to_string(), SECRET.to_string());
        let header = sign_payload(SECRET, BODY, Utc::now().timestamp()).unwrap();
        client.verify_webhook_signature(BODY, &header).unwrap();
    }

    #[test]
    fn event_envelope_keeps_delivery_metadata() {
        let event: StripeEvent = serde_json::from_slice(
            br#"{"id":"evt_1","type":"invoice.payment_failed","created":1700000000,"livemode":false,"data":{"object":{}}}"#,
        )
        .unwrap();

        assert_eq!(event.created, Some(1_700_000_000));
        assert_eq!(event.livemode, Some(false));

        let bare: StripeEvent = serde_json::from_slice(BODY).unwrap();
        assert_eq!(bare.created, None);
        assert_eq!(bare.livemode, None);
    }
}
