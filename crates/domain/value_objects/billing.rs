use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckoutRequest {
    #[serde(default)]
    pub price_id: String,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerPortalRequest {
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RedirectResponse {
    pub url: String,
}
