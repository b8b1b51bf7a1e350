use serde::Serialize;

use crate::domain::value_objects::subscriptions::SubscriptionSnapshot;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Month,
    Year,
}

/// Monthly quotas. `None` means unlimited.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PlanLimits {
    pub api_calls: Option<i64>,
    /// Megabytes.
    pub storage: Option<i64>,
    /// Megabytes.
    pub bandwidth: Option<i64>,
}

impl PlanLimits {
    pub const FREE: PlanLimits = PlanLimits {
        api_calls: Some(1_000),
        storage: Some(100),
        bandwidth: Some(1_000),
    };

    pub const PRO: PlanLimits = PlanLimits {
        api_calls: Some(50_000),
        storage: Some(10_000),
        bandwidth: Some(50_000),
    };

    pub const UNLIMITED: PlanLimits = PlanLimits {
        api_calls: None,
        storage: None,
        bandwidth: None,
    };
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PricingPlan {
    pub id: &'static str,
    pub name: &'static str,
    /// Whole US dollars per interval.
    pub price: u32,
    pub interval: BillingInterval,
    pub stripe_price_id: Option<String>,
    pub features: Vec<&'static str>,
    pub limits: PlanLimits,
    pub popular: bool,
}

/// The public pricing table, with Stripe price ids filled in from configuration.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: Vec<PricingPlan>,
}

impl PlanCatalog {
    pub fn new(monthly_price_id: Option<String>, annual_price_id: Option<String>) -> Self {
        let plans = vec![
            PricingPlan {
                id: "free",
                name: "Free",
                price: 0,
                interval: BillingInterval::Month,
                stripe_price_id: None,
                features: vec![
                    "1,000 API calls/month",
                    "100MB storage",
                    "Email support",
                    "Basic dashboard",
                ],
                limits: PlanLimits::FREE,
                popular: false,
            },
            PricingPlan {
                id: "pro_monthly",
                name: "Pro (Monthly)",
                price: 29,
                interval: BillingInterval::Month,
                stripe_price_id: monthly_price_id,
                features: vec![
                    "50,000 API calls/month",
                    "10GB storage",
                    "Priority support",
                    "Advanced dashboard",
                    "Custom integrations",
                    "Analytics & reporting",
                ],
                limits: PlanLimits::PRO,
                popular: true,
            },
            PricingPlan {
                id: "pro_annual",
                name: "Pro (Annual)",
                price: 290,
                interval: BillingInterval::Year,
                stripe_price_id: annual_price_id,
                features: vec![
                    "50,000 API calls/month",
                    "10GB storage",
                    "Priority support",
                    "Advanced dashboard",
                    "Custom integrations",
                    "Analytics & reporting",
                    "2 months free",
                ],
                limits: PlanLimits::PRO,
                popular: false,
            },
            PricingPlan {
                id: "enterprise",
                name: "Enterprise",
                price: 99,
                interval: BillingInterval::Month,
                stripe_price_id: None,
                features: vec![
                    "Unlimited API calls",
                    "Unlimited storage",
                    "24/7 phone support",
                    "Custom dashboard",
                    "Dedicated account manager",
                    "SLA guarantee",
                    "Custom contracts",
                ],
                limits: PlanLimits::UNLIMITED,
                popular: false,
            },
        ];

        Self { plans }
    }

    pub fn plans(&self) -> &[PricingPlan] {
        &self.plans
    }

    pub fn find_by_price_id(&self, price_id: &str) -> Option<&PricingPlan> {
        if price_id.is_empty() {
            return None;
        }
        self.plans
            .iter()
            .find(|plan| plan.stripe_price_id.as_deref() == Some(price_id))
    }

    /// Quotas for a user: the purchased plan while the subscription grants access, Free otherwise.
    pub fn limits_for(&self, subscription: Option<&SubscriptionSnapshot>) -> PlanLimits {
        subscription
            .filter(|snapshot| snapshot.status.grants_access())
            .and_then(|snapshot| self.find_by_price_id(&snapshot.price_id))
            .map(|plan| plan.limits)
            .unwrap_or(PlanLimits::FREE)
    }
}
