use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::http::ApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Basic,
    Premium,
    Vip,
}

impl PlanType {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::Basic => "basic",
            PlanType::Premium => "premium",
            PlanType::Vip => "vip",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(PlanType::Basic),
            "premium" => Some(PlanType::Premium),
            "vip" => Some(PlanType::Vip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    // The backend spells this both ways depending on the serializer
    #[serde(alias = "cancelled")]
    Canceled,
    Expired,
}

/// Decimal fields arrive as JSON numbers or as strings ("2000.00"),
/// depending on the serializer; both map to f64 here.
pub(crate) fn decimal_from_wire<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Number(f64),
        Text(String),
    }

    match Wire::deserialize(deserializer)? {
        Wire::Number(n) => Ok(n),
        Wire::Text(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: i64,
    pub name: String,
    pub plan_type: PlanType,
    #[serde(deserialize_with = "decimal_from_wire")]
    pub price: f64,
    #[serde(alias = "duration_in_days")]
    pub duration_days: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: serde_json::Map<String, Value>,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_is_active() -> bool {
    true
}

impl SubscriptionPlan {
    /// Boolean feature flags render as "Oui"/"Non" on the pricing page.
    pub fn feature_label(value: &Value) -> String {
        match value {
            Value::Bool(true) => "Oui".to_string(),
            Value::Bool(false) => "Non".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn feature_labels(&self) -> Vec<(String, String)> {
        self.features
            .iter()
            .map(|(name, value)| (name.clone(), Self::feature_label(value)))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub id: i64,
    #[serde(default)]
    pub user: Option<i64>,
    pub plan: i64,
    #[serde(default)]
    pub plan_details: Option<SubscriptionPlan>,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_renew: bool,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub days_remaining: Option<i64>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// Server-provided figure when present, otherwise derived from
    /// `end_date`. Expiry itself stays server-determined.
    pub fn remaining_days(&self) -> Option<i64> {
        self.days_remaining
            .or_else(|| self.end_date.map(|end| (end - Utc::now()).num_days().max(0)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentInitiation {
    pub payment_url: String,
    pub subscription_id: i64,
}

/// Subscription façade over the shared [`ApiClient`].
pub struct SubscriptionService {
    client: Arc<ApiClient>,
}

impl SubscriptionService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Plan catalogue; the only public read on this surface.
    pub async fn plans(&self) -> Result<Vec<SubscriptionPlan>> {
        self.client.get("/api/subscription-plans/").await
    }

    pub async fn subscriptions(&self) -> Result<Vec<Subscription>> {
        self.client.get("/subscriptions/").await
    }

    pub async fn subscription(&self, id: i64) -> Result<Subscription> {
        self.client.get(&format!("/subscriptions/{id}/")).await
    }

    pub async fn create(&self, plan_id: i64) -> Result<Subscription> {
        self.client
            .post("/subscriptions/", &serde_json::json!({ "plan": plan_id }))
            .await
    }

    pub async fn cancel(&self, id: i64) -> Result<Subscription> {
        self.client
            .post_empty(&format!("/subscriptions/{id}/cancel/"))
            .await
    }

    pub async fn renew(&self, id: i64) -> Result<Subscription> {
        self.client
            .post_empty(&format!("/subscriptions/{id}/renew/"))
            .await
    }

    pub async fn change_plan(&self, id: i64, new_plan: i64) -> Result<Subscription> {
        self.client
            .post(
                &format!("/subscriptions/{id}/change_plan/"),
                &serde_json::json!({ "new_plan": new_plan }),
            )
            .await
    }

    pub async fn check_status(&self, id: i64) -> Result<Subscription> {
        self.client
            .get(&format!("/subscriptions/{id}/check_status/"))
            .await
    }

    /// Asks the backend for a mobile-money payment link covering the
    /// subscription's plan price.
    pub async fn initiate_payment(&self, id: i64) -> Result<PaymentInitiation> {
        self.client
            .post_empty(&format!("/subscriptions/{id}/initiate_payment/"))
            .await
    }

    pub async fn set_auto_renew(&self, id: i64, auto_renew: bool) -> Result<Subscription> {
        self.client
            .patch(
                &format!("/subscriptions/{id}/"),
                &serde_json::json!({ "auto_renew": auto_renew }),
            )
            .await
    }

    pub async fn current_subscription(&self) -> Result<Option<Subscription>> {
        let subscriptions = self.subscriptions().await?;
        Ok(subscriptions.into_iter().find(Subscription::is_active))
    }

    pub async fn has_active_subscription(&self) -> Result<bool> {
        Ok(self.current_subscription().await?.is_some())
    }

    pub async fn remaining_days(&self) -> Result<Option<i64>> {
        Ok(self
            .current_subscription()
            .await?
            .and_then(|subscription| subscription.remaining_days()))
    }
}
