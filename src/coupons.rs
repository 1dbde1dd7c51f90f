use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::http::ApiClient;
use crate::subscriptions::{PlanType, decimal_from_wire};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionResult {
    Win,
    Loss,
    Pending,
}

/// The wire carries `is_accessible` as the strings "true"/"false" rather
/// than a JSON boolean. Normalized to a real bool here; the rest of the
/// crate never sees the string form.
fn bool_from_wire<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Flag(bool),
        Text(String),
    }

    match Wire::deserialize(deserializer)? {
        Wire::Flag(flag) => Ok(flag),
        Wire::Text(text) => match text.as_str() {
            "true" | "True" | "1" => Ok(true),
            "false" | "False" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid boolean string: {other:?}"
            ))),
        },
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CouponSelection {
    pub id: i64,
    #[serde(rename = "match")]
    pub match_label: String,
    pub pick: String,
    #[serde(deserialize_with = "decimal_from_wire")]
    pub odds: f64,
    #[serde(default)]
    pub result: Option<SelectionResult>,
}

/// A bundle of betting selections sold behind a subscription tier.
#[derive(Debug, Clone, Deserialize)]
pub struct DailyCoupon {
    pub id: i64,
    pub date: NaiveDate,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub risk_level: RiskLevel,
    pub required_plan: PlanType,
    #[serde(deserialize_with = "decimal_from_wire")]
    pub odds_value: f64,
    #[serde(default)]
    pub selections: Vec<CouponSelection>,
    #[serde(default, deserialize_with = "bool_from_wire")]
    pub is_accessible: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSelection {
    #[serde(rename = "match")]
    pub match_label: String,
    pub pick: String,
    pub odds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCoupon {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub odds_value: f64,
    pub risk_level: RiskLevel,
    pub required_plan: PlanType,
    pub selections: Vec<NewSelection>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CouponUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odds_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_plan: Option<PlanType>,
}

/// Coupon façade over the shared [`ApiClient`].
pub struct CouponService {
    client: Arc<ApiClient>,
}

impl CouponService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn coupons(&self) -> Result<Vec<DailyCoupon>> {
        self.client.get("/coupons/").await
    }

    pub async fn coupon(&self, id: i64) -> Result<DailyCoupon> {
        self.client.get(&format!("/coupons/{id}/")).await
    }

    pub async fn create(&self, coupon: &NewCoupon) -> Result<DailyCoupon> {
        self.client.post("/coupons/create/", coupon).await
    }

    pub async fn update(&self, id: i64, update: &CouponUpdate) -> Result<DailyCoupon> {
        self.client
            .put(&format!("/coupons/{id}/update/"), update)
            .await
    }

    pub async fn follow(&self, id: i64) -> Result<Value> {
        self.client
            .post_empty(&format!("/coupons/{id}/follow/"))
            .await
    }

    pub async fn today_coupons(&self) -> Result<Vec<DailyCoupon>> {
        let today = Utc::now().date_naive();
        let coupons = self.coupons().await?;
        Ok(coupons
            .into_iter()
            .filter(|coupon| coupon.date == today)
            .collect())
    }

    pub async fn coupons_for_plan(&self, plan: PlanType) -> Result<Vec<DailyCoupon>> {
        let coupons = self.coupons().await?;
        Ok(coupons
            .into_iter()
            .filter(|coupon| coupon.required_plan == plan)
            .collect())
    }

    pub async fn coupons_for_risk(&self, risk: RiskLevel) -> Result<Vec<DailyCoupon>> {
        let coupons = self.coupons().await?;
        Ok(coupons
            .into_iter()
            .filter(|coupon| coupon.risk_level == risk)
            .collect())
    }
}
