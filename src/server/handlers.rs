use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, Result};
use crate::server::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pay", post(initiate_payment))
        .route("/healthz", get(healthz))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct PayRequest {
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub amount: Value,
}

impl PayRequest {
    /// Every field is required; the amount must be a positive integer
    /// number of XOF.
    fn validate(&self) -> Result<i64> {
        let amount = amount_as_int(&self.amount);
        if self.firstname.trim().is_empty()
            || self.lastname.trim().is_empty()
            || self.email.trim().is_empty()
            || self.phone.trim().is_empty()
            || amount.is_none()
        {
            return Err(ApiError::Validation("Tous les champs sont requis".to_string()));
        }
        Ok(amount.unwrap_or_default())
    }
}

/// The amount arrives as a JSON number or a numeric string; both become an
/// integer XOF amount, fractions truncated.
fn amount_as_int(value: &Value) -> Option<i64> {
    let amount = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    };
    amount.filter(|v| *v > 0)
}

pub async fn initiate_payment(
    State(app): State<Arc<AppState>>,
    Json(payload): Json<PayRequest>,
) -> Result<Json<Value>> {
    let amount = payload.validate()?;

    match process_payment(&app, &payload, amount).await {
        Ok(url) => Ok(Json(json!({ "payment_url": url }))),
        // Gateway failures all surface as a plain 500 to the caller
        Err(err) => {
            tracing::error!(%err, "payment initiation failed");
            Err(ApiError::Api {
                status: 500,
                message: err.to_string(),
            })
        }
    }
}

async fn process_payment(app: &AppState, payload: &PayRequest, amount: i64) -> Result<String> {
    let customer = match app.fedapay.find_customer_by_email(&payload.email).await? {
        Some(customer) => customer,
        None => {
            app.fedapay
                .create_customer(
                    &payload.firstname,
                    &payload.lastname,
                    &payload.email,
                    &payload.phone,
                )
                .await?
        }
    };

    let transaction = app.fedapay.create_transaction(&customer, amount).await?;
    let token = app.fedapay.generate_token(transaction.id).await?;

    tracing::info!(
        customer_id = customer.id,
        transaction_id = transaction.id,
        amount,
        "payment link issued"
    );
    Ok(token.url)
}
