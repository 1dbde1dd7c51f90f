use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::config::settings::PaymentSettings;
use crate::error::{ApiError, Result};
use crate::http::{client_with_timeout, error_message};

const SANDBOX_URL: &str = "https://sandbox-api.fedapay.com";
const LIVE_URL: &str = "https://api.fedapay.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: i64,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub id: i64,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentToken {
    pub token: String,
    pub url: String,
}

// FedaPay wraps every body under an entity key ("v1/customer", …)
#[derive(Debug, Deserialize)]
struct CustomerListEnvelope {
    #[serde(rename = "v1/customers", default)]
    customers: Vec<Customer>,
}

#[derive(Debug, Deserialize)]
struct CustomerEnvelope {
    #[serde(rename = "v1/customer")]
    customer: Customer,
}

#[derive(Debug, Deserialize)]
struct TransactionEnvelope {
    #[serde(rename = "v1/transaction")]
    transaction: Transaction,
}

/// Minimal FedaPay REST client covering the payment-initiation flow:
/// customer lookup/creation, transaction creation and payment-token
/// generation.
pub struct FedaPayClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    callback_url: String,
}

impl FedaPayClient {
    pub fn new(settings: &PaymentSettings, timeout: Duration) -> Result<Self> {
        let base_url = settings.base_url.clone().unwrap_or_else(|| {
            match settings.environment.as_str() {
                "live" => LIVE_URL,
                _ => SANDBOX_URL,
            }
            .to_string()
        });
        Ok(Self {
            http: client_with_timeout(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: settings.secret_key.clone(),
            callback_url: settings.callback_url.clone(),
        })
    }

    pub async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let response = self
            .http
            .get(format!("{}/v1/customers", self.base_url))
            .bearer_auth(&self.secret_key)
            .query(&[("email", email)])
            .send()
            .await?;
        let list: CustomerListEnvelope = Self::read(response).await?;
        Ok(list.customers.into_iter().next())
    }

    pub async fn create_customer(
        &self,
        firstname: &str,
        lastname: &str,
        email: &str,
        phone: &str,
    ) -> Result<Customer> {
        let body = serde_json::json!({
            "firstname": firstname,
            "lastname": lastname,
            "email": email,
            "phone_number": { "number": phone, "country": "BJ" },
        });
        let response = self
            .http
            .post(format!("{}/v1/customers", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await?;
        let envelope: CustomerEnvelope = Self::read(response).await?;
        tracing::debug!(customer_id = envelope.customer.id, "fedapay customer created");
        Ok(envelope.customer)
    }

    pub async fn create_transaction(&self, customer: &Customer, amount: i64) -> Result<Transaction> {
        let body = serde_json::json!({
            "description": "Dépôt via MTN",
            "amount": amount,
            "currency": { "iso": "XOF" },
            "callback_url": self.callback_url,
            "mode": "mtn_open",
            "merchant_reference": Uuid::new_v4().to_string(),
            "customer": { "id": customer.id },
        });
        let response = self
            .http
            .post(format!("{}/v1/transactions", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await?;
        let envelope: TransactionEnvelope = Self::read(response).await?;
        Ok(envelope.transaction)
    }

    pub async fn generate_token(&self, transaction_id: i64) -> Result<PaymentToken> {
        let response = self
            .http
            .post(format!(
                "{}/v1/transactions/{transaction_id}/token",
                self.base_url
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
        response.json().await.map_err(ApiError::from)
    }
}
