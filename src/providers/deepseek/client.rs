use std::time::Duration;

use crate::error::{ApiError, Result};
use crate::http::{client_with_timeout, error_message};

use super::types::{ChatCompletionRequest, ChatCompletionResponse};

pub struct DeepSeekProvider;

impl DeepSeekProvider {
    pub async fn chat_completions(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        let client = client_with_timeout(timeout)?;
        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

        let response = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(ApiError::from)
    }
}
