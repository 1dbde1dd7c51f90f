use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input, rejected before any network call.
    #[error("{0}")]
    Validation(String),

    /// The refresh flow failed; the session has been cleared.
    #[error("Votre session a expiré. Veuillez vous reconnecter.")]
    SessionExpired,

    /// Non-401 HTTP error passed through with the server's message.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The sports-data provider signalled an error inside a 200 body.
    #[error("{0}")]
    Upstream(String),

    #[error("Erreur de connexion au serveur. Veuillez vérifier votre connexion internet.")]
    Network(String),

    #[error("Le serveur a mis trop de temps à répondre.")]
    Timeout,

    #[error("Réponse illisible: {0}")]
    Parse(String),

    #[error("{0}")]
    NotFound(String),

    /// Client-side login cooldown. A UX nicety, never a security control.
    #[error("Trop de tentatives de connexion. Réessayez dans {retry_after_secs} secondes.")]
    Throttled { retry_after_secs: u64 },

    #[error("Opération annulée")]
    Cancelled,

    #[error("Completion request error: {0}")]
    Completion(#[from] async_openai::error::OpenAIError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::SessionExpired => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Api { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Parse(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
