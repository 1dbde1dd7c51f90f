use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};
use crate::http::ApiClient;
use crate::session::UserSnapshot;

const MAX_LOGIN_FAILURES: u32 = 5;
const LOGIN_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// Registration payload. `password_confirm` is forwarded as-is: checking it
/// against `password` belongs to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterData {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserSnapshot,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Default)]
struct LoginThrottle {
    failures: u32,
    locked_until: Option<Instant>,
}

/// Authentication façade over the shared [`ApiClient`].
///
/// Carries the client-side login cooldown: five consecutive rejected logins
/// lock the form for thirty seconds. Purely cosmetic, trivially bypassed,
/// never a security control.
pub struct AuthService {
    client: Arc<ApiClient>,
    throttle: Mutex<LoginThrottle>,
}

impl AuthService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            throttle: Mutex::new(LoginThrottle::default()),
        }
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse> {
        self.check_throttle()?;

        match self.client.post::<_, AuthResponse>("/login/", credentials).await {
            Ok(auth) => {
                self.reset_throttle();
                self.client.session().install(
                    auth.access.clone(),
                    auth.refresh.clone(),
                    Some(auth.user.clone()),
                );
                tracing::info!(user = %auth.user.username, "login succeeded");
                Ok(auth)
            }
            Err(err) => {
                // Only a server rejection counts toward the cooldown
                if matches!(err, ApiError::Api { .. }) {
                    self.record_failure();
                }
                Err(err)
            }
        }
    }

    pub async fn register(&self, data: &RegisterData) -> Result<AuthResponse> {
        let auth: AuthResponse = self.client.post("/register/", data).await?;
        self.client.session().install(
            auth.access.clone(),
            auth.refresh.clone(),
            Some(auth.user.clone()),
        );
        tracing::info!(user = %auth.user.username, "registration succeeded");
        Ok(auth)
    }

    /// Client-side only; the backend keeps no session to terminate.
    pub fn logout(&self) {
        self.client.session().clear();
    }

    pub async fn profile(&self) -> Result<UserSnapshot> {
        self.client.get("/api/users/profile/").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserSnapshot> {
        let user: UserSnapshot = self.client.put("/api/users/profile/", update).await?;
        self.client.session().set_user(user.clone());
        Ok(user)
    }

    pub async fn verify_email(&self, token: &str) -> Result<()> {
        self.client
            .get_unit(&format!("/api/users/verify-email/?token={token}"))
            .await
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        self.client
            .post_unit(
                "/api/users/reset-password/",
                &serde_json::json!({ "email": email }),
            )
            .await
    }

    pub async fn confirm_password_reset(
        &self,
        token: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<()> {
        self.client
            .post_unit(
                "/api/users/reset-password/confirm/",
                &serde_json::json!({
                    "token": token,
                    "password": password,
                    "password_confirm": password_confirm,
                }),
            )
            .await
    }

    fn check_throttle(&self) -> Result<()> {
        let mut throttle = self.throttle.lock().unwrap();
        if let Some(until) = throttle.locked_until {
            let now = Instant::now();
            if now < until {
                return Err(ApiError::Throttled {
                    retry_after_secs: (until - now).as_secs().max(1),
                });
            }
            throttle.locked_until = None;
            throttle.failures = 0;
        }
        Ok(())
    }

    fn record_failure(&self) {
        let mut throttle = self.throttle.lock().unwrap();
        throttle.failures += 1;
        if throttle.failures >= MAX_LOGIN_FAILURES {
            throttle.locked_until = Some(Instant::now() + LOGIN_COOLDOWN);
            tracing::warn!(failures = throttle.failures, "login temporarily throttled");
        }
    }

    fn reset_throttle(&self) {
        *self.throttle.lock().unwrap() = LoginThrottle::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStore;
    use crate::test_support::spawn_backend;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Json;
    use axum::Router;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use serde_json::{Value, json};

    async fn service_against(app: Router) -> (AuthService, Arc<SessionStore>) {
        let base = spawn_backend(app).await;
        let session = Arc::new(SessionStore::new());
        let client =
            ApiClient::new(&base, Duration::from_secs(5), session.clone()).unwrap();
        (AuthService::new(Arc::new(client)), session)
    }

    #[tokio::test]
    async fn login_installs_the_session() {
        async fn login(Json(body): Json<Value>) -> Response {
            assert_eq!(body["email"], "a@b.com");
            assert_eq!(body["password"], "x");
            Json(json!({
                "access": "T1",
                "refresh": "R1",
                "user": { "id": 7, "username": "kofi", "email": "a@b.com" },
            }))
            .into_response()
        }

        let app = Router::new().route("/login/", post(login));
        let (service, session) = service_against(app).await;

        let auth = service
            .login(&LoginCredentials {
                email: "a@b.com".into(),
                password: "x".into(),
            })
            .await
            .unwrap();

        assert_eq!(auth.access, "T1");
        assert_eq!(session.access_token().as_deref(), Some("T1"));
        assert_eq!(session.refresh_token().as_deref(), Some("R1"));
        assert!(session.is_authenticated());
        assert_eq!(session.user().unwrap().username, "kofi");
    }

    #[tokio::test]
    async fn five_rejected_logins_trigger_the_cooldown() {
        async fn login(State(calls): State<Arc<AtomicUsize>>) -> Response {
            calls.fetch_add(1, Ordering::SeqCst);
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": "Identifiants invalides" })),
            )
                .into_response()
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/login/", post(login))
            .with_state(calls.clone());
        let (service, _session) = service_against(app).await;

        let credentials = LoginCredentials {
            email: "a@b.com".into(),
            password: "wrong".into(),
        };
        for _ in 0..5 {
            let err = service.login(&credentials).await.unwrap_err();
            assert!(matches!(err, ApiError::Api { status: 401, .. }));
        }

        // Sixth attempt is rejected locally, without a network call
        let err = service.login(&credentials).await.unwrap_err();
        assert!(matches!(err, ApiError::Throttled { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn register_installs_the_session() {
        async fn register(Json(body): Json<Value>) -> Response {
            assert_eq!(body["username"], "kofi");
            assert_eq!(body["password_confirm"], "x");
            Json(json!({
                "access": "T1",
                "refresh": "R1",
                "user": { "id": 7, "username": "kofi", "email": "a@b.com" },
            }))
            .into_response()
        }

        let app = Router::new().route("/register/", post(register));
        let (service, session) = service_against(app).await;

        service
            .register(&RegisterData {
                username: "kofi".into(),
                email: "a@b.com".into(),
                password: "x".into(),
                password_confirm: "x".into(),
                first_name: None,
                last_name: None,
            })
            .await
            .unwrap();

        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_the_session() {
        let app = Router::new();
        let (service, session) = service_against(app).await;
        session.install("T1", "R1", None);

        service.logout();
        assert!(!session.is_authenticated());
    }
}
