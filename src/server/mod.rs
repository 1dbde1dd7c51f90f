pub mod fedapay;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::http::{Method, header};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::error::Result;

use fedapay::FedaPayClient;

pub struct AppState {
    pub config: Settings,
    pub fedapay: FedaPayClient,
}

pub fn create_app(config: Settings) -> Result<Router> {
    let fedapay = FedaPayClient::new(&config.payment, config.http.timeout())?;
    let app_state = AppState { config, fedapay };

    // The payment form is served from another origin
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_origin(Any);

    Ok(handlers::routes()
        .with_state(Arc::new(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}
