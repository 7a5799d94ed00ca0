pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod mpesa;
pub mod phone;
pub mod services;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::mpesa::DarajaClient;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub daraja_client: DarajaClient,
    pub config: Config,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route(
            "/payments/initiate",
            post(handlers::payments::initiate_premium_payment),
        )
        .route(
            "/payments/callback/:secret",
            post(handlers::payments::mpesa_callback),
        )
        .route(
            "/payments/status",
            post(handlers::payments::check_payment_status),
        )
        .route(
            "/premium/activate",
            post(handlers::payments::activate_premium),
        )
        .route("/wallet/withdraw", post(handlers::wallet::withdraw))
        .route(
            "/wallet/:account_id/transactions",
            get(handlers::wallet::list_transactions),
        )
        .route("/dashboard/:account_id", get(handlers::wallet::dashboard))
        .route("/surveys", get(handlers::surveys::list_available))
        .route("/surveys/:id/start", post(handlers::surveys::start_survey))
        .route(
            "/surveys/:id/complete",
            post(handlers::surveys::complete_survey),
        )
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
