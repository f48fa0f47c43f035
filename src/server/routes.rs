//! HTTP routes for the wallet web app

use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::balance;
use crate::chain::ChainReader;
use crate::node::HttpConfig;
use crate::storage::Ledger;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub reader: Arc<dyn ChainReader>,
    pub app_name: String,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>, reader: Arc<dyn ChainReader>, app_name: impl Into<String>) -> Self {
        Self { ledger, reader, app_name: app_name.into() }
    }
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub native_balance: Decimal,
    pub token_balance: Decimal,
    pub energy: u64,
}

pub fn create_router(state: AppState, http: &HttpConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/wallet-balance/:user_id", get(wallet_balance))
        .route("/api/wallet/:user_id", get(wallet_balance))
        .layer(cors_layer(&http.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Empty origin list allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([Method::GET]).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn health(State(s): State<AppState>) -> impl IntoResponse {
    Json(json!({"status": "ok", "service": s.app_name}))
}

async fn wallet_balance(State(s): State<AppState>, Path(user_id): Path<i64>) -> Response {
    let wallet = match s.ledger.find(user_id).await {
        Ok(Some(wallet)) => wallet,
        Ok(None) => return (StatusCode::NOT_FOUND, Json(json!({"error": "not_found"}))).into_response(),
        Err(e) => {
            error!(user_id, error = %e, "wallet lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "internal"}))).into_response();
        }
    };

    let summary = balance::summarize(s.reader.as_ref(), &wallet.address).await;
    Json(BalanceResponse {
        address: summary.address,
        native_balance: summary.native_balance,
        token_balance: summary.token_balance,
        energy: summary.energy,
    })
    .into_response()
}
