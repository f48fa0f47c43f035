//! Server - read-only balance API for the web app

pub mod routes;

pub use routes::{create_router, AppState, BalanceResponse};
