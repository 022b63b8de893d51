//! Shared application state for the Axum API server.

use std::sync::Arc;

use courier_dispatch::Dispatcher;
use sqlx::PgPool;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(pool: PgPool, dispatcher: Arc<Dispatcher>) -> Self {
        Self { pool, dispatcher }
    }
}
