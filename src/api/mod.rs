/// HTTP API route modules

pub mod account;
pub mod channel;
pub mod middleware;

use crate::context::AppContext;
use axum::Router;

/// Build all API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .nest("/api/v1/users", account::routes())
        .nest("/api/v1/channels", channel::routes())
}
