pub mod dto;
pub mod handlers;
pub mod model;
pub mod service;
pub mod store;
pub mod validate;
pub mod verify;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::public_routes())
        .merge(handlers::account_routes())
}
