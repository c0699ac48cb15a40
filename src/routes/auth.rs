use axum::routing::{get, post};
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(handlers::sign_up))
        .route("/auth/signin", post(handlers::sign_in))
        .route("/auth/signout", post(handlers::sign_out))
        .route("/auth/google", post(handlers::google_login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/delete", post(handlers::delete_account))
        .route("/auth/me", get(handlers::me))
}
