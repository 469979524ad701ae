mod admin;
mod base;
mod sync;
mod users;

use std::borrow::Cow;

use axum::{
    error_handling::HandleErrorLayer, extract::DefaultBodyLimit, http::StatusCode, middleware,
    response::IntoResponse, routing, Router,
};
use tower::{BoxError, ServiceBuilder};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub mod paths;

pub use admin::{RegisterNodeRequest, RegisterNodeResponse};
pub use base::AboutResponse;
pub use users::UserTrafficResponse;

use crate::authority::Authority;
use crate::error::Result;

/// Build the authority's HTTP API
pub async fn api(authority: Authority) -> Result<Router> {
    let request_timeout = authority.settings.request_timeout();
    let max_body_bytes = authority.settings.max_body_bytes;

    // Admin endpoints and the per-user view need the bearer token
    let admin_routes = Router::new()
        .route(paths::users::TRAFFIC, routing::get(users::user_traffic))
        .route(paths::admin::TRAFFIC, routing::post(admin::set_user_traffic))
        .route(
            paths::admin::USERS,
            routing::get(admin::list_users).post(admin::create_user),
        )
        .route(
            paths::admin::NODES,
            routing::get(admin::list_nodes).post(admin::register_node),
        )
        .route(paths::admin::EVENTS, routing::get(admin::list_events))
        .route_layer(middleware::from_fn_with_state(
            authority.clone(),
            admin::require_admin_token,
        ));

    let api = Router::new()
        .route(paths::base::ROOT, routing::get(base::root))
        .route(paths::base::HEALTH, routing::get(base::health))
        .route(paths::base::ABOUT, routing::get(base::about))
        // Node protocol
        .route(paths::SYNC, routing::post(sync::sync))
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                // Handle errors from middleware
                .layer(HandleErrorLayer::new(handle_error))
                .load_shed()
                .timeout(request_timeout),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(authority);

    Ok(api)
}

async fn handle_error(error: BoxError) -> impl IntoResponse {
    if error.is::<tower::timeout::error::Elapsed>() {
        return (StatusCode::REQUEST_TIMEOUT, Cow::from("request timed out"));
    }

    if error.is::<tower::load_shed::error::Overloaded>() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Cow::from("service is overloaded, try again later"),
        );
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Cow::from(format!("Unhandled internal error: {}", error)),
    )
}
