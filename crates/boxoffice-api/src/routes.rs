use axum::{
    Json, Router, middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use boxoffice_types::api::MessageResponse;

use crate::auth::{self, AppState};
use crate::error::ApiError;
use crate::events;
use crate::middleware::{Capability, Gate, Owner, authorize, require_auth};
use crate::users;

async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::new("Hello, World!"))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route does not exist".into())
}

async fn not_allowed() -> ApiError {
    ApiError::MethodNotAllowed("Method is not valid".into())
}

/// Assemble the full HTTP surface.
///
/// Every route outside `/` and `/auth` needs a valid bearer token; routes with a
/// [`Capability`] additionally pass through [`authorize`] before the handler runs.
pub fn router(state: AppState) -> Router {
    let gate = |capability| {
        middleware::from_fn_with_state(Gate::new(state.clone(), capability), authorize)
    };
    let admin = || gate(Capability::Admin);
    let owner_in_path = || gate(Capability::SelfOrAdmin(Owner::PathId));
    let owner_in_body = || gate(Capability::SelfOrAdmin(Owner::BodyUserId));

    let public_routes = Router::new()
        .route("/", get(root))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/events", get(events::list_events))
        .route("/events", post(events::create_event).route_layer(admin()))
        .route("/events/{id}", get(events::get_event))
        .route(
            "/events/{id}",
            put(events::update_event)
                .delete(events::delete_event)
                .route_layer(admin()),
        )
        .route("/events/category/{category}", get(events::list_events_by_category))
        .route("/events/search/{keyword}", get(events::search_events))
        .route(
            "/events/assign/{id}",
            post(events::assign_event).route_layer(owner_in_body()),
        )
        .route(
            "/users",
            get(users::list_users)
                .put(users::update_user_role)
                .route_layer(admin()),
        )
        .route(
            "/users/{id}",
            get(users::get_user)
                .delete(users::delete_user)
                .route_layer(owner_in_path()),
        )
        .route(
            "/users/events/{id}",
            get(users::list_user_events).route_layer(owner_in_path()),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .method_not_allowed_fallback(not_allowed)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
