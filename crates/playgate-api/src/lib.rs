pub mod admin;
pub mod auth;
pub mod channels;
pub mod codes;
pub mod error;
pub mod middleware;
pub mod playlists;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};

pub use error::ApiError;
pub use state::{AppState, AppStateInner, ServiceConfig};

/// All routes, mounted under `/api`. Redemption and the auth entry points are
/// public; everything else needs a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/playlist/{code}/m3u8", get(playlists::redeem_m3u8))
        .route("/playlist/{code}/json", get(playlists::redeem_json));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route(
            "/channels",
            get(channels::list_channels).post(channels::create_channel),
        )
        .route("/channels/bulk", post(channels::create_channels_bulk))
        .route("/channels/{channel_id}", delete(channels::delete_channel))
        .route(
            "/playlists",
            get(playlists::list_playlists).post(playlists::create_playlist),
        )
        .route(
            "/access-codes",
            get(codes::list_codes).post(codes::generate_code),
        )
        .route("/access-codes/{code}/revoke", post(codes::revoke_code))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{user_id}/role", put(admin::update_role))
        .route("/admin/users/{user_id}/active", put(admin::set_active))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .with_state(state)
}
