use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::blocking;
use crate::error::Result;
use crate::files::UPLOADS_PREFIX;
use crate::middleware::require_auth;
use crate::{comments, conversations, messages, users};

/// The full HTTP surface. `max_upload_bytes` caps every request body.
pub fn build(state: AppState, max_upload_bytes: usize) -> Router {
    let public_routes = Router::new()
        .route("/liveness", get(liveness))
        .route("/session", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/users", get(users::search_users))
        .route("/users/{user_id}", get(users::get_user))
        .route("/me/username", put(users::update_username))
        .route("/me/photo", put(users::update_profile_picture))
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route("/conversations/{conversation_id}", get(conversations::get_conversation))
        .route("/conversations/{conversation_id}/members", post(conversations::add_member))
        .route("/conversations/{conversation_id}/members/me", delete(conversations::leave_group))
        .route("/conversations/{conversation_id}/name", put(conversations::update_group_name))
        .route("/conversations/{conversation_id}/photo", put(conversations::update_group_photo))
        .route("/conversations/{conversation_id}/messages", post(messages::send_message))
        .route("/conversations/{conversation_id}/forwards", post(messages::forward_message))
        .route(
            "/messages/{message_id}",
            patch(messages::edit_message).delete(messages::delete_message),
        )
        .route("/messages/{message_id}/comments", post(comments::create_comment))
        .route("/comments/{comment_id}", delete(comments::delete_comment))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let uploads = ServeDir::new(state.files.root());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service(UPLOADS_PREFIX, uploads)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn liveness(State(state): State<AppState>) -> Result<impl IntoResponse> {
    blocking(&state, |s| Ok(s.db().ping()?)).await?;
    Ok(Json(json!({ "status": "ok" })))
}
