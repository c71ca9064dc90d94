use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;

use courier_types::api::{LoginRequest, LoginResponse};

use crate::blocking;
use crate::error::{ApiError, Result};
use crate::files::FileStore;
use crate::service::Service;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub service: Service,
    pub files: FileStore,
}

/// POST /session: logs in by username, registering it on first use.
/// 201 for a new user, 200 for a returning one.
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse> {
    let outcome = blocking(&state, move |s| s.login(&req.username)).await?;

    let status = if outcome.is_created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let user = outcome.into_inner();

    Ok((
        status,
        Json(LoginResponse {
            identifier: user.id,
            user,
        }),
    ))
}
