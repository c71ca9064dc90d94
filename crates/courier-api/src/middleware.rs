use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use uuid::Uuid;

use courier_types::models::User;

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, Result};

/// The caller, resolved from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }
}

/// Resolves `Authorization: Bearer <user id>` to an existing user.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response> {
    let token = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized)?
        .token()
        .to_owned();

    let user = blocking(&state, move |s| s.authenticate(&token)).await?;

    req.extensions_mut().insert(AuthUser(user));
    Ok(next.run(req).await)
}
