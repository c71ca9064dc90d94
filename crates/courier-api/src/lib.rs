pub mod auth;
pub mod clock;
pub mod comments;
pub mod conversations;
pub mod error;
pub mod files;
pub mod messages;
pub mod middleware;
pub mod router;
pub mod service;
pub mod users;

use tracing::error;

use crate::auth::AppState;
use crate::error::{ApiError, Result};
use crate::service::Service;

/// Runs a rule-layer call off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T>
where
    F: FnOnce(&Service) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.service))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
}
