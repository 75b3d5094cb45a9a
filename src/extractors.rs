use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// The authenticated actor. Carries only the id: the authorization check
/// reads the actor's role fresh from the store, never from the token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
}

/// Extractor that requires a valid bearer token.
/// Returns 401 if the Authorization header is missing, malformed or expired.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts).ok_or(AppError::Unauthorized)?;

        let tokens = state.tokens.lock().await;
        let user_id = tokens.resolve(token).ok_or(AppError::Unauthorized)?;

        Ok(CurrentUser {
            id: user_id.to_string(),
        })
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
