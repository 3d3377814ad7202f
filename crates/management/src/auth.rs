//! Bearer-token session middleware.
//!
//! Protected routes run behind `require_session`, which verifies the JWT
//! and stores the caller's `Principal` in the request extensions. Handlers
//! pick it up with the `Session` extractor.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use timetable_core::TimetableError;
use timetable_platform::auth::bearer_token;
use timetable_platform::Principal;
use tracing::debug;

use crate::error::ApiError;
use crate::handlers::ManagementState;

pub async fn require_session(
    State(state): State<ManagementState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(token) = bearer_token(header_value) else {
        metrics::counter!("auth.session.missing").increment(1);
        return Err(TimetableError::Unauthorized.into());
    };

    let claims = state.sessions.verify(token).map_err(|err| {
        metrics::counter!("auth.session.rejected").increment(1);
        TimetableError::from(err)
    })?;

    debug!(account_id = claims.sub, role = %claims.role, path = %req.uri().path(), "Session verified");
    req.extensions_mut().insert(Principal::from(claims));
    Ok(next.run(req).await)
}

/// The verified caller of a protected route.
pub struct Session(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(Session)
            .ok_or_else(|| TimetableError::Unauthorized.into())
    }
}
