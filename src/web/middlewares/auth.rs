use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    auth::{self, TokenKind},
    model::{CrudRepository, ResourceTyped, entity::UserEntity},
    web::{AppState, RequestContext, context::AuthenticatedUser, error::WebError},
};

pub static AUTH_TOKEN: &str = "SID";

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolves the requester from the bearer header, falling back to the `SID` cookie.
///
/// A missing token yields an anonymous context. A token that fails to decode,
/// is not an access token, or belongs to a deleted user yields a rejected
/// context, so protected handlers answer 401 while public ones still work.
pub async fn extract_context_fn(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<Response, WebError> {
    let token = match bearer_token(req.headers()) {
        Some(token) => Some(token.to_string()),
        None => cookies.get(AUTH_TOKEN).map(|c| c.value().to_string()),
    };

    let Some(token) = token else {
        req.extensions_mut().insert(RequestContext::new(None));
        return Ok(next.run(req).await);
    };

    let claims = match auth::process_token(&token, state.config().app().jwt()) {
        Ok(data) if data.claims.typ == TokenKind::Access => data.claims,
        Ok(_) | Err(_) => {
            req.extensions_mut().insert(RequestContext::rejected());
            return Ok(next.run(req).await);
        }
    };

    let Some(id) = claims.user_id() else {
        req.extensions_mut().insert(RequestContext::rejected());
        return Ok(next.run(req).await);
    };

    // the role is read from the database so a role change applies immediately
    let user = UserEntity::find_by_id(state.pool(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    let ctx = match user {
        Some(user) => RequestContext::new(Some(AuthenticatedUser::new(id, user.role()))),
        None => RequestContext::rejected(),
    };
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_bearer_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
