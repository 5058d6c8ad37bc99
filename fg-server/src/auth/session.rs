use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};

use super::{user_for_token, AuthError, AuthResult};
use crate::database::Database;
use crate::errors::WebError;
use crate::models::User;

/// Pull the key out of `Authorization: Token <key>`. `Bearer` is accepted too.
pub fn token_from_headers(headers: &HeaderMap) -> AuthResult<Option<&str>> {
    let Some(header) = headers.get("Authorization") else {
        return Ok(None);
    };
    let header = header
        .to_str()
        .map_err(|_| AuthError::MalformedHeader("not valid text"))?;
    let token = header
        .strip_prefix("Token ")
        .or_else(|| header.strip_prefix("Bearer "))
        .ok_or(AuthError::MalformedHeader("expected `Token <key>`"))?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MalformedHeader("no credentials provided"));
    }
    Ok(Some(token))
}

/// The authenticated user making the request.
/// Use this as a request guard on endpoints that require a login.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    Database: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)?.ok_or(AuthError::MissingCredentials)?;
        let db = Database::from_ref(state);
        let conn = db.conn()?;
        let user = user_for_token(&conn, token)?.ok_or(AuthError::InvalidToken)?;
        Ok(CurrentUser(user))
    }
}

/// The requesting user when a valid token is present, otherwise anonymous.
///
/// A token that is present but wrong is still rejected, rather than silently
/// treated as anonymous.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    Database: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if token_from_headers(&parts.headers)?.is_none() {
            return Ok(MaybeUser(None));
        }
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        Ok(MaybeUser(Some(user)))
    }
}

/// An authenticated administrator.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Database: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.is_admin {
            Ok(AdminUser(user))
        } else {
            Err(WebError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(header: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = header {
            headers.insert("Authorization", HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn token_header_forms() {
        assert_eq!(token_from_headers(&headers_with(None)).unwrap(), None);
        assert_eq!(
            token_from_headers(&headers_with(Some("Token abc123"))).unwrap(),
            Some("abc123")
        );
        assert_eq!(
            token_from_headers(&headers_with(Some("Bearer abc123"))).unwrap(),
            Some("abc123")
        );
        assert!(token_from_headers(&headers_with(Some("Basic dXNlcg=="))).is_err());
        assert!(token_from_headers(&headers_with(Some("Token "))).is_err());
    }
}
