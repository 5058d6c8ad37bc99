use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use fg::basic_models::Credentials;
use serde::Serialize;

use super::session::{token_from_headers, CurrentUser};
use crate::database::Database;
use crate::errors::WebResult;

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub auth_token: String,
}

pub async fn login(
    State(db): State<Database>,
    Json(credentials): Json<Credentials>,
) -> WebResult<Json<TokenResponse>> {
    let conn = db.conn()?;
    let auth_token = super::login(&conn, &credentials)?;
    Ok(Json(TokenResponse { auth_token }))
}

/// Revoke the token the request was made with.
pub async fn logout(
    State(db): State<Database>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
) -> WebResult<StatusCode> {
    if let Some(token) = token_from_headers(&headers)? {
        super::revoke_token(&*db.conn()?, token)?;
    }
    tracing::info!(user_id = user.id, "Logged out");
    Ok(StatusCode::NO_CONTENT)
}
