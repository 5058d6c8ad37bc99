use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    Json,
};
use fg::basic_models::{PasswordChange, UserRegistration};
use serde::Deserialize;

use super::AppState;
use crate::auth::{
    self,
    session::{CurrentUser, MaybeUser},
};
use crate::errors::{WebError, WebResult};
use crate::models::User;
use crate::pagination::{Page, PageQuery};
use crate::relations::Relation;
use crate::views::{SubscriptionView, UserView};

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// How many recipes to preview per author.
    pub recipes_limit: Option<usize>,
}

impl SubscriptionQuery {
    fn page(&self) -> PageQuery {
        PageQuery {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(registration): Json<UserRegistration>,
) -> WebResult<(StatusCode, Json<User>)> {
    let user = auth::register(&*state.db.conn()?, &registration, false)?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list(
    State(state): State<AppState>,
    viewer: MaybeUser,
    uri: Uri,
    Query(page): Query<PageQuery>,
) -> WebResult<Json<Page<UserView>>> {
    let (limit, offset) = page.resolve(&state.api);
    let conn = state.db.conn()?;
    let results = User::list(&conn, limit, offset)?
        .iter()
        .map(|user| UserView::render(&conn, user, viewer.id()))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Json(Page::new(results, User::count(&conn)?, limit, offset, &uri)))
}

pub async fn detail(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(user_id): Path<i64>,
) -> WebResult<Json<UserView>> {
    let conn = state.db.conn()?;
    let user = User::get_by_id(&conn, user_id)?.ok_or(WebError::NotFound)?;
    Ok(Json(UserView::render(&conn, &user, viewer.id())?))
}

pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> WebResult<Json<UserView>> {
    Ok(Json(UserView::render(&*state.db.conn()?, &user, Some(user.id))?))
}

pub async fn set_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(change): Json<PasswordChange>,
) -> WebResult<StatusCode> {
    auth::change_password(&*state.db.conn()?, &user, &change)?;
    tracing::info!(user_id = user.id, "Changed password");
    Ok(StatusCode::NO_CONTENT)
}

/// The authors the user follows, each with a preview of their recipes.
pub async fn subscriptions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    uri: Uri,
    Query(query): Query<SubscriptionQuery>,
) -> WebResult<Json<Page<SubscriptionView>>> {
    let (limit, offset) = query.page().resolve(&state.api);
    let recipes_limit = query.recipes_limit.unwrap_or(state.api.recipes_preview);
    let conn = state.db.conn()?;
    let results = User::list_subscriptions(&conn, user.id, limit, offset)?
        .iter()
        .map(|author| {
            SubscriptionView::render(
                &conn,
                author,
                Some(user.id),
                Some(recipes_limit),
                &state.api.media_base_url,
            )
        })
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let count = User::count_subscriptions(&conn, user.id)?;
    Ok(Json(Page::new(results, count, limit, offset, &uri)))
}

pub async fn subscribe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(author_id): Path<i64>,
    Query(query): Query<SubscriptionQuery>,
) -> WebResult<(StatusCode, Json<SubscriptionView>)> {
    let conn = state.db.conn()?;
    let author = User::get_by_id(&conn, author_id)?.ok_or(WebError::NotFound)?;
    Relation::Subscription.add(&conn, user.id, author.id)?;
    let view = SubscriptionView::render(
        &conn,
        &author,
        Some(user.id),
        Some(query.recipes_limit.unwrap_or(state.api.recipes_preview)),
        &state.api.media_base_url,
    )?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(author_id): Path<i64>,
) -> WebResult<StatusCode> {
    let conn = state.db.conn()?;
    User::get_by_id(&conn, author_id)?.ok_or(WebError::NotFound)?;
    Relation::Subscription.remove(&conn, user.id, author_id)?;
    Ok(StatusCode::NO_CONTENT)
}
