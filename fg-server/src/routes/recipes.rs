use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use fg::basic_models::RecipeDraft;

use super::AppState;
use crate::auth::session::{CurrentUser, MaybeUser};
use crate::errors::{FieldErrors, WebError, WebResult};
use crate::models::{Recipe, RecipeFilter};
use crate::pagination::{Page, PageQuery};
use crate::relations::Relation;
use crate::views::{RecipeView, ShortRecipe};
use crate::{pipeline, shopping};

fn truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "True")
}

/// Split the listing query into pagination and filters.
///
/// Taken as raw pairs because `tags` may repeat.
fn parse_listing_query(pairs: &[(String, String)]) -> WebResult<(PageQuery, RecipeFilter)> {
    let mut page = PageQuery::default();
    let mut filter = RecipeFilter::default();
    let mut errors = FieldErrors::default();
    for (key, value) in pairs {
        match key.as_str() {
            "limit" => match value.parse() {
                Ok(limit) => page.limit = Some(limit),
                Err(_) => errors.add("limit", "A valid integer is required."),
            },
            "offset" => match value.parse() {
                Ok(offset) => page.offset = Some(offset),
                Err(_) => errors.add("offset", "A valid integer is required."),
            },
            "author" => match value.parse() {
                Ok(author) => filter.author = Some(author),
                Err(_) => errors.add("author", "A valid integer is required."),
            },
            "tags" => filter.tags.push(value.clone()),
            "is_favorited" => filter.is_favorited = truthy(value),
            "is_in_shopping_cart" => filter.is_in_shopping_cart = truthy(value),
            _ => {}
        }
    }
    errors.into_result()?;
    Ok((page, filter))
}

/// `GET /api/recipes/`, newest first
pub async fn list(
    State(state): State<AppState>,
    viewer: MaybeUser,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> WebResult<Json<Page<RecipeView>>> {
    let (page, filter) = parse_listing_query(&pairs)?;
    let (limit, offset) = page.resolve(&state.api);
    let conn = state.db.conn()?;
    let count = Recipe::count(&conn, &filter, viewer.id())?;
    let results = Recipe::list(&conn, &filter, viewer.id(), limit, offset)?
        .iter()
        .map(|recipe| RecipeView::render(&conn, recipe, viewer.id(), &state.api.media_base_url))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Json(Page::new(results, count, limit, offset, &uri)))
}

pub async fn detail(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(recipe_id): Path<i64>,
) -> WebResult<Json<RecipeView>> {
    let conn = state.db.conn()?;
    RecipeView::load(&conn, recipe_id, viewer.id(), &state.api.media_base_url)?
        .map(Json)
        .ok_or(WebError::NotFound)
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(draft): Json<RecipeDraft>,
) -> WebResult<(StatusCode, Json<RecipeView>)> {
    let mut conn = state.db.conn()?;
    let recipe_id = pipeline::create_recipe(&mut conn, &user, &draft)?;
    let view = RecipeView::load(&conn, recipe_id, Some(user.id), &state.api.media_base_url)?
        .ok_or(WebError::NotFound)?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
    Json(draft): Json<RecipeDraft>,
) -> WebResult<Json<RecipeView>> {
    let mut conn = state.db.conn()?;
    pipeline::update_recipe(&mut conn, &user, recipe_id, &draft)?;
    RecipeView::load(&conn, recipe_id, Some(user.id), &state.api.media_base_url)?
        .map(Json)
        .ok_or(WebError::NotFound)
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
) -> WebResult<StatusCode> {
    pipeline::delete_recipe(&*state.db.conn()?, &user, recipe_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Put a recipe into one of the user's collections and answer with its short form.
fn add_recipe_relation(
    state: &AppState,
    relation: Relation,
    user_id: i64,
    recipe_id: i64,
) -> WebResult<(StatusCode, Json<ShortRecipe>)> {
    let conn = state.db.conn()?;
    let recipe = Recipe::get_by_id(&conn, recipe_id)?.ok_or(WebError::NotFound)?;
    relation.add(&conn, user_id, recipe_id)?;
    Ok((
        StatusCode::CREATED,
        Json(ShortRecipe::render(&recipe, &state.api.media_base_url)),
    ))
}

fn remove_recipe_relation(
    state: &AppState,
    relation: Relation,
    user_id: i64,
    recipe_id: i64,
) -> WebResult<StatusCode> {
    let conn = state.db.conn()?;
    Recipe::get_by_id(&conn, recipe_id)?.ok_or(WebError::NotFound)?;
    relation.remove(&conn, user_id, recipe_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
) -> WebResult<(StatusCode, Json<ShortRecipe>)> {
    add_recipe_relation(&state, Relation::Favorite, user.id, recipe_id)
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
) -> WebResult<StatusCode> {
    remove_recipe_relation(&state, Relation::Favorite, user.id, recipe_id)
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
) -> WebResult<(StatusCode, Json<ShortRecipe>)> {
    add_recipe_relation(&state, Relation::ShoppingCart, user.id, recipe_id)
}

pub async fn remove_from_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
) -> WebResult<StatusCode> {
    remove_recipe_relation(&state, Relation::ShoppingCart, user.id, recipe_id)
}

/// The aggregated shopping list as a plain text attachment.
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> WebResult<impl IntoResponse> {
    let items = shopping::aggregate(&*state.db.conn()?, user.id)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", shopping::FILENAME),
            ),
        ],
        shopping::render(&items),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn listing_query_collects_repeated_tags() {
        let (page, filter) = parse_listing_query(&pairs(&[
            ("tags", "breakfast"),
            ("tags", "lunch"),
            ("author", "7"),
            ("is_favorited", "1"),
            ("is_in_shopping_cart", "0"),
            ("limit", "3"),
        ]))
        .unwrap();
        assert_eq!(filter.tags, vec!["breakfast", "lunch"]);
        assert_eq!(filter.author, Some(7));
        assert!(filter.is_favorited);
        assert!(!filter.is_in_shopping_cart);
        assert_eq!(page.limit, Some(3));
        assert_eq!(page.offset, None);
    }

    #[test]
    fn listing_query_rejects_non_numbers() {
        let Err(WebError::Validation(errors)) =
            parse_listing_query(&pairs(&[("author", "bob"), ("limit", "-1")]))
        else {
            panic!("expected a validation error");
        };
        assert!(errors.get("author").is_some());
        assert!(errors.get("limit").is_some());
    }
}
