use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, FromRef, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use crate::auth;
use crate::config::ApiConfig;
use crate::database::Database;
use crate::errors::{WebError, WebResult};
use crate::models::Image;

pub mod catalog;
pub mod recipes;
pub mod users;

/// Everything a handler may need, shared across requests.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub api: Arc<ApiConfig>,
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for Arc<ApiConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.api.clone()
    }
}

pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.api.max_body_bytes;
    Router::new()
        .route("/health", get(health))
        // Authentication
        .route("/api/auth/token/login/", post(auth::route::login))
        .route("/api/auth/token/logout/", post(auth::route::logout))
        // Users and subscriptions
        .route("/api/users/", get(users::list).post(users::register))
        .route("/api/users/me/", get(users::me))
        .route("/api/users/set_password/", post(users::set_password))
        .route("/api/users/subscriptions/", get(users::subscriptions))
        .route("/api/users/:user_id/", get(users::detail))
        .route(
            "/api/users/:user_id/subscribe/",
            post(users::subscribe).delete(users::unsubscribe),
        )
        // Catalog
        .route("/api/tags/", get(catalog::list_tags).post(catalog::create_tag))
        .route(
            "/api/tags/:tag_id/",
            get(catalog::get_tag)
                .patch(catalog::update_tag)
                .delete(catalog::delete_tag),
        )
        .route(
            "/api/ingredients/",
            get(catalog::list_ingredients).post(catalog::create_ingredient),
        )
        .route(
            "/api/ingredients/:ingredient_id/",
            get(catalog::get_ingredient)
                .patch(catalog::update_ingredient)
                .delete(catalog::delete_ingredient),
        )
        // Recipes
        .route("/api/recipes/", get(recipes::list).post(recipes::create))
        .route(
            "/api/recipes/download_shopping_cart/",
            get(recipes::download_shopping_cart),
        )
        .route(
            "/api/recipes/:recipe_id/",
            get(recipes::detail)
                .patch(recipes::update)
                .delete(recipes::delete),
        )
        .route(
            "/api/recipes/:recipe_id/favorite/",
            post(recipes::add_favorite).delete(recipes::remove_favorite),
        )
        .route(
            "/api/recipes/:recipe_id/shopping_cart/",
            post(recipes::add_to_cart).delete(recipes::remove_from_cart),
        )
        // `GET /media/recipes/:recipe_id` serves the stored webp
        .route("/media/recipes/:recipe_id", get(get_image))
        .layer(
            tower_http::compression::CompressionLayer::new()
                .quality(tower_http::CompressionLevel::Fastest),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

// Just reply that everything is okay
async fn health() -> StatusCode {
    StatusCode::OK
}

async fn get_image(
    State(db): State<Database>,
    Path(recipe_id): Path<i64>,
) -> WebResult<impl IntoResponse> {
    let image = Image::get_image(&*db.conn()?, recipe_id)?.ok_or(WebError::NotFound)?;
    Ok((
        [(header::CONTENT_TYPE, format!("image/{}", image.format))],
        image.content_bytes,
    ))
}
