use rusqlite::Connection;
use serde::Serialize;

use crate::models::{Recipe, RecipeIngredient, Tag, User};
use crate::relations::Relation;

/// Where recipe images are served from.
pub fn image_url(media_base_url: &str, recipe_id: i64) -> String {
    format!("{}/media/recipes/{}", media_base_url.trim_end_matches('/'), recipe_id)
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserView {
    pub fn render(conn: &Connection, user: &User, viewer: Option<i64>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_subscribed: Relation::Subscription.exists(conn, viewer, user.id)?,
        })
    }
}

/// The compact recipe form used in favorites, the cart and subscription previews.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ShortRecipe {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i64,
}

impl ShortRecipe {
    pub fn render(recipe: &Recipe, media_base_url: &str) -> Self {
        Self {
            id: recipe.recipe_id,
            name: recipe.name.clone(),
            image: image_url(media_base_url, recipe.recipe_id),
            cooking_time: recipe.cooking_time,
        }
    }
}

/// The full, denormalized recipe. Every response carrying a recipe uses this,
/// rendered for the requesting user, whichever operation produced it.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct RecipeView {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i64,
    pub pub_date: String,
}

impl RecipeView {
    pub fn render(
        conn: &Connection,
        recipe: &Recipe,
        viewer: Option<i64>,
        media_base_url: &str,
    ) -> rusqlite::Result<Self> {
        let author = User::get_by_id(conn, recipe.author_id)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        Ok(Self {
            id: recipe.recipe_id,
            tags: Tag::for_recipe(conn, recipe.recipe_id)?,
            author: UserView::render(conn, &author, viewer)?,
            ingredients: Recipe::get_ingredients(conn, recipe.recipe_id)?,
            is_favorited: Relation::Favorite.exists(conn, viewer, recipe.recipe_id)?,
            is_in_shopping_cart: Relation::ShoppingCart.exists(conn, viewer, recipe.recipe_id)?,
            name: recipe.name.clone(),
            image: image_url(media_base_url, recipe.recipe_id),
            text: recipe.text.clone(),
            cooking_time: recipe.cooking_time,
            pub_date: recipe.pub_date.clone(),
        })
    }

    /// Load and render a recipe by id.
    pub fn load(
        conn: &Connection,
        recipe_id: i64,
        viewer: Option<i64>,
        media_base_url: &str,
    ) -> rusqlite::Result<Option<Self>> {
        Recipe::get_by_id(conn, recipe_id)?
            .map(|recipe| Self::render(conn, &recipe, viewer, media_base_url))
            .transpose()
    }
}

/// An author as seen from the subscriptions page.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub user: UserView,
    pub recipes: Vec<ShortRecipe>,
    pub recipes_count: usize,
}

impl SubscriptionView {
    /// `recipes_limit` bounds the preview; `None` shows every recipe.
    pub fn render(
        conn: &Connection,
        author: &User,
        viewer: Option<i64>,
        recipes_limit: Option<usize>,
        media_base_url: &str,
    ) -> rusqlite::Result<Self> {
        let recipes = Recipe::by_author(conn, author.id, recipes_limit)?
            .iter()
            .map(|r| ShortRecipe::render(r, media_base_url))
            .collect();
        Ok(Self {
            user: UserView::render(conn, author, viewer)?,
            recipes,
            recipes_count: Recipe::count_by_author(conn, author.id)?,
        })
    }
}
