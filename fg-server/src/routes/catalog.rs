use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use fg::basic_models::{IngredientDraft, TagDraft};
use regex::Regex;
use serde::Deserialize;

use crate::auth::session::AdminUser;
use crate::database::Database;
use crate::errors::{is_unique_violation, FieldErrors, WebError, WebResult};
use crate::models::{Ingredient, Tag};

const MAX_TAG_LEN: usize = 200;
const MAX_INGREDIENT_LEN: usize = 200;

lazy_static::lazy_static! {
    static ref COLOR_RE: Regex = Regex::new(r"^#[A-Fa-f0-9]{6}$").expect("valid color pattern");
    static ref SLUG_RE: Regex = Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug pattern");
}

/// Map a uniqueness failure onto the field the client can fix.
fn unique_to_validation(field: &'static str, message: &'static str) -> impl Fn(rusqlite::Error) -> WebError {
    move |e| {
        if is_unique_violation(&e) {
            WebError::invalid(field, message)
        } else {
            e.into()
        }
    }
}

fn check_tag(tag: &Tag) -> WebResult<()> {
    let mut errors = FieldErrors::default();
    if tag.name.trim().is_empty() {
        errors.add("name", "This field is required.");
    } else if tag.name.chars().count() > MAX_TAG_LEN {
        errors.add("name", "Ensure this field has no more than 200 characters.");
    }
    if !COLOR_RE.is_match(&tag.color) {
        errors.add("color", "Enter a color as #RRGGBB.");
    }
    if !SLUG_RE.is_match(&tag.slug) {
        errors.add("slug", "Enter a valid slug of letters, numbers, underscores or hyphens.");
    } else if tag.slug.chars().count() > MAX_TAG_LEN {
        errors.add("slug", "Ensure this field has no more than 200 characters.");
    }
    errors.into_result()
}

pub async fn list_tags(State(db): State<Database>) -> WebResult<Json<Vec<Tag>>> {
    Ok(Json(Tag::list_all(&*db.conn()?)?))
}

pub async fn get_tag(State(db): State<Database>, Path(tag_id): Path<i64>) -> WebResult<Json<Tag>> {
    Tag::get_by_id(&*db.conn()?, tag_id)?
        .map(Json)
        .ok_or(WebError::NotFound)
}

pub async fn create_tag(
    State(db): State<Database>,
    _: AdminUser,
    Json(draft): Json<TagDraft>,
) -> WebResult<(StatusCode, Json<Tag>)> {
    let mut tag = Tag {
        id: 0,
        name: draft.name.unwrap_or_default().trim().to_string(),
        color: draft.color.unwrap_or_default(),
        slug: draft.slug.unwrap_or_default(),
    };
    check_tag(&tag)?;
    let conn = db.conn()?;
    tag.id = Tag::push(&conn, &tag.name, &tag.color, &tag.slug)
        .map_err(unique_to_validation("name", "A tag with this name, color or slug already exists."))?;
    tracing::info!(tag_id = tag.id, slug = %tag.slug, "Created tag");
    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn update_tag(
    State(db): State<Database>,
    _: AdminUser,
    Path(tag_id): Path<i64>,
    Json(draft): Json<TagDraft>,
) -> WebResult<Json<Tag>> {
    let conn = db.conn()?;
    let mut tag = Tag::get_by_id(&conn, tag_id)?.ok_or(WebError::NotFound)?;
    if let Some(name) = draft.name {
        tag.name = name.trim().to_string();
    }
    if let Some(color) = draft.color {
        tag.color = color;
    }
    if let Some(slug) = draft.slug {
        tag.slug = slug;
    }
    check_tag(&tag)?;
    tag.update(&conn)
        .map_err(unique_to_validation("name", "A tag with this name, color or slug already exists."))?;
    Ok(Json(tag))
}

pub async fn delete_tag(
    State(db): State<Database>,
    _: AdminUser,
    Path(tag_id): Path<i64>,
) -> WebResult<StatusCode> {
    if Tag::delete(&*db.conn()?, tag_id)? {
        tracing::info!(tag_id, "Deleted tag");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(WebError::NotFound)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct IngredientSearch {
    /// Case-insensitive name prefix
    pub name: Option<String>,
}

fn check_ingredient(ingredient: &Ingredient) -> WebResult<()> {
    let mut errors = FieldErrors::default();
    for (field, value) in [
        ("name", &ingredient.name),
        ("measurement_unit", &ingredient.measurement_unit),
    ] {
        if value.is_empty() {
            errors.add(field, "This field is required.");
        } else if value.chars().count() > MAX_INGREDIENT_LEN {
            errors.add(field, "Ensure this field has no more than 200 characters.");
        }
    }
    errors.into_result()
}

pub async fn list_ingredients(
    State(db): State<Database>,
    Query(search): Query<IngredientSearch>,
) -> WebResult<Json<Vec<Ingredient>>> {
    Ok(Json(Ingredient::search(&*db.conn()?, search.name.as_deref())?))
}

pub async fn get_ingredient(
    State(db): State<Database>,
    Path(ingredient_id): Path<i64>,
) -> WebResult<Json<Ingredient>> {
    Ingredient::get_by_id(&*db.conn()?, ingredient_id)?
        .map(Json)
        .ok_or(WebError::NotFound)
}

pub async fn create_ingredient(
    State(db): State<Database>,
    _: AdminUser,
    Json(draft): Json<IngredientDraft>,
) -> WebResult<(StatusCode, Json<Ingredient>)> {
    let mut ingredient = Ingredient {
        id: 0,
        name: draft.name.unwrap_or_default().trim().to_lowercase(),
        measurement_unit: draft.measurement_unit.unwrap_or_default().trim().to_lowercase(),
    };
    check_ingredient(&ingredient)?;
    let conn = db.conn()?;
    ingredient.id = Ingredient::push(&conn, &ingredient.name, &ingredient.measurement_unit)
        .map_err(unique_to_validation("name", "This ingredient already exists with that unit."))?;
    tracing::info!(ingredient_id = ingredient.id, "Created ingredient");
    Ok((StatusCode::CREATED, Json(ingredient)))
}

pub async fn update_ingredient(
    State(db): State<Database>,
    _: AdminUser,
    Path(ingredient_id): Path<i64>,
    Json(draft): Json<IngredientDraft>,
) -> WebResult<Json<Ingredient>> {
    let conn = db.conn()?;
    let mut ingredient = Ingredient::get_by_id(&conn, ingredient_id)?.ok_or(WebError::NotFound)?;
    if let Some(name) = draft.name {
        ingredient.name = name.trim().to_lowercase();
    }
    if let Some(unit) = draft.measurement_unit {
        ingredient.measurement_unit = unit.trim().to_lowercase();
    }
    check_ingredient(&ingredient)?;
    ingredient
        .update(&conn)
        .map_err(unique_to_validation("name", "This ingredient already exists with that unit."))?;
    Ok(Json(ingredient))
}

pub async fn delete_ingredient(
    State(db): State<Database>,
    _: AdminUser,
    Path(ingredient_id): Path<i64>,
) -> WebResult<StatusCode> {
    if Ingredient::delete(&*db.conn()?, ingredient_id)? {
        tracing::info!(ingredient_id, "Deleted ingredient");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(WebError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(color: &str, slug: &str) -> Tag {
        Tag {
            id: 0,
            name: "Breakfast".into(),
            color: color.into(),
            slug: slug.into(),
        }
    }

    #[test]
    fn tag_color_and_slug_are_checked() {
        assert!(check_tag(&tag("#E26C2D", "breakfast_1")).is_ok());
        let Err(WebError::Validation(errors)) = check_tag(&tag("red", "no spaces")) else {
            panic!("expected a validation error");
        };
        assert!(errors.get("color").is_some());
        assert!(errors.get("slug").is_some());
        assert!(check_tag(&tag("#12345", "ok")).is_err());
    }
}
