//! Fixtures shared by the unit tests.
use fg::basic_models::{IngredientAmount, IngredientSeed, RecipeDraft, UserRegistration};
use rusqlite::{params, Connection};
use tempfile::TempDir;

use crate::auth;
use crate::database::Database;
use crate::images::tests::png_data_url;
use crate::models::{Ingredient, User};
use crate::pipeline;

pub const PASSWORD: &str = "correct horse";

/// A migrated database in a fresh temporary directory. Keep the directory alive.
pub fn fresh_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("test.db")).unwrap();
    (dir, db)
}

fn registration(username: &str) -> UserRegistration {
    UserRegistration {
        email: format!("{username}@example.com"),
        username: username.into(),
        first_name: "Test".into(),
        last_name: username.into(),
        password: PASSWORD.into(),
    }
}

pub fn make_user(conn: &Connection, username: &str) -> User {
    auth::register(conn, &registration(username), false).unwrap()
}

pub fn make_admin(conn: &Connection, username: &str) -> User {
    auth::register(conn, &registration(username), true).unwrap()
}

/// Get or create a tag with the given slug.
pub fn make_tag(conn: &Connection, slug: &str) -> i64 {
    conn.execute(
        "INSERT OR IGNORE INTO tag (name, color, slug) VALUES (?, ?, ?)",
        params![
            format!("Tag {slug}"),
            format!("#{:06x}", slug.bytes().map(u32::from).sum::<u32>() * 997 % 0xFFFFFF),
            slug
        ],
    )
    .unwrap();
    conn.query_row("SELECT tag_id FROM tag WHERE slug = ?", params![slug], |row| row.get(0))
        .unwrap()
}

/// Get or create an ingredient.
pub fn make_ingredient(conn: &Connection, name: &str, unit: &str) -> i64 {
    Ingredient::push_if_absent(
        conn,
        &IngredientSeed {
            name: name.into(),
            measurement_unit: unit.into(),
        },
    )
    .unwrap();
    conn.query_row(
        "SELECT ingredient_id FROM ingredient WHERE name = ? AND measurement_unit = ?",
        params![name, unit],
        |row| row.get(0),
    )
    .unwrap()
}

/// A valid draft, image included.
pub fn draft_with(tags: &[i64], ingredients: &[(i64, i64)]) -> RecipeDraft {
    RecipeDraft {
        tags: tags.to_vec(),
        ingredients: ingredients
            .iter()
            .map(|&(id, amount)| IngredientAmount { id, amount })
            .collect(),
        name: "Pancakes".into(),
        image: Some(png_data_url()),
        text: "Mix and fry.".into(),
        cooking_time: 20,
    }
}

/// Create a recipe with one tag and one ingredient through the pipeline.
pub fn make_simple_recipe(conn: &mut Connection, author: &User) -> i64 {
    let tag = make_tag(conn, "breakfast");
    let flour = make_ingredient(conn, "flour", "g");
    pipeline::create_recipe(conn, author, &draft_with(&[tag], &[(flour, 100)])).unwrap()
}
