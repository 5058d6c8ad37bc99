use crate::database::{collect_rows, first_row, FromRow};
use fg::basic_models;
use itertools::Itertools;
use rusqlite::{params, params_from_iter, types::Value, Connection};
use serde::{Deserialize, Serialize};

pub fn sqlite_current_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string()
}

/// `?, ?, ?` with one placeholder per item
fn placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).join(", ")
}

/// Return which of `ids` exist in `table`.
fn existing_ids(conn: &Connection, table: &str, key: &str, ids: &[i64]) -> rusqlite::Result<Vec<i64>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let sql = format!(
        "SELECT {key} FROM {table} WHERE {key} IN ({})",
        placeholders(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| row.get(0))?;
    rows.collect()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip)]
    pub is_admin: bool,
}

impl FromRow for User {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("user_id")?,
            email: row.get("email")?,
            username: row.get("username")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            is_admin: row.get("is_admin")?,
        })
    }
}

impl User {
    pub fn get_by_id(conn: &Connection, user_id: i64) -> rusqlite::Result<Option<Self>> {
        first_row(conn, "SELECT * FROM user WHERE user_id = ?", params![user_id])
    }

    pub fn get_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<Self>> {
        first_row(conn, "SELECT * FROM user WHERE email = ?", params![email])
    }

    /// A page of users, oldest account first.
    pub fn list(conn: &Connection, limit: usize, offset: usize) -> rusqlite::Result<Vec<Self>> {
        collect_rows(
            conn,
            "SELECT * FROM user ORDER BY user_id LIMIT ? OFFSET ?",
            params![limit as i64, offset as i64],
        )
    }

    pub fn count(conn: &Connection) -> rusqlite::Result<usize> {
        conn.query_row("SELECT COUNT(*) FROM user", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
    }

    /// Insert a user whose password has already been hashed.
    pub fn push(
        conn: &Connection,
        registration: &basic_models::UserRegistration,
        password_hash: &str,
        is_admin: bool,
    ) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO user (email, username, first_name, last_name, password_hash, is_admin, created_on)
            VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                registration.email,
                registration.username,
                registration.first_name,
                registration.last_name,
                password_hash,
                is_admin,
                sqlite_current_timestamp()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn email_taken(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM user WHERE email = ?)",
            params![email],
            |row| row.get(0),
        )
    }

    pub fn username_taken(conn: &Connection, username: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM user WHERE username = ?)",
            params![username],
            |row| row.get(0),
        )
    }

    pub fn password_hash(conn: &Connection, user_id: i64) -> rusqlite::Result<String> {
        conn.query_row(
            "SELECT password_hash FROM user WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )
    }

    pub fn set_password_hash(conn: &Connection, user_id: i64, hash: &str) -> rusqlite::Result<()> {
        conn.execute(
            "UPDATE user SET password_hash = ? WHERE user_id = ?",
            params![hash, user_id],
        )?;
        Ok(())
    }

    /// Authors `user_id` is subscribed to, in subscription order.
    pub fn list_subscriptions(
        conn: &Connection,
        user_id: i64,
        limit: usize,
        offset: usize,
    ) -> rusqlite::Result<Vec<Self>> {
        collect_rows(
            conn,
            "SELECT user.* FROM subscription
            JOIN user ON user.user_id = subscription.author_id
            WHERE subscription.user_id = ?
            ORDER BY subscription.rowid
            LIMIT ? OFFSET ?",
            params![user_id, limit as i64, offset as i64],
        )
    }

    pub fn count_subscriptions(conn: &Connection, user_id: i64) -> rusqlite::Result<usize> {
        conn.query_row(
            "SELECT COUNT(*) FROM subscription WHERE user_id = ?",
            params![user_id],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as usize)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl FromRow for Tag {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("tag_id")?,
            name: row.get("name")?,
            color: row.get("color")?,
            slug: row.get("slug")?,
        })
    }
}

impl Tag {
    pub fn list_all(conn: &Connection) -> rusqlite::Result<Vec<Tag>> {
        collect_rows(conn, "SELECT * FROM tag ORDER BY tag_id", [])
    }

    pub fn get_by_id(conn: &Connection, tag_id: i64) -> rusqlite::Result<Option<Tag>> {
        first_row(conn, "SELECT * FROM tag WHERE tag_id = ?", params![tag_id])
    }

    /// List all the tags for a recipe
    pub fn for_recipe(conn: &Connection, recipe_id: i64) -> rusqlite::Result<Vec<Tag>> {
        collect_rows(
            conn,
            "SELECT tag.* FROM recipe_tag
            JOIN tag ON tag.tag_id = recipe_tag.tag_id
            WHERE recipe_tag.recipe_id = ?
            ORDER BY tag.tag_id",
            params![recipe_id],
        )
    }

    pub fn existing_ids(conn: &Connection, ids: &[i64]) -> rusqlite::Result<Vec<i64>> {
        existing_ids(conn, "tag", "tag_id", ids)
    }

    pub fn push(conn: &Connection, name: &str, color: &str, slug: &str) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO tag (name, color, slug) VALUES (?, ?, ?)",
            params![name, color, slug],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "UPDATE tag SET name = ?, color = ?, slug = ? WHERE tag_id = ?",
            params![self.name, self.color, self.slug, self.id],
        )?;
        Ok(())
    }

    /// Returns whether a tag was deleted.
    pub fn delete(conn: &Connection, tag_id: i64) -> rusqlite::Result<bool> {
        Ok(conn.execute("DELETE FROM tag WHERE tag_id = ?", params![tag_id])? > 0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

impl FromRow for Ingredient {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("ingredient_id")?,
            name: row.get("name")?,
            measurement_unit: row.get("measurement_unit")?,
        })
    }
}

impl Ingredient {
    /// List ingredients, optionally only those whose name starts with `prefix`.
    pub fn search(conn: &Connection, prefix: Option<&str>) -> rusqlite::Result<Vec<Ingredient>> {
        match prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => {
                // Escape LIKE wildcards so the prefix is matched literally
                let pattern = format!(
                    "{}%",
                    prefix
                        .to_lowercase()
                        .replace('\\', "\\\\")
                        .replace('%', "\\%")
                        .replace('_', "\\_")
                );
                collect_rows(
                    conn,
                    "SELECT * FROM ingredient WHERE lower(name) LIKE ? ESCAPE '\\' ORDER BY name, ingredient_id",
                    params![pattern],
                )
            }
            None => collect_rows(conn, "SELECT * FROM ingredient ORDER BY name, ingredient_id", []),
        }
    }

    pub fn get_by_id(conn: &Connection, ingredient_id: i64) -> rusqlite::Result<Option<Ingredient>> {
        first_row(
            conn,
            "SELECT * FROM ingredient WHERE ingredient_id = ?",
            params![ingredient_id],
        )
    }

    pub fn existing_ids(conn: &Connection, ids: &[i64]) -> rusqlite::Result<Vec<i64>> {
        existing_ids(conn, "ingredient", "ingredient_id", ids)
    }

    pub fn push(conn: &Connection, name: &str, measurement_unit: &str) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO ingredient (name, measurement_unit) VALUES (?, ?)",
            params![name, measurement_unit],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert unless the same (name, unit) pair is already present. Returns whether a row was added.
    pub fn push_if_absent(conn: &Connection, seed: &basic_models::IngredientSeed) -> rusqlite::Result<bool> {
        Ok(conn.execute(
            "INSERT OR IGNORE INTO ingredient (name, measurement_unit) VALUES (?, ?)",
            params![seed.name, seed.measurement_unit],
        )? > 0)
    }

    pub fn update(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "UPDATE ingredient SET name = ?, measurement_unit = ? WHERE ingredient_id = ?",
            params![self.name, self.measurement_unit, self.id],
        )?;
        Ok(())
    }

    pub fn delete(conn: &Connection, ingredient_id: i64) -> rusqlite::Result<bool> {
        Ok(conn.execute(
            "DELETE FROM ingredient WHERE ingredient_id = ?",
            params![ingredient_id],
        )? > 0)
    }
}

/// An ingredient as it appears inside a recipe, with its amount.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RecipeIngredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

impl FromRow for RecipeIngredient {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("ingredient_id")?,
            name: row.get("name")?,
            measurement_unit: row.get("measurement_unit")?,
            amount: row.get("amount")?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub recipe_id: i64,
    pub author_id: i64,
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
    pub pub_date: String,
}

impl FromRow for Recipe {
    /// Create a new recipe from an sql row, provided by rusqlite, using named columns.
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            recipe_id: row.get("recipe_id")?,
            author_id: row.get("author_id")?,
            name: row.get("name")?,
            text: row.get("text")?,
            cooking_time: row.get("cooking_time")?,
            pub_date: row.get("pub_date")?,
        })
    }
}

/// Narrowing options for the recipe listing.
#[derive(Debug, Default, Clone)]
pub struct RecipeFilter {
    pub author: Option<i64>,
    /// Tag slugs; a recipe matches when it carries any of them.
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFilter {
    /// Build the WHERE clause and its parameters for `viewer`.
    fn where_clause(&self, viewer: Option<i64>) -> (String, Vec<Value>) {
        let mut clauses = vec!["1".to_string()];
        let mut values = vec![];
        if let Some(author) = self.author {
            clauses.push("recipe.author_id = ?".into());
            values.push(Value::Integer(author));
        }
        if !self.tags.is_empty() {
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM recipe_tag JOIN tag ON tag.tag_id = recipe_tag.tag_id
                    WHERE recipe_tag.recipe_id = recipe.recipe_id AND tag.slug IN ({}))",
                placeholders(self.tags.len())
            ));
            values.extend(self.tags.iter().cloned().map(Value::Text));
        }
        for (wanted, table) in [
            (self.is_favorited, "favorite"),
            (self.is_in_shopping_cart, "shopping_cart"),
        ] {
            if !wanted {
                continue;
            }
            match viewer {
                Some(user_id) => {
                    clauses.push(format!(
                        "EXISTS (SELECT 1 FROM {table} WHERE {table}.recipe_id = recipe.recipe_id AND {table}.user_id = ?)"
                    ));
                    values.push(Value::Integer(user_id));
                }
                // Anonymous viewers have no favorites and no cart
                None => clauses.push("0".into()),
            }
        }
        (clauses.join(" AND "), values)
    }
}

impl Recipe {
    /// Get a recipe by ID
    pub fn get_by_id(conn: &Connection, recipe_id: i64) -> rusqlite::Result<Option<Self>> {
        first_row(
            conn,
            "SELECT * FROM recipe WHERE recipe_id = ?",
            params![recipe_id],
        )
    }

    /// A page of recipes matching `filter`, newest first.
    pub fn list(
        conn: &Connection,
        filter: &RecipeFilter,
        viewer: Option<i64>,
        limit: usize,
        offset: usize,
    ) -> rusqlite::Result<Vec<Self>> {
        let (clause, mut values) = filter.where_clause(viewer);
        values.push(Value::Integer(limit as i64));
        values.push(Value::Integer(offset as i64));
        collect_rows(
            conn,
            &format!(
                "SELECT * FROM recipe WHERE {clause}
                ORDER BY pub_date DESC, recipe_id DESC
                LIMIT ? OFFSET ?"
            ),
            params_from_iter(values.iter()),
        )
    }

    pub fn count(conn: &Connection, filter: &RecipeFilter, viewer: Option<i64>) -> rusqlite::Result<usize> {
        let (clause, values) = filter.where_clause(viewer);
        conn.query_row(
            &format!("SELECT COUNT(*) FROM recipe WHERE {clause}"),
            params_from_iter(values.iter()),
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as usize)
    }

    /// The newest recipes of one author, at most `limit` of them.
    pub fn by_author(conn: &Connection, author_id: i64, limit: Option<usize>) -> rusqlite::Result<Vec<Self>> {
        collect_rows(
            conn,
            "SELECT * FROM recipe WHERE author_id = ?
            ORDER BY pub_date DESC, recipe_id DESC
            LIMIT ?",
            params![author_id, limit.map(|l| l as i64).unwrap_or(-1)],
        )
    }

    pub fn count_by_author(conn: &Connection, author_id: i64) -> rusqlite::Result<usize> {
        conn.query_row(
            "SELECT COUNT(*) FROM recipe WHERE author_id = ?",
            params![author_id],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as usize)
    }

    /// All the ingredients of a recipe with their amounts, in name order
    pub fn get_ingredients(conn: &Connection, recipe_id: i64) -> rusqlite::Result<Vec<RecipeIngredient>> {
        collect_rows(
            conn,
            "SELECT ingredient.ingredient_id, ingredient.name, ingredient.measurement_unit, ingredient_recipe.amount
            FROM ingredient_recipe
            JOIN ingredient ON ingredient.ingredient_id = ingredient_recipe.ingredient_id
            WHERE ingredient_recipe.recipe_id = ?
            ORDER BY ingredient.name, ingredient.ingredient_id",
            params![recipe_id],
        )
    }

    pub fn push(
        conn: &Connection,
        author_id: i64,
        name: &str,
        text: &str,
        cooking_time: i64,
    ) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO recipe (author_id, name, text, cooking_time, pub_date) VALUES (?, ?, ?, ?, ?)",
            params![author_id, name, text, cooking_time, sqlite_current_timestamp()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_scalars(
        conn: &Connection,
        recipe_id: i64,
        name: &str,
        text: &str,
        cooking_time: i64,
    ) -> rusqlite::Result<()> {
        conn.execute(
            "UPDATE recipe SET name = ?, text = ?, cooking_time = ? WHERE recipe_id = ?",
            params![name, text, cooking_time, recipe_id],
        )?;
        Ok(())
    }

    /// Replace the tag set of a recipe.
    pub fn set_tags(conn: &Connection, recipe_id: i64, tag_ids: &[i64]) -> rusqlite::Result<()> {
        conn.execute("DELETE FROM recipe_tag WHERE recipe_id = ?", params![recipe_id])?;
        let mut stmt = conn.prepare("INSERT INTO recipe_tag (recipe_id, tag_id) VALUES (?, ?)")?;
        for tag_id in tag_ids {
            stmt.execute(params![recipe_id, tag_id])?;
        }
        Ok(())
    }

    /// Replace the ingredient associations of a recipe. Not a merge: every old row goes.
    pub fn set_ingredients(
        conn: &Connection,
        recipe_id: i64,
        ingredients: &[basic_models::IngredientAmount],
    ) -> rusqlite::Result<()> {
        conn.execute(
            "DELETE FROM ingredient_recipe WHERE recipe_id = ?",
            params![recipe_id],
        )?;
        let mut stmt = conn.prepare(
            "INSERT INTO ingredient_recipe (ingredient_id, recipe_id, amount) VALUES (?, ?, ?)",
        )?;
        for ingredient in ingredients {
            stmt.execute(params![ingredient.id, recipe_id, ingredient.amount])?;
        }
        Ok(())
    }

    /// Delete a recipe along with everything that hangs off it.
    pub fn delete(conn: &Connection, recipe_id: i64) -> rusqlite::Result<bool> {
        Ok(conn.execute("DELETE FROM recipe WHERE recipe_id = ?", params![recipe_id])? > 0)
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Image {
    pub recipe_id: i64,
    pub format: String,
    pub content_bytes: Vec<u8>,
}

impl FromRow for Image {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            recipe_id: row.get("recipe_id")?,
            format: row.get("format")?,
            content_bytes: row.get("content_bytes")?,
        })
    }
}

impl Image {
    pub fn get_image(conn: &Connection, recipe_id: i64) -> rusqlite::Result<Option<Image>> {
        first_row(
            conn,
            "SELECT * FROM recipe_image WHERE recipe_id = ?",
            params![recipe_id],
        )
    }

    /// Store an already encoded webp image for a recipe, replacing any previous one.
    pub fn put(conn: &Connection, recipe_id: i64, webp_bytes: &[u8]) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO recipe_image (recipe_id, format, content_bytes)
            VALUES (?, 'webp', ?)",
            params![recipe_id, webp_bytes],
        )?;
        Ok(())
    }
}
