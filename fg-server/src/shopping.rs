use itertools::Itertools;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::database::{collect_rows, FromRow};
use crate::errors::{WebError, WebResult};

/// Name the downloaded list is saved under.
pub const FILENAME: &str = "ShopList.txt";

/// One line of the shopping list: a total across every recipe in the cart.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ShoppingItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

impl FromRow for ShoppingItem {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get("name")?,
            measurement_unit: row.get("measurement_unit")?,
            amount: row.get("amount")?,
        })
    }
}

/// Sum the ingredient amounts over every recipe in the user's cart.
///
/// Amounts are grouped by (name, unit), so the same ingredient measured in
/// different units stays on separate lines. Lines are ordered by name, then unit.
pub fn aggregate(conn: &Connection, user_id: i64) -> WebResult<Vec<ShoppingItem>> {
    let items: Vec<ShoppingItem> = collect_rows(
        conn,
        "SELECT ingredient.name, ingredient.measurement_unit, SUM(ingredient_recipe.amount) AS amount
        FROM shopping_cart
        JOIN ingredient_recipe ON ingredient_recipe.recipe_id = shopping_cart.recipe_id
        JOIN ingredient ON ingredient.ingredient_id = ingredient_recipe.ingredient_id
        WHERE shopping_cart.user_id = ?
        GROUP BY ingredient.name, ingredient.measurement_unit
        ORDER BY ingredient.name, ingredient.measurement_unit",
        params![user_id],
    )?;
    if items.is_empty() {
        // A cart can only hold recipes with ingredients, so no lines means no cart
        return Err(WebError::EmptyCart);
    }
    tracing::debug!(user_id, lines = items.len(), "Aggregated shopping cart");
    Ok(items)
}

/// Render the list as plain text, one `    ·{name} — {amount} {unit}` line per item.
pub fn render(items: &[ShoppingItem]) -> String {
    std::iter::once("Shopping list:".to_string())
        .chain(items.iter().map(|item| {
            format!(
                "    ·{} — {} {}",
                item.name, item.amount, item.measurement_unit
            )
        }))
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::create_recipe;
    use crate::relations::Relation;
    use crate::test_support::*;

    #[test]
    fn amounts_are_summed_across_recipes() {
        let (_dir, db) = fresh_db();
        let mut conn = db.conn().unwrap();
        let cook = make_user(&conn, "cook");
        let tag = make_tag(&conn, "baking");
        let flour = make_ingredient(&conn, "flour", "g");
        let sugar = make_ingredient(&conn, "sugar", "g");
        let sugar_spoons = make_ingredient(&conn, "sugar", "tbsp");

        let bread = create_recipe(&mut conn, &cook, &draft_with(&[tag], &[(flour, 100)])).unwrap();
        let cake = create_recipe(
            &mut conn,
            &cook,
            &draft_with(&[tag], &[(flour, 50), (sugar, 30), (sugar_spoons, 2)]),
        )
        .unwrap();
        Relation::ShoppingCart.add(&conn, cook.id, bread).unwrap();
        Relation::ShoppingCart.add(&conn, cook.id, cake).unwrap();

        let items = aggregate(&conn, cook.id).unwrap();
        assert_eq!(
            items,
            vec![
                ShoppingItem { name: "flour".into(), measurement_unit: "g".into(), amount: 150 },
                ShoppingItem { name: "sugar".into(), measurement_unit: "g".into(), amount: 30 },
                ShoppingItem { name: "sugar".into(), measurement_unit: "tbsp".into(), amount: 2 },
            ]
        );
        assert_eq!(
            render(&items),
            "Shopping list:\n    ·flour — 150 g\n    ·sugar — 30 g\n    ·sugar — 2 tbsp"
        );
    }

    #[test]
    fn only_the_users_own_cart_counts() {
        let (_dir, db) = fresh_db();
        let mut conn = db.conn().unwrap();
        let cook = make_user(&conn, "cook");
        let other = make_user(&conn, "other");
        let recipe = make_simple_recipe(&mut conn, &cook);
        Relation::ShoppingCart.add(&conn, other.id, recipe).unwrap();
        // Favorites are not the cart
        Relation::Favorite.add(&conn, cook.id, recipe).unwrap();

        assert!(matches!(aggregate(&conn, cook.id), Err(WebError::EmptyCart)));
        assert_eq!(aggregate(&conn, other.id).unwrap()[0].amount, 100);
    }
}
