use rusqlite::{params, Connection};
use strum::{EnumString, IntoStaticStr};

use crate::errors::{is_unique_violation, WebError, WebResult};

/// The user-to-target relations that clients switch on and off.
///
/// Each is stored in a table of the same (snake_case) name, keyed by
/// `(user_id, <target column>)`, and the primary key is what prevents
/// duplicate pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Relation {
    Favorite,
    ShoppingCart,
    Subscription,
}

impl Relation {
    fn table(self) -> &'static str {
        self.into()
    }

    fn target_column(self) -> &'static str {
        match self {
            Relation::Subscription => "author_id",
            Relation::Favorite | Relation::ShoppingCart => "recipe_id",
        }
    }

    fn duplicate_message(self) -> &'static str {
        match self {
            Relation::Favorite => "Recipe is already in favorites",
            Relation::ShoppingCart => "Recipe is already in the shopping cart",
            Relation::Subscription => "You are already subscribed to this author",
        }
    }

    fn missing_message(self) -> &'static str {
        match self {
            Relation::Favorite => "Recipe is not in favorites",
            Relation::ShoppingCart => "Recipe is not in the shopping cart",
            Relation::Subscription => "You are not subscribed to this author",
        }
    }

    /// Whether `user_id` holds this relation to `target_id`. Anonymous users hold none.
    pub fn exists(self, conn: &Connection, user_id: Option<i64>, target_id: i64) -> rusqlite::Result<bool> {
        let Some(user_id) = user_id else {
            return Ok(false);
        };
        conn.query_row(
            &format!(
                "SELECT EXISTS (SELECT 1 FROM {} WHERE user_id = ? AND {} = ?)",
                self.table(),
                self.target_column()
            ),
            params![user_id, target_id],
            |row| row.get(0),
        )
    }

    /// Record the pair. The caller has already checked that the target exists.
    pub fn add(self, conn: &Connection, user_id: i64, target_id: i64) -> WebResult<()> {
        if self == Relation::Subscription && user_id == target_id {
            return Err(WebError::Conflict("You cannot subscribe to yourself"));
        }
        let inserted = conn.execute(
            &format!(
                "INSERT INTO {} (user_id, {}) VALUES (?, ?)",
                self.table(),
                self.target_column()
            ),
            params![user_id, target_id],
        );
        match inserted {
            Ok(_) => {
                tracing::info!(relation = ?self, user_id, target_id, "Added");
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => Err(WebError::Conflict(self.duplicate_message())),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop the pair, failing if it was never there.
    pub fn remove(self, conn: &Connection, user_id: i64, target_id: i64) -> WebResult<()> {
        let deleted = conn.execute(
            &format!(
                "DELETE FROM {} WHERE user_id = ? AND {} = ?",
                self.table(),
                self.target_column()
            ),
            params![user_id, target_id],
        )?;
        if deleted == 0 {
            return Err(WebError::MissingAssociation(self.missing_message()));
        }
        tracing::info!(relation = ?self, user_id, target_id, "Removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn relation_names_match_tables() {
        assert_eq!(Relation::ShoppingCart.table(), "shopping_cart");
        assert_eq!("favorite".parse::<Relation>().unwrap(), Relation::Favorite);
    }

    #[test]
    fn favorite_twice_conflicts_and_unfavorite_twice_is_missing() {
        let (_dir, db) = fresh_db();
        let mut conn = db.conn().unwrap();
        let author = make_user(&conn, "author");
        let reader = make_user(&conn, "reader");
        let recipe_id = make_simple_recipe(&mut conn, &author);

        assert!(!Relation::Favorite.exists(&conn, Some(reader.id), recipe_id).unwrap());
        Relation::Favorite.add(&conn, reader.id, recipe_id).unwrap();
        assert!(Relation::Favorite.exists(&conn, Some(reader.id), recipe_id).unwrap());
        assert!(matches!(
            Relation::Favorite.add(&conn, reader.id, recipe_id),
            Err(WebError::Conflict(_))
        ));

        Relation::Favorite.remove(&conn, reader.id, recipe_id).unwrap();
        assert!(matches!(
            Relation::Favorite.remove(&conn, reader.id, recipe_id),
            Err(WebError::MissingAssociation(_))
        ));
    }

    #[test]
    fn relations_are_independent() {
        let (_dir, db) = fresh_db();
        let mut conn = db.conn().unwrap();
        let author = make_user(&conn, "author");
        let recipe_id = make_simple_recipe(&mut conn, &author);
        Relation::ShoppingCart.add(&conn, author.id, recipe_id).unwrap();
        assert!(!Relation::Favorite.exists(&conn, Some(author.id), recipe_id).unwrap());
        assert!(!Relation::ShoppingCart.exists(&conn, None, recipe_id).unwrap());
    }

    #[test]
    fn self_subscription_is_rejected_even_for_admins() {
        let (_dir, db) = fresh_db();
        let conn = db.conn().unwrap();
        let admin = make_admin(&conn, "boss");
        let other = make_user(&conn, "other");
        assert!(matches!(
            Relation::Subscription.add(&conn, admin.id, admin.id),
            Err(WebError::Conflict(_))
        ));
        Relation::Subscription.add(&conn, admin.id, other.id).unwrap();
        // Direction matters
        assert!(!Relation::Subscription.exists(&conn, Some(other.id), admin.id).unwrap());
    }
}
