use fg::basic_models::RecipeDraft;
use itertools::Itertools;
use rusqlite::{Connection, TransactionBehavior};

use crate::errors::{FieldErrors, WebError, WebResult};
use crate::images;
use crate::models::{Image, Ingredient, Recipe, Tag, User};

const MAX_NAME_LEN: usize = 200;
/// Amounts and cooking times are small integers; this also keeps cart sums in range.
const MAX_QUANTITY: i64 = 32_767;

/// Check everything about a draft that can be checked without the store,
/// and decode its image if one came along.
fn check_draft(draft: &RecipeDraft, errors: &mut FieldErrors, require_image: bool) -> Option<Vec<u8>> {
    let name = draft.name.trim();
    if name.is_empty() {
        errors.add("name", "This field is required.");
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.add("name", "Ensure this field has no more than 200 characters.");
    }
    if draft.text.trim().is_empty() {
        errors.add("text", "This field is required.");
    }
    if draft.cooking_time < 1 {
        errors.add("cooking_time", "Cooking time must be at least 1 minute.");
    } else if draft.cooking_time > MAX_QUANTITY {
        errors.add("cooking_time", "Cooking time must be at most 32767 minutes.");
    }

    if draft.tags.is_empty() {
        errors.add("tags", "At least one tag is required.");
    } else if !draft.tags.iter().all_unique() {
        errors.add("tags", "Tags must be unique.");
    }

    if draft.ingredients.is_empty() {
        errors.add("ingredients", "At least one ingredient is required.");
    } else {
        if draft.ingredients.iter().any(|i| i.amount < 1) {
            errors.add("ingredients", "Amount must be at least 1.");
        }
        if draft.ingredients.iter().any(|i| i.amount > MAX_QUANTITY) {
            errors.add("ingredients", "Amount must be at most 32767.");
        }
        if !draft.ingredients.iter().map(|i| i.id).all_unique() {
            errors.add("ingredients", "Ingredients must be unique.");
        }
    }

    match &draft.image {
        Some(data) if !data.trim().is_empty() => match images::decode_upload(data) {
            Ok(bytes) => return Some(bytes),
            Err(e) => {
                tracing::info!("Rejected recipe image: {:#}", e);
                errors.add("image", "Upload a valid image.");
            }
        },
        _ if require_image => errors.add("image", "This field is required."),
        _ => {}
    }
    None
}

/// Check that every referenced tag and ingredient exists.
fn check_references(conn: &Connection, draft: &RecipeDraft, errors: &mut FieldErrors) -> rusqlite::Result<()> {
    let known_tags = Tag::existing_ids(conn, &draft.tags)?;
    for id in draft.tags.iter().filter(|id| !known_tags.contains(id)).unique() {
        errors.add("tags", format!("Invalid pk \"{}\" - object does not exist.", id));
    }
    let ingredient_ids = draft.ingredients.iter().map(|i| i.id).collect_vec();
    let known_ingredients = Ingredient::existing_ids(conn, &ingredient_ids)?;
    for id in ingredient_ids.iter().filter(|id| !known_ingredients.contains(id)).unique() {
        errors.add("ingredients", format!("Invalid pk \"{}\" - object does not exist.", id));
    }
    Ok(())
}

/// Write the tag set and ingredient set of a recipe, replacing whatever was there.
fn write_associations(conn: &Connection, recipe_id: i64, draft: &RecipeDraft) -> rusqlite::Result<()> {
    Recipe::set_tags(conn, recipe_id, &draft.tags)?;
    Recipe::set_ingredients(conn, recipe_id, &draft.ingredients)
}

/// Validate a draft and create the recipe, its tags, ingredient amounts and image
/// in one transaction. Nothing is written if validation fails.
pub fn create_recipe(conn: &mut Connection, author: &User, draft: &RecipeDraft) -> WebResult<i64> {
    let mut errors = FieldErrors::default();
    let image = check_draft(draft, &mut errors, true);

    let tx = conn.transaction()?;
    check_references(&tx, draft, &mut errors)?;
    errors.into_result()?;

    let recipe_id = Recipe::push(
        &tx,
        author.id,
        draft.name.trim(),
        &draft.text,
        draft.cooking_time,
    )?;
    write_associations(&tx, recipe_id, draft)?;
    if let Some(bytes) = image {
        Image::put(&tx, recipe_id, &bytes)?;
    }
    tx.commit()?;
    tracing::info!(
        recipe_id,
        author_id = author.id,
        tags = draft.tags.len(),
        ingredients = draft.ingredients.len(),
        "Created recipe"
    );
    Ok(recipe_id)
}

/// Validate a draft and apply it to an existing recipe. Tags and ingredients are
/// cleared and rewritten, not merged. The image is only replaced when given.
pub fn update_recipe(
    conn: &mut Connection,
    editor: &User,
    recipe_id: i64,
    draft: &RecipeDraft,
) -> WebResult<()> {
    let mut errors = FieldErrors::default();
    let image = check_draft(draft, &mut errors, false);

    // Take the write lock before looking the recipe up, so it cannot vanish in between
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let recipe = Recipe::get_by_id(&tx, recipe_id)?.ok_or(WebError::NotFound)?;
    ensure_can_edit(editor, &recipe)?;
    check_references(&tx, draft, &mut errors)?;
    errors.into_result()?;

    Recipe::update_scalars(
        &tx,
        recipe_id,
        draft.name.trim(),
        &draft.text,
        draft.cooking_time,
    )?;
    write_associations(&tx, recipe_id, draft)?;
    if let Some(bytes) = image {
        Image::put(&tx, recipe_id, &bytes)?;
    }
    tx.commit()?;
    tracing::info!(recipe_id, editor_id = editor.id, "Updated recipe");
    Ok(())
}

pub fn delete_recipe(conn: &Connection, editor: &User, recipe_id: i64) -> WebResult<()> {
    let recipe = Recipe::get_by_id(conn, recipe_id)?.ok_or(WebError::NotFound)?;
    ensure_can_edit(editor, &recipe)?;
    Recipe::delete(conn, recipe_id)?;
    tracing::info!(recipe_id, editor_id = editor.id, "Deleted recipe");
    Ok(())
}

/// Only the author or an administrator may change a recipe.
fn ensure_can_edit(editor: &User, recipe: &Recipe) -> WebResult<()> {
    if editor.is_admin || editor.id == recipe.author_id {
        Ok(())
    } else {
        Err(WebError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use crate::views::RecipeView;
    use fg::basic_models::IngredientAmount;

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn create_then_read_back_has_every_tag_and_ingredient() {
        let (_dir, db) = fresh_db();
        let mut conn = db.conn().unwrap();
        let author = make_user(&conn, "chef");
        let breakfast = make_tag(&conn, "breakfast");
        let dinner = make_tag(&conn, "dinner");
        let flour = make_ingredient(&conn, "flour", "g");
        let milk = make_ingredient(&conn, "milk", "ml");
        let eggs = make_ingredient(&conn, "eggs", "pcs");

        let draft = draft_with(
            &[breakfast, dinner],
            &[(flour, 200), (milk, 300), (eggs, 2)],
        );
        let recipe_id = create_recipe(&mut conn, &author, &draft).unwrap();

        let view = RecipeView::load(&conn, recipe_id, Some(author.id), "").unwrap().unwrap();
        assert_eq!(view.tags.len(), 2);
        assert_eq!(view.ingredients.len(), 3);
        assert_eq!(view.author.username, "chef");
        // Ingredients come back resolved, in name order
        assert_eq!(view.ingredients[0].name, "eggs");
        assert_eq!(view.ingredients[0].measurement_unit, "pcs");
        assert_eq!(view.ingredients[0].amount, 2);
        assert!(Image::get_image(&conn, recipe_id).unwrap().is_some());
    }

    #[test]
    fn update_replaces_ingredients_instead_of_merging() {
        let (_dir, db) = fresh_db();
        let mut conn = db.conn().unwrap();
        let author = make_user(&conn, "chef");
        let tag = make_tag(&conn, "lunch");
        let other_tag = make_tag(&conn, "soup");
        let flour = make_ingredient(&conn, "flour", "g");
        let milk = make_ingredient(&conn, "milk", "ml");
        let beet = make_ingredient(&conn, "beet", "g");
        let recipe_id =
            create_recipe(&mut conn, &author, &draft_with(&[tag], &[(flour, 1), (milk, 2)])).unwrap();

        let mut update = draft_with(&[other_tag], &[(beet, 5)]);
        update.image = None;
        update.name = "Borscht".into();
        update_recipe(&mut conn, &author, recipe_id, &update).unwrap();

        let view = RecipeView::load(&conn, recipe_id, None, "").unwrap().unwrap();
        assert_eq!(view.name, "Borscht");
        assert_eq!(view.tags.iter().map(|t| t.id).collect_vec(), vec![other_tag]);
        assert_eq!(view.ingredients.iter().map(|i| (i.id, i.amount)).collect_vec(), vec![(beet, 5)]);
        assert_eq!(count(&conn, "ingredient_recipe"), 1);
        assert_eq!(count(&conn, "recipe_tag"), 1);
        // The image was not part of the update, so the old one stays
        assert!(Image::get_image(&conn, recipe_id).unwrap().is_some());
    }

    #[test]
    fn zero_amount_is_rejected_and_nothing_is_written() {
        let (_dir, db) = fresh_db();
        let mut conn = db.conn().unwrap();
        let author = make_user(&conn, "chef");
        let tag = make_tag(&conn, "lunch");
        let flour = make_ingredient(&conn, "flour", "g");

        let result = create_recipe(&mut conn, &author, &draft_with(&[tag], &[(flour, 0)]));
        let Err(WebError::Validation(errors)) = result else {
            panic!("expected a validation error");
        };
        assert!(errors.get("ingredients").is_some());
        assert_eq!(count(&conn, "recipe"), 0);
        assert_eq!(count(&conn, "ingredient_recipe"), 0);
    }

    #[test]
    fn oversized_quantities_are_rejected() {
        let (_dir, db) = fresh_db();
        let mut conn = db.conn().unwrap();
        let author = make_user(&conn, "chef");
        let tag = make_tag(&conn, "lunch");
        let flour = make_ingredient(&conn, "flour", "g");

        let mut draft = draft_with(&[tag], &[(flour, i64::MAX / 2 + 1)]);
        draft.cooking_time = 40_000;
        let Err(WebError::Validation(errors)) = create_recipe(&mut conn, &author, &draft) else {
            panic!("expected a validation error");
        };
        assert_eq!(errors.get("ingredients").unwrap(), ["Amount must be at most 32767."]);
        assert!(errors.get("cooking_time").is_some());
        assert_eq!(count(&conn, "recipe"), 0);

        // The largest allowed amount still goes through
        let largest = draft_with(&[tag], &[(flour, 32_767)]);
        let recipe_id = create_recipe(&mut conn, &author, &largest).unwrap();
        assert!(Recipe::get_by_id(&conn, recipe_id).unwrap().is_some());
    }

    #[test]
    fn updating_a_missing_recipe_is_not_found() {
        let (_dir, db) = fresh_db();
        let mut conn = db.conn().unwrap();
        let author = make_user(&conn, "chef");
        let recipe_id = make_simple_recipe(&mut conn, &author);
        let tag = make_tag(&conn, "breakfast");
        let flour = make_ingredient(&conn, "flour", "g");
        delete_recipe(&conn, &author, recipe_id).unwrap();

        let result = update_recipe(&mut conn, &author, recipe_id, &draft_with(&[tag], &[(flour, 5)]));
        assert!(matches!(result, Err(WebError::NotFound)));
        assert_eq!(count(&conn, "ingredient_recipe"), 0);
    }

    #[test]
    fn duplicate_ingredient_is_rejected_and_nothing_is_written() {
        let (_dir, db) = fresh_db();
        let mut conn = db.conn().unwrap();
        let author = make_user(&conn, "chef");
        let tag = make_tag(&conn, "lunch");
        let flour = make_ingredient(&conn, "flour", "g");

        let result = create_recipe(&mut conn, &author, &draft_with(&[tag], &[(flour, 1), (flour, 2)]));
        assert!(matches!(result, Err(WebError::Validation(_))));
        assert_eq!(count(&conn, "recipe"), 0);
    }

    #[test]
    fn empty_sets_and_bad_scalars_are_reported_per_field() {
        let (_dir, db) = fresh_db();
        let mut conn = db.conn().unwrap();
        let author = make_user(&conn, "chef");
        let draft = RecipeDraft {
            tags: vec![],
            ingredients: vec![],
            name: " ".into(),
            image: None,
            text: "".into(),
            cooking_time: 0,
        };
        let Err(WebError::Validation(errors)) = create_recipe(&mut conn, &author, &draft) else {
            panic!("expected a validation error");
        };
        for field in ["tags", "ingredients", "name", "text", "cooking_time", "image"] {
            assert!(errors.get(field).is_some(), "no error for {field}");
        }
    }

    #[test]
    fn unknown_references_are_rejected() {
        let (_dir, db) = fresh_db();
        let mut conn = db.conn().unwrap();
        let author = make_user(&conn, "chef");
        let tag = make_tag(&conn, "lunch");
        let flour = make_ingredient(&conn, "flour", "g");
        let mut draft = draft_with(&[tag, 999], &[(flour, 1)]);
        draft.ingredients.push(IngredientAmount { id: 777, amount: 1 });
        let Err(WebError::Validation(errors)) = create_recipe(&mut conn, &author, &draft) else {
            panic!("expected a validation error");
        };
        assert_eq!(errors.get("tags").unwrap().len(), 1);
        assert!(errors.get("ingredients").unwrap()[0].contains("777"));
    }

    #[test]
    fn failed_update_keeps_the_old_recipe() {
        let (_dir, db) = fresh_db();
        let mut conn = db.conn().unwrap();
        let author = make_user(&conn, "chef");
        let tag = make_tag(&conn, "lunch");
        let flour = make_ingredient(&conn, "flour", "g");
        let recipe_id = create_recipe(&mut conn, &author, &draft_with(&[tag], &[(flour, 3)])).unwrap();

        let bad = draft_with(&[tag], &[(flour, 1), (flour, 1)]);
        assert!(update_recipe(&mut conn, &author, recipe_id, &bad).is_err());
        let view = RecipeView::load(&conn, recipe_id, None, "").unwrap().unwrap();
        assert_eq!(view.ingredients[0].amount, 3);
    }

    #[test]
    fn only_author_or_admin_may_edit() {
        let (_dir, db) = fresh_db();
        let mut conn = db.conn().unwrap();
        let author = make_user(&conn, "chef");
        let stranger = make_user(&conn, "stranger");
        let admin = make_admin(&conn, "boss");
        let recipe_id = make_simple_recipe(&mut conn, &author);
        let tag = make_tag(&conn, "other");
        let salt = make_ingredient(&conn, "salt", "g");
        let mut draft = draft_with(&[tag], &[(salt, 1)]);
        draft.image = None;

        assert!(matches!(
            update_recipe(&mut conn, &stranger, recipe_id, &draft),
            Err(WebError::Forbidden)
        ));
        assert!(matches!(
            delete_recipe(&conn, &stranger, recipe_id),
            Err(WebError::Forbidden)
        ));
        update_recipe(&mut conn, &admin, recipe_id, &draft).unwrap();
        delete_recipe(&conn, &author, recipe_id).unwrap();
        assert_eq!(count(&conn, "ingredient_recipe"), 0);
        assert!(matches!(
            delete_recipe(&conn, &author, recipe_id),
            Err(WebError::NotFound)
        ));
    }
}
