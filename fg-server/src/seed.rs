use std::path::Path;

use anyhow::{Context, Result};
use fg::basic_models::IngredientSeed;
use rusqlite::Connection;

use crate::models::Ingredient;

/// Load the ingredient catalog from a JSON array of `{name, measurement_unit}`.
///
/// Pairs already in the catalog are skipped, so loading the same file twice is
/// harmless. Returns how many ingredients were added.
pub fn load_ingredients(conn: &mut Connection, path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Reading ingredients from {}", path.display()))?;
    let seeds: Vec<IngredientSeed> =
        serde_json::from_str(&raw).context("Parsing ingredients file")?;

    let tx = conn.transaction()?;
    let mut added = 0;
    for seed in seeds {
        let seed = IngredientSeed {
            name: seed.name.trim().to_lowercase(),
            measurement_unit: seed.measurement_unit.trim().to_lowercase(),
        };
        if seed.name.is_empty() || seed.measurement_unit.is_empty() {
            tracing::warn!("Skipping incomplete ingredient {:?}", seed);
            continue;
        }
        if Ingredient::push_if_absent(&tx, &seed)? {
            added += 1;
        }
    }
    tx.commit()?;
    tracing::info!("Loaded {} new ingredients from {}", added, path.display());
    Ok(added)
}
