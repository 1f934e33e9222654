//! Merged shopping list across every recipe in the cart.
//!
//! Lines with the same name and unit collapse into one row whose quantity is
//! the sum of its parts. Each row keeps the ids of the lines it came from, so
//! removing a row can be turned back into removals of those lines.
//!
//! Always derived from a snapshot; nothing here is cached.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{Cart, ItemId, RecipeId};

/// One cart line contributing to a consolidated row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ItemSource {
    pub recipe_id: RecipeId,
    pub item_id: ItemId,
    pub quantity: f64,
}

/// A merged row of the shopping list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedIngredient {
    /// Spelling of the first contributing line.
    pub name: String,
    pub unit: String,
    pub quantity: f64,
    pub sources: Vec<ItemSource>,
}

impl ConsolidatedIngredient {
    /// Ids of every contributing line.
    #[must_use]
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.sources.iter().map(|s| s.item_id).collect()
    }

    /// Distinct recipes contributing to this row, in id order.
    #[must_use]
    pub fn recipe_ids(&self) -> Vec<RecipeId> {
        let mut ids: Vec<_> = self.sources.iter().map(|s| s.recipe_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

fn merge_key(name: &str, unit: &str) -> (String, String) {
    (
        name.trim().to_ascii_lowercase(),
        unit.trim().to_ascii_lowercase(),
    )
}

/// Group every line of `cart` by (name, unit) and sum the quantities.
///
/// Rows come back ordered by their normalized name, then unit.
#[must_use]
pub fn consolidate(cart: &Cart) -> Vec<ConsolidatedIngredient> {
    let mut rows: BTreeMap<(String, String), ConsolidatedIngredient> = BTreeMap::new();

    for (recipe_id, item) in cart.items() {
        let row = rows
            .entry(merge_key(&item.name, &item.unit))
            .or_insert_with(|| ConsolidatedIngredient {
                name: item.name.trim().to_string(),
                unit: item.unit.trim().to_string(),
                quantity: 0.0,
                sources: Vec::new(),
            });
        row.quantity += item.quantity;
        row.sources.push(ItemSource {
            recipe_id,
            item_id: item.id,
            quantity: item.quantity,
        });
    }

    rows.into_values().collect()
}
