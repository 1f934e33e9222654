//! Client-side mirror of the server-owned cart.
//!
//! A [`Cart`] holds one [`CartRecipe`] per recipe id. Every recipe carries its
//! own ingredient lines ([`CartItem`]), but item ids live in a single flat
//! namespace across the whole cart, so an item can be found without knowing
//! its owning recipe.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_newtype!(
    /// Stable external identifier of a recipe. Unique within a cart.
    RecipeId
);
id_newtype!(
    /// Identifier of a cart line. Unique across all recipes of a cart.
    ItemId
);
id_newtype!(
    /// Reference to the ingredient template on the original recipe.
    ///
    /// The server links every cart line to one of these; it is the only way
    /// to recreate a line after it has been deleted.
    IngredientRef
);

/// A single ingredient line in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Cart-wide unique line id.
    pub id: ItemId,
    /// Display name, e.g. `"flour"`.
    pub name: String,
    /// Non-negative amount, already scaled to the recipe's serving size.
    pub quantity: f64,
    /// Unit of `quantity`, e.g. `"cup"`. May be empty.
    #[serde(default)]
    pub unit: String,
    /// Back-reference to the recipe's ingredient template.
    #[serde(default)]
    pub recipe_ingredient_id: Option<IngredientRef>,
}

impl CartItem {
    /// Whether this line carries enough linkage to be recreated server-side.
    #[must_use]
    pub fn is_restorable(&self) -> bool {
        self.recipe_ingredient_id.is_some()
    }
}

/// A recipe placed in the cart at a given serving size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartRecipe {
    pub recipe_id: RecipeId,
    pub name: String,
    /// Multiplier applied to the recipe's template quantities.
    pub serving_size: f64,
    #[serde(default, rename = "ingredients")]
    pub items: Vec<CartItem>,
}

impl CartRecipe {
    /// Create an entry with no ingredient lines.
    pub fn new(recipe_id: RecipeId, name: impl Into<String>, serving_size: f64) -> Self {
        Self {
            recipe_id,
            name: name.into(),
            serving_size,
            items: Vec::new(),
        }
    }

    /// Builder-style helper to attach a line.
    #[must_use]
    pub fn with_item(mut self, item: CartItem) -> Self {
        self.items.push(item);
        self
    }

    /// Look up a line of this recipe by id.
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Ids of every line of this recipe.
    pub fn item_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.iter().map(|item| item.id)
    }
}

/// The root aggregate: every recipe currently in the cart.
///
/// The client never invents a cart on its own; instances come from the
/// gateway and are then patched by optimistic mutations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "CartWire", into = "CartWire")]
pub struct Cart {
    recipes: BTreeMap<RecipeId, CartRecipe>,
}

/// Wire shape: `{"recipes": [...]}`.
#[derive(Serialize, Deserialize)]
struct CartWire {
    #[serde(default)]
    recipes: Vec<CartRecipe>,
}

impl From<CartWire> for Cart {
    fn from(wire: CartWire) -> Self {
        Self::from_recipes(wire.recipes)
    }
}

impl From<Cart> for CartWire {
    fn from(cart: Cart) -> Self {
        Self {
            recipes: cart.recipes.into_values().collect(),
        }
    }
}

impl Cart {
    /// An empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from recipe entries. Later duplicates replace earlier ones.
    pub fn from_recipes(recipes: impl IntoIterator<Item = CartRecipe>) -> Self {
        Self {
            recipes: recipes.into_iter().map(|r| (r.recipe_id, r)).collect(),
        }
    }

    /// Number of recipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Total number of lines across all recipes.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.recipes.values().map(|r| r.items.len()).sum()
    }

    /// Iterate over recipes in id order.
    pub fn recipes(&self) -> impl Iterator<Item = &CartRecipe> {
        self.recipes.values()
    }

    /// Iterate over every line together with its owning recipe id.
    pub fn items(&self) -> impl Iterator<Item = (RecipeId, &CartItem)> {
        self.recipes
            .values()
            .flat_map(|r| r.items.iter().map(move |item| (r.recipe_id, item)))
    }

    #[must_use]
    pub fn recipe(&self, id: RecipeId) -> Option<&CartRecipe> {
        self.recipes.get(&id)
    }

    pub fn recipe_mut(&mut self, id: RecipeId) -> Option<&mut CartRecipe> {
        self.recipes.get_mut(&id)
    }

    #[must_use]
    pub fn contains_recipe(&self, id: RecipeId) -> bool {
        self.recipes.contains_key(&id)
    }

    /// Insert or replace a recipe entry, returning the replaced one.
    pub fn insert_recipe(&mut self, recipe: CartRecipe) -> Option<CartRecipe> {
        self.recipes.insert(recipe.recipe_id, recipe)
    }

    /// Remove a recipe together with all of its lines.
    pub fn remove_recipe(&mut self, id: RecipeId) -> Option<CartRecipe> {
        self.recipes.remove(&id)
    }

    /// Find a line anywhere in the cart.
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<(RecipeId, &CartItem)> {
        self.items().find(|(_, item)| item.id == id)
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut CartItem> {
        self.recipes
            .values_mut()
            .flat_map(|r| r.items.iter_mut())
            .find(|item| item.id == id)
    }

    /// Recipe that currently owns the given line.
    #[must_use]
    pub fn owner_of(&self, id: ItemId) -> Option<RecipeId> {
        self.item(id).map(|(recipe_id, _)| recipe_id)
    }

    /// Remove a line, returning it with its former owner.
    pub fn remove_item(&mut self, id: ItemId) -> Option<(RecipeId, CartItem)> {
        self.recipes.values_mut().find_map(|r| {
            let pos = r.items.iter().position(|item| item.id == id)?;
            Some((r.recipe_id, r.items.remove(pos)))
        })
    }

    /// Attach a line to an existing recipe.
    ///
    /// Refused (returns `false`) when the recipe is absent or the id is
    /// already taken somewhere in the cart.
    pub fn insert_item(&mut self, recipe_id: RecipeId, item: CartItem) -> bool {
        if self.item(item.id).is_some() {
            return false;
        }
        match self.recipes.get_mut(&recipe_id) {
            Some(recipe) => {
                recipe.items.push(item);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, name: &str, quantity: f64) -> CartItem {
        CartItem {
            id: ItemId(id),
            name: name.to_string(),
            quantity,
            unit: "cup".to_string(),
            recipe_ingredient_id: Some(IngredientRef(id + 100)),
        }
    }

    fn sample() -> Cart {
        Cart::from_recipes([
            CartRecipe::new(RecipeId(1), "bread", 1.0)
                .with_item(item(10, "flour", 2.0))
                .with_item(item(11, "water", 1.0)),
            CartRecipe::new(RecipeId(2), "cake", 2.0).with_item(item(20, "flour", 1.0)),
        ])
    }

    #[test]
    fn item_lookup_is_cart_wide() {
        let cart = sample();
        assert_eq!(cart.owner_of(ItemId(20)), Some(RecipeId(2)));
        assert_eq!(cart.owner_of(ItemId(11)), Some(RecipeId(1)));
        assert_eq!(cart.owner_of(ItemId(99)), None);
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn remove_recipe_drops_its_lines() {
        let mut cart = sample();
        let removed = cart.remove_recipe(RecipeId(1)).unwrap();
        assert_eq!(removed.items.len(), 2);
        assert!(cart.item(ItemId(10)).is_none());
        assert!(cart.item(ItemId(11)).is_none());
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn remove_item_reports_owner() {
        let mut cart = sample();
        let (owner, removed) = cart.remove_item(ItemId(11)).unwrap();
        assert_eq!(owner, RecipeId(1));
        assert_eq!(removed.name, "water");
        assert!(cart.remove_item(ItemId(11)).is_none());
    }

    #[test]
    fn insert_item_rejects_duplicate_ids_and_missing_recipes() {
        let mut cart = sample();
        assert!(!cart.insert_item(RecipeId(2), item(10, "dup", 1.0)));
        assert!(!cart.insert_item(RecipeId(9), item(30, "salt", 1.0)));
        assert!(cart.insert_item(RecipeId(2), item(30, "salt", 1.0)));
        assert_eq!(cart.owner_of(ItemId(30)), Some(RecipeId(2)));
    }

    #[test]
    fn wire_format_matches_server_payload() {
        let json = r#"{
            "recipes": [{
                "recipe_id": 7,
                "name": "omelette",
                "serving_size": 2.0,
                "ingredients": [
                    {"id": 1, "name": "egg", "quantity": 2.0, "unit": "ea", "recipe_ingredient_id": 50},
                    {"id": 2, "name": "salt", "quantity": 0.5}
                ]
            }]
        }"#;
        let cart: Cart = serde_json::from_str(json).unwrap();
        let recipe = cart.recipe(RecipeId(7)).unwrap();
        assert_eq!(recipe.items.len(), 2);
        assert_eq!(recipe.items[0].recipe_ingredient_id, Some(IngredientRef(50)));
        assert_eq!(recipe.items[1].unit, "");
        assert!(!recipe.items[1].is_restorable());

        let back: Cart = serde_json::from_str(&serde_json::to_string(&cart).unwrap()).unwrap();
        assert_eq!(back, cart);
    }
}
