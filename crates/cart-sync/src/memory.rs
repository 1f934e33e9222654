use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::gateway::{CartGateway, GatewayError};
use crate::model::{Cart, CartItem, CartRecipe, IngredientRef, ItemId, RecipeId};

/// One ingredient on a recipe definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientTemplate {
    pub id: IngredientRef,
    pub name: String,
    /// Amount for a serving size of 1.
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
}

/// A recipe definition the cart can be seeded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeTemplate {
    pub id: RecipeId,
    pub name: String,
    #[serde(default)]
    pub ingredients: Vec<IngredientTemplate>,
}

impl RecipeTemplate {
    pub fn new(id: RecipeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ingredients: Vec::new(),
        }
    }

    /// Builder-style helper to append an ingredient.
    #[must_use]
    pub fn ingredient(
        mut self,
        id: IngredientRef,
        name: impl Into<String>,
        quantity: f64,
        unit: impl Into<String>,
    ) -> Self {
        self.ingredients.push(IngredientTemplate {
            id,
            name: name.into(),
            quantity,
            unit: unit.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredRecipe {
    recipe_id: RecipeId,
    serving_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredItem {
    id: ItemId,
    recipe_id: RecipeId,
    recipe_ingredient_id: IngredientRef,
    name: String,
    quantity: f64,
    unit: String,
}

/// Server-side cart state, as the remote service would keep it.
///
/// Lines are stored flat with a cart-wide id counter; recipes only record
/// their serving size. Serializable so tools can keep it in a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCart {
    #[serde(default)]
    catalog: Vec<RecipeTemplate>,
    #[serde(default)]
    recipes: Vec<StoredRecipe>,
    #[serde(default)]
    items: Vec<StoredItem>,
    #[serde(default)]
    next_item_id: u64,
}

impl ServerCart {
    /// An empty cart that knows the given recipe definitions.
    pub fn with_catalog(catalog: impl IntoIterator<Item = RecipeTemplate>) -> Self {
        Self {
            catalog: catalog.into_iter().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn template(&self, id: RecipeId) -> Option<&RecipeTemplate> {
        self.catalog.iter().find(|t| t.id == id)
    }

    /// Recipe definitions the server can add, in registration order.
    pub fn catalog(&self) -> &[RecipeTemplate] {
        &self.catalog
    }

    fn stored_recipe_mut(&mut self, id: RecipeId) -> Result<&mut StoredRecipe, GatewayError> {
        self.recipes
            .iter_mut()
            .find(|r| r.recipe_id == id)
            .ok_or_else(|| GatewayError::NotFound(format!("recipe {id} in cart")))
    }

    fn stored_item_mut(&mut self, id: ItemId) -> Result<&mut StoredItem, GatewayError> {
        self.items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| GatewayError::NotFound(format!("item {id}")))
    }

    fn allocate_item_id(&mut self) -> ItemId {
        let floor = self.items.iter().map(|i| i.id.0).max().unwrap_or(0) + 1;
        let id = self.next_item_id.max(floor);
        self.next_item_id = id + 1;
        ItemId(id)
    }

    /// Render the cart the way a read request returns it.
    #[must_use]
    pub fn read(&self) -> Cart {
        Cart::from_recipes(self.recipes.iter().map(|stored| {
            let name = self
                .template(stored.recipe_id)
                .map(|t| t.name.clone())
                .unwrap_or_default();
            let items = self
                .items
                .iter()
                .filter(|i| i.recipe_id == stored.recipe_id)
                .map(|i| CartItem {
                    id: i.id,
                    name: i.name.clone(),
                    quantity: i.quantity,
                    unit: i.unit.clone(),
                    recipe_ingredient_id: Some(i.recipe_ingredient_id),
                })
                .collect();
            CartRecipe {
                recipe_id: stored.recipe_id,
                name,
                serving_size: stored.serving_size,
                items,
            }
        }))
    }

    /// Add a recipe and seed one line per template ingredient, scaled by
    /// `serving_size`.
    pub fn add_recipe(&mut self, id: RecipeId, serving_size: f64) -> Result<(), GatewayError> {
        let template = self
            .template(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("recipe {id}")))?;
        if self.recipes.iter().any(|r| r.recipe_id == id) {
            return Err(GatewayError::Rejected(format!("recipe {id} already in cart")));
        }

        self.recipes.push(StoredRecipe {
            recipe_id: id,
            serving_size,
        });
        for ingredient in template.ingredients {
            let item_id = self.allocate_item_id();
            self.items.push(StoredItem {
                id: item_id,
                recipe_id: id,
                recipe_ingredient_id: ingredient.id,
                name: ingredient.name,
                quantity: ingredient.quantity * serving_size,
                unit: ingredient.unit,
            });
        }
        Ok(())
    }

    pub fn remove_recipe(&mut self, id: RecipeId) -> Result<(), GatewayError> {
        self.stored_recipe_mut(id)?;
        self.items.retain(|i| i.recipe_id != id);
        self.recipes.retain(|r| r.recipe_id != id);
        Ok(())
    }

    /// Change the serving size and rescale every line of the recipe.
    pub fn set_serving_size(&mut self, id: RecipeId, serving_size: f64) -> Result<(), GatewayError> {
        let stored = self.stored_recipe_mut(id)?;
        let previous = stored.serving_size;
        stored.serving_size = serving_size;

        if previous > 0.0 {
            let factor = serving_size / previous;
            for item in self.items.iter_mut().filter(|i| i.recipe_id == id) {
                item.quantity *= factor;
            }
        }
        Ok(())
    }

    /// Add a line for one of the recipe's template ingredients. A line that
    /// already links to the same ingredient absorbs the quantity instead.
    pub fn add_item(
        &mut self,
        recipe_id: RecipeId,
        ingredient_id: IngredientRef,
        quantity: f64,
    ) -> Result<(), GatewayError> {
        self.stored_recipe_mut(recipe_id)?;
        let ingredient = self
            .template(recipe_id)
            .and_then(|t| t.ingredients.iter().find(|i| i.id == ingredient_id))
            .cloned()
            .ok_or_else(|| {
                GatewayError::NotFound(format!("ingredient {ingredient_id} of recipe {recipe_id}"))
            })?;

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|i| i.recipe_id == recipe_id && i.recipe_ingredient_id == ingredient_id)
        {
            existing.quantity += quantity;
            return Ok(());
        }

        let id = self.allocate_item_id();
        self.items.push(StoredItem {
            id,
            recipe_id,
            recipe_ingredient_id: ingredient_id,
            name: ingredient.name,
            quantity,
            unit: ingredient.unit,
        });
        Ok(())
    }

    pub fn remove_item(&mut self, id: ItemId) -> Result<(), GatewayError> {
        self.stored_item_mut(id)?;
        self.items.retain(|i| i.id != id);
        Ok(())
    }

    pub fn set_item_quantity(&mut self, id: ItemId, quantity: f64) -> Result<(), GatewayError> {
        self.stored_item_mut(id)?.quantity = quantity;
        Ok(())
    }
}

/// Kind of gateway request, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GatewayOp {
    ReadCart,
    AddRecipe,
    RemoveRecipe,
    SetServingSize,
    AddItem,
    RemoveItem,
    SetItemQuantity,
}

/// A request received by [`MemoryGateway`], with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    ReadCart,
    AddRecipe {
        recipe_id: RecipeId,
        serving_size: f64,
    },
    RemoveRecipe {
        recipe_id: RecipeId,
    },
    SetServingSize {
        recipe_id: RecipeId,
        serving_size: f64,
    },
    AddItem {
        recipe_id: RecipeId,
        recipe_ingredient_id: IngredientRef,
        quantity: f64,
    },
    RemoveItem {
        item_id: ItemId,
    },
    SetItemQuantity {
        item_id: ItemId,
        quantity: f64,
    },
}

impl GatewayCall {
    #[must_use]
    pub fn op(&self) -> GatewayOp {
        match self {
            Self::ReadCart => GatewayOp::ReadCart,
            Self::AddRecipe { .. } => GatewayOp::AddRecipe,
            Self::RemoveRecipe { .. } => GatewayOp::RemoveRecipe,
            Self::SetServingSize { .. } => GatewayOp::SetServingSize,
            Self::AddItem { .. } => GatewayOp::AddItem,
            Self::RemoveItem { .. } => GatewayOp::RemoveItem,
            Self::SetItemQuantity { .. } => GatewayOp::SetItemQuantity,
        }
    }

    /// `true` for everything except [`GatewayCall::ReadCart`].
    #[must_use]
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::ReadCart)
    }
}

type CallPredicate = Box<dyn Fn(&GatewayCall) -> bool + Send + Sync>;

#[derive(Default)]
struct Faults {
    fail_next: usize,
    ops: BTreeSet<GatewayOp>,
    predicates: Vec<CallPredicate>,
}

impl Faults {
    fn should_fail(&mut self, call: &GatewayCall) -> bool {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return true;
        }
        self.ops.contains(&call.op()) || self.predicates.iter().any(|p| p(call))
    }
}

/// In-process gateway backed by a [`ServerCart`].
///
/// Behaves like the remote service, records every request it receives and
/// can be told to fail. Ideal for testing and prototyping.
///
/// # Example
///
/// ```
/// use cart_sync::{IngredientRef, MemoryGateway, RecipeId, RecipeTemplate};
///
/// let gateway = MemoryGateway::with_catalog([
///     RecipeTemplate::new(RecipeId(1), "pancakes")
///         .ingredient(IngredientRef(10), "flour", 1.0, "cup"),
/// ]);
/// gateway.with_state(|s| s.add_recipe(RecipeId(1), 2.0)).unwrap();
///
/// let cart = gateway.cart();
/// assert_eq!(cart.recipe(RecipeId(1)).unwrap().items[0].quantity, 2.0);
/// assert!(gateway.calls().is_empty());
/// ```
#[derive(Default)]
pub struct MemoryGateway {
    state: Mutex<ServerCart>,
    calls: Mutex<Vec<GatewayCall>>,
    faults: Mutex<Faults>,
}

impl fmt::Debug for MemoryGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryGateway")
            .field("state", &*self.state.lock())
            .field("calls", &self.calls.lock().len())
            .finish_non_exhaustive()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: impl IntoIterator<Item = RecipeTemplate>) -> Self {
        Self::from_state(ServerCart::with_catalog(catalog))
    }

    pub fn from_state(state: ServerCart) -> Self {
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    /// Copy of the server-side state.
    #[must_use]
    pub fn state(&self) -> ServerCart {
        self.state.lock().clone()
    }

    /// Run `f` directly against the server state. Not recorded as a call
    /// and never subject to injected failures.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut ServerCart) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// What a read would return, without recording a call.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.state.lock().read()
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    /// Requests received so far, excluding reads.
    #[must_use]
    pub fn writes(&self) -> Vec<GatewayCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Fail the next `n` requests, whatever they are.
    pub fn fail_next(&self, n: usize) {
        self.faults.lock().fail_next = n;
    }

    /// Fail every request of the given kind until cleared.
    pub fn fail_on(&self, op: GatewayOp) {
        self.faults.lock().ops.insert(op);
    }

    /// Fail every request matching `predicate` until cleared.
    pub fn fail_when(&self, predicate: impl Fn(&GatewayCall) -> bool + Send + Sync + 'static) {
        self.faults.lock().predicates.push(Box::new(predicate));
    }

    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
    }

    fn admit(&self, call: GatewayCall) -> Result<(), GatewayError> {
        let fail = self.faults.lock().should_fail(&call);
        self.calls.lock().push(call);
        if fail {
            Err(GatewayError::Transport("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CartGateway for MemoryGateway {
    async fn read_cart(&self) -> Result<Cart, GatewayError> {
        self.admit(GatewayCall::ReadCart)?;
        Ok(self.state.lock().read())
    }

    async fn add_recipe(
        &self,
        recipe_id: RecipeId,
        serving_size: f64,
    ) -> Result<(), GatewayError> {
        self.admit(GatewayCall::AddRecipe {
            recipe_id,
            serving_size,
        })?;
        self.state.lock().add_recipe(recipe_id, serving_size)
    }

    async fn remove_recipe(&self, recipe_id: RecipeId) -> Result<(), GatewayError> {
        self.admit(GatewayCall::RemoveRecipe { recipe_id })?;
        self.state.lock().remove_recipe(recipe_id)
    }

    async fn set_serving_size(
        &self,
        recipe_id: RecipeId,
        serving_size: f64,
    ) -> Result<(), GatewayError> {
        self.admit(GatewayCall::SetServingSize {
            recipe_id,
            serving_size,
        })?;
        self.state.lock().set_serving_size(recipe_id, serving_size)
    }

    async fn add_item(
        &self,
        recipe_id: RecipeId,
        recipe_ingredient_id: IngredientRef,
        quantity: f64,
    ) -> Result<(), GatewayError> {
        self.admit(GatewayCall::AddItem {
            recipe_id,
            recipe_ingredient_id,
            quantity,
        })?;
        self.state
            .lock()
            .add_item(recipe_id, recipe_ingredient_id, quantity)
    }

    async fn remove_item(&self, item_id: ItemId) -> Result<(), GatewayError> {
        self.admit(GatewayCall::RemoveItem { item_id })?;
        self.state.lock().remove_item(item_id)
    }

    async fn set_item_quantity(
        &self,
        item_id: ItemId,
        quantity: f64,
    ) -> Result<(), GatewayError> {
        self.admit(GatewayCall::SetItemQuantity { item_id, quantity })?;
        self.state.lock().set_item_quantity(item_id, quantity)
    }
}
