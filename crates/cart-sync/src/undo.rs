//! Single-slot undo for destructive cart mutations.
//!
//! ```text
//!            arm (discards any previous record)
//!   Empty ───────────────────────────────────────▶ Armed(action)
//!     ▲                                               │
//!     └────────────── take / dismiss ─────────────────┘
//! ```
//!
//! The buffer itself has no deadline; expiry is decided by whoever shows
//! the "undo" affordance and ends in [`UndoBuffer::dismiss`].

use crate::model::{CartItem, CartRecipe, RecipeId};

/// A line removed from the cart, remembered with the recipe it belonged to.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedItem {
    pub recipe_id: RecipeId,
    pub item: CartItem,
}

impl RemovedItem {
    /// Capture a removed line. `None` when it carries no ingredient
    /// linkage, since such a line cannot be recreated.
    pub fn capture(recipe_id: RecipeId, item: CartItem) -> Option<Self> {
        item.is_restorable().then_some(Self { recipe_id, item })
    }
}

/// Which kind of removal an [`UndoAction`] reverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoKind {
    Recipe,
    Item,
    Bulk,
}

/// Everything needed to reverse one destructive operation.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoAction {
    /// A whole recipe, including the lines it had when removed.
    Recipe(CartRecipe),
    /// A single line.
    Item(RemovedItem),
    /// Lines removed together, possibly from several recipes.
    Bulk(Vec<RemovedItem>),
}

impl UndoAction {
    #[must_use]
    pub fn kind(&self) -> UndoKind {
        match self {
            Self::Recipe(_) => UndoKind::Recipe,
            Self::Item(_) => UndoKind::Item,
            Self::Bulk(_) => UndoKind::Bulk,
        }
    }

    /// Number of lines the action would restore.
    #[must_use]
    pub fn item_count(&self) -> usize {
        match self {
            Self::Recipe(recipe) => recipe.items.len(),
            Self::Item(_) => 1,
            Self::Bulk(entries) => entries.len(),
        }
    }

    /// Short human-readable label for an undo prompt.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Recipe(recipe) => format!("Removed {}", recipe.name),
            Self::Item(entry) => format!("Removed {}", entry.item.name),
            Self::Bulk(entries) => match entries.as_slice() {
                [only] => format!("Removed {}", only.item.name),
                _ => format!("Removed {} items", entries.len()),
            },
        }
    }
}

/// Observable state of the buffer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum UndoState {
    #[default]
    Empty,
    Armed(UndoAction),
}

impl UndoState {
    #[must_use]
    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed(_))
    }
}

/// Holds at most one [`UndoAction`]. Newest wins; there is no history.
#[derive(Debug, Default)]
pub struct UndoBuffer {
    slot: Option<UndoAction>,
}

impl UndoBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `action`, returning the record it displaced (now unrecoverable).
    pub fn arm(&mut self, action: UndoAction) -> Option<UndoAction> {
        let discarded = self.slot.take();
        self.slot = Some(action);
        discarded
    }

    /// Empty the buffer for restoration.
    pub fn take(&mut self) -> Option<UndoAction> {
        self.slot.take()
    }

    /// Empty the buffer without restoring anything.
    pub fn dismiss(&mut self) -> Option<UndoAction> {
        self.slot.take()
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.slot.is_some()
    }

    #[must_use]
    pub fn state(&self) -> UndoState {
        match &self.slot {
            Some(action) => UndoState::Armed(action.clone()),
            None => UndoState::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IngredientRef, ItemId};

    fn line(id: u64, name: &str, linked: bool) -> CartItem {
        CartItem {
            id: ItemId(id),
            name: name.to_string(),
            quantity: 1.0,
            unit: "ea".to_string(),
            recipe_ingredient_id: linked.then_some(IngredientRef(id)),
        }
    }

    #[test]
    fn empty_by_default() {
        let buffer = UndoBuffer::new();
        assert!(!buffer.is_armed());
        assert_eq!(buffer.state(), UndoState::Empty);
    }

    #[test]
    fn arming_twice_keeps_only_the_newest() {
        let mut buffer = UndoBuffer::new();
        let first = UndoAction::Recipe(CartRecipe::new(RecipeId(1), "soup", 1.0));
        let second = UndoAction::Item(RemovedItem::capture(RecipeId(2), line(5, "egg", true)).unwrap());

        assert!(buffer.arm(first.clone()).is_none());
        assert_eq!(buffer.arm(second.clone()), Some(first));
        assert_eq!(buffer.take(), Some(second));
        assert!(buffer.take().is_none());
    }

    #[test]
    fn dismiss_empties_the_slot() {
        let mut buffer = UndoBuffer::new();
        buffer.arm(UndoAction::Bulk(Vec::new()));
        assert!(buffer.state().is_armed());
        assert!(buffer.dismiss().is_some());
        assert_eq!(buffer.state(), UndoState::Empty);
    }

    #[test]
    fn unlinked_lines_are_not_captured() {
        assert!(RemovedItem::capture(RecipeId(1), line(1, "salt", false)).is_none());
        assert!(RemovedItem::capture(RecipeId(1), line(2, "salt", true)).is_some());
    }

    #[test]
    fn describe_names_the_removed_thing() {
        let recipe = CartRecipe::new(RecipeId(1), "soup", 1.0);
        assert_eq!(UndoAction::Recipe(recipe).describe(), "Removed soup");

        let entries = vec![
            RemovedItem::capture(RecipeId(1), line(1, "egg", true)).unwrap(),
            RemovedItem::capture(RecipeId(2), line(2, "milk", true)).unwrap(),
        ];
        let bulk = UndoAction::Bulk(entries);
        assert_eq!(bulk.describe(), "Removed 2 items");
        assert_eq!(bulk.kind(), UndoKind::Bulk);
        assert_eq!(bulk.item_count(), 2);
    }
}
