//! Cart State Store: the single in-memory snapshot the UI reads from.
//!
//! The store never talks to the network. The engine performs the read and
//! hands the result to [`CartStore::apply_read`], which either swaps the
//! whole snapshot or falls back to an empty cart. Readers receive an
//! `Arc<Cart>` and never observe a half-applied update.

use std::sync::Arc;

use crate::gateway::GatewayError;
use crate::model::Cart;

/// Outcome of the most recent read-through.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// No read has completed yet.
    #[default]
    Unsynced,
    /// The snapshot reflects the last successful read.
    Synced,
    /// The last read failed; the snapshot was reset to an empty cart.
    Failed(String),
}

impl SyncStatus {
    /// `true` when the last read-through failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Owner of the current cart snapshot.
#[derive(Debug, Default)]
pub struct CartStore {
    cart: Arc<Cart>,
    status: SyncStatus,
    /// Bumped on every change so observers can cheaply detect updates.
    revision: u64,
}

impl CartStore {
    /// Create a store holding an empty, never-synced cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot. Cheap to clone and immutable.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Cart> {
        Arc::clone(&self.cart)
    }

    /// Borrow the current cart for a lookup without cloning the handle.
    #[must_use]
    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    /// Monotonic change counter.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Install the result of a read-through.
    ///
    /// On success the snapshot is replaced wholesale; on failure it becomes
    /// an empty cart and the status records the reason. The error is handed
    /// back so the caller can log it.
    pub fn apply_read(&mut self, result: Result<Cart, GatewayError>) -> Result<(), GatewayError> {
        self.revision += 1;
        match result {
            Ok(cart) => {
                self.cart = Arc::new(cart);
                self.status = SyncStatus::Synced;
                Ok(())
            }
            Err(e) => {
                self.cart = Arc::new(Cart::new());
                self.status = SyncStatus::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Apply a local (optimistic) change to the snapshot.
    ///
    /// Callers look the target up first; every call counts as a change.
    /// Outstanding `Arc<Cart>` handles keep seeing the previous version.
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut Cart) -> R) -> R {
        self.revision += 1;
        f(Arc::make_mut(&mut self.cart))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CartRecipe, RecipeId};

    fn one_recipe() -> Cart {
        Cart::from_recipes([CartRecipe::new(RecipeId(1), "soup", 1.0)])
    }

    #[test]
    fn new_store_is_empty_and_unsynced() {
        let store = CartStore::new();
        assert!(store.snapshot().is_empty());
        assert_eq!(store.status(), &SyncStatus::Unsynced);
    }

    #[test]
    fn successful_read_replaces_snapshot() {
        let mut store = CartStore::new();
        store.apply_read(Ok(one_recipe())).unwrap();
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(store.status(), &SyncStatus::Synced);
    }

    #[test]
    fn failed_read_resets_to_empty_cart() {
        let mut store = CartStore::new();
        store.apply_read(Ok(one_recipe())).unwrap();

        let err = store
            .apply_read(Err(GatewayError::Transport("offline".to_string())))
            .unwrap_err();
        assert_eq!(err, GatewayError::Transport("offline".to_string()));
        assert!(store.snapshot().is_empty());
        assert!(store.status().is_failed());
    }

    #[test]
    fn mutate_leaves_earlier_snapshots_untouched() {
        let mut store = CartStore::new();
        store.apply_read(Ok(one_recipe())).unwrap();

        let before = store.snapshot();
        let rev = store.revision();
        store.mutate(|cart| cart.remove_recipe(RecipeId(1)));

        assert_eq!(before.len(), 1);
        assert!(store.snapshot().is_empty());
        assert!(store.revision() > rev);
    }

    #[test]
    fn lookups_do_not_bump_revision() {
        let mut store = CartStore::new();
        store.apply_read(Ok(one_recipe())).unwrap();
        let rev = store.revision();

        assert!(store.cart().contains_recipe(RecipeId(1)));
        assert!(!store.cart().contains_recipe(RecipeId(2)));
        assert_eq!(store.revision(), rev);
    }
}
