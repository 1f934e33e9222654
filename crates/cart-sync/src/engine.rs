//! Optimistic mutation engine.
//!
//! `CartEngine` is the only writer of the cart snapshot. Every mutation
//! follows the same protocol:
//!
//! 1. validate the input, then apply the change to the local snapshot
//!    before the first await point;
//! 2. send the matching request to the [`CartGateway`];
//! 3. on success, destructive operations arm the undo buffer;
//! 4. on failure, discard the local change by re-reading the whole cart.
//!
//! # Example
//!
//! ```
//! use cart_sync::{CartEngine, IngredientRef, MemoryGateway, RecipeId, RecipeTemplate, UndoState};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let gateway = MemoryGateway::with_catalog([
//!     RecipeTemplate::new(RecipeId(7), "omelette")
//!         .ingredient(IngredientRef(50), "egg", 1.0, "ea"),
//! ]);
//! gateway.with_state(|s| s.add_recipe(RecipeId(7), 2.0)).unwrap();
//!
//! let engine = CartEngine::new(gateway);
//! engine.refresh().await.unwrap();
//!
//! engine.remove_recipe(RecipeId(7)).await;
//! assert!(engine.snapshot().is_empty());
//! assert!(engine.undo_state().is_armed());
//!
//! engine.invoke_undo().await;
//! assert_eq!(engine.snapshot().recipe(RecipeId(7)).unwrap().items[0].quantity, 2.0);
//! assert_eq!(engine.undo_state(), UndoState::Empty);
//! # });
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, EngineConfig, ServingBounds};
use crate::consolidate::{consolidate, ConsolidatedIngredient};
use crate::error::CartError;
use crate::gateway::CartGateway;
use crate::model::{Cart, CartItem, CartRecipe, ItemId, RecipeId};
use crate::store::{CartStore, SyncStatus};
use crate::undo::{RemovedItem, UndoAction, UndoBuffer, UndoKind, UndoState};

/// How a mutation ended once the gateway answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The gateway confirmed the change.
    Committed,
    /// Some requests of a bulk removal failed; the cart was re-read.
    Partial { failed: usize },
    /// The gateway refused the change; the cart was re-read.
    RolledBack,
    /// The target is not in the cart. Nothing was sent.
    Skipped,
}

/// Summary of an undo restoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreReport {
    pub kind: UndoKind,
    /// Lines successfully re-added.
    pub restored: usize,
    /// Lines without ingredient linkage, which cannot be recreated.
    pub skipped: usize,
    /// Gateway requests that failed along the way.
    pub errors: usize,
}

impl RestoreReport {
    fn new(kind: UndoKind) -> Self {
        Self {
            kind,
            restored: 0,
            skipped: 0,
            errors: 0,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors == 0 && self.skipped == 0
    }
}

fn validate_serving(value: f64, bounds: &ServingBounds) -> Result<f64, CartError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CartError::InvalidServingSize(value));
    }
    Ok(bounds.clamp(value))
}

fn validate_quantity(value: f64) -> Result<f64, CartError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CartError::InvalidQuantity(value));
    }
    Ok(value)
}

/// Builder for constructing a `CartEngine` with custom configuration.
#[derive(Debug)]
pub struct CartEngineBuilder<G> {
    gateway: G,
    config: EngineConfig,
}

impl<G: CartGateway> CartEngineBuilder<G> {
    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the range serving sizes are clamped into.
    pub fn serving_bounds(mut self, bounds: ServingBounds) -> Self {
        self.config.serving = bounds;
        self
    }

    /// Build the engine. The snapshot starts empty until the first refresh.
    ///
    /// Fails when the configuration is invalid, e.g. inverted serving bounds.
    pub fn build(self) -> Result<CartEngine<G>, ConfigError> {
        self.config.validate()?;
        Ok(CartEngine::with_config(self.gateway, self.config))
    }
}

/// Client-side cart synchronizer with optimistic updates and undo.
///
/// All methods take `&self`. Local state sits behind short-lived locks that
/// are never held across an await, so operations started concurrently on
/// the same task interleave only at gateway calls; the last write to the
/// snapshot wins and the next refresh restores server truth.
#[derive(Debug)]
pub struct CartEngine<G> {
    gateway: G,
    store: Mutex<CartStore>,
    undo: Mutex<UndoBuffer>,
    config: EngineConfig,
}

impl<G: CartGateway> CartEngine<G> {
    /// Create an engine with the default configuration.
    pub fn new(gateway: G) -> Self {
        Self::with_config(gateway, EngineConfig::default())
    }

    fn with_config(gateway: G, config: EngineConfig) -> Self {
        Self {
            gateway,
            store: Mutex::new(CartStore::new()),
            undo: Mutex::new(UndoBuffer::new()),
            config,
        }
    }

    pub fn builder(gateway: G) -> CartEngineBuilder<G> {
        CartEngineBuilder {
            gateway,
            config: EngineConfig::default(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current cart snapshot, including optimistic changes.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Cart> {
        self.store.lock().snapshot()
    }

    /// Change counter of the snapshot; bumps on every local or remote update.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.store.lock().revision()
    }

    /// Whether the last read-through succeeded.
    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        self.store.lock().status().clone()
    }

    /// Replace the snapshot with the gateway's view of the cart.
    ///
    /// On failure the snapshot becomes an empty cart and the sync status
    /// records the error.
    pub async fn refresh(&self) -> Result<Arc<Cart>, CartError> {
        let result = self.gateway.read_cart().await;
        let mut store = self.store.lock();
        store.apply_read(result)?;
        Ok(store.snapshot())
    }

    /// Refresh, logging instead of returning a failure.
    async fn reconcile(&self) {
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "cart refresh failed, showing an empty cart");
        }
    }

    async fn roll_back(&self, op: &'static str, error: impl std::fmt::Display) -> MutationOutcome {
        warn!(op, error = %error, "gateway rejected mutation, re-reading cart");
        self.reconcile().await;
        MutationOutcome::RolledBack
    }

    fn arm_undo(&self, action: UndoAction) {
        let kind = action.kind();
        let discarded = self.undo.lock().arm(action);
        if let Some(previous) = discarded {
            debug!(kind = ?previous.kind(), "discarded previous undo record");
        }
        info!(?kind, "undo armed");
    }

    fn clear_undo(&self) {
        let cleared = self.undo.lock().dismiss();
        if let Some(previous) = cleared {
            debug!(kind = ?previous.kind(), "discarded previous undo record");
        }
    }

    /// Put a recipe in the cart at `serving_size`.
    ///
    /// An empty entry shows up immediately; once the gateway confirms, the
    /// cart is re-read to pick up the lines the server seeded.
    pub async fn add_recipe(
        &self,
        recipe_id: RecipeId,
        name: impl Into<String>,
        serving_size: f64,
    ) -> Result<MutationOutcome, CartError> {
        let serving_size = validate_serving(serving_size, &self.config.serving)?;
        let entry = CartRecipe::new(recipe_id, name, serving_size);
        {
            let mut store = self.store.lock();
            if store.snapshot().contains_recipe(recipe_id) {
                return Err(CartError::RecipeAlreadyInCart(recipe_id));
            }
            store.mutate(|cart| cart.insert_recipe(entry));
        }
        debug!(%recipe_id, serving_size, "optimistically added recipe");

        match self.gateway.add_recipe(recipe_id, serving_size).await {
            Ok(()) => {
                self.reconcile().await;
                Ok(MutationOutcome::Committed)
            }
            Err(e) => Ok(self.roll_back("add_recipe", e).await),
        }
    }

    /// Remove a recipe and all of its lines.
    pub async fn remove_recipe(&self, recipe_id: RecipeId) -> MutationOutcome {
        let removed = {
            let mut store = self.store.lock();
            if store.cart().contains_recipe(recipe_id) {
                store.mutate(|cart| cart.remove_recipe(recipe_id))
            } else {
                None
            }
        };
        let Some(recipe) = removed else {
            debug!(%recipe_id, "recipe not in cart, nothing to remove");
            return MutationOutcome::Skipped;
        };
        debug!(%recipe_id, lines = recipe.items.len(), "optimistically removed recipe");

        match self.gateway.remove_recipe(recipe_id).await {
            Ok(()) => {
                self.arm_undo(UndoAction::Recipe(recipe));
                MutationOutcome::Committed
            }
            Err(e) => self.roll_back("remove_recipe", e).await,
        }
    }

    /// Remove a single line.
    ///
    /// A line that is no longer in the cart (already gone through another
    /// path) is reported as [`MutationOutcome::Skipped`].
    pub async fn remove_item(&self, item_id: ItemId) -> MutationOutcome {
        let removed = {
            let mut store = self.store.lock();
            if store.cart().item(item_id).is_some() {
                store.mutate(|cart| cart.remove_item(item_id))
            } else {
                None
            }
        };
        let Some((recipe_id, item)) = removed else {
            debug!(%item_id, "item not in cart, nothing to remove");
            return MutationOutcome::Skipped;
        };
        debug!(%item_id, %recipe_id, "optimistically removed item");

        match self.gateway.remove_item(item_id).await {
            Ok(()) => {
                match RemovedItem::capture(recipe_id, item) {
                    Some(entry) => self.arm_undo(UndoAction::Item(entry)),
                    None => {
                        warn!(%item_id, "removed item has no ingredient link, undo unavailable");
                        self.clear_undo();
                    }
                }
                MutationOutcome::Committed
            }
            Err(e) => self.roll_back("remove_item", e).await,
        }
    }

    /// Remove several lines, possibly from different recipes.
    ///
    /// Each line is sent as its own request, in the given order. Requests
    /// are independent: when some fail, the ones that went through stay
    /// removed (and undoable) and the cart is re-read.
    pub async fn remove_items(&self, ids: &[ItemId]) -> MutationOutcome {
        let mut seen = BTreeSet::new();
        let captured: Vec<(RecipeId, CartItem)> = {
            let mut store = self.store.lock();
            let wanted: Vec<ItemId> = ids
                .iter()
                .copied()
                .filter(|id| seen.insert(*id) && store.cart().item(*id).is_some())
                .collect();
            if wanted.is_empty() {
                Vec::new()
            } else {
                store.mutate(|cart| {
                    wanted
                        .iter()
                        .filter_map(|id| cart.remove_item(*id))
                        .collect()
                })
            }
        };
        if captured.is_empty() {
            debug!(requested = ids.len(), "none of the items are in the cart");
            return MutationOutcome::Skipped;
        }
        debug!(count = captured.len(), "optimistically removed items");

        let mut removed = Vec::with_capacity(captured.len());
        let mut failed = 0;
        for (recipe_id, item) in captured {
            match self.gateway.remove_item(item.id).await {
                Ok(()) => removed.push((recipe_id, item)),
                Err(e) => {
                    warn!(item_id = %item.id, error = %e, "bulk removal: request failed");
                    failed += 1;
                }
            }
        }

        let succeeded = removed.len();
        if succeeded > 0 {
            let entries: Vec<RemovedItem> = removed
                .into_iter()
                .filter_map(|(recipe_id, item)| RemovedItem::capture(recipe_id, item))
                .collect();
            if entries.len() < succeeded {
                warn!(
                    unlinked = succeeded - entries.len(),
                    "some removed items have no ingredient link and cannot be restored"
                );
            }
            if entries.is_empty() {
                self.clear_undo();
            } else {
                self.arm_undo(UndoAction::Bulk(entries));
            }
        }

        if failed == 0 {
            return MutationOutcome::Committed;
        }
        self.reconcile().await;
        if succeeded == 0 {
            MutationOutcome::RolledBack
        } else {
            MutationOutcome::Partial { failed }
        }
    }

    /// Remove every line behind a consolidated shopping-list row.
    pub async fn remove_consolidated(&self, row: &ConsolidatedIngredient) -> MutationOutcome {
        self.remove_items(&row.item_ids()).await
    }

    /// Change a recipe's serving size.
    ///
    /// Positive finite values are clamped into the configured bounds; the
    /// recipe's lines are rescaled locally by the same factor the server
    /// applies.
    pub async fn set_serving_size(
        &self,
        recipe_id: RecipeId,
        value: f64,
    ) -> Result<MutationOutcome, CartError> {
        let serving_size = validate_serving(value, &self.config.serving)?;
        if (serving_size - value).abs() > f64::EPSILON {
            debug!(%recipe_id, requested = value, serving_size, "clamped serving size");
        }

        let previous = {
            let mut store = self.store.lock();
            if store.cart().contains_recipe(recipe_id) {
                store.mutate(|cart| {
                    let recipe = cart.recipe_mut(recipe_id)?;
                    let previous = recipe.serving_size;
                    recipe.serving_size = serving_size;
                    if previous > 0.0 && previous.is_finite() {
                        let factor = serving_size / previous;
                        for item in &mut recipe.items {
                            item.quantity *= factor;
                        }
                    }
                    Some(previous)
                })
            } else {
                None
            }
        };
        let Some(previous) = previous else {
            debug!(%recipe_id, "recipe not in cart, serving size unchanged");
            return Ok(MutationOutcome::Skipped);
        };
        debug!(%recipe_id, previous, serving_size, "optimistically changed serving size");

        match self.gateway.set_serving_size(recipe_id, serving_size).await {
            Ok(()) => Ok(MutationOutcome::Committed),
            Err(e) => Ok(self.roll_back("set_serving_size", e).await),
        }
    }

    /// Overwrite the quantity of one line.
    pub async fn set_item_quantity(
        &self,
        item_id: ItemId,
        value: f64,
    ) -> Result<MutationOutcome, CartError> {
        let quantity = validate_quantity(value)?;

        let previous = {
            let mut store = self.store.lock();
            if store.cart().item(item_id).is_some() {
                store.mutate(|cart| {
                    let item = cart.item_mut(item_id)?;
                    Some(std::mem::replace(&mut item.quantity, quantity))
                })
            } else {
                None
            }
        };
        let Some(previous) = previous else {
            debug!(%item_id, "item not in cart, quantity unchanged");
            return Ok(MutationOutcome::Skipped);
        };
        debug!(%item_id, previous, quantity, "optimistically changed quantity");

        match self.gateway.set_item_quantity(item_id, quantity).await {
            Ok(()) => Ok(MutationOutcome::Committed),
            Err(e) => Ok(self.roll_back("set_item_quantity", e).await),
        }
    }

    #[must_use]
    pub fn undo_state(&self) -> UndoState {
        self.undo.lock().state()
    }

    /// Restore the last destructive operation, then re-read the cart.
    ///
    /// Returns `None` when there is nothing to undo. The buffer is empty
    /// afterwards whatever the outcome; failed steps are logged and the
    /// final refresh shows what actually came back.
    pub async fn invoke_undo(&self) -> Option<RestoreReport> {
        let taken = self.undo.lock().take();
        let action = taken?;
        info!(kind = ?action.kind(), lines = action.item_count(), "restoring undo record");

        let report = match action {
            UndoAction::Recipe(recipe) => self.restore_recipe(recipe).await,
            UndoAction::Item(entry) => self.restore_items(UndoKind::Item, vec![entry]).await,
            UndoAction::Bulk(entries) => self.restore_items(UndoKind::Bulk, entries).await,
        };
        if !report.is_complete() {
            warn!(
                restored = report.restored,
                skipped = report.skipped,
                errors = report.errors,
                "undo restored the cart only partially"
            );
        }

        self.reconcile().await;
        Some(report)
    }

    /// Drop the undo record without restoring it, then re-read the cart.
    ///
    /// Returns `false` (and does nothing) when the buffer was already empty.
    pub async fn dismiss_undo(&self) -> bool {
        let dismissed = self.undo.lock().dismiss();
        let Some(action) = dismissed else {
            return false;
        };
        info!(kind = ?action.kind(), "undo dismissed");
        self.reconcile().await;
        true
    }

    /// Re-add a removed recipe with the exact lines it had.
    ///
    /// Adding a recipe seeds its default lines, so those are deleted again
    /// and the captured lines re-added one by one.
    async fn restore_recipe(&self, recipe: CartRecipe) -> RestoreReport {
        let mut report = RestoreReport::new(UndoKind::Recipe);
        let recipe_id = recipe.recipe_id;

        {
            let mut store = self.store.lock();
            if !store.cart().contains_recipe(recipe_id) {
                store.mutate(|cart| cart.insert_recipe(recipe.clone()));
            }
        }

        if let Err(e) = self.gateway.add_recipe(recipe_id, recipe.serving_size).await {
            warn!(%recipe_id, error = %e, "undo: re-adding recipe failed");
            report.errors += 1;
            return report;
        }

        let seeded: Vec<ItemId> = match self.gateway.read_cart().await {
            Ok(cart) => cart
                .recipe(recipe_id)
                .map(|r| r.item_ids().collect())
                .unwrap_or_default(),
            Err(e) => {
                warn!(%recipe_id, error = %e, "undo: reading seeded lines failed");
                report.errors += 1;
                return report;
            }
        };
        for item_id in seeded {
            if let Err(e) = self.gateway.remove_item(item_id).await {
                warn!(%recipe_id, %item_id, error = %e, "undo: removing seeded line failed");
                report.errors += 1;
            }
        }

        for item in &recipe.items {
            let Some(ingredient) = item.recipe_ingredient_id else {
                warn!(%recipe_id, item_id = %item.id, "undo: line has no ingredient link, skipped");
                report.skipped += 1;
                continue;
            };
            match self
                .gateway
                .add_item(recipe_id, ingredient, item.quantity)
                .await
            {
                Ok(()) => report.restored += 1,
                Err(e) => {
                    warn!(%recipe_id, %ingredient, error = %e, "undo: re-adding line failed");
                    report.errors += 1;
                }
            }
        }
        report
    }

    /// Re-add removed lines to the recipes they came from. Best effort:
    /// a failure does not stop the remaining entries.
    async fn restore_items(&self, kind: UndoKind, entries: Vec<RemovedItem>) -> RestoreReport {
        let mut report = RestoreReport::new(kind);

        self.store.lock().mutate(|cart| {
            for entry in &entries {
                cart.insert_item(entry.recipe_id, entry.item.clone());
            }
        });

        for entry in entries {
            let Some(ingredient) = entry.item.recipe_ingredient_id else {
                report.skipped += 1;
                continue;
            };
            match self
                .gateway
                .add_item(entry.recipe_id, ingredient, entry.item.quantity)
                .await
            {
                Ok(()) => report.restored += 1,
                Err(e) => {
                    warn!(
                        recipe_id = %entry.recipe_id,
                        %ingredient,
                        error = %e,
                        "undo: re-adding line failed"
                    );
                    report.errors += 1;
                }
            }
        }
        report
    }

    /// Merged shopping list for the current snapshot.
    #[must_use]
    pub fn consolidated_ingredients(&self) -> Vec<ConsolidatedIngredient> {
        consolidate(&self.snapshot())
    }
}
