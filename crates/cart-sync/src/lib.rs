//! # cart-sync
//!
//! Client-side mirror of a server-owned shopping cart of recipes and
//! ingredient lines.
//!
//! Mutations are applied to the local snapshot first, so a UI sees them
//! immediately, then sent to the server through a [`CartGateway`]. A failed
//! request is never retried: the engine re-reads the whole cart instead.
//! The last destructive operation can be undone once.
//!
//! ## Quick Start
//!
//! ```
//! use cart_sync::prelude::*;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let gateway = MemoryGateway::with_catalog([
//!     RecipeTemplate::new(RecipeId(1), "bread")
//!         .ingredient(IngredientRef(10), "flour", 2.0, "cups"),
//!     RecipeTemplate::new(RecipeId(2), "cake")
//!         .ingredient(IngredientRef(20), "flour", 1.0, "cups"),
//! ]);
//! let engine = CartEngine::new(gateway);
//!
//! engine.add_recipe(RecipeId(1), "bread", 1.0).await.unwrap();
//! engine.add_recipe(RecipeId(2), "cake", 1.0).await.unwrap();
//!
//! let list = engine.consolidated_ingredients();
//! assert_eq!(list.len(), 1);
//! assert_eq!(list[0].quantity, 3.0);
//! # });
//! ```
//!
//! ## Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`CartStore`] | Current snapshot and sync status |
//! | [`CartGateway`] | Remote service abstraction |
//! | [`CartEngine`] | Optimistic mutations, rollback, undo |
//! | [`UndoBuffer`] | Single-slot record of the last removal |
//! | [`consolidate()`] | Merged shopping list |
//! | [`MemoryGateway`] | In-process server for tests and tools |

mod config;
mod consolidate;
mod engine;
mod error;
mod gateway;
mod memory;
mod model;
mod store;
mod undo;

pub mod prelude;

pub use config::{ConfigError, EngineConfig, ServingBounds};
pub use consolidate::{consolidate, ConsolidatedIngredient, ItemSource};
pub use engine::{CartEngine, CartEngineBuilder, MutationOutcome, RestoreReport};
pub use error::CartError;
pub use gateway::{CartGateway, GatewayError};
pub use memory::{
    GatewayCall, GatewayOp, IngredientTemplate, MemoryGateway, RecipeTemplate, ServerCart,
};
pub use model::{Cart, CartItem, CartRecipe, IngredientRef, ItemId, RecipeId};
pub use store::{CartStore, SyncStatus};
pub use undo::{RemovedItem, UndoAction, UndoBuffer, UndoKind, UndoState};
