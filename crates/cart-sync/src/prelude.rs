//! Convenient re-exports for common usage.
//!
//! ```
//! use cart_sync::prelude::*;
//! ```

pub use crate::CartEngine;
pub use crate::CartError;
pub use crate::CartGateway;
pub use crate::ConsolidatedIngredient;
pub use crate::IngredientRef;
pub use crate::ItemId;
pub use crate::MemoryGateway;
pub use crate::MutationOutcome;
pub use crate::RecipeId;
pub use crate::RecipeTemplate;
pub use crate::UndoState;
