use thiserror::Error;

use crate::gateway::GatewayError;
use crate::model::RecipeId;

/// Error returned by [`CartEngine`](crate::CartEngine) operations.
///
/// Only raised before anything is mutated. Gateway failures during a
/// mutation are absorbed by the rollback refresh and reported through
/// [`MutationOutcome`](crate::MutationOutcome) instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CartError {
    #[error("serving size {0} is not a positive finite number")]
    InvalidServingSize(f64),
    #[error("quantity {0} is not a non-negative finite number")]
    InvalidQuantity(f64),
    #[error("recipe {0} is already in the cart")]
    RecipeAlreadyInCart(RecipeId),
    #[error("cart refresh failed: {0}")]
    Refresh(#[from] GatewayError),
}
