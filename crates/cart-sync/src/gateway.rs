use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Cart, IngredientRef, ItemId, RecipeId};

/// Failure reported by a [`CartGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The request never produced a usable response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The addressed recipe, item or ingredient does not exist remotely.
    #[error("{0} not found")]
    NotFound(String),
    /// The server understood the request and refused it.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Remote side of the cart.
///
/// Every backend implements this trait: an HTTP client in production,
/// [`MemoryGateway`](crate::MemoryGateway) in tests. The engine never
/// retries a call; any failure is resolved by re-reading the cart.
///
/// Writes report only success or failure. The authoritative state is
/// always obtained through [`read_cart`](Self::read_cart).
#[async_trait]
pub trait CartGateway: Send + Sync {
    /// Read the full current cart.
    async fn read_cart(&self) -> Result<Cart, GatewayError>;

    /// Put a recipe in the cart. The server seeds its default lines,
    /// scaled by `serving_size`.
    async fn add_recipe(&self, recipe_id: RecipeId, serving_size: f64)
        -> Result<(), GatewayError>;

    /// Remove a recipe and every line belonging to it.
    async fn remove_recipe(&self, recipe_id: RecipeId) -> Result<(), GatewayError>;

    /// Change the serving size of a recipe already in the cart.
    async fn set_serving_size(
        &self,
        recipe_id: RecipeId,
        serving_size: f64,
    ) -> Result<(), GatewayError>;

    /// Add one line linked to an ingredient template of `recipe_id`.
    async fn add_item(
        &self,
        recipe_id: RecipeId,
        recipe_ingredient_id: IngredientRef,
        quantity: f64,
    ) -> Result<(), GatewayError>;

    /// Delete a single line.
    async fn remove_item(&self, item_id: ItemId) -> Result<(), GatewayError>;

    /// Overwrite the quantity of a single line.
    async fn set_item_quantity(&self, item_id: ItemId, quantity: f64)
        -> Result<(), GatewayError>;
}

#[async_trait]
impl<G: CartGateway + ?Sized> CartGateway for Arc<G> {
    async fn read_cart(&self) -> Result<Cart, GatewayError> {
        (**self).read_cart().await
    }

    async fn add_recipe(
        &self,
        recipe_id: RecipeId,
        serving_size: f64,
    ) -> Result<(), GatewayError> {
        (**self).add_recipe(recipe_id, serving_size).await
    }

    async fn remove_recipe(&self, recipe_id: RecipeId) -> Result<(), GatewayError> {
        (**self).remove_recipe(recipe_id).await
    }

    async fn set_serving_size(
        &self,
        recipe_id: RecipeId,
        serving_size: f64,
    ) -> Result<(), GatewayError> {
        (**self).set_serving_size(recipe_id, serving_size).await
    }

    async fn add_item(
        &self,
        recipe_id: RecipeId,
        recipe_ingredient_id: IngredientRef,
        quantity: f64,
    ) -> Result<(), GatewayError> {
        (**self)
            .add_item(recipe_id, recipe_ingredient_id, quantity)
            .await
    }

    async fn remove_item(&self, item_id: ItemId) -> Result<(), GatewayError> {
        (**self).remove_item(item_id).await
    }

    async fn set_item_quantity(
        &self,
        item_id: ItemId,
        quantity: f64,
    ) -> Result<(), GatewayError> {
        (**self).set_item_quantity(item_id, quantity).await
    }
}
