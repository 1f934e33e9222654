//! End-to-end undo behavior against the in-memory server.

use std::sync::Arc;

use cart_sync::{
    Cart, CartEngine, GatewayCall, GatewayOp, IngredientRef, ItemId, MemoryGateway,
    MutationOutcome, RecipeId, RecipeTemplate, UndoAction, UndoKind, UndoState,
};

type Engine = CartEngine<Arc<MemoryGateway>>;

fn catalog() -> Vec<RecipeTemplate> {
    vec![
        RecipeTemplate::new(RecipeId(1), "bread")
            .ingredient(IngredientRef(10), "flour", 2.0, "cups")
            .ingredient(IngredientRef(11), "water", 1.0, "cups"),
        RecipeTemplate::new(RecipeId(2), "cake")
            .ingredient(IngredientRef(20), "flour", 1.0, "cups")
            .ingredient(IngredientRef(21), "sugar", 0.5, "cups"),
        RecipeTemplate::new(RecipeId(7), "omelette").ingredient(IngredientRef(50), "egg", 1.0, "ea"),
    ]
}

async fn engine_with(recipes: &[(u64, f64)]) -> Engine {
    let gateway = Arc::new(MemoryGateway::with_catalog(catalog()));
    for (id, serving) in recipes {
        gateway
            .with_state(|s| s.add_recipe(RecipeId(*id), *serving))
            .unwrap();
    }
    let engine = CartEngine::new(gateway);
    engine.refresh().await.unwrap();
    engine.gateway().clear_calls();
    engine
}

fn line_id(cart: &Cart, recipe: u64, name: &str) -> ItemId {
    cart.recipe(RecipeId(recipe))
        .and_then(|r| r.items.iter().find(|i| i.name == name))
        .map(|i| i.id)
        .unwrap_or_else(|| panic!("no {name} in recipe {recipe}"))
}

/// Recipe ids, serving sizes and the multiset of (name, unit, quantity)
/// lines; item ids are reassigned by the server on restore.
fn shape(cart: &Cart) -> Vec<(RecipeId, String, Vec<(String, String, String)>)> {
    cart.recipes()
        .map(|r| {
            let mut lines: Vec<_> = r
                .items
                .iter()
                .map(|i| (i.name.clone(), i.unit.clone(), format!("{}", i.quantity)))
                .collect();
            lines.sort();
            (r.recipe_id, format!("{}", r.serving_size), lines)
        })
        .collect()
}

#[tokio::test]
async fn removed_recipe_is_restored_through_add_then_reconcile() {
    let engine = engine_with(&[(7, 2.0)]).await;
    let before = engine.snapshot();
    let egg = line_id(&before, 7, "egg");

    assert_eq!(
        engine.remove_recipe(RecipeId(7)).await,
        MutationOutcome::Committed
    );
    assert!(engine.snapshot().is_empty());
    match engine.undo_state() {
        UndoState::Armed(UndoAction::Recipe(recipe)) => {
            assert_eq!(&recipe, before.recipe(RecipeId(7)).unwrap());
        }
        other => panic!("expected recipe undo, got {other:?}"),
    }

    engine.gateway().clear_calls();
    let report = engine.invoke_undo().await.unwrap();
    assert_eq!(report.kind, UndoKind::Recipe);
    assert_eq!(report.restored, 1);
    assert!(report.is_complete());

    let writes = engine.gateway().writes();
    assert_eq!(writes.len(), 3);
    assert_eq!(
        writes[0],
        GatewayCall::AddRecipe {
            recipe_id: RecipeId(7),
            serving_size: 2.0
        }
    );
    match writes[1] {
        GatewayCall::RemoveItem { item_id } => assert_ne!(item_id, egg),
        ref other => panic!("expected removal of the seeded line, got {other:?}"),
    }
    assert_eq!(
        writes[2],
        GatewayCall::AddItem {
            recipe_id: RecipeId(7),
            recipe_ingredient_id: IngredientRef(50),
            quantity: 2.0
        }
    );
    assert_eq!(
        engine.gateway().calls().last(),
        Some(&GatewayCall::ReadCart)
    );

    let after = engine.snapshot();
    let recipe = after.recipe(RecipeId(7)).unwrap();
    assert_eq!(recipe.items.len(), 1);
    assert_eq!(recipe.items[0].quantity, 2.0);
    assert_eq!(recipe.items[0].unit, "ea");
    assert_eq!(engine.undo_state(), UndoState::Empty);
}

#[tokio::test]
async fn recipe_round_trip_keeps_edited_lines() {
    let engine = engine_with(&[(1, 1.0), (2, 1.5)]).await;
    let water = line_id(&engine.snapshot(), 1, "water");
    engine.set_item_quantity(water, 4.0).await.unwrap();
    let flour = line_id(&engine.snapshot(), 1, "flour");
    engine.remove_item(flour).await;
    engine.refresh().await.unwrap();
    let before = shape(&engine.snapshot());

    engine.remove_recipe(RecipeId(1)).await;
    engine.invoke_undo().await.unwrap();

    assert_eq!(shape(&engine.snapshot()), before);
}

#[tokio::test]
async fn second_removal_replaces_the_first_record() {
    let engine = engine_with(&[(1, 1.0), (2, 1.0)]).await;

    engine.remove_recipe(RecipeId(1)).await;
    engine.remove_recipe(RecipeId(2)).await;
    engine.invoke_undo().await.unwrap();

    let cart = engine.snapshot();
    assert!(cart.recipe(RecipeId(1)).is_none());
    assert!(cart.recipe(RecipeId(2)).is_some());
    assert!(engine.invoke_undo().await.is_none());
}

#[tokio::test]
async fn bulk_undo_returns_lines_to_their_recipes() {
    let engine = engine_with(&[(1, 1.0), (2, 1.0)]).await;
    let cart = engine.snapshot();
    let water = line_id(&cart, 1, "water");
    let sugar = line_id(&cart, 2, "sugar");

    assert_eq!(
        engine.remove_items(&[water, sugar, water]).await,
        MutationOutcome::Committed
    );
    assert_eq!(engine.gateway().writes().len(), 2);
    assert_eq!(engine.snapshot().item_count(), 2);

    let report = engine.invoke_undo().await.unwrap();
    assert_eq!(report.kind, UndoKind::Bulk);
    assert_eq!(report.restored, 2);

    let after = engine.snapshot();
    let names = |id: u64| -> Vec<String> {
        let mut names: Vec<_> = after
            .recipe(RecipeId(id))
            .unwrap()
            .items
            .iter()
            .map(|i| i.name.clone())
            .collect();
        names.sort();
        names
    };
    assert_eq!(names(1), vec!["flour", "water"]);
    assert_eq!(names(2), vec!["flour", "sugar"]);
}

#[tokio::test]
async fn consolidated_row_removal_is_undoable() {
    let engine = engine_with(&[(1, 1.0), (2, 1.0)]).await;
    let rows = engine.consolidated_ingredients();
    let flour = rows.iter().find(|r| r.name == "flour").unwrap();
    assert_eq!(flour.quantity, 3.0);
    assert_eq!(flour.sources.len(), 2);

    assert_eq!(
        engine.remove_consolidated(flour).await,
        MutationOutcome::Committed
    );
    assert!(engine
        .consolidated_ingredients()
        .iter()
        .all(|r| r.name != "flour"));

    engine.invoke_undo().await.unwrap();
    let rows = engine.consolidated_ingredients();
    let flour = rows.iter().find(|r| r.name == "flour").unwrap();
    assert_eq!(flour.quantity, 3.0);
    assert_eq!(flour.recipe_ids(), vec![RecipeId(1), RecipeId(2)]);
}

#[tokio::test]
async fn partial_bulk_failure_keeps_what_went_through() {
    let engine = engine_with(&[(1, 1.0), (2, 1.0)]).await;
    let cart = engine.snapshot();
    let water = line_id(&cart, 1, "water");
    let sugar = line_id(&cart, 2, "sugar");
    engine.gateway().fail_when(
        move |call| matches!(call, GatewayCall::RemoveItem { item_id } if *item_id == sugar),
    );

    assert_eq!(
        engine.remove_items(&[water, sugar]).await,
        MutationOutcome::Partial { failed: 1 }
    );

    let after = engine.snapshot();
    assert!(after.item(water).is_none());
    assert!(after.item(sugar).is_some());
    match engine.undo_state() {
        UndoState::Armed(UndoAction::Bulk(entries)) => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].item.id, water);
            assert_eq!(entries[0].recipe_id, RecipeId(1));
        }
        other => panic!("expected bulk undo, got {other:?}"),
    }
}

#[tokio::test]
async fn bulk_removal_with_every_request_failing_rolls_back() {
    let engine = engine_with(&[(1, 1.0), (2, 1.0)]).await;
    engine.remove_recipe(RecipeId(2)).await;
    let before = engine.snapshot();
    let flour = line_id(&before, 1, "flour");
    let water = line_id(&before, 1, "water");

    engine.gateway().fail_on(GatewayOp::RemoveItem);
    assert_eq!(
        engine.remove_items(&[flour, water]).await,
        MutationOutcome::RolledBack
    );

    assert_eq!(*engine.snapshot(), *before);
    assert_eq!(*engine.snapshot(), engine.gateway().cart());
    assert_eq!(engine.gateway().calls().last(), Some(&GatewayCall::ReadCart));
    match engine.undo_state() {
        UndoState::Armed(UndoAction::Recipe(recipe)) => assert_eq!(recipe.recipe_id, RecipeId(2)),
        other => panic!("expected the earlier recipe undo, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_removal_keeps_previous_record() {
    let engine = engine_with(&[(1, 1.0), (2, 1.0)]).await;
    engine.remove_recipe(RecipeId(1)).await;

    engine.gateway().fail_on(GatewayOp::RemoveRecipe);
    assert_eq!(
        engine.remove_recipe(RecipeId(2)).await,
        MutationOutcome::RolledBack
    );
    assert!(engine.snapshot().recipe(RecipeId(2)).is_some());

    match engine.undo_state() {
        UndoState::Armed(UndoAction::Recipe(recipe)) => assert_eq!(recipe.recipe_id, RecipeId(1)),
        other => panic!("expected recipe undo, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_restoration_still_clears_the_buffer() {
    let engine = engine_with(&[(1, 1.0)]).await;
    let water = line_id(&engine.snapshot(), 1, "water");
    engine.remove_item(water).await;

    engine.gateway().fail_on(GatewayOp::AddItem);
    let report = engine.invoke_undo().await.unwrap();
    assert_eq!(report.kind, UndoKind::Item);
    assert_eq!(report.errors, 1);
    assert!(!report.is_complete());

    assert_eq!(engine.undo_state(), UndoState::Empty);
    assert_eq!(*engine.snapshot(), engine.gateway().cart());
    assert!(engine.snapshot().item(water).is_none());
}

#[tokio::test]
async fn dismissing_forgets_the_record() {
    let engine = engine_with(&[(1, 1.0)]).await;
    engine.remove_recipe(RecipeId(1)).await;

    assert!(engine.dismiss_undo().await);
    assert!(!engine.dismiss_undo().await);
    assert!(engine.invoke_undo().await.is_none());
    assert!(engine.snapshot().is_empty());
}
