use std::path::{Path, PathBuf};

use cart_sync::{
    Cart, CartEngine, ConsolidatedIngredient, EngineConfig, ItemId, MemoryGateway,
    MutationOutcome, RecipeId, RecipeTemplate, ServerCart, UndoState,
};
use console::style;
use tracing::{debug, info};

pub type Result<T = ()> = std::result::Result<T, Box<dyn std::error::Error>>;

/// A cart file loaded into an engine. Changes reach the file on [`save`].
///
/// [`save`]: Session::save
pub struct Session {
    path: PathBuf,
    engine: CartEngine<MemoryGateway>,
}

impl Session {
    pub async fn open(path: &Path, config: &EngineConfig) -> Result<Self> {
        let state = read_state(path)?;
        let engine = CartEngine::builder(MemoryGateway::from_state(state))
            .config(config.clone())
            .build()?;
        engine.refresh().await?;
        debug!(path = %path.display(), recipes = engine.snapshot().len(), "cart loaded");

        Ok(Self {
            path: path.to_path_buf(),
            engine,
        })
    }

    pub fn engine(&self) -> &CartEngine<MemoryGateway> {
        &self.engine
    }

    /// Name of a catalog recipe, if the cart file knows it.
    pub fn recipe_name(&self, recipe_id: RecipeId) -> Option<String> {
        self.engine
            .gateway()
            .with_state(|s| s.template(recipe_id).map(|t| t.name.clone()))
    }

    pub fn save(&self) -> Result {
        write_state(&self.path, &self.engine.gateway().state())
    }
}

fn read_state(path: &Path) -> Result<ServerCart> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read cart file {}: {e}", path.display()))?;
    let state = serde_json::from_str(&raw)
        .map_err(|e| format!("Invalid cart file {}: {e}", path.display()))?;
    Ok(state)
}

fn write_state(path: &Path, state: &ServerCart) -> Result {
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path, json)?;
    debug!(path = %path.display(), "cart saved");
    Ok(())
}

/// Load engine configuration, or defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            Ok(EngineConfig::load(path)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

/// `cart init <cart> --catalog <file>`: Create an empty cart file.
pub fn init(cart_path: &Path, catalog_path: &Path, force: bool) -> Result {
    if cart_path.exists() && !force {
        return Err(format!(
            "Cart file {} already exists (use --force to overwrite)",
            cart_path.display()
        )
        .into());
    }

    let raw = std::fs::read_to_string(catalog_path)
        .map_err(|e| format!("Cannot read catalog {}: {e}", catalog_path.display()))?;
    let catalog: Vec<RecipeTemplate> = serde_json::from_str(&raw)
        .map_err(|e| format!("Invalid catalog {}: {e}", catalog_path.display()))?;
    let count = catalog.len();

    write_state(cart_path, &ServerCart::with_catalog(catalog))?;
    println!(
        "Created {} with {count} catalog recipes",
        cart_path.display()
    );
    Ok(())
}

/// `cart catalog <cart>`: Print the recipes that can be added.
pub fn catalog(cart_path: &Path, json: bool) -> Result {
    let state = read_state(cart_path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(state.catalog())?);
    } else {
        print_catalog(state.catalog());
    }
    Ok(())
}

/// `cart show <cart>`: Print recipes and lines.
pub async fn show(cart_path: &Path, config: &EngineConfig, json: bool) -> Result {
    let session = Session::open(cart_path, config).await?;
    let cart = session.engine().snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&*cart)?);
    } else {
        print_cart(&cart);
    }
    Ok(())
}

/// `cart list <cart>`: Print the consolidated shopping list.
pub async fn list(cart_path: &Path, config: &EngineConfig, json: bool) -> Result {
    let session = Session::open(cart_path, config).await?;
    let rows = session.engine().consolidated_ingredients();
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_list(&rows);
    }
    Ok(())
}

/// `cart add-recipe <cart> <id>`: Add a catalog recipe.
pub async fn add_recipe(
    cart_path: &Path,
    config: &EngineConfig,
    recipe_id: u64,
    serving: f64,
) -> Result {
    let session = Session::open(cart_path, config).await?;
    let recipe_id = RecipeId(recipe_id);
    let name = session
        .recipe_name(recipe_id)
        .ok_or_else(|| format!("Recipe {recipe_id} is not in the catalog"))?;

    let outcome = session.engine().add_recipe(recipe_id, name, serving).await?;
    finish(&session, outcome)
}

/// `cart remove-recipe <cart> <id>`
pub async fn remove_recipe(cart_path: &Path, config: &EngineConfig, recipe_id: u64) -> Result {
    let session = Session::open(cart_path, config).await?;
    let outcome = session.engine().remove_recipe(RecipeId(recipe_id)).await;
    finish(&session, outcome)
}

/// `cart remove-item <cart> <id>...`
pub async fn remove_items(cart_path: &Path, config: &EngineConfig, ids: &[u64]) -> Result {
    let session = Session::open(cart_path, config).await?;
    let outcome = match ids {
        [id] => session.engine().remove_item(ItemId(*id)).await,
        _ => {
            let ids: Vec<ItemId> = ids.iter().copied().map(ItemId).collect();
            session.engine().remove_items(&ids).await
        }
    };
    finish(&session, outcome)
}

/// `cart set-serving <cart> <recipe> <value>`
pub async fn set_serving(
    cart_path: &Path,
    config: &EngineConfig,
    recipe_id: u64,
    serving: f64,
) -> Result {
    let session = Session::open(cart_path, config).await?;
    let outcome = session
        .engine()
        .set_serving_size(RecipeId(recipe_id), serving)
        .await?;
    finish(&session, outcome)
}

/// `cart set-quantity <cart> <item> <value>`
pub async fn set_quantity(
    cart_path: &Path,
    config: &EngineConfig,
    item_id: u64,
    quantity: f64,
) -> Result {
    let session = Session::open(cart_path, config).await?;
    let outcome = session
        .engine()
        .set_item_quantity(ItemId(item_id), quantity)
        .await?;
    finish(&session, outcome)
}

/// Report a single-shot mutation and persist the cart.
fn finish(session: &Session, outcome: MutationOutcome) -> Result {
    print_outcome(outcome);
    session.save()?;
    match outcome {
        MutationOutcome::RolledBack => Err("The change was rejected and rolled back".into()),
        _ => Ok(()),
    }
}

// ── Output ───────────────────────────────────────────────────────────

pub fn print_outcome(outcome: MutationOutcome) {
    match outcome {
        MutationOutcome::Committed => println!("{}", style("ok").green()),
        MutationOutcome::Skipped => println!("{}", style("nothing to do").yellow()),
        MutationOutcome::Partial { failed } => println!(
            "{}",
            style(format!("partially applied, {failed} request(s) failed")).yellow()
        ),
        MutationOutcome::RolledBack => println!("{}", style("rolled back").red()),
    }
}

pub fn print_catalog(catalog: &[RecipeTemplate]) {
    if catalog.is_empty() {
        println!("  (empty catalog)");
        return;
    }

    for recipe in catalog {
        println!(
            "{} {}",
            style(format!("#{}", recipe.id)).dim(),
            style(&recipe.name).bold()
        );
        for ingredient in &recipe.ingredients {
            println!(
                "  {:<24} {:>10} {}",
                truncate(&ingredient.name, 24),
                format_qty(ingredient.quantity),
                ingredient.unit
            );
        }
    }
}

pub fn print_cart(cart: &Cart) {
    if cart.is_empty() {
        println!("  (empty cart)");
        return;
    }

    for recipe in cart.recipes() {
        println!(
            "{} {} {}",
            style(format!("#{}", recipe.recipe_id)).dim(),
            style(&recipe.name).bold(),
            style(format!("(serves {})", format_qty(recipe.serving_size))).dim(),
        );
        for item in &recipe.items {
            println!(
                "  {:>6}  {:<24} {:>10} {}",
                item.id,
                truncate(&item.name, 24),
                format_qty(item.quantity),
                item.unit
            );
        }
    }
}

pub fn print_list(rows: &[ConsolidatedIngredient]) {
    if rows.is_empty() {
        println!("  (nothing to buy)");
        return;
    }

    println!(
        "  {:<24} {:>10} {:<8} {}",
        "Ingredient", "Quantity", "Unit", "Items"
    );
    println!("  {}", "-".repeat(56));
    for row in rows {
        let items: Vec<String> = row.item_ids().iter().map(ToString::to_string).collect();
        println!(
            "  {:<24} {:>10} {:<8} {}",
            truncate(&row.name, 24),
            format_qty(row.quantity),
            row.unit,
            items.join(",")
        );
    }
}

pub fn print_undo(state: &UndoState) {
    match state {
        UndoState::Empty => println!("  undo: {}", style("empty").dim()),
        UndoState::Armed(action) => {
            println!("  undo: {}", style(action.describe()).cyan());
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn format_qty(q: f64) -> String {
    let s = format!("{q:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 3).collect();
        format!("{head}...")
    }
}
