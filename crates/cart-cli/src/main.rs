use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;

mod commands;
mod script;

/// cart: Development tool for cart-sync.
///
/// Drives a cart engine against a local JSON file that stands in for the
/// remote cart service.
#[derive(Parser)]
#[command(name = "cart", version, about, long_about = None)]
struct Cli {
    /// Engine configuration file (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). Overrides RUST_LOG.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a cart file from a JSON recipe catalog.
    Init {
        /// Path of the cart file to create.
        cart: PathBuf,

        /// JSON array of recipe definitions.
        #[arg(long)]
        catalog: PathBuf,

        /// Overwrite an existing cart file.
        #[arg(long)]
        force: bool,
    },

    /// Show the recipe catalog stored in a cart file.
    Catalog {
        /// Path to the cart file.
        cart: PathBuf,

        /// Print the catalog as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show recipes and their lines.
    Show {
        /// Path to the cart file.
        cart: PathBuf,

        /// Print the cart as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the consolidated shopping list.
    List {
        /// Path to the cart file.
        cart: PathBuf,

        /// Print the list as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Add a recipe from the catalog.
    AddRecipe {
        /// Path to the cart file.
        cart: PathBuf,

        recipe_id: u64,

        #[arg(short, long, default_value = "1.0")]
        serving: f64,
    },

    /// Remove a recipe and all of its lines.
    RemoveRecipe {
        /// Path to the cart file.
        cart: PathBuf,

        recipe_id: u64,
    },

    /// Remove one or more lines.
    RemoveItem {
        /// Path to the cart file.
        cart: PathBuf,

        #[arg(required = true)]
        item_ids: Vec<u64>,
    },

    /// Change a recipe's serving size.
    SetServing {
        /// Path to the cart file.
        cart: PathBuf,

        recipe_id: u64,

        serving: f64,
    },

    /// Change the quantity of a line.
    SetQuantity {
        /// Path to the cart file.
        cart: PathBuf,

        item_id: u64,

        #[arg(allow_negative_numbers = true)]
        quantity: f64,
    },

    /// Run a sequence of commands in one session, so removals can be undone.
    Script {
        /// Path to the cart file.
        cart: PathBuf,

        /// Script file, one command per line. Reads stdin when omitted.
        file: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into()),
        1 => tracing_subscriber::EnvFilter::new("debug"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> commands::Result {
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init {
            cart,
            catalog,
            force,
        } => commands::init(&cart, &catalog, force),
        Commands::Catalog { cart, json } => commands::catalog(&cart, json),
        Commands::Show { cart, json } => commands::show(&cart, &config, json).await,
        Commands::List { cart, json } => commands::list(&cart, &config, json).await,
        Commands::AddRecipe {
            cart,
            recipe_id,
            serving,
        } => commands::add_recipe(&cart, &config, recipe_id, serving).await,
        Commands::RemoveRecipe { cart, recipe_id } => {
            commands::remove_recipe(&cart, &config, recipe_id).await
        }
        Commands::RemoveItem { cart, item_ids } => {
            commands::remove_items(&cart, &config, &item_ids).await
        }
        Commands::SetServing {
            cart,
            recipe_id,
            serving,
        } => commands::set_serving(&cart, &config, recipe_id, serving).await,
        Commands::SetQuantity {
            cart,
            item_id,
            quantity,
        } => commands::set_quantity(&cart, &config, item_id, quantity).await,
        Commands::Script { cart, file } => script::run(&cart, &config, file.as_deref()).await,
    }
}
