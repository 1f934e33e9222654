//! `cart script`: several commands against one engine, so the undo buffer
//! survives between them.
//!
//! ```text
//! # comments and blank lines are ignored
//! remove-recipe 7
//! show
//! undo
//! remove-row flour cups
//! dismiss
//! ```

use std::io::Read;
use std::path::Path;

use cart_sync::{EngineConfig, ItemId, RecipeId};
use tracing::warn;

use crate::commands::{self, print_cart, print_list, print_outcome, print_undo, Session};

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Show,
    List,
    Refresh,
    Status,
    Add { recipe_id: u64, serving: f64 },
    RemoveRecipe(u64),
    RemoveItems(Vec<u64>),
    RemoveRow { name: String, unit: Option<String> },
    Serving { recipe_id: u64, serving: f64 },
    Quantity { item_id: u64, quantity: f64 },
    Undo,
    Dismiss,
}

fn number<T: std::str::FromStr>(word: Option<&str>, what: &str) -> Result<T, String> {
    let word = word.ok_or_else(|| format!("missing {what}"))?;
    word.parse()
        .map_err(|_| format!("invalid {what}: {word:?}"))
}

fn parse_line(line: &str) -> Result<Option<Step>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let step = match command {
        "show" => Step::Show,
        "list" => Step::List,
        "refresh" => Step::Refresh,
        "status" => Step::Status,
        "undo" => Step::Undo,
        "dismiss" => Step::Dismiss,
        "add" => Step::Add {
            recipe_id: number(words.next(), "recipe id")?,
            serving: match words.next() {
                Some(w) => number(Some(w), "serving size")?,
                None => 1.0,
            },
        },
        "remove-recipe" => Step::RemoveRecipe(number(words.next(), "recipe id")?),
        "remove-item" => {
            let ids = words
                .by_ref()
                .map(|w| number(Some(w), "item id"))
                .collect::<Result<Vec<u64>, _>>()?;
            if ids.is_empty() {
                return Err("missing item id".to_string());
            }
            Step::RemoveItems(ids)
        }
        "remove-row" => Step::RemoveRow {
            name: words
                .next()
                .ok_or_else(|| "missing ingredient name".to_string())?
                .to_string(),
            unit: words.next().map(str::to_string),
        },
        "serving" => Step::Serving {
            recipe_id: number(words.next(), "recipe id")?,
            serving: number(words.next(), "serving size")?,
        },
        "quantity" => Step::Quantity {
            item_id: number(words.next(), "item id")?,
            quantity: number(words.next(), "quantity")?,
        },
        other => return Err(format!("unknown command {other:?}")),
    };

    if let Some(extra) = words.next() {
        return Err(format!("unexpected argument {extra:?}"));
    }
    Ok(Some(step))
}

fn parse(source: &str) -> commands::Result<Vec<Step>> {
    let mut steps = Vec::new();
    for (n, line) in source.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(step)) => steps.push(step),
            Ok(None) => {}
            Err(e) => return Err(format!("line {}: {e}", n + 1).into()),
        }
    }
    Ok(steps)
}

/// `cart script <cart> [file]`: Run a command script in one session.
pub async fn run(cart_path: &Path, config: &EngineConfig, file: Option<&Path>) -> commands::Result {
    let source = match file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read script {}: {e}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let steps = parse(&source)?;

    let session = Session::open(cart_path, config).await?;
    for step in steps {
        println!("> {}", describe(&step));
        execute(&session, step).await;
    }
    session.save()
}

/// Run one step. Failures are reported and the script moves on.
async fn execute(session: &Session, step: Step) {
    let engine = session.engine();
    let result = match step {
        Step::Show => {
            print_cart(&engine.snapshot());
            Ok(None)
        }
        Step::List => {
            print_list(&engine.consolidated_ingredients());
            Ok(None)
        }
        Step::Status => {
            println!("  sync: {:?}, revision {}", engine.sync_status(), engine.revision());
            print_undo(&engine.undo_state());
            Ok(None)
        }
        Step::Refresh => engine.refresh().await.map(|_| None),
        Step::Add { recipe_id, serving } => {
            let recipe_id = RecipeId(recipe_id);
            let name = session
                .recipe_name(recipe_id)
                .unwrap_or_else(|| format!("recipe {recipe_id}"));
            engine.add_recipe(recipe_id, name, serving).await.map(Some)
        }
        Step::RemoveRecipe(id) => Ok(Some(engine.remove_recipe(RecipeId(id)).await)),
        Step::RemoveItems(ids) => {
            let ids: Vec<ItemId> = ids.into_iter().map(ItemId).collect();
            Ok(Some(engine.remove_items(&ids).await))
        }
        Step::RemoveRow { name, unit } => {
            let rows = engine.consolidated_ingredients();
            let row = rows.iter().find(|r| {
                r.name.eq_ignore_ascii_case(&name)
                    && unit.as_ref().map_or(true, |u| r.unit.eq_ignore_ascii_case(u))
            });
            match row {
                Some(row) => Ok(Some(engine.remove_consolidated(row).await)),
                None => {
                    println!("  no row named {name:?}");
                    Ok(None)
                }
            }
        }
        Step::Serving { recipe_id, serving } => engine
            .set_serving_size(RecipeId(recipe_id), serving)
            .await
            .map(Some),
        Step::Quantity { item_id, quantity } => engine
            .set_item_quantity(ItemId(item_id), quantity)
            .await
            .map(Some),
        Step::Undo => {
            match engine.invoke_undo().await {
                Some(report) => println!(
                    "  restored {} line(s), {} skipped, {} error(s)",
                    report.restored, report.skipped, report.errors
                ),
                None => println!("  nothing to undo"),
            }
            Ok(None)
        }
        Step::Dismiss => {
            if !engine.dismiss_undo().await {
                println!("  nothing to dismiss");
            }
            Ok(None)
        }
    };

    match result {
        Ok(Some(outcome)) => print_outcome(outcome),
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "script step failed");
            println!("  error: {e}");
        }
    }
}

fn describe(step: &Step) -> String {
    match step {
        Step::Show => "show".to_string(),
        Step::List => "list".to_string(),
        Step::Refresh => "refresh".to_string(),
        Step::Status => "status".to_string(),
        Step::Add { recipe_id, serving } => format!("add {recipe_id} {serving}"),
        Step::RemoveRecipe(id) => format!("remove-recipe {id}"),
        Step::RemoveItems(ids) => {
            let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
            format!("remove-item {}", ids.join(" "))
        }
        Step::RemoveRow { name, unit } => match unit {
            Some(unit) => format!("remove-row {name} {unit}"),
            None => format!("remove-row {name}"),
        },
        Step::Serving { recipe_id, serving } => format!("serving {recipe_id} {serving}"),
        Step::Quantity { item_id, quantity } => format!("quantity {item_id} {quantity}"),
        Step::Undo => "undo".to_string(),
        Step::Dismiss => "dismiss".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_command() {
        let source = "\
# warm up
show
add 7
add 8 2.5
remove-recipe 7
remove-item 1 2 3
remove-row flour cups
remove-row egg
serving 8 1.5
quantity 4 -5

undo
dismiss
";
        let steps = parse(source).unwrap();
        assert_eq!(
            steps,
            vec![
                Step::Show,
                Step::Add { recipe_id: 7, serving: 1.0 },
                Step::Add { recipe_id: 8, serving: 2.5 },
                Step::RemoveRecipe(7),
                Step::RemoveItems(vec![1, 2, 3]),
                Step::RemoveRow { name: "flour".to_string(), unit: Some("cups".to_string()) },
                Step::RemoveRow { name: "egg".to_string(), unit: None },
                Step::Serving { recipe_id: 8, serving: 1.5 },
                Step::Quantity { item_id: 4, quantity: -5.0 },
                Step::Undo,
                Step::Dismiss,
            ]
        );
    }

    #[test]
    fn errors_carry_the_line_number() {
        let err = parse("show\nremove-item\n").unwrap_err();
        assert_eq!(err.to_string(), "line 2: missing item id");

        let err = parse("serving 1 lots\n").unwrap_err();
        assert_eq!(err.to_string(), "line 1: invalid serving size: \"lots\"");

        let err = parse("undo now\n").unwrap_err();
        assert_eq!(err.to_string(), "line 1: unexpected argument \"now\"");

        assert!(parse("explode\n").is_err());
    }
}
