pub mod render;
pub mod settings;
pub mod shell;

use chrono::Utc;

use crate::engine::RecipeEngine;
use crate::error::AppError;
use crate::recipe::Category;
use crate::selection::ToggleOutcome;
use crate::transfer;

/// One line of user input, parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Propose,
    /// 1-based menu number as typed.
    Select(usize),
    Confirm,
    Expand,
    Regenerate,
    Back,
    Clear,
    ClearAll,
    List(Option<Category>),
    Toggle(String),
    Random,
    Unselect,
    Advice,
    Settings,
    Set { field: String, value: String },
    RandomSettings,
    State,
    Diag,
    Export(Option<String>),
    Import { path: String, force: bool },
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  list [CATEGORY]      show catalog items (vegetables, meat, seafood, processed, grains, seasonings, fruits)
  toggle ID            select or deselect an ingredient
  random               chef's choice ingredient selection
  unselect             clear the ingredient selection
  advice               notes about the current selection
  settings             show cooking conditions
  set FIELD VALUE      season | meal | time | cuisine | method | servings (lists comma separated)
  random-settings      pick random cooking conditions
  propose              ask for six menus
  select N             select or deselect menu N
  confirm              generate the recipe for the selected menu
  expand               rewrite the steps in more detail
  regenerate           ask for six different menus
  back                 return from the recipe to the menu list
  clear | clear-all    reset the workflow (clear-all also drops selection and settings)
  state | diag         show workflow state or recipe diagnostics
  export [PATH]        write selection and settings to a file
  import PATH [--force]
  quit";

impl Command {
    pub fn parse(line: &str) -> Result<Command, AppError> {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Err(AppError::Validation("empty command".into()));
        };
        let rest: Vec<&str> = parts.collect();
        let arg = |name: &str| -> Result<String, AppError> {
            rest.first()
                .map(|s| s.to_string())
                .ok_or_else(|| AppError::Validation(format!("`{}` needs an argument", name)))
        };

        let command = match head.to_lowercase().as_str() {
            "propose" => Command::Propose,
            "select" => {
                let raw = arg("select")?;
                let n: usize = raw
                    .parse()
                    .map_err(|_| AppError::Validation(format!("not a menu number: {}", raw)))?;
                if n == 0 {
                    return Err(AppError::Validation("menus are numbered from 1".into()));
                }
                Command::Select(n)
            }
            "confirm" => Command::Confirm,
            "expand" => Command::Expand,
            "regenerate" => Command::Regenerate,
            "back" => Command::Back,
            "clear" => Command::Clear,
            "clear-all" => Command::ClearAll,
            "list" => match rest.first() {
                None => Command::List(None),
                Some(name) => Command::List(Some(Category::parse(name).ok_or_else(|| {
                    AppError::Validation(format!("unknown category: {}", name))
                })?)),
            },
            "toggle" => Command::Toggle(arg("toggle")?),
            "random" => Command::Random,
            "unselect" => Command::Unselect,
            "advice" => Command::Advice,
            "settings" => Command::Settings,
            "set" => {
                let field = arg("set")?;
                let value = rest[1..].join(" ");
                if value.is_empty() {
                    return Err(AppError::Validation(format!("`set {}` needs a value", field)));
                }
                Command::Set { field, value }
            }
            "random-settings" => Command::RandomSettings,
            "state" => Command::State,
            "diag" => Command::Diag,
            "export" => Command::Export(rest.first().map(|s| s.to_string())),
            "import" => Command::Import {
                path: arg("import")?,
                force: rest.iter().any(|s| *s == "--force"),
            },
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(AppError::Validation(format!("unknown command: {}", other))),
        };
        Ok(command)
    }
}

pub enum Flow {
    Continue(String),
    Quit,
}

pub async fn dispatch(engine: &RecipeEngine, command: Command) -> Result<Flow, AppError> {
    let text = match command {
        Command::Propose => render::menus(&engine.propose_menus(None).await?),
        Command::Regenerate => render::menus(&engine.regenerate().await?),
        Command::Select(n) => match engine.select_menu(n - 1)? {
            Some(i) => format!("selected menu {}", i + 1),
            None => "selection cleared".to_string(),
        },
        Command::Confirm => {
            let recipe = engine.confirm_selection().await?;
            let mut out = render::recipe(&recipe);
            let diagnostics = engine.diagnostics();
            if !diagnostics.is_empty() {
                out.push('\n');
                out.push_str(&render::diagnostics(&diagnostics));
            }
            out
        }
        Command::Expand => render::steps(&engine.expand_steps().await?),
        Command::Back => format!("back to menus ({:?})", engine.back_to_menus()?),
        Command::Clear => {
            engine.clear()?;
            "cleared".to_string()
        }
        Command::ClearAll => {
            engine.clear_all()?;
            "cleared everything".to_string()
        }
        Command::List(category) => {
            let state = engine.snapshot()?;
            render::catalog(engine.catalog(), category, &state)
        }
        Command::Toggle(id) => match engine.toggle_ingredient(&id)? {
            ToggleOutcome::Added(entry) => match entry.original_selection {
                Some(_) => format!("added {} ({}, chosen for you)", entry.name, entry.id),
                None => format!("added {}", entry.name),
            },
            ToggleOutcome::Removed(entry) => format!("removed {}", entry.name),
        },
        Command::Random => render::selection(&engine.random_select()?),
        Command::Unselect => {
            engine.clear_selection()?;
            "selection cleared".to_string()
        }
        Command::Advice => render::advisories(&engine.selection_advisories()?),
        Command::Settings => render::settings(&engine.snapshot()?.settings),
        Command::Set { field, value } => {
            let current = engine.snapshot()?.settings;
            let next = settings::apply_field(current, &field, &value)?;
            let text = render::settings(&next);
            engine.update_settings(next)?;
            text
        }
        Command::RandomSettings => render::settings(&engine.random_settings()?),
        Command::State => render::state(&engine.snapshot()?),
        Command::Diag => render::diagnostics(&engine.diagnostics()),
        Command::Export(path) => {
            let now = Utc::now();
            let path = path.unwrap_or_else(|| transfer::export_file_name(now));
            let json = engine.export_settings(now)?;
            std::fs::write(&path, json)?;
            format!("exported to {}", path)
        }
        Command::Import { path, force } => {
            let raw = std::fs::read_to_string(&path)?;
            let imported = engine.import_settings(&raw, force)?;
            let date = imported
                .export_date
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            format!(
                "imported {} ingredients (exported {})",
                imported.selected_ingredients.len(),
                date
            )
        }
        Command::Help => HELP.to_string(),
        Command::Quit => return Ok(Flow::Quit),
    };
    Ok(Flow::Continue(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse("propose").unwrap(), Command::Propose);
        assert_eq!(Command::parse("  CONFIRM ").unwrap(), Command::Confirm);
        assert_eq!(Command::parse("clear-all").unwrap(), Command::ClearAll);
        assert_eq!(Command::parse("exit").unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_select() {
        assert_eq!(Command::parse("select 3").unwrap(), Command::Select(3));
        assert!(Command::parse("select 0").is_err());
        assert!(Command::parse("select two").is_err());
        assert!(Command::parse("select").is_err());
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(
            Command::parse("toggle soySauce").unwrap(),
            Command::Toggle("soySauce".into())
        );
        assert_eq!(
            Command::parse("list fruits").unwrap(),
            Command::List(Some(Category::Fruits))
        );
        assert!(Command::parse("list desserts").is_err());
        assert_eq!(
            Command::parse("set cuisine 和食,中華").unwrap(),
            Command::Set {
                field: "cuisine".into(),
                value: "和食,中華".into()
            }
        );
        assert!(Command::parse("set season").is_err());
        assert_eq!(
            Command::parse("import a.json --force").unwrap(),
            Command::Import {
                path: "a.json".into(),
                force: true
            }
        );
        assert_eq!(Command::parse("export").unwrap(), Command::Export(None));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Command::parse(""), Err(AppError::Validation(_))));
        assert!(matches!(
            Command::parse("bake cake"),
            Err(AppError::Validation(_))
        ));
    }
}
