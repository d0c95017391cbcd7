//! Plain-text views of engine results for the shell.

use std::fmt::Write;

use crate::agent::assemble::Diagnostics;
use crate::catalog::IngredientCatalog;
use crate::recipe::{Category, MenuCandidate, SelectedIngredient, Settings, ValidatedRecipe};
use crate::selection::Advisory;
use crate::state::WorkflowState;

pub fn menus(menus: &[MenuCandidate]) -> String {
    let mut out = String::new();
    for (i, menu) in menus.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} [{}] {} / {}",
            i + 1,
            menu.menu_name,
            menu.cuisine,
            menu.cooking_time,
            menu.difficulty
        );
        if !menu.description.is_empty() {
            let _ = writeln!(out, "   {}", menu.description);
        }
    }
    out.trim_end().to_string()
}

pub fn recipe(recipe: &ValidatedRecipe) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", recipe.menu_name);
    if !recipe.description.is_empty() {
        let _ = writeln!(out, "{}", recipe.description);
    }
    let _ = writeln!(out, "time: {}  difficulty: {}", recipe.cooking_time, recipe.difficulty);
    let _ = writeln!(out, "ingredients:");
    for line in &recipe.ingredients {
        let _ = writeln!(out, "  - {} {}", line.name, line.amount);
    }
    if !recipe.seasonings.is_empty() {
        let _ = writeln!(out, "seasonings:");
        for s in &recipe.seasonings {
            let mark = if s.is_selected { "" } else { " (basic)" };
            let _ = writeln!(out, "  - {} {}{}", s.name, s.amount, mark);
        }
    }
    out.push_str("steps:\n");
    out.push_str(&steps(&recipe.cooking_steps));
    out.push('\n');
    if !recipe.tips.is_empty() {
        let _ = writeln!(out, "tips: {}", recipe.tips);
    }
    if let Some(alternatives) = &recipe.alternatives {
        for sub in &alternatives.substitutions {
            let _ = writeln!(out, "substitute: {} -> {}", sub.original, sub.substitute);
        }
    }
    out.trim_end().to_string()
}

pub fn steps(steps: &[String]) -> String {
    steps
        .iter()
        .enumerate()
        .map(|(i, s)| format!("  {}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn diagnostics(diagnostics: &Diagnostics) -> String {
    if diagnostics.is_empty() {
        return "no issues".to_string();
    }
    let mut out = format!("{} issue(s):\n", diagnostics.total());
    for v in &diagnostics.violations {
        let _ = writeln!(out, "  violation: {}", v.message);
    }
    for w in &diagnostics.warnings {
        let _ = writeln!(out, "  corrected: {}", w.message);
    }
    for c in &diagnostics.contradictions {
        let _ = writeln!(out, "  contradiction: {}", c.message);
    }
    out.trim_end().to_string()
}

/// Catalog listing; `*` marks selected items and `~` items in season.
pub fn catalog(
    catalog: &dyn IngredientCatalog,
    only: Option<Category>,
    state: &WorkflowState,
) -> String {
    let categories: Vec<Category> = match only {
        Some(c) => vec![c],
        None => Category::ALL.to_vec(),
    };
    let mut out = String::new();
    for category in categories {
        let _ = writeln!(out, "[{}]", category.as_str());
        for item in catalog.category(category) {
            let selected = state
                .selected_ingredients
                .iter()
                .any(|s| s.id == item.id || s.original_selection.as_deref() == Some(&item.id));
            let _ = writeln!(
                out,
                " {}{} {} ({})",
                if selected { '*' } else { ' ' },
                if item.in_season(&state.settings.season) { '~' } else { ' ' },
                item.name,
                item.id
            );
        }
    }
    out.trim_end().to_string()
}

pub fn selection(selection: &[SelectedIngredient]) -> String {
    if selection.is_empty() {
        return "nothing selected".to_string();
    }
    let names: Vec<&str> = selection.iter().map(|s| s.name.as_str()).collect();
    format!("selected: {}", names.join("、"))
}

pub fn advisories(advisories: &[Advisory]) -> String {
    if advisories.is_empty() {
        return "no advice".to_string();
    }
    advisories
        .iter()
        .map(|a| format!("{}: {}\n  {}", a.ingredients.join("、"), a.message, a.tips))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn settings(settings: &Settings) -> String {
    format!(
        "season: {}\nmeal: {}\ntime: {}\ncuisine: {}\nmethod: {}\nservings: {}",
        settings.season,
        settings.meal_type,
        settings.cooking_time,
        settings.cuisine.join(","),
        settings.cooking_method.join(","),
        settings.servings
    )
}

pub fn state(state: &WorkflowState) -> String {
    let mut out = format!("phase: {:?}\n", state.phase());
    let _ = writeln!(out, "{}", selection(&state.selected_ingredients));
    if !state.proposed_menus.is_empty() {
        let _ = writeln!(out, "menus: {}", state.proposed_menus.len());
    }
    if let Some(menu) = state.selected_menu() {
        let _ = writeln!(out, "selected menu: {}", menu.menu_name);
    }
    if let Some(recipe) = &state.current_recipe {
        let _ = writeln!(
            out,
            "recipe: {}{}",
            recipe.menu_name,
            if state.is_detailed_steps_displayed { " (detailed steps)" } else { "" }
        );
    }
    out.trim_end().to_string()
}
