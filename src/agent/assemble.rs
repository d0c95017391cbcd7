use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::agent::contradiction::{detect_contradictions, Contradiction};
use crate::agent::extract::extract_json_with_preview;
use crate::agent::rules::ReferenceTables;
use crate::agent::validate::{validate_recipe, Violation, Warning};
use crate::catalog::IngredientCatalog;
use crate::error::AppError;
use crate::recipe::{MenuCandidate, RecipeDraft, SelectedIngredient, ValidatedRecipe};

pub const MENU_COUNT: usize = 6;

const RECIPE_KEYS: [&str; 3] = ["menuName", "ingredients", "cookingSteps"];

/// Advisory output of the last recipe assembly. Never persisted.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Diagnostics {
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
    pub contradictions: Vec<Contradiction>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty() && self.warnings.is_empty() && self.contradictions.is_empty()
    }

    pub fn total(&self) -> usize {
        self.violations.len() + self.warnings.len() + self.contradictions.len()
    }
}

#[derive(Debug, Clone)]
pub struct AssembledRecipe {
    pub recipe: ValidatedRecipe,
    pub diagnostics: Diagnostics,
}

/// Parse the menu proposal reply. Requires a `menus` array with at least one
/// named entry; keeps at most [`MENU_COUNT`].
pub fn parse_menus(raw: &str, preview_chars: usize) -> Result<Vec<MenuCandidate>, AppError> {
    debug!(raw = %raw, "menu proposal reply");
    let outcome = extract_json_with_preview(raw, preview_chars)?;
    let Some(items) = outcome.value.get("menus").and_then(Value::as_array) else {
        return Err(AppError::Shape("reply has no `menus` array".into()));
    };

    let mut menus: Vec<MenuCandidate> = items
        .iter()
        .filter_map(|item| match serde_json::from_value::<MenuCandidate>(item.clone()) {
            Ok(menu) if !menu.menu_name.trim().is_empty() => Some(menu),
            Ok(_) => {
                warn!("skipping menu candidate without a name");
                None
            }
            Err(e) => {
                warn!(error = %e, "skipping malformed menu candidate");
                None
            }
        })
        .collect();

    if menus.is_empty() {
        return Err(AppError::Shape("`menus` contains no usable candidates".into()));
    }
    if menus.len() != MENU_COUNT {
        warn!(
            count = menus.len(),
            expected = MENU_COUNT,
            "model returned an unexpected number of menus"
        );
        menus.truncate(MENU_COUNT);
    }
    Ok(menus)
}

/// Extract, shape-check, validate, then scan for contradictions.
pub fn assemble_recipe(
    raw: &str,
    selection: &[SelectedIngredient],
    tables: &ReferenceTables,
    catalog: &dyn IngredientCatalog,
    preview_chars: usize,
) -> Result<AssembledRecipe, AppError> {
    debug!(raw = %raw, "detailed recipe reply");
    let outcome = extract_json_with_preview(raw, preview_chars)?;
    let draft = parse_draft(outcome.value)?;

    let report = validate_recipe(&draft, selection, tables, catalog);
    let contradictions = detect_contradictions(&report.recipe, tables);
    let diagnostics = Diagnostics {
        violations: report.violations,
        warnings: report.warnings,
        contradictions,
    };

    info!(
        menu = %report.recipe.menu_name,
        violations = diagnostics.violations.len(),
        warnings = diagnostics.warnings.len(),
        contradictions = diagnostics.contradictions.len(),
        "recipe assembled"
    );
    Ok(AssembledRecipe {
        recipe: report.recipe,
        diagnostics,
    })
}

/// Recompute diagnostics for a recipe that is already validated, e.g. after a
/// session restore. The recipe itself is left untouched.
pub fn diagnose_recipe(
    recipe: &ValidatedRecipe,
    selection: &[SelectedIngredient],
    tables: &ReferenceTables,
    catalog: &dyn IngredientCatalog,
) -> Diagnostics {
    let report = validate_recipe(&recipe.to_draft(), selection, tables, catalog);
    Diagnostics {
        violations: report.violations,
        warnings: report.warnings,
        contradictions: detect_contradictions(recipe, tables),
    }
}

/// Steps from the expansion reply. `detailedSteps` is asked for; a reply that
/// reuses `cookingSteps` is accepted too.
pub fn parse_detailed_steps(raw: &str, preview_chars: usize) -> Result<Vec<String>, AppError> {
    debug!(raw = %raw, "step expansion reply");
    let outcome = extract_json_with_preview(raw, preview_chars)?;
    let steps = ["detailedSteps", "cookingSteps"]
        .iter()
        .find_map(|key| outcome.value.get(*key).and_then(Value::as_array))
        .ok_or_else(|| AppError::Shape("reply has no `detailedSteps` array".into()))?;

    let steps: Vec<String> = steps
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if steps.is_empty() {
        return Err(AppError::Shape("`detailedSteps` is empty".into()));
    }
    Ok(steps)
}

fn parse_draft(value: Value) -> Result<RecipeDraft, AppError> {
    let Some(object) = value.as_object() else {
        return Err(AppError::Shape("reply is not a JSON object".into()));
    };
    if !RECIPE_KEYS.iter().any(|k| object.contains_key(*k)) {
        return Err(AppError::Shape(
            "reply has none of `menuName`, `ingredients`, `cookingSteps`".into(),
        ));
    }
    serde_json::from_value(value).map_err(|e| AppError::Shape(format!("recipe fields: {}", e)))
}
