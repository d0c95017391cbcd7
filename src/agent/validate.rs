use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::agent::rules::ReferenceTables;
use crate::catalog::IngredientCatalog;
use crate::recipe::{
    Category, IngredientLine, RecipeDraft, SeasoningLine, SelectedIngredient, ValidatedRecipe,
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    UnauthorizedIngredient,
    UnknownSeasoning,
    UnauthorizedSeasoningInSteps,
    UnauthorizedIngredientInSteps,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RecipeSection {
    Ingredients,
    Seasonings,
    CookingSteps,
}

/// A rule break that caused data to be dropped, or prose that names
/// something the user did not pick.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub ingredient: String,
    pub section: RecipeSection,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    MovedToSeasonings,
    CorrectedSelectionStatus,
}

/// An inconsistency that was corrected automatically.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Warning {
    pub kind: WarningKind,
    pub ingredient: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub recipe: ValidatedRecipe,
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
}

/// Name sets derived from the user's selection.
struct SelectionNames {
    ingredients: HashSet<String>,
    seasonings: HashSet<String>,
}

impl SelectionNames {
    fn from_selection(selection: &[SelectedIngredient]) -> Self {
        let mut ingredients = HashSet::new();
        let mut seasonings = HashSet::new();
        for item in selection {
            let name = item.name.trim().to_string();
            if item.category == Category::Seasonings {
                seasonings.insert(name);
            } else {
                ingredients.insert(name);
            }
        }
        Self {
            ingredients,
            seasonings,
        }
    }

    fn any_contains(&self, needle: &str) -> bool {
        self.ingredients
            .iter()
            .chain(self.seasonings.iter())
            .any(|n| n == needle || n.contains(needle))
    }
}

/// Reconcile a draft against the selection. Ingredients are a closed set:
/// anything unselected is moved to seasonings (when it is one) or dropped.
/// Seasonings are an open set: unknown ones are reported but kept. Steps are
/// reported only, never rewritten.
pub fn validate_recipe(
    draft: &RecipeDraft,
    selection: &[SelectedIngredient],
    tables: &ReferenceTables,
    catalog: &dyn IngredientCatalog,
) -> ValidationReport {
    let names = SelectionNames::from_selection(selection);
    let mut violations = Vec::new();
    let mut warnings = Vec::new();

    let mut ingredients: Vec<IngredientLine> = Vec::new();
    let mut moved: Vec<SeasoningLine> = Vec::new();

    for line in &draft.ingredients {
        let name = line.name.trim();
        if names.ingredients.contains(name) {
            ingredients.push(IngredientLine {
                name: name.to_string(),
                amount: line.amount.clone(),
            });
        } else if names.seasonings.contains(name) || tables.is_known_seasoning(name) {
            moved.push(SeasoningLine {
                name: name.to_string(),
                amount: line.amount.clone(),
                is_selected: names.seasonings.contains(name),
            });
            warnings.push(Warning {
                kind: WarningKind::MovedToSeasonings,
                ingredient: name.to_string(),
                message: format!("「{}」は調味料のため、調味料欄に移動しました", name),
            });
        } else {
            violations.push(Violation {
                kind: ViolationKind::UnauthorizedIngredient,
                ingredient: name.to_string(),
                section: RecipeSection::Ingredients,
                message: format!("選択されていない食材「{}」をレシピから除外しました", name),
            });
        }
    }

    let mut seasonings: Vec<SeasoningLine> = Vec::with_capacity(draft.seasonings.len() + moved.len());
    for entry in &draft.seasonings {
        let name = entry.name.trim();
        let is_selected = names.seasonings.contains(name);

        if !is_selected && !tables.is_known_seasoning(name) {
            violations.push(Violation {
                kind: ViolationKind::UnknownSeasoning,
                ingredient: name.to_string(),
                section: RecipeSection::Seasonings,
                message: format!("未知の調味料「{}」がレシピに含まれています", name),
            });
        }
        if entry.is_selected != Some(is_selected) {
            warnings.push(Warning {
                kind: WarningKind::CorrectedSelectionStatus,
                ingredient: name.to_string(),
                message: format!("「{}」の選択状態を修正しました", name),
            });
        }
        seasonings.push(SeasoningLine {
            name: name.to_string(),
            amount: entry.amount.clone(),
            is_selected,
        });
    }
    seasonings.extend(moved);

    violations.extend(scan_steps(&draft.cooking_steps, &names, tables, catalog));

    let recipe = ValidatedRecipe {
        menu_name: draft.menu_name.clone(),
        description: draft.description.clone(),
        cooking_time: draft.cooking_time.clone(),
        difficulty: draft.difficulty.clone(),
        ingredients,
        seasonings,
        cooking_steps: draft.cooking_steps.clone(),
        tips: draft.tips.clone(),
        ingredient_usage: draft.usage(),
        alternatives: draft.alternatives.clone(),
    };

    for v in &violations {
        warn!(kind = ?v.kind, ingredient = %v.ingredient, "{}", v.message);
    }
    for w in &warnings {
        info!(kind = ?w.kind, ingredient = %w.ingredient, "{}", w.message);
    }

    ValidationReport {
        recipe,
        violations,
        warnings,
    }
}

fn scan_steps(
    steps: &[String],
    names: &SelectionNames,
    tables: &ReferenceTables,
    catalog: &dyn IngredientCatalog,
) -> Vec<Violation> {
    let text = steps.join(" ");
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut reported: HashSet<String> = HashSet::new();

    for seasoning in &tables.step_seasonings {
        let selected = tables
            .variations(seasoning)
            .iter()
            .any(|v| names.seasonings.contains(v));
        if text.contains(seasoning.as_str()) && !selected && reported.insert(seasoning.clone()) {
            out.push(Violation {
                kind: ViolationKind::UnauthorizedSeasoningInSteps,
                ingredient: seasoning.clone(),
                section: RecipeSection::CookingSteps,
                message: format!(
                    "作り方で「{}」が使われていますが、選択された調味料に含まれていません",
                    seasoning
                ),
            });
        }
    }

    for name in catalog.all_names() {
        if name.is_empty()
            || !text.contains(name)
            || names.any_contains(name)
            || tables.is_known_seasoning(name)
            || !reported.insert(name.to_string())
        {
            continue;
        }
        out.push(Violation {
            kind: ViolationKind::UnauthorizedIngredientInSteps,
            ingredient: name.to_string(),
            section: RecipeSection::CookingSteps,
            message: format!("作り方に選択されていない食材「{}」が含まれています", name),
        });
    }

    out
}
