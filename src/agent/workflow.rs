//! Pure workflow transitions. Each function takes the current state and an
//! input and returns the next state or an error; nothing here awaits, locks
//! or persists. `engine` drives these around the model calls.

use tracing::warn;

use crate::agent::prompts;
use crate::ai::message::ChatMessage;
use crate::error::AppError;
use crate::recipe::{MenuCandidate, SelectedIngredient, Settings, ValidatedRecipe};
use crate::state::{Phase, WorkflowState};

fn invalid(state: &WorkflowState, action: &'static str) -> AppError {
    AppError::InvalidTransition {
        phase: state.phase(),
        action,
    }
}

/// Prompt for a fresh batch of menus. With `regenerate`, the names of the
/// menus (and recipe) being replaced are passed as names to avoid.
pub fn plan_menu_proposal(
    state: &WorkflowState,
    regenerate: bool,
) -> Result<Vec<ChatMessage>, AppError> {
    if state.selected_ingredients.is_empty() {
        return Err(AppError::Validation("no ingredients selected".into()));
    }
    let avoid = if regenerate {
        if state.phase() == Phase::Idle {
            return Err(invalid(state, "regenerate"));
        }
        previous_menu_names(state)
    } else {
        Vec::new()
    };
    Ok(prompts::build_menu_proposal(
        &state.settings,
        &state.ingredient_names(),
        &avoid,
    ))
}

fn previous_menu_names(state: &WorkflowState) -> Vec<String> {
    let mut names: Vec<String> = state
        .proposed_menus
        .iter()
        .map(|m| m.menu_name.clone())
        .collect();
    if let Some(recipe) = &state.current_recipe {
        if !names.contains(&recipe.menu_name) && !recipe.menu_name.is_empty() {
            names.push(recipe.menu_name.clone());
        }
    }
    names
}

/// New menus replace everything downstream of them.
pub fn apply_menu_proposal(state: &WorkflowState, menus: Vec<MenuCandidate>) -> WorkflowState {
    WorkflowState {
        proposed_menus: menus,
        selected_menu_index: None,
        current_recipe: None,
        is_detailed_steps_displayed: false,
        ..state.clone()
    }
}

/// Select `index`, or deselect it if it is already the selection.
pub fn select_menu(state: &WorkflowState, index: usize) -> Result<WorkflowState, AppError> {
    if !matches!(state.phase(), Phase::MenusProposed | Phase::MenuSelected) {
        return Err(invalid(state, "select a menu"));
    }
    if index >= state.proposed_menus.len() {
        return Err(AppError::Validation(format!(
            "menu {} does not exist ({} proposed)",
            index + 1,
            state.proposed_menus.len()
        )));
    }
    let selected_menu_index = if state.selected_menu_index == Some(index) {
        None
    } else {
        Some(index)
    };
    Ok(WorkflowState {
        selected_menu_index,
        ..state.clone()
    })
}

/// Prompt for the detailed recipe of the selected menu.
pub fn plan_recipe(state: &WorkflowState) -> Result<Vec<ChatMessage>, AppError> {
    if state.phase() != Phase::MenuSelected {
        return Err(invalid(state, "confirm a menu"));
    }
    let menu = state
        .selected_menu()
        .ok_or_else(|| invalid(state, "confirm a menu"))?;
    Ok(prompts::build_detailed_recipe(
        menu,
        &state.settings,
        &state.ingredient_names(),
    ))
}

pub fn apply_recipe(
    state: &WorkflowState,
    recipe: ValidatedRecipe,
) -> Result<WorkflowState, AppError> {
    if state.phase() != Phase::MenuSelected {
        return Err(invalid(state, "store a recipe"));
    }
    Ok(WorkflowState {
        current_recipe: Some(recipe),
        is_detailed_steps_displayed: false,
        ..state.clone()
    })
}

/// Prompt for more detailed steps. A second expansion is refused before any
/// model call is made.
pub fn plan_step_expansion(state: &WorkflowState) -> Result<Vec<ChatMessage>, AppError> {
    match (state.phase(), &state.current_recipe) {
        (Phase::StepsDetailed, _) => Err(AppError::AlreadyDetailed),
        (Phase::RecipeReady, Some(recipe)) => {
            if recipe.cooking_steps.is_empty() {
                return Err(AppError::Validation("recipe has no steps to expand".into()));
            }
            Ok(prompts::build_step_expansion(recipe))
        }
        _ => Err(invalid(state, "expand steps")),
    }
}

/// Steps are replaced in place; ingredient data is untouched.
pub fn apply_detailed_steps(
    state: &WorkflowState,
    steps: Vec<String>,
) -> Result<WorkflowState, AppError> {
    if state.phase() == Phase::StepsDetailed {
        return Err(AppError::AlreadyDetailed);
    }
    let Some(recipe) = state.current_recipe.as_ref() else {
        return Err(invalid(state, "expand steps"));
    };
    if steps.len() != recipe.cooking_steps.len() {
        warn!(
            before = recipe.cooking_steps.len(),
            after = steps.len(),
            "detailed steps changed the step count"
        );
    }
    let mut recipe = recipe.clone();
    recipe.replace_steps(steps);
    Ok(WorkflowState {
        current_recipe: Some(recipe),
        is_detailed_steps_displayed: true,
        ..state.clone()
    })
}

/// Drop the recipe and return to the menu list, keeping the selection.
pub fn back_to_menus(state: &WorkflowState) -> Result<WorkflowState, AppError> {
    if !matches!(state.phase(), Phase::RecipeReady | Phase::StepsDetailed) {
        return Err(invalid(state, "go back to menus"));
    }
    Ok(WorkflowState {
        current_recipe: None,
        is_detailed_steps_displayed: false,
        ..state.clone()
    })
}

/// Back to `Idle`, keeping ingredients and settings.
pub fn clear(state: &WorkflowState) -> WorkflowState {
    WorkflowState {
        selected_ingredients: state.selected_ingredients.clone(),
        settings: state.settings.clone(),
        ..WorkflowState::default()
    }
}

/// Back to `Idle` with nothing selected and default settings.
pub fn clear_all() -> WorkflowState {
    WorkflowState::default()
}

pub fn with_settings(state: &WorkflowState, settings: Settings) -> WorkflowState {
    WorkflowState {
        settings,
        ..state.clone()
    }
}

pub fn with_selection(state: &WorkflowState, selection: Vec<SelectedIngredient>) -> WorkflowState {
    WorkflowState {
        selected_ingredients: selection,
        ..state.clone()
    }
    .normalized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::Category;

    fn with_ingredients() -> WorkflowState {
        WorkflowState {
            selected_ingredients: vec![SelectedIngredient {
                id: "egg".into(),
                name: "卵".into(),
                category: Category::Processed,
                original_selection: None,
            }],
            ..Default::default()
        }
    }

    fn menus(n: usize) -> Vec<MenuCandidate> {
        (0..n)
            .map(|i| MenuCandidate {
                menu_name: format!("料理{}", i),
                ..Default::default()
            })
            .collect()
    }

    fn recipe() -> ValidatedRecipe {
        ValidatedRecipe {
            menu_name: "卵焼き".into(),
            cooking_steps: vec!["卵を溶く".into(), "焼く".into()],
            ..Default::default()
        }
    }

    fn recipe_ready() -> WorkflowState {
        let state = apply_menu_proposal(&with_ingredients(), menus(6));
        let state = select_menu(&state, 2).unwrap();
        apply_recipe(&state, recipe()).unwrap()
    }

    #[test]
    fn test_propose_requires_ingredients() {
        let err = plan_menu_proposal(&WorkflowState::default(), false).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_idle_only_reaches_menus_proposed() {
        let idle = with_ingredients();
        assert!(plan_menu_proposal(&idle, false).is_ok());
        assert!(select_menu(&idle, 0).is_err());
        assert!(plan_recipe(&idle).is_err());
        assert!(apply_recipe(&idle, recipe()).is_err());
        assert!(plan_step_expansion(&idle).is_err());
        assert!(apply_detailed_steps(&idle, vec!["x".into()]).is_err());
        assert!(back_to_menus(&idle).is_err());
        assert!(matches!(
            plan_menu_proposal(&idle, true),
            Err(AppError::InvalidTransition { phase: Phase::Idle, .. })
        ));

        let next = apply_menu_proposal(&idle, menus(6));
        assert_eq!(next.phase(), Phase::MenusProposed);
    }

    #[test]
    fn test_recipe_needs_selection_first() {
        let proposed = apply_menu_proposal(&with_ingredients(), menus(6));
        assert!(plan_recipe(&proposed).is_err());
        assert!(apply_recipe(&proposed, recipe()).is_err());

        let selected = select_menu(&proposed, 0).unwrap();
        assert_eq!(selected.phase(), Phase::MenuSelected);
        assert!(plan_recipe(&selected).is_ok());
        assert_eq!(
            apply_recipe(&selected, recipe()).unwrap().phase(),
            Phase::RecipeReady
        );
    }

    #[test]
    fn test_select_toggles_and_replaces() {
        let proposed = apply_menu_proposal(&with_ingredients(), menus(6));
        let first = select_menu(&proposed, 1).unwrap();
        assert_eq!(first.selected_menu_index, Some(1));

        let other = select_menu(&first, 4).unwrap();
        assert_eq!(other.selected_menu_index, Some(4));

        let off = select_menu(&other, 4).unwrap();
        assert_eq!(off.selected_menu_index, None);
        assert_eq!(off.phase(), Phase::MenusProposed);

        assert!(matches!(
            select_menu(&proposed, 6),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_expand_once() {
        let ready = recipe_ready();
        assert!(plan_step_expansion(&ready).is_ok());

        let detailed =
            apply_detailed_steps(&ready, vec!["卵を箸でよく溶く".into(), "弱火で焼く".into()])
                .unwrap();
        assert_eq!(detailed.phase(), Phase::StepsDetailed);
        assert_eq!(
            detailed.current_recipe.as_ref().unwrap().cooking_steps[1],
            "弱火で焼く"
        );
        assert!(matches!(
            plan_step_expansion(&detailed),
            Err(AppError::AlreadyDetailed)
        ));
        assert!(matches!(
            apply_detailed_steps(&detailed, vec![]),
            Err(AppError::AlreadyDetailed)
        ));
    }

    #[test]
    fn test_regenerate_avoids_previous_names() {
        let ready = recipe_ready();
        let messages = plan_menu_proposal(&ready, true).unwrap();
        assert!(messages[0].content.contains("- 料理0"));
        assert!(messages[0].content.contains("- 卵焼き"));

        let regenerated = apply_menu_proposal(&ready, menus(6));
        assert_eq!(regenerated.phase(), Phase::MenusProposed);
        assert!(regenerated.current_recipe.is_none());
    }

    #[test]
    fn test_back_to_menus_keeps_selection() {
        let back = back_to_menus(&recipe_ready()).unwrap();
        assert_eq!(back.phase(), Phase::MenuSelected);
        assert_eq!(back.selected_menu_index, Some(2));
        assert_eq!(back.proposed_menus.len(), 6);
    }

    #[test]
    fn test_clear_and_clear_all() {
        let cleared = clear(&recipe_ready());
        assert_eq!(cleared.phase(), Phase::Idle);
        assert_eq!(cleared.selected_ingredients.len(), 1);

        let everything = clear_all();
        assert!(everything.selected_ingredients.is_empty());
        assert_eq!(everything.settings, Settings::default());
    }
}
