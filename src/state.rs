use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::recipe::{MenuCandidate, SelectedIngredient, Settings, ValidatedRecipe};

/// Where the workflow currently stands. Derived from [`WorkflowState`] so the
/// persisted form stays a plain data dump.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    MenusProposed,
    MenuSelected,
    RecipeReady,
    StepsDetailed,
}

/// The unit of persistence: everything the session needs to resume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowState {
    pub selected_ingredients: Vec<SelectedIngredient>,
    pub proposed_menus: Vec<MenuCandidate>,
    /// Stored as `-1` for "no selection" to stay compatible with saved sessions.
    #[serde(with = "menu_index")]
    pub selected_menu_index: Option<usize>,
    pub current_recipe: Option<ValidatedRecipe>,
    pub is_detailed_steps_displayed: bool,
    pub settings: Settings,
}

impl WorkflowState {
    pub fn phase(&self) -> Phase {
        match (&self.current_recipe, self.proposed_menus.is_empty()) {
            (Some(_), _) if self.is_detailed_steps_displayed => Phase::StepsDetailed,
            (Some(_), _) => Phase::RecipeReady,
            (None, true) => Phase::Idle,
            (None, false) if self.selected_menu().is_some() => Phase::MenuSelected,
            (None, false) => Phase::MenusProposed,
        }
    }

    pub fn selected_menu(&self) -> Option<&MenuCandidate> {
        self.selected_menu_index
            .and_then(|i| self.proposed_menus.get(i))
    }

    pub fn ingredient_names(&self) -> Vec<String> {
        self.selected_ingredients
            .iter()
            .map(|i| i.name.clone())
            .collect()
    }

    /// Rebuild a stored state field by field. A field that doesn't parse
    /// falls back to its default and list entries are skipped one at a time.
    /// Only a value that isn't an object yields `None`.
    pub fn from_stored(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let state = WorkflowState {
            selected_ingredients: entries(obj, "selectedIngredients"),
            proposed_menus: entries(obj, "proposedMenus"),
            selected_menu_index: obj.get("selectedMenuIndex").and_then(stored_index),
            current_recipe: field(obj, "currentRecipe"),
            is_detailed_steps_displayed: obj
                .get("isDetailedStepsDisplayed")
                .is_some_and(stored_flag),
            settings: field(obj, "settings"),
        };
        Some(state.normalized())
    }

    /// Drop fields that can't be trusted after a restore: an index pointing
    /// past the menu list, or a detail flag without a recipe.
    pub fn normalized(mut self) -> Self {
        if self
            .selected_menu_index
            .is_some_and(|i| i >= self.proposed_menus.len())
        {
            self.selected_menu_index = None;
        }
        if self.current_recipe.is_none() {
            self.is_detailed_steps_displayed = false;
        }
        let mut seen = std::collections::HashSet::new();
        self.selected_ingredients.retain(|i| seen.insert(i.id.clone()));
        self
    }
}

fn entries<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str) -> Vec<T> {
    let Some(items) = obj.get(key).and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            serde_json::from_value(item.clone())
                .map_err(|e| warn!(field = key, error = %e, "skipping malformed stored entry"))
                .ok()
        })
        .collect()
}

fn field<T: DeserializeOwned + Default>(obj: &Map<String, Value>, key: &str) -> T {
    match obj.get(key) {
        None | Some(Value::Null) => T::default(),
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!(field = key, error = %e, "stored field unreadable, using default");
            T::default()
        }),
    }
}

fn stored_index(value: &Value) -> Option<usize> {
    let index: Option<i64> = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    index.filter(|i| *i >= 0).map(|i| i as usize)
}

fn stored_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim() == "true",
        _ => false,
    }
}

mod menu_index {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(i) => serializer.serialize_i64(*i as i64),
            None => serializer.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value
            .as_i64()
            .filter(|i| *i >= 0)
            .map(|i| i as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::Category;

    fn menu(name: &str) -> MenuCandidate {
        MenuCandidate {
            menu_name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_phase_progression() {
        let mut state = WorkflowState::default();
        assert_eq!(state.phase(), Phase::Idle);

        state.proposed_menus = vec![menu("A"), menu("B")];
        assert_eq!(state.phase(), Phase::MenusProposed);

        state.selected_menu_index = Some(1);
        assert_eq!(state.phase(), Phase::MenuSelected);

        state.current_recipe = Some(ValidatedRecipe::default());
        assert_eq!(state.phase(), Phase::RecipeReady);

        state.is_detailed_steps_displayed = true;
        assert_eq!(state.phase(), Phase::StepsDetailed);
    }

    #[test]
    fn test_menu_index_serialized_as_minus_one() {
        let state = WorkflowState::default();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["selectedMenuIndex"], -1);

        let back: WorkflowState = serde_json::from_value(json).unwrap();
        assert_eq!(back.selected_menu_index, None);
    }

    #[test]
    fn test_from_stored_recovers_each_field() {
        let value = serde_json::json!({
            "selectedIngredients": [
                {"id": "egg", "name": "卵", "category": "processed"},
                {"id": "tomato"},
                "garbage"
            ],
            "proposedMenus": null,
            "selectedMenuIndex": "0",
            "currentRecipe": {"menuName": 3},
            "isDetailedStepsDisplayed": "true",
            "settings": {"season": "夏"}
        });
        let state = WorkflowState::from_stored(&value).unwrap();
        assert_eq!(state.selected_ingredients.len(), 1);
        assert_eq!(state.selected_ingredients[0].id, "egg");
        assert!(state.proposed_menus.is_empty());
        assert_eq!(state.selected_menu_index, None);
        assert!(state.current_recipe.is_none());
        assert!(!state.is_detailed_steps_displayed);
        assert_eq!(state.settings.season, "夏");
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[test]
    fn test_from_stored_string_flag_and_index() {
        let value = serde_json::json!({
            "proposedMenus": [{"menuName": "A"}, {"menuName": "B"}],
            "selectedMenuIndex": "1",
            "currentRecipe": {"menuName": "B", "cookingSteps": ["焼く"]},
            "isDetailedStepsDisplayed": "true"
        });
        let state = WorkflowState::from_stored(&value).unwrap();
        assert_eq!(state.selected_menu_index, Some(1));
        assert_eq!(state.phase(), Phase::StepsDetailed);
        assert!(WorkflowState::from_stored(&serde_json::json!([1, 2])).is_none());
    }

    #[test]
    fn test_normalized_drops_out_of_range_index_and_duplicates() {
        let dup = SelectedIngredient {
            id: "tomato".into(),
            name: "トマト".into(),
            category: Category::Vegetables,
            original_selection: None,
        };
        let state = WorkflowState {
            selected_ingredients: vec![dup.clone(), dup],
            proposed_menus: vec![menu("A")],
            selected_menu_index: Some(4),
            is_detailed_steps_displayed: true,
            ..Default::default()
        }
        .normalized();
        assert_eq!(state.selected_menu_index, None);
        assert!(!state.is_detailed_steps_displayed);
        assert_eq!(state.selected_ingredients.len(), 1);
    }
}
