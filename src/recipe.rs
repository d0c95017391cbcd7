use serde::{Deserialize, Deserializer, Serialize};

/// Ingredient categories offered by the catalog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Vegetables,
    Meat,
    Seafood,
    Processed,
    Grains,
    Seasonings,
    Fruits,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Vegetables,
        Category::Meat,
        Category::Seafood,
        Category::Processed,
        Category::Grains,
        Category::Seasonings,
        Category::Fruits,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Vegetables => "vegetables",
            Category::Meat => "meat",
            Category::Seafood => "seafood",
            Category::Processed => "processed",
            Category::Grains => "grains",
            Category::Seasonings => "seasonings",
            Category::Fruits => "fruits",
        }
    }

    pub fn parse(name: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelectedIngredient {
    pub id: String,
    pub name: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_selection: Option<String>,
}

/// One of the six candidates returned by the menu proposal call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MenuCandidate {
    #[serde(deserialize_with = "lenient_string")]
    pub menu_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "lenient_string")]
    pub cooking_time: String,
    #[serde(deserialize_with = "lenient_string")]
    pub difficulty: String,
    #[serde(deserialize_with = "lenient_string")]
    pub servings: String,
    #[serde(deserialize_with = "lenient_string")]
    pub cuisine: String,
    #[serde(deserialize_with = "lenient_string")]
    pub category: String,
    #[serde(deserialize_with = "lenient_string_list")]
    pub main_ingredients: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngredientLine {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub amount: String,
}

/// Seasoning entry as the model wrote it; the flag may be missing or wrong.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SeasoningDraft {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub amount: String,
    pub is_selected: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SeasoningLine {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub amount: String,
    pub is_selected: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngredientUsage {
    #[serde(deserialize_with = "lenient_string_list")]
    pub used: Vec<String>,
    #[serde(deserialize_with = "lenient_string_list")]
    pub unused: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub reason: String,
}

/// Older replies carried the usage reason as `unusedIngredients.reason`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LegacyUnused {
    #[serde(deserialize_with = "lenient_string")]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Substitution {
    #[serde(deserialize_with = "lenient_string")]
    pub original: String,
    #[serde(deserialize_with = "lenient_string")]
    pub substitute: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Alternatives {
    pub substitutions: Vec<Substitution>,
}

/// Untrusted recipe freshly parsed from a model reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipeDraft {
    #[serde(deserialize_with = "lenient_string")]
    pub menu_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "lenient_string")]
    pub cooking_time: String,
    #[serde(deserialize_with = "lenient_string")]
    pub difficulty: String,
    pub ingredients: Vec<IngredientLine>,
    pub seasonings: Vec<SeasoningDraft>,
    #[serde(deserialize_with = "lenient_string_list")]
    pub cooking_steps: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub tips: String,
    pub ingredient_usage: IngredientUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unused_ingredients: Option<LegacyUnused>,
    pub alternatives: Option<Alternatives>,
}

impl RecipeDraft {
    /// `ingredientUsage` with the legacy reason appended when present.
    pub fn usage(&self) -> IngredientUsage {
        let mut usage = self.ingredient_usage.clone();
        let legacy = self
            .unused_ingredients
            .as_ref()
            .map(|u| u.reason.trim())
            .filter(|r| !r.is_empty());
        if let Some(reason) = legacy {
            if usage.reason.trim().is_empty() {
                usage.reason = reason.to_string();
            } else if !usage.reason.contains(reason) {
                usage.reason = format!("{} {}", usage.reason, reason);
            }
        }
        usage
    }
}

/// A recipe whose ingredient list has been reconciled against the user's
/// selection. Only `agent::validate` builds one from a draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidatedRecipe {
    pub menu_name: String,
    pub description: String,
    pub cooking_time: String,
    pub difficulty: String,
    pub ingredients: Vec<IngredientLine>,
    pub seasonings: Vec<SeasoningLine>,
    pub cooking_steps: Vec<String>,
    pub tips: String,
    pub ingredient_usage: IngredientUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<Alternatives>,
}

impl ValidatedRecipe {
    /// Replace the steps in place after a step expansion.
    pub fn replace_steps(&mut self, steps: Vec<String>) {
        self.cooking_steps = steps;
    }

    /// Convert back into draft form, e.g. to re-validate a restored recipe.
    pub fn to_draft(&self) -> RecipeDraft {
        RecipeDraft {
            menu_name: self.menu_name.clone(),
            description: self.description.clone(),
            cooking_time: self.cooking_time.clone(),
            difficulty: self.difficulty.clone(),
            ingredients: self.ingredients.clone(),
            seasonings: self
                .seasonings
                .iter()
                .map(|s| SeasoningDraft {
                    name: s.name.clone(),
                    amount: s.amount.clone(),
                    is_selected: Some(s.is_selected),
                })
                .collect(),
            cooking_steps: self.cooking_steps.clone(),
            tips: self.tips.clone(),
            ingredient_usage: self.ingredient_usage.clone(),
            unused_ingredients: None,
            alternatives: self.alternatives.clone(),
        }
    }
}

/// User preferences that steer every prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[serde(deserialize_with = "lenient_string")]
    pub season: String,
    #[serde(deserialize_with = "lenient_string")]
    pub meal_type: String,
    #[serde(deserialize_with = "lenient_string")]
    pub cooking_time: String,
    #[serde(deserialize_with = "lenient_string_list")]
    pub cuisine: Vec<String>,
    #[serde(deserialize_with = "lenient_string_list")]
    pub cooking_method: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub servings: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            season: "春".to_string(),
            meal_type: "昼食".to_string(),
            cooking_time: "30分以内".to_string(),
            cuisine: vec!["和食".to_string()],
            cooking_method: vec!["ランダム".to_string()],
            servings: "2人分".to_string(),
        }
    }
}

/// Accepts strings, numbers, booleans and null; anything else becomes empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_string(&value))
}

/// Accepts a list of scalars or a single scalar (older stored settings kept
/// `cuisine` as a plain string).
fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .filter(|s| !s.is_empty())
            .collect(),
        serde_json::Value::Null => Vec::new(),
        other => {
            let s = value_to_string(&other);
            if s.is_empty() {
                Vec::new()
            } else {
                vec![s]
            }
        }
    })
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
