use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::catalog::{CatalogItem, IngredientCatalog};
use crate::error::AppError;
use crate::recipe::{Category, SelectedIngredient, Settings};

pub const CHEESE_ID: &str = "cheese";

/// Concrete cheeses the generic entry resolves to.
const CHEESE_VARIANTS: [&str; 8] = [
    "mozzarella",
    "cheddar",
    "parmesan",
    "camembert",
    "gouda",
    "blueCheeseNew",
    "ricotta",
    "mascarpone",
];

const NATTO_ID: &str = "natto";

/// Inclusive pick counts for the chef's-choice selection.
const PICK_RANGES: [(Category, usize, usize); 7] = [
    (Category::Vegetables, 1, 2),
    (Category::Meat, 0, 1),
    (Category::Seafood, 0, 1),
    (Category::Processed, 0, 2),
    (Category::Grains, 0, 1),
    (Category::Seasonings, 2, 3),
    (Category::Fruits, 0, 0),
];

const FRUIT_CHANCE: f64 = 0.1;

pub const SEASONS: [&str; 4] = ["春", "夏", "秋", "冬"];
pub const MEAL_TYPES: [&str; 4] = ["朝食", "昼食", "夕食", "おやつ"];
pub const COOKING_TIMES: [&str; 4] = ["15分以内", "30分以内", "1時間以内", "時間制限なし"];
pub const CUISINES: [&str; 5] = ["和食", "洋食", "中華", "イタリアン", "その他"];
pub const COOKING_METHODS: [&str; 8] = [
    "ランダム",
    "炒め物",
    "煮込み",
    "焼き物",
    "蒸し料理",
    "揚げ物",
    "サラダ・生",
    "スープ・汁物",
];
pub const SERVINGS: [&str; 4] = ["1人分", "2人分", "3-4人分", "5人以上"];

#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    Added(SelectedIngredient),
    Removed(SelectedIngredient),
}

/// A heads-up about the current selection. Purely informational.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Advisory {
    pub ingredients: Vec<String>,
    pub message: String,
    pub tips: String,
}

fn to_selected(item: &CatalogItem, category: Category) -> SelectedIngredient {
    SelectedIngredient {
        id: item.id.clone(),
        name: item.name.clone(),
        category,
        original_selection: None,
    }
}

fn push_unique(selection: &mut Vec<SelectedIngredient>, entry: SelectedIngredient) -> bool {
    if selection.iter().any(|s| s.id == entry.id) {
        return false;
    }
    selection.push(entry);
    true
}

/// A random cheese variant not yet in `selection`. When every variant is
/// already picked the first one is returned; `None` only when the catalog
/// carries no variants at all.
fn pick_cheese<R: Rng + ?Sized>(
    catalog: &dyn IngredientCatalog,
    selection: &[SelectedIngredient],
    rng: &mut R,
) -> Option<SelectedIngredient> {
    let variants: Vec<&CatalogItem> = catalog
        .category(Category::Processed)
        .iter()
        .filter(|item| CHEESE_VARIANTS.contains(&item.id.as_str()))
        .collect();
    let unselected: Vec<&CatalogItem> = variants
        .iter()
        .copied()
        .filter(|item| !selection.iter().any(|s| s.id == item.id))
        .collect();

    let chosen = unselected.choose(rng).or_else(|| variants.first())?;
    Some(SelectedIngredient {
        original_selection: Some(CHEESE_ID.to_string()),
        ..to_selected(chosen, Category::Processed)
    })
}

/// The catalog entry, with the generic cheese resolved to a variant.
fn resolve_entry<R: Rng + ?Sized>(
    item: &CatalogItem,
    category: Category,
    catalog: &dyn IngredientCatalog,
    selection: &[SelectedIngredient],
    rng: &mut R,
) -> SelectedIngredient {
    if item.id == CHEESE_ID {
        if let Some(cheese) = pick_cheese(catalog, selection, rng) {
            return cheese;
        }
    }
    to_selected(item, category)
}

/// Remove the entry with `id` if selected, else add it from the catalog.
pub fn toggle<R: Rng + ?Sized>(
    selection: &mut Vec<SelectedIngredient>,
    id: &str,
    catalog: &dyn IngredientCatalog,
    rng: &mut R,
) -> Result<ToggleOutcome, AppError> {
    if let Some(pos) = selection.iter().position(|s| s.id == id) {
        return Ok(ToggleOutcome::Removed(selection.remove(pos)));
    }

    let (category, item) = catalog
        .find(id)
        .ok_or_else(|| AppError::Validation(format!("unknown ingredient id: {}", id)))?;
    let entry = resolve_entry(item, category, catalog, selection, rng);
    if entry.original_selection.is_some() {
        info!(chosen = %entry.name, "generic cheese resolved to a variant");
    }
    if !push_unique(selection, entry.clone()) {
        return Err(AppError::Validation(format!("{} is already selected", entry.name)));
    }
    Ok(ToggleOutcome::Added(entry))
}

/// A fresh chef's-choice selection. Always contains at least one meat or
/// seafood entry when the catalog has any.
pub fn random_pick<R: Rng + ?Sized>(
    catalog: &dyn IngredientCatalog,
    rng: &mut R,
) -> Vec<SelectedIngredient> {
    let mut picked: Vec<SelectedIngredient> = Vec::new();
    let take_fruit = rng.gen_bool(FRUIT_CHANCE);

    for (category, min, max) in PICK_RANGES {
        let items = catalog.category(category);
        if items.is_empty() {
            continue;
        }
        let max = if category == Category::Fruits && take_fruit {
            1
        } else {
            max
        };
        let count = rng.gen_range(min..=max).min(items.len());
        let chosen: Vec<&CatalogItem> = items.choose_multiple(rng, count).collect();
        for item in chosen {
            let entry = resolve_entry(item, category, catalog, &picked, rng);
            push_unique(&mut picked, entry);
        }
    }

    let has_main = picked
        .iter()
        .any(|s| matches!(s.category, Category::Meat | Category::Seafood));
    if !has_main {
        let mains: Vec<Category> = [Category::Meat, Category::Seafood]
            .into_iter()
            .filter(|c| !catalog.category(*c).is_empty())
            .collect();
        if let Some(category) = mains.choose(rng) {
            if let Some(item) = catalog.category(*category).choose(rng) {
                push_unique(&mut picked, to_selected(item, *category));
            }
        }
    }

    picked
}

pub fn advisories(selection: &[SelectedIngredient]) -> Vec<Advisory> {
    let mut out = Vec::new();

    if let Some(natto) = selection.iter().find(|s| s.id == NATTO_ID) {
        out.push(Advisory {
            ingredients: vec![natto.name.clone()],
            message: "納豆は風味と粘りが強いため、組み合わせる食材に注意が必要です。".into(),
            tips: "繊細な味の食材と合わせる場合は調理法を工夫しましょう。".into(),
        });
    }

    let grains: Vec<String> = selection
        .iter()
        .filter(|s| s.category == Category::Grains)
        .map(|s| s.name.clone())
        .collect();
    if grains.len() > 1 {
        out.push(Advisory {
            ingredients: grains,
            message: "複数の主食が選択されています。メニューごとに使い分けます。".into(),
            tips: "1つのメニューでは通常1種類の主食だけを使います。".into(),
        });
    }

    out
}

fn pick_one<R: Rng + ?Sized>(options: &[&str], rng: &mut R) -> String {
    options.choose(rng).copied().unwrap_or_default().to_string()
}

fn pick_some<R: Rng + ?Sized>(options: &[&str], rng: &mut R) -> Vec<String> {
    let count = rng.gen_range(1..=3).min(options.len());
    options
        .choose_multiple(rng, count)
        .map(|s| s.to_string())
        .collect()
}

/// Random cooking conditions: one value per single-choice field, one to
/// three for cuisine and cooking method.
pub fn random_settings<R: Rng + ?Sized>(rng: &mut R) -> Settings {
    Settings {
        season: pick_one(&SEASONS, rng),
        meal_type: pick_one(&MEAL_TYPES, rng),
        cooking_time: pick_one(&COOKING_TIMES, rng),
        cuisine: pick_some(&CUISINES, rng),
        cooking_method: pick_some(&COOKING_METHODS, rng),
        servings: pick_one(&SERVINGS, rng),
    }
}
