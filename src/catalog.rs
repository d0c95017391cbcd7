use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::error::AppError;
use crate::recipe::Category;

const EMBEDDED_CATALOG: &str = include_str!("../data/ingredients.json");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub seasons: Vec<String>,
}

impl CatalogItem {
    /// Items without season data count as available all year.
    pub fn in_season(&self, season: &str) -> bool {
        self.seasons.is_empty() || self.seasons.iter().any(|s| s == season)
    }
}

/// Read-only ingredient catalog queried by category.
pub trait IngredientCatalog: Send + Sync {
    fn category(&self, category: Category) -> &[CatalogItem];

    fn find(&self, id: &str) -> Option<(Category, &CatalogItem)> {
        Category::ALL.into_iter().find_map(|c| {
            self.category(c)
                .iter()
                .find(|item| item.id == id)
                .map(|item| (c, item))
        })
    }

    fn all_names(&self) -> Vec<&str> {
        Category::ALL
            .into_iter()
            .flat_map(|c| self.category(c).iter().map(|i| i.name.as_str()))
            .collect()
    }
}

/// Catalog backed by a category -> items JSON document.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    categories: HashMap<Category, Vec<CatalogItem>>,
}

impl StaticCatalog {
    pub fn embedded() -> Result<Self, AppError> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let parsed: BTreeMap<String, Vec<CatalogItem>> = serde_json::from_str(raw)
            .map_err(|e| AppError::Config(format!("Invalid ingredient catalog: {}", e)))?;

        let mut categories = HashMap::new();
        for (name, items) in parsed {
            match Category::parse(&name) {
                Some(category) => {
                    categories.insert(category, items);
                }
                None => warn!(category = %name, "skipping unknown catalog category"),
            }
        }
        Ok(Self { categories })
    }

    pub fn from_items(items: impl IntoIterator<Item = (Category, Vec<CatalogItem>)>) -> Self {
        Self {
            categories: items.into_iter().collect(),
        }
    }
}

impl IngredientCatalog for StaticCatalog {
    fn category(&self, category: Category) -> &[CatalogItem] {
        self.categories
            .get(&category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}
