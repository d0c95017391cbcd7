use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::agent::rules::ReferenceTables;
use crate::recipe::ValidatedRecipe;

/// Names shorter than this are skipped to avoid matching every sentence.
const MIN_NAME_CHARS: usize = 2;

/// A listed quantity that the prose says is not used.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Contradiction {
    pub ingredient: String,
    pub pattern: String,
    pub context: String,
    pub matched_variation: String,
    pub amount: String,
    pub message: String,
}

/// `0g`, `0 個`, `0適量` and friends: listed but not actually used.
pub fn is_zero_amount(amount: &str) -> bool {
    let re = match Regex::new(r"(?i)^0\s*(g|ml|個|本|枚|片|かけ|つ|粒|滴|適量|少々)?$") {
        Ok(re) => re,
        Err(_) => return false,
    };
    re.is_match(amount.trim())
}

/// Strip qualifiers, quantities and configured suffixes so the name can be
/// searched for in prose.
pub fn normalize_name(name: &str, tables: &ReferenceTables) -> String {
    let mut out = name.to_string();
    for pattern in [r"（.*?）", r"\(.*?\)", r"\s*大さじ.*", r"\s*小さじ.*", r"\s*\d+.*"] {
        if let Ok(re) = Regex::new(pattern) {
            out = re.replace_all(&out, "").into_owned();
        }
    }
    let mut out = out.trim().to_string();
    for suffix in &tables.strip_suffixes {
        if let Some(stripped) = out.strip_suffix(suffix.as_str()) {
            out = stripped.to_string();
        }
    }
    out.trim().to_string()
}

/// Scan description, tips and usage reason for negation phrases near a
/// listed ingredient. Advisory only: the recipe is never altered.
pub fn detect_contradictions(
    recipe: &ValidatedRecipe,
    tables: &ReferenceTables,
) -> Vec<Contradiction> {
    let prose = [
        recipe.description.as_str(),
        recipe.tips.as_str(),
        recipe.ingredient_usage.reason.as_str(),
    ]
    .join(" ");
    if prose.trim().is_empty() {
        return Vec::new();
    }

    let entries = recipe
        .ingredients
        .iter()
        .map(|i| (i.name.as_str(), i.amount.as_str()))
        .chain(
            recipe
                .seasonings
                .iter()
                .map(|s| (s.name.as_str(), s.amount.as_str())),
        );

    let mut found: Vec<Contradiction> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for (name, amount) in entries {
        if is_zero_amount(amount) {
            debug!(ingredient = %name, %amount, "zero amount, contradiction check skipped");
            continue;
        }
        let clean = normalize_name(name, tables);
        if clean.chars().count() < MIN_NAME_CHARS {
            continue;
        }
        let variations = tables.variations(&clean);

        for pattern in &tables.negation_phrases {
            if seen.contains(&(name.to_string(), pattern.clone())) {
                continue;
            }
            if let Some((variation, context)) = find_near(&prose, &variations, pattern) {
                seen.insert((name.to_string(), pattern.clone()));
                found.push(Contradiction {
                    ingredient: name.to_string(),
                    pattern: pattern.clone(),
                    message: format!(
                        "材料リストに「{}」({})が含まれていますが、説明では「{}」と記載されています",
                        name, amount, context
                    ),
                    context,
                    matched_variation: variation,
                    amount: amount.to_string(),
                });
            }
        }
    }

    for c in &found {
        warn!(ingredient = %c.ingredient, pattern = %c.pattern, "{}", c.message);
    }
    found
}

/// First `<name>...<negation>` or `<negation>...<name>` window within one
/// clause, tried for every variation of the name.
fn find_near(prose: &str, variations: &[String], pattern: &str) -> Option<(String, String)> {
    let p = regex::escape(pattern);
    for variation in variations {
        let v = regex::escape(variation);
        for window in [
            format!("{}[^。\\n]*?{}", v, p),
            format!("{}[^。\\n]*?{}", p, v),
        ] {
            let Ok(re) = Regex::new(&window) else {
                continue;
            };
            if let Some(m) = re.find(prose) {
                return Some((variation.clone(), m.as_str().to_string()));
            }
        }
    }
    None
}
