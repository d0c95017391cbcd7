use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::AppError;

/// Lookup tables shared by the validator and the contradiction detector.
/// Kept as data so aliases and phrases can grow without code changes.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ReferenceTables {
    pub version: Option<u32>,
    pub known_seasonings: Vec<String>,
    pub step_seasonings: Vec<String>,
    pub negation_phrases: Vec<String>,
    pub aliases: BTreeMap<String, Vec<String>>,
    pub strip_suffixes: Vec<String>,
}

pub(crate) const DEFAULT_YAML: &str = include_str!("../../rules/default.yaml");
pub(crate) const EXTENDED_YAML: &str = include_str!("../../rules/extended.yaml");

impl ReferenceTables {
    pub fn load_from_file(path: &Path) -> Result<Self, AppError> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Load an embedded preset by name. `"extended"` selects the larger table;
    /// anything else (including None) loads the default preset.
    pub fn from_preset(name: Option<&str>) -> Result<Self, AppError> {
        let yaml_str = match name {
            Some("extended") => EXTENDED_YAML,
            _ => DEFAULT_YAML,
        };
        serde_yaml::from_str(yaml_str)
            .map_err(|e| AppError::Config(format!("Failed to parse reference tables: {}", e)))
    }

    /// A file path wins over a preset name.
    pub fn resolve(preset: Option<&str>, path: Option<&str>) -> Result<Self, AppError> {
        match path {
            Some(p) => Self::load_from_file(Path::new(p)),
            None => Self::from_preset(preset),
        }
    }

    /// Substring match in either direction, so "しょうゆ大さじ1" and "醤油"-style
    /// entries both resolve against the list.
    pub fn is_known_seasoning(&self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.known_seasonings
            .iter()
            .any(|known| name.contains(known.as_str()) || known.contains(name))
    }

    /// The name itself plus every alias reachable from it, forward and reverse.
    pub fn variations(&self, name: &str) -> Vec<String> {
        let mut out = vec![name.to_string()];
        if let Some(forward) = self.aliases.get(name) {
            out.extend(forward.iter().cloned());
        }
        for (canonical, variants) in &self.aliases {
            if variants.iter().any(|v| v == name) {
                out.push(canonical.clone());
            }
        }
        let mut seen = std::collections::HashSet::new();
        out.retain(|v| seen.insert(v.clone()));
        out
    }
}
