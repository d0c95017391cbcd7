use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::AppError;
use crate::recipe::{SelectedIngredient, Settings};
use crate::state::WorkflowState;

pub const BUNDLE_VERSION: &str = "1.0";
pub const APP_NAME: &str = "AI料理提案システム";

/// Portable copy of the user's selection and cooking conditions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub version: String,
    pub export_date: String,
    pub app_name: String,
    pub data: ExportData,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub selected_ingredients: Vec<SelectedIngredient>,
    pub settings: Settings,
}

#[derive(Debug, Clone)]
pub struct ImportedSettings {
    pub selected_ingredients: Vec<SelectedIngredient>,
    pub settings: Settings,
    /// `appName` differs from ours; the caller decides whether to proceed.
    pub foreign_app: bool,
    pub export_date: Option<DateTime<FixedOffset>>,
}

pub fn build_bundle(state: &WorkflowState, now: DateTime<Utc>) -> ExportBundle {
    ExportBundle {
        version: BUNDLE_VERSION.to_string(),
        export_date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        app_name: APP_NAME.to_string(),
        data: ExportData {
            selected_ingredients: state.selected_ingredients.clone(),
            settings: state.settings.clone(),
        },
    }
}

pub fn export_json(state: &WorkflowState, now: DateTime<Utc>) -> Result<String, AppError> {
    Ok(serde_json::to_string_pretty(&build_bundle(state, now))?)
}

/// `ai-cooking-settings-2024-05-01-12-30-00.json`
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("ai-cooking-settings-{}.json", now.format("%Y-%m-%d-%H-%M-%S"))
}

/// Parse an exported bundle. Entries that don't deserialize are skipped with
/// a warning; a bundle without `version` and `data` is rejected.
pub fn parse_bundle(raw: &str) -> Result<ImportedSettings, AppError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| AppError::Validation(format!("import file is not valid JSON: {}", e)))?;

    let (Some(_), Some(data)) = (value.get("version"), value.get("data")) else {
        return Err(AppError::Validation(
            "import file has no `version` or `data`".into(),
        ));
    };

    let selected_ingredients = data
        .get("selectedIngredients")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    serde_json::from_value::<SelectedIngredient>(item.clone())
                        .map_err(|e| warn!(error = %e, "skipping malformed imported ingredient"))
                        .ok()
                })
                .collect()
        })
        .unwrap_or_default();

    let settings = match data.get("settings") {
        Some(s) => serde_json::from_value(s.clone())
            .map_err(|e| AppError::Validation(format!("imported settings: {}", e)))?,
        None => Settings::default(),
    };

    let foreign_app = value.get("appName").and_then(Value::as_str) != Some(APP_NAME);
    let export_date = value
        .get("exportDate")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok());

    Ok(ImportedSettings {
        selected_ingredients,
        settings,
        foreign_app,
        export_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::Category;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    fn state() -> WorkflowState {
        WorkflowState {
            selected_ingredients: vec![SelectedIngredient {
                id: "salmon".into(),
                name: "鮭".into(),
                category: Category::Seafood,
                original_selection: None,
            }],
            settings: Settings {
                season: "秋".into(),
                ..Settings::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_export_bundle_shape() {
        let json: Value = serde_json::from_str(&export_json(&state(), now()).unwrap()).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["appName"], APP_NAME);
        assert_eq!(json["exportDate"], "2024-05-01T12:30:00.000Z");
        assert_eq!(json["data"]["selectedIngredients"][0]["id"], "salmon");
        assert_eq!(json["data"]["settings"]["season"], "秋");
        assert!(json["data"].get("proposedMenus").is_none());
    }

    #[test]
    fn test_import_own_export() {
        let raw = export_json(&state(), now()).unwrap();
        let imported = parse_bundle(&raw).unwrap();
        assert!(!imported.foreign_app);
        assert_eq!(imported.selected_ingredients, state().selected_ingredients);
        assert_eq!(imported.settings.season, "秋");
        assert_eq!(imported.export_date.unwrap().timestamp(), now().timestamp());
    }

    #[test]
    fn test_import_rejects_missing_fields() {
        assert!(matches!(
            parse_bundle(r#"{"data":{}}"#),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(parse_bundle("nope"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_import_foreign_and_legacy_bundle() {
        let raw = r#"{"version":"0.9","appName":"other","data":{"selectedIngredients":[{"id":"egg","name":"卵","category":"processed"},{"id":"x"}],"settings":{"cuisine":"中華"}}}"#;
        let imported = parse_bundle(raw).unwrap();
        assert!(imported.foreign_app);
        assert_eq!(imported.selected_ingredients.len(), 1);
        assert_eq!(imported.settings.cuisine, vec!["中華".to_string()]);
        assert!(imported.export_date.is_none());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            export_file_name(now()),
            "ai-cooking-settings-2024-05-01-12-30-00.json"
        );
    }
}
