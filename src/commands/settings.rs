use crate::error::AppError;
use crate::recipe::Settings;
use crate::selection::{COOKING_METHODS, COOKING_TIMES, CUISINES, MEAL_TYPES, SEASONS, SERVINGS};

fn one_of(field: &str, value: &str, options: &[&str]) -> Result<String, AppError> {
    if options.contains(&value) {
        Ok(value.to_string())
    } else {
        Err(AppError::Validation(format!(
            "{} must be one of {}",
            field,
            options.join(", ")
        )))
    }
}

fn list_of(field: &str, value: &str, options: &[&str]) -> Result<Vec<String>, AppError> {
    let mut picked: Vec<String> = Vec::new();
    for part in value.split([',', '、']).map(str::trim).filter(|s| !s.is_empty()) {
        let part = one_of(field, part, options)?;
        if !picked.contains(&part) {
            picked.push(part);
        }
    }
    if picked.is_empty() {
        return Err(AppError::Validation(format!("{} needs at least one value", field)));
    }
    Ok(picked)
}

/// Return `settings` with one field changed. `ランダム` as a cooking method
/// excludes the concrete methods.
pub fn apply_field(mut settings: Settings, field: &str, value: &str) -> Result<Settings, AppError> {
    let value = value.trim();
    match field {
        "season" => settings.season = one_of(field, value, &SEASONS)?,
        "meal" => settings.meal_type = one_of(field, value, &MEAL_TYPES)?,
        "time" => settings.cooking_time = one_of(field, value, &COOKING_TIMES)?,
        "servings" => settings.servings = one_of(field, value, &SERVINGS)?,
        "cuisine" => settings.cuisine = list_of(field, value, &CUISINES)?,
        "method" => {
            let methods = list_of(field, value, &COOKING_METHODS)?;
            settings.cooking_method = if methods.iter().any(|m| m == COOKING_METHODS[0]) {
                vec![COOKING_METHODS[0].to_string()]
            } else {
                methods
            };
        }
        other => {
            return Err(AppError::Validation(format!(
                "unknown setting: {} (season, meal, time, cuisine, method, servings)",
                other
            )))
        }
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_value_fields() {
        let s = apply_field(Settings::default(), "season", "冬").unwrap();
        assert_eq!(s.season, "冬");
        let s = apply_field(s, "servings", "1人分").unwrap();
        assert_eq!(s.servings, "1人分");
        assert!(matches!(
            apply_field(Settings::default(), "season", "梅雨"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_cuisine_list_dedupes() {
        let s = apply_field(Settings::default(), "cuisine", "中華, 洋食、中華").unwrap();
        assert_eq!(s.cuisine, vec!["中華".to_string(), "洋食".to_string()]);
        assert!(apply_field(Settings::default(), "cuisine", " , ").is_err());
    }

    #[test]
    fn test_random_method_is_exclusive() {
        let s = apply_field(Settings::default(), "method", "炒め物,ランダム").unwrap();
        assert_eq!(s.cooking_method, vec!["ランダム".to_string()]);
        let s = apply_field(Settings::default(), "method", "炒め物,揚げ物").unwrap();
        assert_eq!(s.cooking_method.len(), 2);
    }

    #[test]
    fn test_unknown_field() {
        assert!(apply_field(Settings::default(), "spice", "high").is_err());
    }
}
