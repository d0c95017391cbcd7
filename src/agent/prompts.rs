use crate::agent::assemble::MENU_COUNT;
use crate::ai::message::ChatMessage;
use crate::recipe::{MenuCandidate, Settings, ValidatedRecipe};

const ROLE_LINE: &str = "あなたは経験豊富な料理研究家です。";

/// Split `total` slots across the requested cuisines as evenly as possible.
/// Earlier cuisines absorb the remainder. Empty input yields no allocation.
pub fn distribute_cuisines(cuisines: &[String], total: usize) -> Vec<(String, usize)> {
    if cuisines.is_empty() {
        return Vec::new();
    }
    let base = total / cuisines.len();
    let extra = total % cuisines.len();
    cuisines
        .iter()
        .enumerate()
        .map(|(i, c)| (c.clone(), base + usize::from(i < extra)))
        .filter(|(_, n)| *n > 0)
        .collect()
}

fn join_or(values: &[String], fallback: &str) -> String {
    if values.is_empty() {
        fallback.to_string()
    } else {
        values.join("、")
    }
}

fn push_conditions(prompt: &mut String, settings: &Settings) {
    prompt.push_str("## 条件\n");
    prompt.push_str(&format!("- 季節: {}\n", settings.season));
    prompt.push_str(&format!("- 食事タイプ: {}\n", settings.meal_type));
    prompt.push_str(&format!("- 調理時間: {}\n", settings.cooking_time));
    prompt.push_str(&format!(
        "- 料理ジャンル: {}\n",
        join_or(&settings.cuisine, "指定なし")
    ));
    prompt.push_str(&format!(
        "- 調理法: {}\n",
        join_or(&settings.cooking_method, "ランダム")
    ));
    prompt.push_str(&format!("- 人数: {}\n\n", settings.servings));
}

fn push_ingredients(prompt: &mut String, ingredients: &[String]) {
    prompt.push_str("## 利用可能な食材\n");
    prompt.push_str(&ingredients.join("、"));
    prompt.push_str("\n\n");
}

fn single_user_message(prompt: String) -> Vec<ChatMessage> {
    vec![ChatMessage::user(prompt)]
}

/// First call: ask for exactly six menu candidates. `avoid` lists names from
/// the previous batch when regenerating.
pub fn build_menu_proposal(
    settings: &Settings,
    ingredients: &[String],
    avoid: &[String],
) -> Vec<ChatMessage> {
    let mut prompt = String::new();
    prompt.push_str(ROLE_LINE);
    prompt.push_str(&format!(
        "以下の食材と条件から、作れるメニューを{}つ提案してください。\n\n",
        MENU_COUNT
    ));

    if !avoid.is_empty() {
        prompt.push_str("## 再提案\n");
        prompt.push_str("前回と異なるメニューにしてください。次の料理名と似た料理は避けること:\n");
        for name in avoid {
            prompt.push_str(&format!("- {}\n", name));
        }
        prompt.push('\n');
    }

    let allocation = distribute_cuisines(&settings.cuisine, MENU_COUNT);
    if allocation.len() > 1 {
        prompt.push_str("## ジャンルの配分\n");
        prompt.push_str("選択されたジャンルにできるだけ均等に分けること:\n");
        for (cuisine, count) in &allocation {
            prompt.push_str(&format!("- {}: {}品\n", cuisine, count));
        }
        prompt.push('\n');
    }

    push_ingredients(&mut prompt, ingredients);
    push_conditions(&mut prompt, settings);

    prompt.push_str("## 回答形式\n");
    prompt.push_str("次の形式のJSONを ```json で囲んで返してください。menus は必ず");
    prompt.push_str(&format!("{}件にすること。\n\n", MENU_COUNT));
    prompt.push_str(
        r#"```json
{
  "menus": [
    {
      "menuName": "料理名",
      "description": "50文字程度の説明",
      "cookingTime": "例: 30分",
      "difficulty": "簡単/普通/難しい",
      "servings": "例: 2人分",
      "cuisine": "和食/洋食/中華/イタリアン/その他のいずれか",
      "category": "例: 炒め物、煮物、パスタ",
      "mainIngredients": ["主要食材1", "主要食材2"]
    }
  ]
}
```
"#,
    );
    prompt.push_str("\n## 注意\n");
    prompt.push_str("- 利用可能な食材から選んで使うこと。全部使う必要はない\n");
    prompt.push_str("- 各メニューは料理ジャンルか調理法を変えること\n");
    prompt.push_str("- cuisine にはそのメニューのジャンルを1つだけ書くこと\n");
    prompt.push_str("- 麺料理は category に麺の種類を書くこと\n");
    prompt.push_str("- 調理時間は条件内に収めること\n");

    single_user_message(prompt)
}

/// Second call: the chosen menu expanded into a full recipe.
pub fn build_detailed_recipe(
    menu: &MenuCandidate,
    settings: &Settings,
    ingredients: &[String],
) -> Vec<ChatMessage> {
    let mut prompt = String::new();
    prompt.push_str(ROLE_LINE);
    prompt.push_str("選ばれたメニューの詳しいレシピを作成してください。\n\n");

    prompt.push_str("## 選ばれたメニュー\n");
    prompt.push_str(&format!("- 料理名: {}\n", menu.menu_name));
    prompt.push_str(&format!("- 概要: {}\n", menu.description));
    prompt.push_str(&format!("- 調理時間: {}\n", menu.cooking_time));
    prompt.push_str(&format!("- 難易度: {}\n", menu.difficulty));
    prompt.push_str(&format!("- 人数: {}\n", menu.servings));
    if !menu.cuisine.is_empty() {
        prompt.push_str(&format!("- ジャンル: {}\n", menu.cuisine));
    }
    prompt.push('\n');

    push_ingredients(&mut prompt, ingredients);
    push_conditions(&mut prompt, settings);

    prompt.push_str("## 回答形式\n");
    prompt.push_str("次の形式のJSONを ```json で囲んで返してください。\n\n");
    prompt.push_str(&format!(
        r#"```json
{{
  "menuName": "{}",
  "description": "説明",
  "cookingTime": "{}",
  "difficulty": "{}",
  "ingredients": [{{"name": "食材名", "amount": "分量"}}],
  "seasonings": [{{"name": "調味料名", "amount": "分量", "isSelected": true}}],
  "cookingSteps": ["手順1", "手順2"],
  "tips": "コツ",
  "ingredientUsage": {{"used": ["食材名"], "unused": ["食材名"], "reason": "理由"}},
  "alternatives": {{"substitutions": [{{"original": "元の食材", "substitute": "代替"}}]}}
}}
```
"#,
        menu.menu_name, menu.cooking_time, menu.difficulty
    ));
    prompt.push_str("\n## 注意\n");
    prompt.push_str("- ingredients には利用可能な食材だけを入れ、食材を追加しないこと\n");
    prompt.push_str("- 調味料は ingredients ではなく seasonings に入れること\n");
    prompt.push_str("- seasonings の全項目に isSelected を付けること\n");
    prompt.push_str("- 分量は具体的に書くこと\n");
    prompt.push_str("- 使わない食材は分量を「0g」とし、説明で使わないと書いてよい\n");

    single_user_message(prompt)
}

/// Third call: same steps, more detail, same count.
pub fn build_step_expansion(recipe: &ValidatedRecipe) -> Vec<ChatMessage> {
    let mut prompt = String::new();
    prompt.push_str("次のレシピの作り方を、初心者でも失敗しないように詳しく書き直してください。\n\n");
    prompt.push_str(&format!("## 料理名\n{}\n\n", recipe.menu_name));
    prompt.push_str("## 現在の作り方\n");
    for (i, step) in recipe.cooking_steps.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, step));
    }
    prompt.push_str("\n## 要求\n");
    prompt.push_str(&format!(
        "- 手順の数は{}つのまま変えないこと\n",
        recipe.cooking_steps.len()
    ));
    prompt.push_str("- 時間の目安、火加減、見極めのポイントを含めること\n\n");
    prompt.push_str("## 回答形式\n");
    prompt.push_str("```json\n{\n  \"detailedSteps\": [\"詳しい手順1\", \"詳しい手順2\"]\n}\n```\n");

    single_user_message(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::message::Role;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_distribute_evenly() {
        let alloc = distribute_cuisines(&strings(&["和食", "洋食"]), 6);
        assert_eq!(alloc, vec![("和食".to_string(), 3), ("洋食".to_string(), 3)]);
    }

    #[test]
    fn test_distribute_remainder_goes_first() {
        let alloc = distribute_cuisines(&strings(&["和食", "洋食", "中華", "イタリアン"]), 6);
        let counts: Vec<usize> = alloc.iter().map(|(_, n)| *n).collect();
        assert_eq!(counts, vec![2, 2, 1, 1]);
        assert_eq!(counts.iter().sum::<usize>(), 6);
    }

    #[test]
    fn test_distribute_more_cuisines_than_slots() {
        let many = strings(&["a", "b", "c", "d", "e", "f", "g"]);
        let alloc = distribute_cuisines(&many, 6);
        assert_eq!(alloc.len(), 6);
        assert!(alloc.iter().all(|(_, n)| *n == 1));
        assert!(distribute_cuisines(&[], 6).is_empty());
    }

    #[test]
    fn test_menu_prompt_is_one_user_message() {
        let settings = Settings {
            cuisine: strings(&["和食", "中華"]),
            ..Settings::default()
        };
        let messages = build_menu_proposal(&settings, &strings(&["トマト", "豚肉"]), &[]);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        let text = &messages[0].content;
        assert!(text.contains("トマト、豚肉"));
        assert!(text.contains("- 和食: 3品"));
        assert!(text.contains("\"menus\""));
        assert!(!text.contains("再提案"));
    }

    #[test]
    fn test_regenerate_prompt_lists_prior_names() {
        let messages = build_menu_proposal(
            &Settings::default(),
            &strings(&["卵"]),
            &strings(&["親子丼", "卵焼き"]),
        );
        let text = &messages[0].content;
        assert!(text.contains("- 親子丼"));
        assert!(text.contains("- 卵焼き"));
        // a single cuisine gets no allocation block
        assert!(!text.contains("ジャンルの配分"));
    }

    #[test]
    fn test_detailed_recipe_prompt_seeds_menu() {
        let menu = MenuCandidate {
            menu_name: "肉じゃが".into(),
            cooking_time: "40分".into(),
            difficulty: "普通".into(),
            ..Default::default()
        };
        let messages = build_detailed_recipe(&menu, &Settings::default(), &strings(&["じゃがいも"]));
        let text = &messages[0].content;
        assert!(text.contains("\"menuName\": \"肉じゃが\""));
        assert!(text.contains("- 料理名: 肉じゃが"));
        assert!(text.contains("じゃがいも"));
    }

    #[test]
    fn test_step_expansion_numbers_steps() {
        let recipe = ValidatedRecipe {
            menu_name: "味噌汁".into(),
            cooking_steps: strings(&["湯を沸かす", "味噌を溶く"]),
            ..Default::default()
        };
        let text = &build_step_expansion(&recipe)[0].content;
        assert!(text.contains("1. 湯を沸かす\n2. 味噌を溶く"));
        assert!(text.contains("2つのまま"));
        assert!(text.contains("detailedSteps"));
    }
}
