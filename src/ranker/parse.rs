//! Tolerant reading of the ranking service's reply.

use serde_json::Value;
use uuid::Uuid;

use super::Ranking;

/// Field names a ranking entry may carry its plan id under, in lookup order.
const ID_FIELDS: &[&str] = &["id", "_id", "planId", "mealPlanId", "meal_plan_id"];
const RATIONALE_FIELDS: &[&str] = &["rationale", "reason"];

/// Pulls the generated text out of a responses-API payload.
pub fn extract_text(response: &Value) -> String {
    if let Some(text) = response.get("output_text").and_then(Value::as_str) {
        return text.to_string();
    }

    let Some(output) = response.get("output").and_then(Value::as_array) else {
        return String::new();
    };
    output
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|piece| {
            matches!(
                piece.get("type").and_then(Value::as_str),
                Some("output_text") | Some("text")
            )
        })
        .filter_map(|piece| {
            piece
                .get("text")
                .or_else(|| piece.get("value"))
                .and_then(Value::as_str)
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// First balanced `{...}` block in `text`, ignoring braces inside JSON strings.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Canonical plan id from a ranking entry, or `None` if it has no usable id.
fn entry_id(entry: &Value) -> Option<Uuid> {
    let raw = match entry {
        Value::String(s) => s.as_str(),
        Value::Object(map) => ID_FIELDS
            .iter()
            .find_map(|f| map.get(*f).and_then(Value::as_str))?,
        _ => return None,
    };
    Uuid::parse_str(raw.trim()).ok()
}

fn entry_rationale(entry: &Value) -> Option<String> {
    let map = entry.as_object()?;
    RATIONALE_FIELDS
        .iter()
        .find_map(|f| map.get(*f).and_then(Value::as_str))
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

/// Parses `{ "rankings": [...] }` out of free text. Never fails: anything
/// unreadable yields an empty list, malformed entries are skipped.
pub fn parse_rankings(text: &str) -> Vec<Ranking> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let candidate = extract_json_block(text).unwrap_or(text);
    let Ok(parsed) = serde_json::from_str::<Value>(candidate) else {
        return Vec::new();
    };
    let Some(entries) = parsed.get("rankings").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            Some(Ranking {
                id: entry_id(entry)?,
                rationale: entry_rationale(entry),
            })
        })
        .collect()
}
