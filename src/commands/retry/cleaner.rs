use std::collections::BTreeSet;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{Map, Value};

/// Best-effort repair of a failed record's data before a retry attempt:
/// numeric re-coercion, string re-trimming, and regulation code
/// normalization. The shape of the payload is preserved.
#[derive(Debug)]
pub struct DataCleaner {
    code_anywhere: Regex,
    digit_run: Regex,
}

impl DataCleaner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            code_anywhere: Regex::new(r"(\d+)\s*-\s*(\d+)\s*-\s*(\d+)")
                .context("failed to compile embedded code regex")?,
            digit_run: Regex::new(r"\d+").context("failed to compile digit run regex")?,
        })
    }

    pub fn clean(&self, record_type: &str, data: &Value) -> Value {
        let Some(fields) = data.as_object() else {
            return data.clone();
        };

        let mut cleaned = Map::new();
        for (key, value) in fields {
            let repaired = match key.as_str() {
                "number" | "editionNumber" | "chapterNumber" | "articleNumber" | "sortOrder" => {
                    coerce_int(value).map(Value::from).unwrap_or_else(|| value.clone())
                }
                "code" => Value::from(self.sanitize_code_value(value, fields)),
                _ => retrim(value),
            };
            cleaned.insert(key.clone(), repaired);
        }

        // A regulation retried without any recoverable code still needs one.
        if record_type == "regulation" && !cleaned.contains_key("code") {
            cleaned.insert(
                "code".to_string(),
                Value::from(self.fallback_code(&cleaned)),
            );
        }

        Value::Object(cleaned)
    }

    /// Normalizes to the `edition-chapter-ordinal` shape, scavenging digit
    /// runs when the raw value is unparsable, with a synthesized fallback as
    /// the last resort.
    pub fn sanitize_code(&self, raw: &str, edition_number: i64, chapter_number: i64) -> String {
        if let Some(captures) = self.code_anywhere.captures(raw) {
            return format!("{}-{}-{}", &captures[1], &captures[2], &captures[3]);
        }

        let runs: Vec<&str> = self
            .digit_run
            .find_iter(raw)
            .map(|found| found.as_str())
            .collect();
        if runs.len() >= 3 {
            return format!("{}-{}-{}", runs[0], runs[1], runs[2]);
        }

        let ordinal = runs.first().copied().unwrap_or("0");
        format!("{edition_number}-{chapter_number}-{ordinal}")
    }

    fn sanitize_code_value(&self, value: &Value, fields: &Map<String, Value>) -> String {
        let raw = value.as_str().unwrap_or_default();
        let edition_number = fields.get("editionNumber").and_then(coerce_int).unwrap_or(0);
        let chapter_number = fields.get("chapterNumber").and_then(coerce_int).unwrap_or(0);
        self.sanitize_code(raw, edition_number, chapter_number)
    }

    fn fallback_code(&self, fields: &Map<String, Value>) -> String {
        let edition_number = fields.get("editionNumber").and_then(coerce_int).unwrap_or(0);
        let chapter_number = fields.get("chapterNumber").and_then(coerce_int).unwrap_or(0);
        format!("{edition_number}-{chapter_number}-0")
    }
}

/// `toInt`-style coercion: numbers pass through, strings parse after a trim,
/// and a leading digit run is the last resort.
pub fn coerce_int(value: &Value) -> Option<i64> {
    if let Some(number) = value.as_i64() {
        return Some(number);
    }
    if let Some(number) = value.as_f64() {
        return Some(number as i64);
    }

    let text = value.as_str()?.trim();
    if let Ok(number) = text.parse::<i64>() {
        return Some(number);
    }

    let digits: String = text.chars().take_while(|ch| ch.is_ascii_digit()).collect();
    digits.parse::<i64>().ok()
}

fn retrim(value: &Value) -> Value {
    match value.as_str() {
        Some(text) => Value::from(text.trim()),
        None => value.clone(),
    }
}

/// Keyword classification of a failure message. Reporting only; retry
/// behavior does not branch on the category.
pub fn categorize_failure(message: &str) -> &'static str {
    let lower = message.to_lowercase();

    if ["unique", "duplicate", "constraint"]
        .iter()
        .any(|keyword| lower.contains(keyword))
    {
        return "constraint";
    }

    if ["malformed", "shape", "format", "parse", "not found"]
        .iter()
        .any(|keyword| lower.contains(keyword))
    {
        return "data_format";
    }

    if ["empty", "invalid", "required", "negative", "agree", "missing"]
        .iter()
        .any(|keyword| lower.contains(keyword))
    {
        return "validation";
    }

    "unknown"
}

pub fn recommendations_for(categories: &BTreeSet<String>) -> Vec<String> {
    let mut recommendations = Vec::new();

    if categories.contains("constraint") {
        recommendations.push(
            "Duplicate natural keys were rejected; check whether a sibling with the same number or code already exists in the store.".to_string(),
        );
    }
    if categories.contains("validation") {
        recommendations.push(
            "Some nodes are missing required fields; fix the source headings (empty titles, negative numbers) and re-import.".to_string(),
        );
    }
    if categories.contains("data_format") {
        recommendations.push(
            "Regulation codes or parent references could not be normalized; review the flagged source lines for unusual formatting.".to_string(),
        );
    }
    if categories.contains("unknown") {
        recommendations.push(
            "Unclassified failures remain; inspect the permanent failure records manually.".to_string(),
        );
    }

    recommendations
}
