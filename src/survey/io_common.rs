use std::path::Path;

use chrono::{SecondsFormat, TimeZone, Utc};
use serde_json::Value as JSValue;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

pub fn make_default_id(path: &str) -> impl Fn(usize) -> String {
    let simplified_file_name = simplify_file_name(path);
    move |lineno| format!("{}-{:08}", simplified_file_name, lineno)
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// ISO-8601 in UTC with milliseconds, e.g. `2023-11-14T22:13:20.000Z`.
pub fn format_start_time(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => millis.to_string(),
    }
}

pub fn parse_start_time(s: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.timestamp_millis())
}

fn scalar_cell(js: &JSValue) -> String {
    match js {
        JSValue::Null => "".to_string(),
        JSValue::String(s) => s.clone(),
        JSValue::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.as_f64().map(survey_tally::number_key).unwrap_or_default(),
        },
        JSValue::Array(l) => l.iter().map(scalar_cell).collect::<Vec<String>>().join(", "),
        other => other.to_string(),
    }
}

/// The text of a stored answer in one cell: lists are joined with `, `, group
/// answers are written as JSON, missing answers are empty.
pub fn answer_cell(js: Option<&JSValue>) -> String {
    match js {
        None => "".to_string(),
        Some(JSValue::Object(obj)) => match obj.get("value") {
            Some(v) => scalar_cell(v),
            None if obj.is_empty() => "".to_string(),
            None => JSValue::Object(obj.clone()).to_string(),
        },
        Some(other) => scalar_cell(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cells() {
        assert_eq!(answer_cell(None), "");
        assert_eq!(answer_cell(Some(&json!({"value": "yes"}))), "yes");
        assert_eq!(
            answer_cell(Some(&json!({"value": ["math", "physics"], "subQuestion": {"value": "x"}}))),
            "math, physics"
        );
        assert_eq!(answer_cell(Some(&json!({"value": 3}))), "3");
        assert_eq!(answer_cell(Some(&json!({"value": 2.5}))), "2.5");
        assert_eq!(answer_cell(Some(&json!({}))), "");
        assert_eq!(
            answer_cell(Some(&json!({"father_interest": {"value": "always"}}))),
            "{\"father_interest\":{\"value\":\"always\"}}"
        );
        assert_eq!(answer_cell(Some(&json!("bare"))), "bare");
    }

    #[test]
    fn start_times() {
        assert_eq!(format_start_time(1_700_000_000_000), "2023-11-14T22:13:20.000Z");
        assert_eq!(
            parse_start_time("2023-11-14T22:13:20.000Z"),
            Some(1_700_000_000_000)
        );
        assert_eq!(parse_start_time("yesterday"), None);
    }

    #[test]
    fn default_ids() {
        let f = make_default_id("/tmp/export/results.xlsx");
        assert_eq!(f(3), "results.xlsx-00000003");
    }
}
