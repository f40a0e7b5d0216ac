//! parser for dict-literal strings.
//!
//! older spreadsheet exports stored device records as single-quoted dict
//! literals, e.g. `{'machineId': 'AA:BB', 'fwVersion': '1.2', 'zones': [1, 2]}`.
//! this recovers a flat record from that text, evaluating simple literals
//! where possible and leaving anything else as a string.

use crate::flatten::FlatRecord;
use crate::timefmt::LocalClock;
use serde_json::{Number, Value};

const DATE_FIELDS: &[&str] = &["fwReleaseDate", "manufactureDate"];

/// parse `{'k': v, ...}` into a record. pairs without a `:` are skipped.
pub fn parse_dict_literal(s: &str, clock: &LocalClock) -> FlatRecord {
    let body = s.trim().trim_matches(|c| c == '{' || c == '}');
    let mut record = FlatRecord::new();

    for pair in split_top_level(body) {
        let Some((raw_key, raw_value)) = pair.split_once(':') else {
            if !pair.is_empty() {
                tracing::warn!("[LITERAL] Failed to parse pair '{}'", pair);
            }
            continue;
        };

        let key = strip_quotes(raw_key);
        let mut value = eval_literal(strip_quotes(raw_value));

        if DATE_FIELDS.contains(&key) {
            if let Some(rendered) = value.as_f64().and_then(|e| clock.full(e)) {
                value = Value::String(rendered);
            }
        }

        record.insert(key.to_string(), value);
    }

    record
}

/// split on commas that are outside `[...]` and outside quotes
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (idx, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(s[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(s[start..].trim());
    parts
}

fn strip_quotes(s: &str) -> &str {
    s.trim().trim_matches(|c| c == '\'' || c == '"' || c == ' ')
}

/// evaluate the literal forms that show up in device dumps
fn eval_literal(s: &str) -> Value {
    match s {
        "True" => return Value::Bool(true),
        "False" => return Value::Bool(false),
        "None" => return Value::Null,
        _ => {}
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::from(i);
    }
    if let Some(n) = s.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        if inner.trim().is_empty() {
            return Value::Array(Vec::new());
        }
        return Value::Array(
            split_top_level(inner)
                .into_iter()
                .map(|item| eval_literal(strip_quotes(item)))
                .collect(),
        );
    }
    Value::String(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_mixed_literals() {
        let rec = parse_dict_literal(
            "{'machineId': '68:B6:B3:54:E8:B2', 'zones': [1, 2, 3], 'isLatest': True, 'note': None, 'ratio': 0.5}",
            &LocalClock::default(),
        );

        // the value's first ':' belongs to the mac address, not the pair
        assert_eq!(rec["machineId"], json!("68:B6:B3:54:E8:B2"));
        assert_eq!(rec["zones"], json!([1, 2, 3]));
        assert_eq!(rec["isLatest"], json!(true));
        assert_eq!(rec["note"], json!(null));
        assert_eq!(rec["ratio"], json!(0.5));
    }

    #[test]
    fn test_commas_inside_lists_and_quotes() {
        let rec = parse_dict_literal(
            "{'tags': ['a', 'b'], 'label': 'x, y', 'n': 3}",
            &LocalClock::default(),
        );
        assert_eq!(rec["tags"], json!(["a", "b"]));
        assert_eq!(rec["label"], json!("x, y"));
        assert_eq!(rec["n"], json!(3));
    }

    #[test]
    fn test_date_fields_are_rendered() {
        let rec = parse_dict_literal(
            "{'fwReleaseDate': 1704110400, 'manufactureDate': '1719835200000'}",
            &LocalClock::default(),
        );
        assert_eq!(rec["fwReleaseDate"], json!("2024-01-01 13:00:00"));
        assert_eq!(rec["manufactureDate"], json!("2024-07-01 14:00:00"));
    }

    #[test]
    fn test_pairs_without_colon_are_skipped() {
        let rec = parse_dict_literal("{'a': 1, garbage, 'b': 'two'}", &LocalClock::default());
        assert_eq!(rec.len(), 2);
        assert_eq!(rec["b"], json!("two"));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_dict_literal("{}", &LocalClock::default()).is_empty());
    }
}
