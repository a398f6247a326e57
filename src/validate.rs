//! Validation of raw model output against the resume schema.
//!
//! The model is asked for bare JSON but frequently wraps it in a markdown
//! fence anyway, so fences are stripped first. The JSON is then walked
//! against [`crate::schema::RESUME_DATA`] and every violation is collected
//! as a `path: message` string (e.g. `experience[0].start_date: Field
//! required`). Those strings are fed back to callers and logged; they are
//! never sent back to the model.

use crate::resume::ResumeData;
use crate::schema::{FieldType, ItemType, ObjectSchema, RESUME_DATA};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

static OPENING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```(?:json)?\s*$").unwrap());

/// Outcome of validating one model response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub success: bool,
    /// Populated on success.
    pub data: Option<ResumeData>,
    /// Populated on failure.
    pub errors: Vec<String>,
    /// The model output exactly as received.
    pub raw_json: String,
}

impl ValidationResult {
    fn failed(errors: Vec<String>, raw: &str) -> Self {
        Self {
            success: false,
            data: None,
            errors,
            raw_json: raw.to_string(),
        }
    }
}

/// Remove a surrounding ```` ```json ```` fence if present.
///
/// The opening fence must sit alone on the first line; a trailing ```` ``` ````
/// is dropped wherever the text ends with one.
pub fn strip_markdown_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(first) = text.lines().next() {
        if OPENING_FENCE.is_match(first) {
            text = text.split_once('\n').map_or("", |(_, rest)| rest);
        }
    }
    if let Some(body) = text.strip_suffix("```") {
        text = body.trim_end();
    }
    text.trim()
}

/// Parse and validate `raw` as [`ResumeData`].
pub fn validate_llm_response(raw: &str) -> ValidationResult {
    let stripped = strip_markdown_fences(raw);

    let value: Value = match serde_json::from_str(stripped) {
        Ok(v) => v,
        Err(e) => return ValidationResult::failed(vec![format!("Invalid JSON: {e}")], raw),
    };

    let mut errors = Vec::new();
    check_value(&value, FieldType::Object(&RESUME_DATA), "", &mut errors);
    if !errors.is_empty() {
        return ValidationResult::failed(errors, raw);
    }

    match serde_json::from_value::<ResumeData>(value) {
        Ok(data) => ValidationResult {
            success: true,
            data: Some(data),
            errors: Vec::new(),
            raw_json: raw.to_string(),
        },
        Err(e) => ValidationResult::failed(vec![e.to_string()], raw),
    }
}

// ── Schema walk ─────────────────────────────────────────────────────────

fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn push(errors: &mut Vec<String>, path: &str, msg: impl Into<String>) {
    let msg = msg.into();
    if path.is_empty() {
        errors.push(msg);
    } else {
        errors.push(format!("{path}: {msg}"));
    }
}

fn check_object(map: &Map<String, Value>, schema: &ObjectSchema, path: &str, errors: &mut Vec<String>) {
    for field in schema.fields {
        let field_path = join_key(path, field.name);
        match map.get(field.name) {
            None if field.required => push(errors, &field_path, "Field required"),
            None => {}
            Some(Value::Null) if field.nullable => {}
            Some(value) => check_value(value, field.ty, &field_path, errors),
        }
    }
}

fn check_value(value: &Value, ty: FieldType, path: &str, errors: &mut Vec<String>) {
    match ty {
        FieldType::String => {
            if !value.is_string() {
                push(errors, path, "Input should be a valid string");
            }
        }
        FieldType::Number { min, max } => match value.as_f64() {
            Some(n) => {
                if let Some(min) = min.filter(|m| n < *m) {
                    push(
                        errors,
                        path,
                        format!("Input should be greater than or equal to {}", fmt_bound(min)),
                    );
                }
                if let Some(max) = max.filter(|m| n > *m) {
                    push(
                        errors,
                        path,
                        format!("Input should be less than or equal to {}", fmt_bound(max)),
                    );
                }
            }
            None => push(errors, path, "Input should be a valid number"),
        },
        FieldType::Integer => {
            if !value.is_i64() {
                push(errors, path, "Input should be a valid integer");
            }
        }
        FieldType::Boolean => {
            if !value.is_boolean() {
                push(errors, path, "Input should be a valid boolean");
            }
        }
        FieldType::Enum(allowed) => {
            if !value.as_str().is_some_and(|s| allowed.contains(&s)) {
                push(errors, path, format!("Input should be {}", fmt_choices(allowed)));
            }
        }
        FieldType::Object(schema) => match value.as_object() {
            Some(map) => check_object(map, schema, path, errors),
            None => push(
                errors,
                path,
                format!("Input should be a valid dictionary or instance of {}", schema.name),
            ),
        },
        FieldType::Array(item) => match value.as_array() {
            Some(items) => {
                let item_ty = match item {
                    ItemType::String => FieldType::String,
                    ItemType::Object(schema) => FieldType::Object(schema),
                };
                for (i, v) in items.iter().enumerate() {
                    check_value(v, item_ty, &format!("{path}[{i}]"), errors);
                }
            }
            None => push(errors, path, "Input should be a valid list"),
        },
    }
}

fn fmt_bound(b: f64) -> String {
    if b.fract() == 0.0 {
        format!("{}", b as i64)
    } else {
        b.to_string()
    }
}

/// `'a'`, `'a' or 'b'`, `'a', 'b' or 'c'`.
fn fmt_choices(allowed: &[&str]) -> String {
    let quoted: Vec<String> = allowed.iter().map(|s| format!("'{s}'")).collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} or {last}", rest.join(", ")),
        Some((last, _)) => last.clone(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({ "personal_info": { "name": "Jane Doe" } })
    }

    #[test]
    fn fences_stripped() {
        assert_eq!(strip_markdown_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_markdown_fences("  ```\n{}\n```  "), "{}");
        assert_eq!(strip_markdown_fences("{}"), "{}");
        // An opening fence with trailing content is not a bare fence line.
        assert_eq!(strip_markdown_fences("```json {}"), "```json {}");
    }

    #[test]
    fn fenced_minimal_resume_validates() {
        let raw = format!("```json\n{}\n```", minimal());
        let r = validate_llm_response(&raw);
        assert!(r.success, "{:?}", r.errors);
        assert_eq!(r.data.unwrap().personal_info.name, "Jane Doe");
        assert_eq!(r.raw_json, raw);
    }

    #[test]
    fn invalid_json_single_error() {
        let r = validate_llm_response("Sure! Here is the JSON");
        assert!(!r.success);
        assert_eq!(r.errors.len(), 1);
        assert!(r.errors[0].starts_with("Invalid JSON: "));
        assert!(r.data.is_none());
    }

    #[test]
    fn missing_required_fields_have_paths() {
        let raw = json!({
            "personal_info": { "name": "Jane" },
            "experience": [{ "company": "Acme", "title": "Engineer" }]
        })
        .to_string();
        let r = validate_llm_response(&raw);
        assert!(!r.success);
        assert_eq!(r.errors, vec!["experience[0].start_date: Field required"]);
    }

    #[test]
    fn root_missing_personal_info() {
        let r = validate_llm_response("{}");
        assert_eq!(r.errors, vec!["personal_info: Field required"]);
    }

    #[test]
    fn root_not_an_object() {
        let r = validate_llm_response("[]");
        assert_eq!(
            r.errors,
            vec!["Input should be a valid dictionary or instance of ResumeData"]
        );
    }

    #[test]
    fn null_list_rejected_null_optional_accepted() {
        let raw = json!({
            "personal_info": { "name": "Jane", "email": null, "urls": null },
            "skills": null
        })
        .to_string();
        let r = validate_llm_response(&raw);
        assert_eq!(
            r.errors,
            vec![
                "personal_info.urls: Input should be a valid list",
                "skills: Input should be a valid list",
            ]
        );
    }

    #[test]
    fn enum_and_bounds_messages() {
        let raw = json!({
            "personal_info": { "name": "Jane" },
            "skills": [{ "skill": "Rust", "skill_type": "medium", "confidence": 1.5 }],
            "languages": [{ "language": "French", "fluency": "great" }]
        })
        .to_string();
        let r = validate_llm_response(&raw);
        assert_eq!(
            r.errors,
            vec![
                "skills[0].skill_type: Input should be 'hard' or 'soft'",
                "skills[0].confidence: Input should be less than or equal to 1",
                "languages[0].fluency: Input should be 'basic', 'conversational', 'fluent' or 'native'",
            ]
        );
    }

    #[test]
    fn wrong_scalar_types() {
        let raw = json!({
            "personal_info": { "name": 42, "location": "Paris" },
            "interests": ["chess", 7],
            "skills": [{ "skill": "Go", "skill_id": "x", "years_experience": "3" }],
            "experience": [{ "company": "A", "title": "B", "start_date": "2020", "current": "yes" }]
        })
        .to_string();
        let r = validate_llm_response(&raw);
        assert_eq!(
            r.errors,
            vec![
                "personal_info.name: Input should be a valid string",
                "personal_info.location: Input should be a valid dictionary or instance of Location",
                "experience[0].current: Input should be a valid boolean",
                "skills[0].years_experience: Input should be a valid number",
                "skills[0].skill_id: Input should be a valid integer",
                "interests[1]: Input should be a valid string",
            ]
        );
    }

    #[test]
    fn unknown_keys_ignored_and_integers_accepted_as_numbers() {
        let raw = json!({
            "personal_info": { "name": "Jane", "nickname": "JD" },
            "education": [{ "institution": "MIT", "gpa": { "value": 4, "max": 4 } }],
            "summary": "ignored"
        })
        .to_string();
        let r = validate_llm_response(&raw);
        assert!(r.success, "{:?}", r.errors);
        let gpa = r.data.unwrap().education[0].gpa.unwrap();
        assert_eq!(gpa.value, 4.0);
    }

    #[test]
    fn choices_formatting() {
        assert_eq!(fmt_choices(&["a"]), "'a'");
        assert_eq!(fmt_choices(&["a", "b"]), "'a' or 'b'");
        assert_eq!(fmt_choices(&["a", "b", "c"]), "'a', 'b' or 'c'");
        assert_eq!(fmt_bound(0.0), "0");
        assert_eq!(fmt_bound(0.5), "0.5");
    }
}
