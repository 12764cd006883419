use chrono::NaiveDate;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{ArgumentSchema, FieldKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path to the offending value, e.g. `filters.region` or `years[2]`.
    pub path: String,
    pub message: String,
}

/// Every schema violation found in one set of arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn render_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{}: {}", issue.path, issue.message))
        .collect::<Vec<_>>()
        .join("\n")
}

impl ArgumentSchema {
    /// Check `args` against the schema and return the accepted subset.
    ///
    /// Undeclared keys are dropped, whole-valued floats given for integer
    /// fields are normalized to integers, and `null` on an optional field is
    /// treated as absent.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<Map<String, Value>, ValidationError> {
        let mut issues = Vec::new();
        let validated = validate_object(self, args, "", &mut issues);
        if issues.is_empty() {
            Ok(validated)
        } else {
            Err(ValidationError { issues })
        }
    }
}

fn validate_object(
    schema: &ArgumentSchema,
    args: &Map<String, Value>,
    prefix: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Map<String, Value> {
    let mut validated = Map::new();
    for field in schema.fields() {
        let path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{prefix}.{}", field.name)
        };
        match args.get(&field.name) {
            None => {
                if !field.optional {
                    issues.push(issue(path, "required field is missing".to_string()));
                }
            }
            Some(Value::Null)
                if field.optional && !matches!(field.kind, FieldKind::Nullable(_)) => {}
            Some(value) => {
                if let Some(accepted) = validate_value(&field.kind, value, &path, issues) {
                    validated.insert(field.name.clone(), accepted);
                }
            }
        }
    }
    validated
}

fn validate_value(
    kind: &FieldKind,
    value: &Value,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Value> {
    match kind {
        FieldKind::Nullable(inner) => {
            if value.is_null() {
                Some(Value::Null)
            } else {
                validate_value(inner, value, path, issues)
            }
        }
        FieldKind::String => match value {
            Value::String(_) => Some(value.clone()),
            _ => mismatch(kind, value, path, issues),
        },
        FieldKind::Boolean => match value {
            Value::Bool(_) => Some(value.clone()),
            _ => mismatch(kind, value, path, issues),
        },
        FieldKind::Integer { min, max } => {
            let number = match whole_integer(value) {
                Ok(number) => number,
                Err(IntegerRejection::NotInteger) => return mismatch(kind, value, path, issues),
                Err(IntegerRejection::OutOfRange) => {
                    issues.push(issue(
                        path,
                        format!("out of range for a 64-bit integer, received {value}"),
                    ));
                    return None;
                }
            };
            if let Some(min) = min.filter(|min| number < *min) {
                issues.push(issue(path, format!("must be >= {min}, received {number}")));
                return None;
            }
            if let Some(max) = max.filter(|max| number > *max) {
                issues.push(issue(path, format!("must be <= {max}, received {number}")));
                return None;
            }
            Some(Value::from(number))
        }
        FieldKind::Number { min, max } => {
            let Some(number) = value.as_f64() else {
                return mismatch(kind, value, path, issues);
            };
            if let Some(min) = min.filter(|min| number < *min) {
                issues.push(issue(path, format!("must be >= {min}, received {number}")));
                return None;
            }
            if let Some(max) = max.filter(|max| number > *max) {
                issues.push(issue(path, format!("must be <= {max}, received {number}")));
                return None;
            }
            Some(value.clone())
        }
        FieldKind::Enum(values) => match value.as_str() {
            Some(raw) if values.iter().any(|allowed| allowed == raw) => Some(value.clone()),
            Some(raw) => {
                issues.push(issue(
                    path,
                    format!("expected one of [{}], received '{raw}'", values.join(", ")),
                ));
                None
            }
            None => mismatch(kind, value, path, issues),
        },
        FieldKind::Date => match value.as_str() {
            Some(raw) if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok() => Some(value.clone()),
            Some(raw) => {
                issues.push(issue(
                    path,
                    format!("expected date (YYYY-MM-DD), received '{raw}'"),
                ));
                None
            }
            None => mismatch(kind, value, path, issues),
        },
        FieldKind::Array(items) => {
            let Some(elements) = value.as_array() else {
                return mismatch(kind, value, path, issues);
            };
            let before = issues.len();
            let accepted: Vec<Value> = elements
                .iter()
                .enumerate()
                .filter_map(|(index, element)| {
                    validate_value(items, element, &format!("{path}[{index}]"), issues)
                })
                .collect();
            (issues.len() == before).then_some(Value::Array(accepted))
        }
        FieldKind::Object(schema) => {
            let Some(map) = value.as_object() else {
                return mismatch(kind, value, path, issues);
            };
            let before = issues.len();
            let accepted = validate_object(schema, map, path, issues);
            (issues.len() == before).then_some(Value::Object(accepted))
        }
        FieldKind::Union(alternatives) => {
            for alternative in alternatives {
                let mut scratch = Vec::new();
                if let Some(accepted) = validate_value(alternative, value, path, &mut scratch) {
                    if scratch.is_empty() {
                        return Some(accepted);
                    }
                }
            }
            mismatch(kind, value, path, issues)
        }
    }
}

enum IntegerRejection {
    NotInteger,
    OutOfRange,
}

/// Integers pass through; whole floats are converted only when the result is
/// exactly the caller's value.
fn whole_integer(value: &Value) -> Result<i64, IntegerRejection> {
    if let Some(number) = value.as_i64() {
        return Ok(number);
    }
    if value.as_u64().is_some() {
        return Err(IntegerRejection::OutOfRange);
    }
    let Some(float) = value.as_f64() else {
        return Err(IntegerRejection::NotInteger);
    };
    if !float.is_finite() || float.fract() != 0.0 {
        return Err(IntegerRejection::NotInteger);
    }
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
    if float >= i64::MIN as f64 && float < i64::MAX as f64 {
        Ok(float as i64)
    } else {
        Err(IntegerRejection::OutOfRange)
    }
}

fn mismatch(
    kind: &FieldKind,
    value: &Value,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Value> {
    issues.push(issue(
        path,
        format!("expected {}, received {}", kind.label(), json_type_name(value)),
    ));
    None
}

fn issue(path: impl Into<String>, message: String) -> ValidationIssue {
    ValidationIssue {
        path: path.into(),
        message,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_i64() || number.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("test args must be an object")
    }

    fn year_schema() -> ArgumentSchema {
        ArgumentSchema::new()
            .required("id", FieldKind::integer_range(1800, 2100), "Reference year")
            .optional("lang", FieldKind::enumeration(["en", "de"]), "Language")
    }

    #[test]
    fn accepts_integer_and_strips_unknown_keys() {
        let validated = year_schema()
            .validate(&args(json!({ "id": 2023, "verbose": true })))
            .unwrap();
        assert_eq!(Value::Object(validated), json!({ "id": 2023 }));
    }

    #[test]
    fn whole_float_is_coerced_to_integer() {
        let validated = year_schema().validate(&args(json!({ "id": 2023.0 }))).unwrap();
        assert_eq!(validated["id"], json!(2023));
        assert!(validated["id"].is_i64());
    }

    #[test]
    fn integers_beyond_i64_are_rejected_not_clamped() {
        let schema = ArgumentSchema::new().required("id", FieldKind::integer(), "Identifier");
        for raw in ["9223372036854775808", "9223372036854775808.0", "18446744073709551615"] {
            let value: Value = serde_json::from_str(raw).unwrap();
            let err = schema.validate(&args(json!({ "id": value }))).unwrap_err();
            assert_eq!(err.issues.len(), 1);
            assert_eq!(err.issues[0].path, "id");
            assert!(
                err.issues[0].message.starts_with("out of range for a 64-bit integer"),
                "{raw}: {}",
                err.issues[0].message
            );
        }

        let validated = schema
            .validate(&args(json!({ "id": i64::MAX })))
            .unwrap();
        assert_eq!(validated["id"], json!(i64::MAX));
        let validated = schema
            .validate(&args(json!({ "id": -9223372036854775808.0_f64 })))
            .unwrap();
        assert_eq!(validated["id"], json!(i64::MIN));
    }

    #[test]
    fn fractional_number_for_integer_is_a_type_mismatch() {
        let err = year_schema().validate(&args(json!({ "id": 2023.5 }))).unwrap_err();
        assert_eq!(err.issues[0].message, "expected integer, received number");
    }

    #[test]
    fn string_for_integer_is_rejected_with_path() {
        let err = year_schema()
            .validate(&args(json!({ "id": "abc" })))
            .expect_err("string id must fail");
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].path, "id");
        assert_eq!(err.issues[0].message, "expected integer, received string");
        assert_eq!(err.to_string(), "id: expected integer, received string");
    }

    #[test]
    fn missing_required_and_bad_enum_are_both_reported() {
        let err = year_schema()
            .validate(&args(json!({ "lang": "fr" })))
            .expect_err("must fail");
        let paths: Vec<&str> = err.issues.iter().map(|issue| issue.path.as_str()).collect();
        assert_eq!(paths, vec!["id", "lang"]);
        assert_eq!(err.issues[0].message, "required field is missing");
        assert_eq!(err.issues[1].message, "expected one of [en, de], received 'fr'");
    }

    #[test]
    fn integer_bounds_are_enforced() {
        let err = year_schema()
            .validate(&args(json!({ "id": 1500 })))
            .expect_err("out of range");
        assert_eq!(err.issues[0].message, "must be >= 1800, received 1500");
        assert!(year_schema().validate(&args(json!({ "id": 20.5 }))).is_err());
    }

    #[test]
    fn null_on_optional_field_is_treated_as_absent() {
        let validated = year_schema()
            .validate(&args(json!({ "id": 2000, "lang": null })))
            .unwrap();
        assert!(!validated.contains_key("lang"));
    }

    #[test]
    fn nested_paths_are_reported_for_objects_and_arrays() {
        let schema = ArgumentSchema::new()
            .required(
                "filters",
                FieldKind::object(ArgumentSchema::new().required(
                    "region",
                    FieldKind::union(vec![FieldKind::String, FieldKind::integer()]),
                    "Region",
                )),
                "Filters",
            )
            .optional("years", FieldKind::array(FieldKind::integer()), "Years")
            .optional("from", FieldKind::Date, "Start date");

        let err = schema
            .validate(&args(json!({
                "filters": { "region": true },
                "years": [2020, "x"],
                "from": "2020-13-01"
            })))
            .expect_err("must fail");
        let paths: Vec<&str> = err.issues.iter().map(|issue| issue.path.as_str()).collect();
        assert_eq!(paths, vec!["filters.region", "years[1]", "from"]);
        assert_eq!(
            err.issues[0].message,
            "expected string | integer, received boolean"
        );

        let ok = schema
            .validate(&args(json!({
                "filters": { "region": 9, "extra": 1 },
                "years": [2020, 2021],
                "from": "2020-01-31"
            })))
            .unwrap();
        assert_eq!(ok["filters"], json!({ "region": 9 }));
    }

    #[test]
    fn nullable_accepts_null_but_stays_required() {
        let schema = ArgumentSchema::new().required(
            "weight",
            FieldKind::nullable(FieldKind::number()),
            "Weight",
        );
        assert!(schema.validate(&args(json!({ "weight": null }))).is_ok());
        assert!(schema.validate(&args(json!({ "weight": 1.5 }))).is_ok());
        assert!(schema.validate(&args(json!({}))).is_err());
    }
}
