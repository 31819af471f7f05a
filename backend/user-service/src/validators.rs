//! Request field validators and violation rendering
//!
//! Rules are declared on the generated request messages (see `build.rs`);
//! this module holds the custom rules they reference and turns a
//! [`ValidationErrors`] into the single caller-facing message.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

/// Code of the `required` rule; a failing `required` hides the field's other violations
pub const REQUIRED_CODE: &str = "required";

/// Prefix of messages produced when the validation engine itself fails
pub const RUNTIME_ERROR_PREFIX: &str = "validation runtime error";

// Compile regex patterns once at startup
pub static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]+$").expect("hardcoded username regex is invalid - fix source code")
});

/// validator crate compatible rule: the field must not be empty
pub fn required(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        Err(ValidationError::new(REQUIRED_CODE).with_message(Cow::Borrowed("is required")))
    } else {
        Ok(())
    }
}

/// One field-level violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field_path: String,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.field_path, self.message)
    }
}

/// Flatten validator output into violations ordered by field path
///
/// Nested structs and lists are addressed as `parent.child` and `list[i]`.
pub fn collect_violations(errors: &ValidationErrors) -> Vec<Violation> {
    let mut violations = Vec::new();
    flatten("", errors, &mut violations);
    violations.sort_by(|a, b| a.field_path.cmp(&b.field_path));
    violations
}

fn flatten(prefix: &str, errors: &ValidationErrors, out: &mut Vec<Violation>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                if let Some(required) = field_errors.iter().find(|e| e.code == REQUIRED_CODE) {
                    out.push(Violation {
                        message: describe(required),
                        field_path: path,
                    });
                    continue;
                }
                out.extend(field_errors.iter().map(|e| Violation {
                    field_path: path.clone(),
                    message: describe(e),
                }));
            }
            ValidationErrorsKind::Struct(nested) => flatten(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten(&format!("{path}[{index}]"), nested, out);
                }
            }
        }
    }
}

fn describe(error: &ValidationError) -> String {
    if error.code == "regex" {
        return "value has an invalid format".to_string();
    }
    if let Some(message) = &error.message {
        return message.to_string();
    }

    let param = |name: &str| error.params.get(name).map(number);
    match error.code.as_ref() {
        "length" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("length must be between {min} and {max}"),
            (Some(min), None) => format!("length must be at least {min}"),
            (None, Some(max)) => format!("length must be at most {max}"),
            (None, None) => "has an invalid length".to_string(),
        },
        "range" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("must be between {min} and {max}"),
            (Some(min), None) => format!("must be greater than or equal to {min}"),
            (None, Some(max)) => format!("must be less than or equal to {max}"),
            (None, None) => "is out of range".to_string(),
        },
        code => format!("is invalid ({code})"),
    }
}

// Bounds may arrive as floats; `1.0` reads better as `1`
fn number(value: &serde_json::Value) -> String {
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => value.to_string(),
    }
}

/// Render violations as `"<field> <message>"` joined with `", "`
pub fn render_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Message for an engine failure, distinct from a rule violation
pub fn render_runtime_error(detail: &str) -> String {
    format!("{RUNTIME_ERROR_PREFIX}: {detail}")
}
