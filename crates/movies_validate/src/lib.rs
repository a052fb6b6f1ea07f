//! Declarative validation rules for MCP tool arguments.
//!
//! Rules are pure predicates on a single [`serde_json::Value`]; a
//! [`RuleSet`] binds rules to field names and validates a JSON object in one
//! pass, collecting every failure rather than stopping at the first one.
//!
//! # Example
//!
//! ```
//! use movies_validate::{rules, RuleSet};
//! use serde_json::json;
//!
//! let set = RuleSet::new()
//!     .field("title", vec![rules::required(), rules::max_length(255)])
//!     .field("year", vec![rules::min(1888.0), rules::max(2040.0)]);
//!
//! let errors = set.validate(&json!({ "title": "", "year": 1999 })).unwrap_err();
//! assert_eq!(errors.count(), 1);
//! ```

use serde_json::Value;
use std::fmt;

/// A single validation rule: a predicate returning an error message on
/// failure.
pub type RuleFn = Box<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// One failing field and the message describing why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All validation failures collected from a single [`RuleSet::validate`]
/// pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    pub fn fields(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn count(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// A structured detail payload suitable for a JSON-RPC error's `data`
    /// field: per-field messages and a count.
    pub fn detail(&self) -> Value {
        serde_json::json!({
            "fields": self.errors.iter().map(|e| serde_json::json!({
                "field": e.field,
                "message": e.message,
            })).collect::<Vec<_>>(),
            "count": self.errors.len(),
        })
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.errors.iter().map(|e| e.field.as_str()).collect();
        write!(f, "Invalid parameters: {}", names.join(", "))
    }
}

/// A set of rules bound to field names.
#[derive(Default)]
pub struct RuleSet {
    bindings: Vec<(String, Vec<RuleFn>)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self { bindings: Vec::new() }
    }

    /// Bind a list of rules to a field name. Rules run in order; every
    /// failing rule for a field contributes one [`FieldError`].
    pub fn field(mut self, name: impl Into<String>, rules: Vec<RuleFn>) -> Self {
        self.bindings.push((name.into(), rules));
        self
    }

    /// Validate a JSON object against every bound field, collecting all
    /// failures in one pass.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationErrors> {
        let empty = Value::Null;
        let mut errors = Vec::new();

        for (field, rules) in &self.bindings {
            let field_value = value.get(field).unwrap_or(&empty);
            for rule in rules {
                if let Err(message) = rule(field_value) {
                    errors.push(FieldError {
                        field: field.clone(),
                        message,
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors { errors })
        }
    }
}

/// Rule combinators.
pub mod rules {
    use super::*;

    /// `nil`, empty strings (after trimming), and empty sequences fail.
    /// Empty maps are treated as valid, since client-provided capability
    /// objects may legitimately be empty.
    pub fn required() -> RuleFn {
        Box::new(|v: &Value| match v {
            Value::Null => Err("is required".to_string()),
            Value::String(s) if s.trim().is_empty() => Err("is required".to_string()),
            Value::Array(a) if a.is_empty() => Err("is required".to_string()),
            Value::Object(_) => Ok(()),
            _ => Ok(()),
        })
    }

    pub fn min_length(n: usize) -> RuleFn {
        Box::new(move |v: &Value| {
            let len = value_len(v);
            match len {
                Some(len) if len < n => Err(format!("must be at least {} characters", n)),
                _ => Ok(()),
            }
        })
    }

    pub fn max_length(n: usize) -> RuleFn {
        Box::new(move |v: &Value| {
            let len = value_len(v);
            match len {
                Some(len) if len > n => Err(format!("must be at most {} characters", n)),
                _ => Ok(()),
            }
        })
    }

    pub fn min(x: f64) -> RuleFn {
        Box::new(move |v: &Value| match v.as_f64() {
            Some(n) if n < x => Err(format!("must be >= {}", x)),
            _ => Ok(()),
        })
    }

    pub fn max(x: f64) -> RuleFn {
        Box::new(move |v: &Value| match v.as_f64() {
            Some(n) if n > x => Err(format!("must be <= {}", x)),
            _ => Ok(()),
        })
    }

    pub fn one_of(values: Vec<String>) -> RuleFn {
        Box::new(move |v: &Value| {
            if matches!(v, Value::Null) {
                return Ok(());
            }
            let s = v.as_str().unwrap_or_default();
            if values.iter().any(|allowed| allowed == s) {
                Ok(())
            } else {
                Err(format!("must be one of: {}", values.join(", ")))
            }
        })
    }

    pub fn email() -> RuleFn {
        Box::new(|v: &Value| {
            if matches!(v, Value::Null) {
                return Ok(());
            }
            let s = v.as_str().unwrap_or_default();
            let re = regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
            if re.is_match(s) {
                Ok(())
            } else {
                Err("must be a valid email address".to_string())
            }
        })
    }

    pub fn url() -> RuleFn {
        Box::new(|v: &Value| {
            if matches!(v, Value::Null) {
                return Ok(());
            }
            let s = v.as_str().unwrap_or_default();
            if s.is_empty() {
                return Ok(());
            }
            match url::Url::parse(s) {
                Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => Ok(()),
                _ => Err("must be a valid absolute URL".to_string()),
            }
        })
    }

    pub fn alpha() -> RuleFn {
        Box::new(|v: &Value| check_chars(v, |c| c.is_alphabetic(), "must contain only letters"))
    }

    pub fn numeric() -> RuleFn {
        Box::new(|v: &Value| {
            check_chars(v, |c| c.is_ascii_digit(), "must contain only digits")
        })
    }

    pub fn alphanumeric() -> RuleFn {
        Box::new(|v: &Value| {
            check_chars(v, |c| c.is_alphanumeric(), "must be alphanumeric")
        })
    }

    pub fn date(layout: &'static str) -> RuleFn {
        Box::new(move |v: &Value| {
            if matches!(v, Value::Null) {
                return Ok(());
            }
            let s = v.as_str().unwrap_or_default();
            match chrono::NaiveDate::parse_from_str(s, layout) {
                Ok(_) => Ok(()),
                Err(_) => Err(format!("must match date format {}", layout)),
            }
        })
    }

    pub fn uuid() -> RuleFn {
        Box::new(|v: &Value| {
            if matches!(v, Value::Null) {
                return Ok(());
            }
            let s = v.as_str().unwrap_or_default();
            match uuid::Uuid::parse_str(s) {
                Ok(_) => Ok(()),
                Err(_) => Err("must be a valid UUID".to_string()),
            }
        })
    }

    pub fn json() -> RuleFn {
        Box::new(|v: &Value| {
            if matches!(v, Value::Null) {
                return Ok(());
            }
            let s = v.as_str().unwrap_or_default();
            match serde_json::from_str::<Value>(s) {
                Ok(_) => Ok(()),
                Err(_) => Err("must be valid JSON".to_string()),
            }
        })
    }

    /// `movie_rating` = `min(0) & max(10)`.
    pub fn movie_rating() -> RuleFn {
        Box::new(|v: &Value| {
            if matches!(v, Value::Null) {
                return Ok(());
            }
            min(0.0)(v)?;
            max(10.0)(v)
        })
    }

    pub fn mcp_protocol_version() -> RuleFn {
        Box::new(|v: &Value| {
            let s = v.as_str().unwrap_or_default();
            let re = regex::Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
            if re.is_match(s) {
                Ok(())
            } else {
                Err("must be a protocol version of the form YYYY-MM-DD".to_string())
            }
        })
    }

    pub fn mcp_tool_name() -> RuleFn {
        Box::new(|v: &Value| {
            let s = v.as_str().unwrap_or_default();
            let re = regex::Regex::new(r"^[a-z][a-z0-9_]*$").unwrap();
            if re.is_match(s) {
                Ok(())
            } else {
                Err("must be a lowercase_snake_case tool name".to_string())
            }
        })
    }

    pub fn mcp_resource_uri() -> RuleFn {
        Box::new(|v: &Value| {
            let s = v.as_str().unwrap_or_default();
            let re = regex::Regex::new(r"^movies://(database|posters)/.+$").unwrap();
            if re.is_match(s) {
                Ok(())
            } else {
                Err("must be a movies:// resource URI".to_string())
            }
        })
    }

    fn value_len(v: &Value) -> Option<usize> {
        match v {
            Value::String(s) => Some(s.trim().chars().count()),
            Value::Array(a) => Some(a.len()),
            Value::Null => None,
            _ => None,
        }
    }

    fn check_chars(v: &Value, pred: impl Fn(char) -> bool, message: &str) -> Result<(), String> {
        if matches!(v, Value::Null) {
            return Ok(());
        }
        let s = v.as_str().unwrap_or_default();
        if s.chars().all(&pred) {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }
}

/// Struct-tag validation: a tag of the form `required,min=N,max=N`.
///
/// `min`/`max` select `min_length`/`max_length` for strings and sequences,
/// and `min`/`max` for numbers, chosen by the value's runtime JSON type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagRules {
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl TagRules {
    pub fn parse(tag: &str) -> Self {
        let mut parsed = Self::default();
        for part in tag.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if part == "required" {
                parsed.required = true;
                continue;
            }
            if let Some((key, value)) = part.split_once('=') {
                let value: f64 = value.trim().parse().unwrap_or_default();
                match key.trim() {
                    "min" => parsed.min = Some(value),
                    "max" => parsed.max = Some(value),
                    _ => {}
                }
            }
        }
        parsed
    }

    /// Check a value against the parsed tag, dispatching `min`/`max` to
    /// length or numeric rules based on the value's runtime type.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if self.required {
            rules::required()(value)?;
        }
        match value {
            Value::String(_) | Value::Array(_) => {
                if let Some(min) = self.min {
                    rules::min_length(min as usize)(value)?;
                }
                if let Some(max) = self.max {
                    rules::max_length(max as usize)(value)?;
                }
            }
            Value::Number(_) => {
                if let Some(min) = self.min {
                    rules::min(min)(value)?;
                }
                if let Some(max) = self.max {
                    rules::max(max)(value)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_rejects_empty_string_after_trim() {
        let rule = rules::required();
        assert!(rule(&json!("   ")).is_err());
        assert!(rule(&json!("x")).is_ok());
    }

    #[test]
    fn required_accepts_empty_map() {
        let rule = rules::required();
        assert!(rule(&json!({})).is_ok());
    }

    #[test]
    fn required_rejects_empty_array() {
        let rule = rules::required();
        assert!(rule(&json!([])).is_err());
    }

    #[test]
    fn movie_rating_bounds() {
        let rule = rules::movie_rating();
        assert!(rule(&json!(8.7)).is_ok());
        assert!(rule(&json!(11.0)).is_err());
        assert!(rule(&json!(-1.0)).is_err());
    }

    #[test]
    fn rule_set_collects_all_field_failures_in_one_pass() {
        let set = RuleSet::new()
            .field("title", vec![rules::required()])
            .field("year", vec![rules::min(1888.0), rules::max(2040.0)]);

        let errors = set
            .validate(&json!({ "title": "", "year": 1700 }))
            .unwrap_err();

        assert_eq!(errors.count(), 2);
        assert!(errors.to_string().contains("title"));
        assert!(errors.to_string().contains("year"));
    }

    #[test]
    fn tag_rules_dispatch_by_runtime_type() {
        let tag = TagRules::parse("required,min=1,max=255");
        assert!(tag.check(&json!("The Matrix")).is_ok());
        assert!(tag.check(&json!("")).is_err());

        let numeric_tag = TagRules::parse("min=0,max=10");
        assert!(numeric_tag.check(&json!(10.5)).is_err());
    }

    #[test]
    fn one_of_rejects_values_outside_the_set() {
        let rule = rules::one_of(vec!["asc".to_string(), "desc".to_string()]);
        assert!(rule(&json!("asc")).is_ok());
        assert!(rule(&json!("sideways")).is_err());
    }

    #[test]
    fn url_rule_requires_http_scheme() {
        let rule = rules::url();
        assert!(rule(&json!("https://example.com/poster.jpg")).is_ok());
        assert!(rule(&json!("not-a-url")).is_err());
        assert!(rule(&json!("")).is_ok());
    }
}
