//! Evaluation context normalization
//!
//! Flattens a caller-supplied attribute map into a lookup table of primitive
//! values that targeting rules can be evaluated against. Normalization is a
//! pure function: unknown or non-coercible attributes simply end up absent,
//! never defaulted to null placeholders, so EXISTS/NOT_EXISTS can distinguish
//! "missing" from "present-but-empty".

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

// ============================================================================
// AttributeValue
// ============================================================================

/// A normalized attribute or rule value.
///
/// Rule evaluation is type-aware, so values carry their primitive type
/// instead of being stringly typed. Sets are ordered so serialization and
/// equality are stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    String(String),
    StringSet(BTreeSet<String>),
}

impl AttributeValue {
    /// Build a string set from anything iterable over string-likes
    pub fn set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::StringSet(values.into_iter().map(Into::into).collect())
    }

    /// Get the value as a string slice, if it is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as a number, parsing numeric strings
    ///
    /// Numeric coercion is only used by ordered comparisons; equality stays
    /// strict on the variant type.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Get the scalar string form used for membership tests
    ///
    /// Integral numbers render without a fractional part so `Number(5.0)`
    /// matches a `"5"` set entry. Sets have no scalar form.
    pub fn scalar_string(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::String(s) => Some(Cow::Borrowed(s)),
            Self::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            Self::Number(n) => Some(Cow::Owned(format_number(*n))),
            Self::StringSet(_) => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// ============================================================================
// EvaluationContext
// ============================================================================

/// A normalized user context for rule and flag evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationContext {
    user_id: String,
    attributes: HashMap<String, AttributeValue>,
}

impl EvaluationContext {
    /// Create an empty context for a user
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            attributes: HashMap::new(),
        }
    }

    /// Normalize an arbitrary JSON attribute map into a flat context
    ///
    /// Scalars are kept with their primitive type, arrays of scalars become
    /// string sets, and nested objects are flattened one level with
    /// dot-delimited keys. Nulls and anything deeper are dropped.
    pub fn normalize(user_id: impl Into<String>, attributes: &Map<String, Value>) -> Self {
        let mut ctx = Self::new(user_id);

        for (key, value) in attributes {
            match value {
                Value::Object(nested) => {
                    for (nested_key, nested_value) in nested {
                        if let Some(coerced) = coerce_value(nested_value) {
                            ctx.attributes
                                .insert(format!("{}.{}", key, nested_key), coerced);
                        }
                    }
                }
                _ => {
                    if let Some(coerced) = coerce_value(value) {
                        ctx.attributes.insert(key.clone(), coerced);
                    }
                }
            }
        }

        ctx
    }

    /// Add an attribute (builder style)
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Get the user ID this context was built for
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Look up a normalized attribute
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Check whether an attribute key is present
    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Number of normalized attributes
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check whether the context has no attributes
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Coerce a JSON scalar or scalar array into an attribute value
fn coerce_value(value: &Value) -> Option<AttributeValue> {
    match value {
        Value::Bool(b) => Some(AttributeValue::Bool(*b)),
        Value::Number(n) => n.as_f64().map(AttributeValue::Number),
        Value::String(s) => Some(AttributeValue::String(s.clone())),
        Value::Array(items) => {
            let set = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => n.as_f64().map(format_number),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .collect::<BTreeSet<_>>();
            Some(AttributeValue::StringSet(set))
        }
        Value::Null | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    mod attribute_value_tests {
        use super::*;

        #[test]
        fn test_as_number_parses_numeric_strings() {
            assert_eq!(AttributeValue::from("42").as_number(), Some(42.0));
            assert_eq!(AttributeValue::from(" 3.5 ").as_number(), Some(3.5));
            assert_eq!(AttributeValue::from("abc").as_number(), None);
            assert_eq!(AttributeValue::from(true).as_number(), None);
        }

        #[test]
        fn test_scalar_string_forms() {
            assert_eq!(
                AttributeValue::from("US").scalar_string().as_deref(),
                Some("US")
            );
            assert_eq!(
                AttributeValue::Number(5.0).scalar_string().as_deref(),
                Some("5")
            );
            assert_eq!(
                AttributeValue::Number(2.5).scalar_string().as_deref(),
                Some("2.5")
            );
            assert_eq!(
                AttributeValue::from(true).scalar_string().as_deref(),
                Some("true")
            );
            assert!(AttributeValue::set(["a"]).scalar_string().is_none());
        }

        #[test]
        fn test_untagged_serialization() {
            let value = AttributeValue::set(["US", "CA"]);
            let json = serde_json::to_string(&value).unwrap();
            assert_eq!(json, r#"["CA","US"]"#);

            let parsed: AttributeValue = serde_json::from_str("42").unwrap();
            assert_eq!(parsed, AttributeValue::Number(42.0));
        }
    }

    mod normalization_tests {
        use super::*;

        #[test]
        fn test_scalars_keep_their_type() {
            let attrs = object(json!({
                "country": "US",
                "age": 30,
                "premium": true,
            }));
            let ctx = EvaluationContext::normalize("user-1", &attrs);

            assert_eq!(ctx.user_id(), "user-1");
            assert_eq!(ctx.get("country"), Some(&AttributeValue::from("US")));
            assert_eq!(ctx.get("age"), Some(&AttributeValue::Number(30.0)));
            assert_eq!(ctx.get("premium"), Some(&AttributeValue::Bool(true)));
        }

        #[test]
        fn test_arrays_become_string_sets() {
            let attrs = object(json!({ "tags": ["beta", "mobile", 7] }));
            let ctx = EvaluationContext::normalize("user-1", &attrs);

            assert_eq!(
                ctx.get("tags"),
                Some(&AttributeValue::set(["beta", "mobile", "7"]))
            );
        }

        #[test]
        fn test_nulls_are_absent_not_defaulted() {
            let attrs = object(json!({ "referral_code": null }));
            let ctx = EvaluationContext::normalize("user-1", &attrs);

            assert!(!ctx.contains("referral_code"));
            assert!(ctx.is_empty());
        }

        #[test]
        fn test_empty_array_is_present_but_empty() {
            let attrs = object(json!({ "tags": [] }));
            let ctx = EvaluationContext::normalize("user-1", &attrs);

            // Present-but-empty is distinct from missing for EXISTS checks
            assert!(ctx.contains("tags"));
            assert_eq!(ctx.get("tags"), Some(&AttributeValue::set::<_, String>([])));
        }

        #[test]
        fn test_nested_objects_flatten_one_level() {
            let attrs = object(json!({
                "device": { "os": "ios", "version": 17 },
                "deep": { "nested": { "too": "far" } },
            }));
            let ctx = EvaluationContext::normalize("user-1", &attrs);

            assert_eq!(ctx.get("device.os"), Some(&AttributeValue::from("ios")));
            assert_eq!(
                ctx.get("device.version"),
                Some(&AttributeValue::Number(17.0))
            );
            assert!(!ctx.contains("deep.nested"));
            assert!(!ctx.contains("deep.nested.too"));
        }

        #[test]
        fn test_builder_attributes() {
            let ctx = EvaluationContext::new("user-2")
                .with_attribute("plan", "pro")
                .with_attribute("seats", 12i64);

            assert_eq!(ctx.len(), 2);
            assert_eq!(ctx.get("plan"), Some(&AttributeValue::from("pro")));
        }
    }
}
