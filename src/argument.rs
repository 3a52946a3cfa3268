//! Request arguments handed to token handlers
//!
//! A [`PageArgument`] is captured once per request from the query string or
//! form body the host server decoded. Names may repeat; the most recently
//! pushed pair wins on lookup and is also first when iterating by index.
//!
//! ```rust,ignore
//! use page_builder::PageArgument;
//!
//! let mut args = PageArgument::new();
//! args.push("k", "1");
//! args.push("k", "2");
//! assert_eq!(args.arg("k"), Some("2"));
//! assert_eq!(args.arg_name(1), Some("k"));
//! ```

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// A single request argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestArgument {
    pub name: String,
    pub value: String,
}

/// Ordered name/value pairs of one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageArgument {
    // Stored oldest first; every lookup walks from the back.
    arguments: Vec<RequestArgument>,
}

impl PageArgument {
    /// Create an empty argument set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair in front of every pair pushed before it
    pub fn push<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.arguments.push(RequestArgument {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Value of the most recently pushed argument called `name`
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|argument| argument.name == name)
            .map(|argument| argument.value.as_str())
    }

    /// Value at `index`, counted from the most recent push
    pub fn arg_at(&self, index: usize) -> Option<&str> {
        self.item(index).map(|argument| argument.value.as_str())
    }

    /// Name at `index`, counted from the most recent push
    pub fn arg_name(&self, index: usize) -> Option<&str> {
        self.item(index).map(|argument| argument.name.as_str())
    }

    /// Whether any argument is called `name`
    pub fn has_arg(&self, name: &str) -> bool {
        self.iter().any(|argument| argument.name == name)
    }

    /// Number of arguments, duplicates included
    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Iterate most recent first
    pub fn iter(&self) -> impl Iterator<Item = &RequestArgument> {
        self.arguments.iter().rev()
    }

    /// Build from a JSON object; scalars are stringified, arrays push one
    /// pair per element in order. Nested objects and arrays are rejected.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            Error::config_owned(format!(
                "request arguments must be a JSON object, found {}",
                json_kind(value)
            ))
        })?;

        let mut args = Self::new();
        for (name, value) in object {
            match value {
                JsonValue::Array(items) => {
                    for item in items {
                        args.push(name.as_str(), json_scalar(item)?);
                    }
                }
                other => args.push(name.as_str(), json_scalar(other)?),
            }
        }
        Ok(args)
    }

    fn item(&self, index: usize) -> Option<&RequestArgument> {
        self.iter().nth(index)
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

fn json_scalar(value: &JsonValue) -> Result<String> {
    match value {
        JsonValue::Null => Ok(String::new()),
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Bool(_) | JsonValue::Number(_) => Ok(value.to_string()),
        JsonValue::Array(_) | JsonValue::Object(_) => {
            Err(Error::config_static("request argument values must be scalars"))
        }
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for PageArgument {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut args = Self::new();
        for (name, value) in iter {
            args.push(name, value);
        }
        args
    }
}

impl<N: Into<String>, V: Into<String>> Extend<(N, V)> for PageArgument {
    fn extend<I: IntoIterator<Item = (N, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.push(name, value);
        }
    }
}

/// Serializes as a JSON object holding the effective value of each name.
impl Serialize for PageArgument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.len());
        let mut map = serializer.serialize_map(None)?;
        for argument in self.iter() {
            if seen.contains(&argument.name.as_str()) {
                continue;
            }
            seen.push(&argument.name);
            map.serialize_entry(&argument.name, &argument.value)?;
        }
        map.end()
    }
}

/// Types that can be turned into request arguments.
///
/// Implemented by `#[derive(PageArguments)]` when the `derive` feature is on.
pub trait IntoPageArgument {
    fn to_page_argument(&self) -> PageArgument;
}

impl IntoPageArgument for PageArgument {
    fn to_page_argument(&self) -> PageArgument {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duplicate_resolves_to_latest() {
        let mut args = PageArgument::new();
        args.push("k", "1");
        args.push("k", "2");
        assert_eq!(args.arg("k"), Some("2"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_index_order_is_most_recent_first() {
        let args: PageArgument = vec![("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        assert_eq!(args.arg_name(0), Some("c"));
        assert_eq!(args.arg_at(0), Some("3"));
        assert_eq!(args.arg_name(2), Some("a"));
        assert_eq!(args.arg_at(3), None);
        assert_eq!(args.arg_name(3), None);
    }

    #[test]
    fn test_missing_argument() {
        let args = PageArgument::new();
        assert!(args.is_empty());
        assert_eq!(args.arg("ssid"), None);
        assert!(!args.has_arg("ssid"));
    }

    #[test]
    fn test_from_json() {
        let args = PageArgument::from_json(&json!({
            "ssid": "home",
            "channel": 6,
            "hidden": false,
            "dns": ["1.1.1.1", "8.8.8.8"],
            "note": null
        }))
        .unwrap();

        assert_eq!(args.arg("ssid"), Some("home"));
        assert_eq!(args.arg("channel"), Some("6"));
        assert_eq!(args.arg("hidden"), Some("false"));
        assert_eq!(args.arg("dns"), Some("8.8.8.8"));
        assert_eq!(args.arg("note"), Some(""));
        assert_eq!(args.len(), 6);

        let err = PageArgument::from_json(&json!(["not", "an", "object"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Config error: request arguments must be a JSON object, found an array"
        );

        let err = PageArgument::from_json(&json!({"dns": [["1.1.1.1"]]})).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert!(PageArgument::from_json(&json!({"ap": {"ssid": "x"}})).is_err());
    }

    #[test]
    fn test_serialize_keeps_effective_values() {
        let mut args = PageArgument::new();
        args.push("mode", "sta");
        args.push("mode", "ap");
        args.push("ip", "10.0.0.1");

        let value = serde_json::to_value(&args).unwrap();
        assert_eq!(value, json!({"mode": "ap", "ip": "10.0.0.1"}));
    }

    #[test]
    fn test_extend() {
        let mut args = PageArgument::new();
        args.extend([("x", "1")]);
        args.extend(vec![("x".to_string(), "2".to_string())]);
        assert_eq!(args.arg("x"), Some("2"));
    }
}
