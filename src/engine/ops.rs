//! Cell-level value operations.
//!
//! The building blocks of generated row programs: each operation takes a
//! JSON value and returns a transformed JSON value. Operations never fail;
//! a value an operation cannot handle passes through unchanged (or becomes
//! null for strictly-typed conversions), which keeps partially wrong
//! generated programs from aborting a pass.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// All available cell operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Remove leading and trailing whitespace.
    Trim,

    /// Convert to uppercase.
    Uppercase,

    /// Convert to lowercase.
    Lowercase,

    /// Regex pattern replacement.
    Replace {
        pattern: String,
        #[serde(default)]
        value: String,
    },

    /// Pad at the start to reach a target length.
    PadStart {
        length: usize,
        #[serde(default = "default_pad_char")]
        char: String,
    },

    /// Pad at the end to reach a target length.
    PadEnd {
        length: usize,
        #[serde(default = "default_pad_char")]
        char: String,
    },

    /// Extract a 4-digit year from a date-like string.
    ExtractYear,

    /// Ensure the value starts with a prefix.
    EnsurePrefix { value: String },

    /// Ensure the value ends with a suffix.
    EnsureSuffix { value: String },

    /// Map values through a lookup table.
    Map {
        mapping: HashMap<String, String>,
        #[serde(default)]
        case_insensitive: bool,
        /// Replacement when no mapping matches; null keeps the input value.
        #[serde(default)]
        default_unmapped: Option<String>,
    },

    /// Split into an array of trimmed parts.
    Split {
        #[serde(default = "default_split_separator")]
        separator: String,
    },

    /// Convert to boolean against a truthy-string list.
    ToBoolean {
        #[serde(default = "default_true_values")]
        true_values: Vec<String>,
    },

    /// Convert to a number (integer or float).
    ToNumber,

    /// Extract a substring by character offset.
    Substring {
        start: usize,
        #[serde(default)]
        length: Option<usize>,
    },

    /// Keep only alphanumeric characters.
    Alphanumeric,

    /// Keep only ASCII digits.
    DigitsOnly,
}

fn default_pad_char() -> String {
    "0".to_string()
}

fn default_split_separator() -> String {
    ",".to_string()
}

fn default_true_values() -> Vec<String> {
    ["true", "1", "yes", "y"].iter().map(|s| s.to_string()).collect()
}

/// Coerce a scalar JSON value to a string; objects and arrays stay opaque.
fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Apply a string-to-string function, passing non-stringable values through.
fn map_string(value: &Value, f: impl FnOnce(String) -> String) -> Value {
    as_string(value)
        .map(|s| Value::String(f(s)))
        .unwrap_or_else(|| value.clone())
}

impl Operation {
    /// All regex patterns referenced by this operation.
    ///
    /// Used by program compilation to validate patterns up front, so an
    /// invalid pattern is a compile fault rather than a silent per-row no-op.
    pub fn patterns(&self) -> Vec<&str> {
        match self {
            Operation::Replace { pattern, .. } => vec![pattern.as_str()],
            _ => Vec::new(),
        }
    }

    /// Apply this operation to a value.
    pub fn apply(&self, value: &Value) -> Value {
        match self {
            Operation::Trim => map_string(value, |s| s.trim().to_string()),
            Operation::Uppercase => map_string(value, |s| s.to_uppercase()),
            Operation::Lowercase => map_string(value, |s| s.to_lowercase()),

            Operation::Replace { pattern, value: replacement } => {
                match (as_string(value), regex::Regex::new(pattern)) {
                    (Some(s), Ok(re)) => Value::String(re.replace_all(&s, replacement.as_str()).into_owned()),
                    _ => value.clone(),
                }
            }

            Operation::PadStart { length, char } => map_string(value, |s| {
                let pad = char.chars().next().unwrap_or('0');
                let deficit = length.saturating_sub(s.chars().count());
                let mut out: String = std::iter::repeat(pad).take(deficit).collect();
                out.push_str(&s);
                out
            }),

            Operation::PadEnd { length, char } => map_string(value, |s| {
                let pad = char.chars().next().unwrap_or('0');
                let deficit = length.saturating_sub(s.chars().count());
                let mut out = s;
                out.extend(std::iter::repeat(pad).take(deficit));
                out
            }),

            Operation::ExtractYear => as_string(value)
                .and_then(|s| {
                    regex::Regex::new(r"\d{4}")
                        .ok()
                        .and_then(|re| re.find(&s).map(|m| m.as_str().to_string()))
                })
                .and_then(|year| year.parse::<i64>().ok())
                .map(|n| Value::Number(n.into()))
                .unwrap_or(Value::Null),

            Operation::EnsurePrefix { value: prefix } => map_string(value, |s| {
                if s.starts_with(prefix.as_str()) { s } else { format!("{}{}", prefix, s) }
            }),

            Operation::EnsureSuffix { value: suffix } => map_string(value, |s| {
                if s.ends_with(suffix.as_str()) { s } else { format!("{}{}", s, suffix) }
            }),

            Operation::Map { mapping, case_insensitive, default_unmapped } => {
                map_string(value, |s| {
                    let hit = if *case_insensitive {
                        mapping
                            .iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case(&s))
                            .map(|(_, v)| v.clone())
                    } else {
                        mapping.get(&s).cloned()
                    };
                    match hit {
                        Some(v) => v,
                        // Unlike a lookup miss dropping the field, keep the
                        // input so map-values instructions degrade gracefully.
                        None => default_unmapped.clone().unwrap_or(s),
                    }
                })
            }

            Operation::Split { separator } => as_string(value)
                .map(|s| {
                    Value::Array(
                        s.split(separator.as_str())
                            .map(|p| Value::String(p.trim().to_string()))
                            .collect(),
                    )
                })
                .unwrap_or_else(|| value.clone()),

            Operation::ToBoolean { true_values } => match value {
                Value::Bool(b) => Value::Bool(*b),
                _ => as_string(value)
                    .map(|s| Value::Bool(true_values.iter().any(|tv| tv.eq_ignore_ascii_case(s.trim()))))
                    .unwrap_or(Value::Bool(false)),
            },

            Operation::ToNumber => match value {
                Value::Number(_) => value.clone(),
                _ => as_string(value)
                    .and_then(|s| parse_loose_number(&s))
                    .unwrap_or(Value::Null),
            },

            Operation::Substring { start, length } => map_string(value, |s| {
                let chars: Vec<char> = s.chars().collect();
                let end = length.map(|l| start + l).unwrap_or(chars.len()).min(chars.len());
                chars.get(*start..end).map(|c| c.iter().collect()).unwrap_or_default()
            }),

            Operation::Alphanumeric => {
                map_string(value, |s| s.chars().filter(|c| c.is_alphanumeric()).collect())
            }

            Operation::DigitsOnly => {
                map_string(value, |s| s.chars().filter(|c| c.is_ascii_digit()).collect())
            }
        }
    }
}

/// Parse a number out of a possibly formatted string ("$1,234.50" -> 1234.5).
fn parse_loose_number(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    let negative = trimmed.starts_with('-') || (trimmed.starts_with('(') && trimmed.ends_with(')'));
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    if cleaned.contains('.') {
        let n: f64 = cleaned.parse().ok()?;
        let n = if negative { -n } else { n };
        serde_json::Number::from_f64(n).map(Value::Number)
    } else {
        let n: i64 = cleaned.parse().ok()?;
        let n = if negative { -n } else { n };
        Some(Value::Number(n.into()))
    }
}

/// Reference table of all cell operations, for prompts and the CLI.
pub fn operations_description() -> String {
    r#"Available cell operations:

| Operation | Description | Parameters |
|-----------|-------------|------------|
| trim | Remove leading/trailing whitespace | - |
| uppercase | Convert to uppercase | - |
| lowercase | Convert to lowercase | - |
| replace | Regex pattern replacement | pattern: regex, value: replacement |
| pad_start | Pad string at start | length, char (default "0") |
| pad_end | Pad string at end | length, char (default "0") |
| extract_year | Extract 4-digit year from a date | - |
| ensure_prefix | Add prefix if not present | value: prefix string |
| ensure_suffix | Add suffix if not present | value: suffix string |
| map | Map values using lookup table | mapping: {source: target}, case_insensitive, default_unmapped |
| split | Split into array | separator (default ",") |
| to_boolean | Convert to boolean | true_values: list of truthy strings |
| to_number | Parse number from formatted text | - |
| substring | Extract substring | start, length (optional) |
| alphanumeric | Keep only alphanumeric chars | - |
| digits_only | Keep only digits | - |

Example operation chain in JSON:
[
  {"type": "trim"},
  {"type": "replace", "pattern": "[$,]", "value": ""},
  {"type": "to_number"}
]"#
    .to_string()
}
