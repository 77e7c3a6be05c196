//! # Bruker Parameter File Parser
//!
//! Bruker acquisition (`acqu`, `acqus`, `acqu2`, ...) and processing
//! (`proc`, `procs`, ...) files are line-oriented JCAMP-DX style key/value
//! text:
//!
//! ```text
//! ##$PULPROG= <zg30>
//! ##$TD= 65536
//! ##$SWH= 10000.000
//! ##$O1P (0..7)= 0 0 0 0
//! 0 0 0 0
//! $$ comment lines start with two dollar signs
//! ##END
//! ```
//!
//! The format is effectively a dynamically typed bag: strings are wrapped in
//! angle brackets, `yes`/`no` encode booleans, and array parameters carry an
//! index range and may span multiple lines. [`ParamMap`] preserves that
//! flexibility (every value is a [`ParamValue`]) while making required fields
//! explicit: the `require_*` accessors fail with
//! [`ParamError::MissingRequiredParameter`] instead of returning ambiguous
//! defaults. Optional lookups return `Option` and never fail.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Serialize;

/// Errors that can occur while reading a Bruker parameter file
#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    /// I/O error reading the parameter file
    #[error("Failed to read parameter file: {0}")]
    IoError(#[from] std::io::Error),

    /// A parameter required to interpret the experiment is absent
    #[error("Missing required parameter: {0}")]
    MissingRequiredParameter(String),

    /// A parameter exists but does not have the expected type
    #[error("Parameter {name} has unexpected type (expected {expected})")]
    WrongType {
        /// Parameter name as it appears in the file
        name: String,
        /// Human-readable description of the expected type
        expected: &'static str,
    },
}

/// A single parameter value with the vendor's loose typing preserved
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// `yes`/`no` flag
    Bool(bool),
    /// Integer scalar
    Int(i64),
    /// Floating-point scalar
    Float(f64),
    /// Bare or angle-bracket-quoted string
    Str(String),
    /// Array parameter (`##$NAME (0..N)=`), values in file order
    Array(Vec<ParamValue>),
}

impl ParamValue {
    /// Parse a single whitespace-free token into the closest scalar type.
    fn parse_scalar(raw: &str) -> ParamValue {
        let raw = raw.trim();
        if raw.starts_with('<') && raw.ends_with('>') && raw.len() >= 2 {
            return ParamValue::Str(raw[1..raw.len() - 1].to_string());
        }
        match raw.to_ascii_lowercase().as_str() {
            "yes" => return ParamValue::Bool(true),
            "no" => return ParamValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return ParamValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return ParamValue::Float(f);
        }
        ParamValue::Str(raw.to_string())
    }

    /// View the value as a string slice, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// View the value as a float; integer values coerce
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// View the value as an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// View the value as a boolean flag
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// View the value as an array slice
    pub fn as_array(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::Array(v) => Some(v),
            _ => None,
        }
    }
}

/// Parsed contents of one Bruker parameter file
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParamMap {
    params: HashMap<String, ParamValue>,
}

impl ParamMap {
    /// Read and parse a parameter file from disk.
    ///
    /// Bruker files occasionally contain stray non-UTF8 bytes; these are
    /// replaced rather than treated as errors.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ParamError> {
        let bytes = fs::read(path.as_ref())?;
        let content = String::from_utf8_lossy(&bytes);
        Ok(Self::parse(&content))
    }

    /// Parse parameter text. Unrecognized lines are ignored; this parser
    /// never fails on malformed input, it simply extracts what it can.
    pub fn parse(content: &str) -> Self {
        let lines: Vec<&str> = content.lines().collect();
        let mut params = HashMap::new();

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].trim();
            if !line.starts_with("##$") {
                i += 1;
                continue;
            }
            let Some(eq) = line.find('=') else {
                i += 1;
                continue;
            };
            let name_part = line[3..eq].trim();
            let value_part = line[eq + 1..].trim();

            // Array parameters carry an index range in the name or value,
            // e.g. `##$O1P (0..7)=` or `##$PLW= (0..63)`.
            let is_array = name_part.contains('(') || value_part.starts_with('(');
            if is_array {
                let base_name = name_part
                    .split('(')
                    .next()
                    .unwrap_or(name_part)
                    .trim()
                    .to_string();
                let inline = strip_index_range(value_part);
                let (values, next) = parse_array_values(&lines, i, inline);
                if !base_name.is_empty() {
                    params.insert(base_name, ParamValue::Array(values));
                }
                i = next;
            } else {
                if !name_part.is_empty() {
                    params.insert(name_part.to_string(), ParamValue::parse_scalar(value_part));
                }
                i += 1;
            }
        }

        ParamMap { params }
    }

    /// Look up a raw value
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    /// Look up a string value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::as_str)
    }

    /// Look up a float value (integers coerce)
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(ParamValue::as_f64)
    }

    /// Look up an integer value
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ParamValue::as_i64)
    }

    /// Look up a string value, failing if the key is absent
    pub fn require_str(&self, key: &str) -> Result<&str, ParamError> {
        match self.get(key) {
            Some(v) => v.as_str().ok_or_else(|| ParamError::WrongType {
                name: key.to_string(),
                expected: "string",
            }),
            None => Err(ParamError::MissingRequiredParameter(key.to_string())),
        }
    }

    /// Whether the map contains a key
    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Number of parsed parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether no parameters were parsed
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Drop a leading `(0..N)` index-range group from an array value line,
/// returning any values that follow it on the same line.
fn strip_index_range(value: &str) -> &str {
    let value = value.trim();
    if value.starts_with('(') {
        match value.find(')') {
            Some(close) => value[close + 1..].trim(),
            None => "",
        }
    } else {
        value
    }
}

/// Collect array values from the definition line and any continuation lines.
/// Continuation stops at the next parameter, a comment, or a blank line.
fn parse_array_values(
    lines: &[&str],
    start_index: usize,
    inline: &str,
) -> (Vec<ParamValue>, usize) {
    let mut values: Vec<ParamValue> = inline
        .split_whitespace()
        .map(ParamValue::parse_scalar)
        .collect();

    let mut i = start_index + 1;
    while i < lines.len() {
        let line = lines[i].trim();
        if line.starts_with("##") || line.starts_with("$$") || line.is_empty() {
            break;
        }
        values.extend(line.split_whitespace().map(ParamValue::parse_scalar));
        i += 1;
    }
    (values, i)
}
