//! Intent records exchanged with the model-inference component
//!
//! The model emits a flat JSON object: `category`, `operation`, and one
//! string field per extracted slot. The same shape is used as the training
//! target, so parsing and serialization here define the round-trip contract.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// A (category, operation) pair identifying one configured operation
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationKey {
    pub category: String,
    pub operation: String,
}

impl OperationKey {
    pub fn new(category: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            operation: operation.into(),
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.operation)
    }
}

/// Structured intent extracted from natural language
///
/// Parameters are kept in a `BTreeMap` so serialization is stable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawIntent")]
pub struct Intent {
    pub category: String,
    pub operation: String,
    #[serde(flatten)]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error("invalid intent JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("parameter '{name}' must be a string, number or boolean")]
    InvalidParameter { name: String },
    #[error("no JSON object found in model output")]
    NoJsonObject,
}

#[derive(Deserialize)]
struct RawIntent {
    category: String,
    operation: String,
    #[serde(flatten)]
    rest: BTreeMap<String, JsonValue>,
}

impl TryFrom<RawIntent> for Intent {
    type Error = IntentError;

    fn try_from(raw: RawIntent) -> Result<Self, Self::Error> {
        let mut parameters = BTreeMap::new();
        for (name, value) in raw.rest {
            let value = match value {
                JsonValue::String(s) => s,
                JsonValue::Number(n) => n.to_string(),
                JsonValue::Bool(b) => b.to_string(),
                _ => return Err(IntentError::InvalidParameter { name }),
            };
            parameters.insert(name, value);
        }

        Ok(Self {
            category: raw.category,
            operation: raw.operation,
            parameters,
        })
    }
}

impl Intent {
    pub fn new(category: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            operation: operation.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Builder-style parameter insertion
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn key(&self) -> OperationKey {
        OperationKey::new(self.category.clone(), self.operation.clone())
    }

    /// Parse an intent from the model's JSON output.
    ///
    /// Numbers and booleans are accepted and stringified (`{"level": 50}`),
    /// since small models are not consistent about quoting numeric slots.
    pub fn from_json(text: &str) -> Result<Self, IntentError> {
        let raw: RawIntent = serde_json::from_str(text)?;
        Self::try_from(raw)
    }

    /// Extract the first JSON object from raw generator output.
    ///
    /// The inference tool prints banner lines (`==========`) and token
    /// statistics around the completion; only the object itself matters.
    pub fn from_model_output(output: &str) -> Result<Self, IntentError> {
        let start = output.find('{').ok_or(IntentError::NoJsonObject)?;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (offset, ch) in output[start..].char_indices() {
            if in_string {
                match ch {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match ch {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = start + offset + ch.len_utf8();
                        return Self::from_json(&output[start..end]);
                    }
                }
                _ => {}
            }
        }

        Err(IntentError::NoJsonObject)
    }

    /// Serialize as the compact JSON the model is trained to emit
    pub fn to_json(&self) -> String {
        // Serializing a struct of strings and a string map cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
