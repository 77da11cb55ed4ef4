use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One decision point of a turn. Entries are appended in the order decisions were made.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceEntry {
    pub step: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TraceEntry {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            fields: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}
