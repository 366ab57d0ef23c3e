use serde_json::Value;
use thiserror::Error;

use crate::tree::Scalar;

#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    Scalar(Scalar),
    Mapping(Vec<(String, PayloadValue)>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub entries: Vec<(String, PayloadValue)>,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload must be a json object, got {0}")]
    NotAnObject(&'static str),
}

impl Payload {
    pub fn parse(body: &str) -> Result<Self, PayloadError> {
        match serde_json::from_str::<Value>(body)? {
            Value::Object(map) => Ok(Self {
                entries: map.into_iter().map(|(k, v)| (k, PayloadValue::from(v))).collect(),
            }),
            other => Err(PayloadError::NotAnObject(json_kind(&other))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Value> for PayloadValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => PayloadValue::Scalar(Scalar::Null),
            Value::Bool(b) => PayloadValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => PayloadValue::Scalar(match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => Scalar::Float(n.as_f64().unwrap_or_default()),
            }),
            Value::String(s) => PayloadValue::Scalar(Scalar::Text(s)),
            Value::Array(items) => PayloadValue::Mapping(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(idx, v)| (idx.to_string(), PayloadValue::from(v)))
                    .collect(),
            ),
            Value::Object(map) => PayloadValue::Mapping(
                map.into_iter().map(|(k, v)| (k, PayloadValue::from(v))).collect(),
            ),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
