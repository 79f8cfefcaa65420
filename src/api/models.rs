use serde::{Serialize, Deserialize};
use serde_json::Value;

/// Response wrapper used by the Flux API: `{"status": "success", "data": [...]}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// Shape of a feed payload once decoded
#[derive(Debug, PartialEq)]
pub enum FeedPayload {
    Records(Vec<Value>),
    ApiError(String),
    Unexpected(&'static str),
}

impl FeedPayload {
    /// Unwraps the envelope if there is one; a bare array is taken as-is
    pub fn from_json(payload: Value) -> Self {
        match payload {
            Value::Array(records) => Self::Records(records),
            Value::Object(_) => match serde_json::from_value::<ApiEnvelope>(payload) {
                Ok(ApiEnvelope { status: Some(status), data }) if status == "error" => {
                    let message = match &data {
                        Value::Object(obj) => obj
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown error")
                            .to_string(),
                        Value::String(s) => s.clone(),
                        _ => "unknown error".to_string(),
                    };
                    Self::ApiError(message)
                }
                Ok(ApiEnvelope { data: Value::Array(records), .. }) => Self::Records(records),
                Ok(_) => Self::Unexpected("envelope without a data array"),
                Err(_) => Self::Unexpected("malformed envelope"),
            },
            Value::Null => Self::Unexpected("empty body"),
            _ => Self::Unexpected("scalar body"),
        }
    }
}
