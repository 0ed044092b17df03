//! Line-delimited JSON command protocol shared by device servers and clients.
//!
//! Every request is a single line `{"function": "<name>", "params": {...}}`
//! and every response is a single line holding either the operation's JSON
//! return value or `{"error": "<message>"}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const FUNCTION_NOT_FOUND: &str = "Function not found";
pub const INVALID_JSON: &str = "Invalid JSON received";

/// A single device call as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub function: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Command {
    pub fn new(function: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            function: function.into(),
            params,
        }
    }

    /// Build a command from any JSON value; non-object params are rejected.
    pub fn from_value(function: impl Into<String>, params: Value) -> Result<Self, ProtocolError> {
        match params {
            Value::Object(map) => Ok(Self::new(function, map)),
            Value::Null => Ok(Self::new(function, Map::new())),
            other => Err(ProtocolError::ParamsNotAnObject(json_kind(&other))),
        }
    }
}

/// Outcome of decoding one response line.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success(Value),
    Error(String),
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(message.into())
    }

    pub fn into_value(self) -> Value {
        match self {
            Response::Success(value) => value,
            Response::Error(message) => serde_json::json!({ "error": message }),
        }
    }

    /// Classify a decoded value: an object carrying an `error` key is a remote failure.
    pub fn from_value(value: Value) -> Self {
        if let Value::Object(map) = &value {
            if let Some(error) = map.get("error") {
                let message = match error {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                return Response::Error(message);
            }
        }
        Response::Success(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid JSON received")]
    InvalidJson,
    #[error("Malformed command: {0}")]
    MalformedCommand(String),
    #[error("params must be a JSON object, got {0}")]
    ParamsNotAnObject(&'static str),
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Encode a command as one newline-terminated line.
pub fn encode_command(command: &Command) -> Result<String, ProtocolError> {
    let mut line =
        serde_json::to_string(command).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// A request whose function name has been read but whose params have not
/// been checked yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub function: String,
    pub params: Value,
}

impl Request {
    pub fn into_command(self) -> Result<Command, ProtocolError> {
        Command::from_value(self.function, self.params)
            .map_err(|e| ProtocolError::MalformedCommand(e.to_string()))
    }
}

/// Decode one request line up to the function name.
///
/// Blank and non-UTF-8 lines count as invalid JSON. `params` is left as-is,
/// so a server can reject an unknown function before looking at it.
pub fn decode_request(line: &[u8]) -> Result<Request, ProtocolError> {
    let text = core::str::from_utf8(line).map_err(|_| ProtocolError::InvalidJson)?;
    let value: Value = serde_json::from_str(text.trim()).map_err(|_| ProtocolError::InvalidJson)?;
    let mut map = match value {
        Value::Object(map) => map,
        other => {
            return Err(ProtocolError::MalformedCommand(format!(
                "expected an object, got {}",
                json_kind(&other)
            )))
        }
    };
    let function = match map.remove("function") {
        Some(Value::String(function)) => function,
        Some(other) => {
            return Err(ProtocolError::MalformedCommand(format!(
                "function must be a string, got {}",
                json_kind(&other)
            )))
        }
        None => return Err(ProtocolError::MalformedCommand("missing field `function`".to_string())),
    };
    let params = map.remove("params").unwrap_or(Value::Null);
    Ok(Request { function, params })
}

/// Decode one full request line, params included.
pub fn decode_command(line: &[u8]) -> Result<Command, ProtocolError> {
    decode_request(line)?.into_command()
}

/// Encode a response as one newline-terminated line.
pub fn encode_response(response: &Response) -> Result<String, ProtocolError> {
    let value = match response {
        Response::Success(value) => serde_json::to_string(value),
        Response::Error(message) => serde_json::to_string(&serde_json::json!({ "error": message })),
    };
    let mut line = value.map_err(|e| ProtocolError::Serialization(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Decode one response line.
pub fn decode_response(line: &str) -> Result<Response, ProtocolError> {
    let value: Value = serde_json::from_str(line.trim()).map_err(|_| ProtocolError::InvalidJson)?;
    Ok(Response::from_value(value))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
