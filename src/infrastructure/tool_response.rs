// Tool response helpers - every tool answers with `{ "success": bool, ... }`
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Map, Value};

pub type ToolResponse = Json<Value>;

/// Serialize `data` and merge it with the `success` flag.
/// Non-object payloads are nested under `data`.
pub fn tool_result<T: Serialize>(success: bool, data: &T) -> ToolResponse {
    let mut body = match serde_json::to_value(data) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
        Err(e) => {
            tracing::error!("Tool response serialization failed: {}", e);
            return tool_error("The result could not be serialized.");
        }
    };
    body.insert("success".to_string(), Value::Bool(success));
    Json(Value::Object(body))
}

pub fn tool_ok<T: Serialize>(data: &T) -> ToolResponse {
    tool_result(true, data)
}

pub fn tool_error(message: impl Into<String>) -> ToolResponse {
    Json(json!({ "success": false, "error": message.into() }))
}

/// Turn a JSON extraction failure into a tool error instead of an HTTP rejection.
pub fn read_params<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ToolResponse> {
    match payload {
        Ok(Json(params)) => Ok(params),
        Err(rejection) => Err(tool_error(format!("Invalid parameters: {}", rejection.body_text()))),
    }
}
