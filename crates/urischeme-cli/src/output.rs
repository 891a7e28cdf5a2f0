//! JSON response shapes printed on stdout.
//!
//! Every command prints one object: `{success: true, ...data}` on success or
//! `{success: false, error, code}` on failure, where `code` is also the
//! process exit code.

use serde_json::{json, Map, Value};
use urischeme::SchemeError;

/// Exit code for failures that are not scheme errors (bad store path, IO, ...).
pub const GENERIC_FAILURE: u8 = 1;

/// Wrap command output as a success response.
pub fn success(data: Value) -> Value {
    let mut response = Map::new();
    response.insert("success".to_string(), Value::Bool(true));
    match data {
        Value::Object(fields) => response.extend(fields),
        Value::Null => {}
        other => {
            response.insert("result".to_string(), other);
        }
    }
    Value::Object(response)
}

/// Build the failure response and exit code for an error.
pub fn failure(err: &anyhow::Error) -> (Value, u8) {
    let code = exit_code(err);
    let response = json!({
        "success": false,
        "error": format!("{:#}", err),
        "code": code,
    });
    (response, code)
}

/// Scheme errors keep their stable numeric code; anything else is a generic failure.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<SchemeError>()
        .and_then(|e| u8::try_from(e.to_error_code()).ok())
        .unwrap_or(GENERIC_FAILURE)
}
