//! Turning a raw response into a result.
//!
//! Only status 200 with a non-empty JSON object body counts as success.
//! Other 2xx codes and redirects are errors like any other status.

use serde_json::Value;

use crate::error::ApiError;
use crate::http::{HttpResponse, ResponseRecord};

pub fn interpret(response: HttpResponse) -> Result<ResponseRecord, ApiError> {
    let HttpResponse {
        status,
        headers,
        body,
    } = response;

    if status != 200 {
        return Err(ApiError::Status { status, body });
    }

    let decoded = match serde_json::from_str::<Value>(&body) {
        Ok(Value::Object(map)) => map,
        _ => return Err(ApiError::Undecodable { body }),
    };
    if decoded.is_empty() {
        return Err(ApiError::EmptyBody { body });
    }

    Ok(ResponseRecord {
        status,
        headers: headers
            .into_iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect(),
        body: decoded,
    })
}
