use actix_web::{HttpRequest, HttpResponse, error::InternalError};
use serde::Serialize;

/// JSON error body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub fields: serde_json::Value,
}

impl ErrorResponse {
    /// Error with a single free-form message
    pub fn message(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            fields: serde_json::json!({"message": message.into()}),
        }
    }
}

/// JsonConfig with the project-wide 400 response for bad request bodies
pub fn json_config(limit: usize) -> actix_web_validator::JsonConfig {
    actix_web_validator::JsonConfig::default()
        .limit(limit)
        .error_handler(json_error_handler)
}

fn json_error_handler(err: actix_web_validator::Error, _req: &HttpRequest) -> actix_web::Error {
    let body = match err {
        actix_web_validator::Error::Validate(validation_errors) => {
            let mut fields = serde_json::Map::new();
            for (field, errors) in validation_errors.field_errors() {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Invalid value for {}", field))
                    })
                    .collect();
                fields.insert(field.to_string(), serde_json::json!({"errors": messages}));
            }
            ErrorResponse {
                error: "Validation failed".to_string(),
                fields: serde_json::Value::Object(fields),
            }
        }
        actix_web_validator::Error::Deserialize(de_err) => {
            let detail = de_err.to_string();
            let message = if detail.contains("EOF while parsing") {
                "Request body is empty. Expected JSON payload".to_string()
            } else {
                format!("Invalid JSON: {}", detail)
            };
            ErrorResponse::message("Request validation failed", message)
        }
        other => ErrorResponse::message("Request validation failed", other.to_string()),
    };

    InternalError::from_response("", HttpResponse::BadRequest().json(body)).into()
}
