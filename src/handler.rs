//! Transport-agnostic request handling
//!
//! `handle` implements the manifest endpoint contract in terms of a method
//! string and an optional identifier, so any HTTP binding can forward to it.

use serde_json::json;

use crate::error::ManifestError;
use crate::executor::QueryExecutor;
use crate::pipeline::{to_json_string, ManifestService};

const JSON: &str = "application/json";

/// Status, headers and body of a response
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HandlerResponse {
    fn new(status: u16, content_type: &str, body: String) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body,
        }
    }

    /// First header with the given (case-insensitive) name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Error response with a JSON body
pub fn error_response(error: &ManifestError) -> HandlerResponse {
    let status = error.status_code();
    let body = json!({
        "error": {
            "kind": error.kind(),
            "message": error.to_string(),
            "status": status,
        }
    });
    HandlerResponse::new(status, JSON, body.to_string())
}

/// Answer a manifest request
pub fn handle<E: QueryExecutor>(
    service: &ManifestService<E>,
    method: &str,
    identifier: Option<&str>,
) -> HandlerResponse {
    if method != "GET" {
        let mut response =
            HandlerResponse::new(405, "text/plain", format!("Method {} Not Allowed", method));
        response.headers.push(("allow".to_string(), "GET".to_string()));
        return response;
    }

    let Some(identifier) = identifier else {
        return error_response(&ManifestError::InvalidIdentifier {
            identifier: String::new(),
            reason: "no identifier in request".to_string(),
        });
    };

    let result = service
        .get_manifest(identifier)
        .and_then(|outcome| to_json_string(&outcome.manifest, false));
    match result {
        Ok(body) => HandlerResponse::new(200, JSON, body),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use serde_json::Value;

    struct Failing;

    impl QueryExecutor for Failing {
        fn construct(&self, _query: &str) -> Result<Value, ManifestError> {
            Err(ManifestError::Timeout {
                endpoint: "http://localhost/sparql".to_string(),
                timeout_ms: 10,
            })
        }
    }

    struct Empty;

    impl QueryExecutor for Empty {
        fn construct(&self, _query: &str) -> Result<Value, ManifestError> {
            Ok(Value::Array(Vec::new()))
        }
    }

    fn body(response: &HandlerResponse) -> Value {
        serde_json::from_str(&response.body).unwrap()
    }

    #[test]
    fn test_other_methods_not_allowed() {
        let service = ManifestService::new(Empty, &Settings::default());
        for method in ["POST", "PUT", "DELETE", "PATCH"] {
            let response = handle(&service, method, Some("ubb-ms-0003"));
            assert_eq!(response.status, 405);
            assert_eq!(response.header("Allow"), Some("GET"));
            assert_eq!(response.body, format!("Method {} Not Allowed", method));
        }
    }

    #[test]
    fn test_missing_identifier_is_bad_request() {
        let service = ManifestService::new(Empty, &Settings::default());
        let response = handle(&service, "GET", None);
        assert_eq!(response.status, 400);
        assert_eq!(body(&response)["error"]["kind"], "invalid_identifier");
    }

    #[test]
    fn test_unknown_object_is_not_found() {
        let service = ManifestService::new(Empty, &Settings::default());
        let response = handle(&service, "GET", Some("no-such-object"));
        assert_eq!(response.status, 404);
        assert_eq!(response.header("content-type"), Some(JSON));

        let body = body(&response);
        assert_eq!(body["error"]["kind"], "shape_mismatch");
        assert_eq!(body["error"]["status"], 404);
        assert!(body.get("items").is_none());
    }

    #[test]
    fn test_timeout_is_gateway_timeout() {
        let service = ManifestService::new(Failing, &Settings::default());
        let response = handle(&service, "GET", Some("ubb-ms-0003"));
        assert_eq!(response.status, 504);
        assert_eq!(body(&response)["error"]["kind"], "timeout");
    }
}
