use serde::{Deserialize, Serialize};

use crate::resources::job::Job;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the client.
///
/// Service-reported rejections (`NotFound`, `Duplicate`, `AccessDenied`,
/// `InvalidQuery`, `Service`) are never retried automatically. Transport
/// failures are `Communication` and may be transient; the wait loop is the
/// only place that retries them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot determine {kind} described by '{identifier}'")]
    ReferenceResolution {
        kind: &'static str,
        identifier: String,
    },

    #[error("invalid schema: {0}")]
    Schema(String),

    #[error("expected a {expected} reference, got a {found} reference")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    AccessDenied(String),

    #[error("{0}")]
    InvalidQuery(String),

    /// The server received the request and rejected it for a reason with no
    /// more specific classification.
    #[error("{0}")]
    Service(String),

    /// The server response was missing required fields or otherwise
    /// unparseable. Indicates a service bug, not a user error; never
    /// swallowed.
    #[error("server interface error: {0}")]
    Interface(String),

    #[error("error communicating with the server: {0}")]
    Communication(String),

    #[error("wait timed out after {waited_secs}s; job not finished, in state {state}")]
    Timeout { waited_secs: u64, state: String },
}

impl Error {
    /// Classify a server-reported error payload.
    ///
    /// The reason falls back to `code` and the message to `errorMessage`, or
    /// is synthesized from the reason and arguments; a payload missing both
    /// reason and message is a malformed server response and classifies as
    /// [`Error::Interface`] rather than panicking.
    pub fn from_error_proto(error: &ErrorProto) -> Error {
        let reason = error
            .reason
            .as_deref()
            .filter(|reason| !reason.is_empty())
            .map(str::to_owned)
            .or_else(|| error.code_as_string());
        let message = error
            .message
            .as_deref()
            .filter(|message| !message.is_empty())
            .map(str::to_owned)
            .or_else(|| {
                error
                    .error_message
                    .as_deref()
                    .filter(|message| !message.is_empty())
                    .map(str::to_owned)
            })
            .or_else(|| {
                reason
                    .as_deref()
                    .map(|reason| format!("{}: {}", reason, error.arguments.join(" ")))
            });

        let (reason, message) = match (reason, message) {
            (Some(reason), Some(message)) => (reason, message),
            _ => {
                return Error::Interface(format!(
                    "error reported by server with missing error fields, server returned: {:?}",
                    error
                ))
            }
        };

        match reason.as_str() {
            "notFound" => Error::NotFound(message),
            "duplicate" => Error::Duplicate(message),
            "accessDenied" => Error::AccessDenied(message),
            "invalidQuery" => Error::InvalidQuery(message),
            // The less interesting reasons all map to the generic variant.
            _ => Error::Service(message),
        }
    }

    /// Classify a whole error response body, `{"error": {"errors": [...]}}`.
    pub fn from_error_response(body: &serde_json::Value) -> Error {
        let first = body
            .get("error")
            .and_then(|error| error.get("errors"))
            .and_then(|errors| errors.get(0));
        match first.map(|error| serde_json::from_value::<ErrorProto>(error.clone())) {
            Some(Ok(proto)) => Error::from_error_proto(&proto),
            _ => Error::Interface(format!(
                "error reported by server with missing error fields, server returned: {}",
                body
            )),
        }
    }
}

/// An error object as the server reports it, both inside job status and in
/// error response bodies. Every field is optional; classification decides
/// what to make of whatever subset is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorProto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<String>,
}

impl ErrorProto {
    fn code_as_string(&self) -> Option<String> {
        match self.code.as_ref()? {
            serde_json::Value::String(code) if !code.is_empty() => Some(code.clone()),
            serde_json::Value::Number(code) => Some(code.to_string()),
            _ => None,
        }
    }
}

/// Fail with the classified error if the job finished with an error result,
/// otherwise hand the job back. Waiting and classification are deliberately
/// separate; reaching DONE says nothing about the job's own outcome.
pub fn check_job_result(job: Job) -> Result<Job> {
    match job.status.as_ref().and_then(|status| status.error_result.as_ref()) {
        Some(error) => Err(Error::from_error_proto(error)),
        None => Ok(job),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn proto(value: serde_json::Value) -> ErrorProto {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_classify_by_reason() {
        let cases = [
            ("notFound", "NotFound"),
            ("duplicate", "Duplicate"),
            ("accessDenied", "AccessDenied"),
            ("invalidQuery", "InvalidQuery"),
            ("rateLimitExceeded", "Service"),
            ("backendError", "Service"),
        ];
        for (reason, expected) in cases {
            let error =
                Error::from_error_proto(&proto(json!({"reason": reason, "message": "x"})));
            let variant = match error {
                Error::NotFound(_) => "NotFound",
                Error::Duplicate(_) => "Duplicate",
                Error::AccessDenied(_) => "AccessDenied",
                Error::InvalidQuery(_) => "InvalidQuery",
                Error::Service(_) => "Service",
                other => panic!("unexpected classification: {other:?}"),
            };
            assert_eq!(variant, expected, "reason {reason}");
        }
    }

    #[test]
    fn test_classification_is_case_sensitive() {
        let error = Error::from_error_proto(&proto(json!({"reason": "NotFound", "message": "x"})));
        assert!(matches!(error, Error::Service(_)));
    }

    #[test]
    fn test_reason_falls_back_to_code() {
        let error = Error::from_error_proto(&proto(json!({"code": "notFound", "message": "x"})));
        assert!(matches!(error, Error::NotFound(message) if message == "x"));
    }

    #[test]
    fn test_message_fallbacks() {
        let error = Error::from_error_proto(&proto(
            json!({"reason": "notFound", "errorMessage": "gone"}),
        ));
        assert!(matches!(error, Error::NotFound(message) if message == "gone"));

        let error = Error::from_error_proto(&proto(
            json!({"reason": "notFound", "arguments": ["a", "b"]}),
        ));
        assert!(matches!(error, Error::NotFound(message) if message == "notFound: a b"));
    }

    #[test]
    fn test_missing_fields_is_interface_error() {
        let error = Error::from_error_proto(&proto(json!({})));
        assert!(matches!(error, Error::Interface(_)));

        // A message alone is not enough either; the reason is required.
        let error = Error::from_error_proto(&proto(json!({"message": "x"})));
        assert!(matches!(error, Error::Interface(_)));
    }

    #[test]
    fn test_classify_error_response_body() {
        let body = json!({
            "error": {
                "errors": [{"reason": "accessDenied", "message": "no"}],
                "code": 403,
                "message": "no"
            }
        });
        assert!(matches!(Error::from_error_response(&body), Error::AccessDenied(_)));

        let body = json!({"unexpected": true});
        assert!(matches!(Error::from_error_response(&body), Error::Interface(_)));
    }

    #[test]
    fn test_check_job_result() {
        let job: Job = serde_json::from_value(json!({
            "configuration": {"query": {"query": "select 1"}},
            "status": {
                "state": "DONE",
                "errorResult": {"reason": "invalidQuery", "message": "syntax error"}
            }
        }))
        .unwrap();
        assert!(matches!(
            check_job_result(job),
            Err(Error::InvalidQuery(message)) if message == "syntax error"
        ));

        let job: Job = serde_json::from_value(json!({
            "configuration": {"query": {"query": "select 1"}},
            "status": {"state": "DONE"}
        }))
        .unwrap();
        assert!(check_job_result(job).is_ok());
    }
}
