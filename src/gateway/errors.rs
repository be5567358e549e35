//! Translation of RPC failures into HTTP responses.
//!
//! | gRPC code | HTTP | Body |
//! |---|---|---|
//! | Internal | 500 | fixed text; the real message is only logged |
//! | InvalidArgument | 400 | `errors` map of field path to messages |
//! | anything else | per [`http_status`] | `{"code","message","details":[]}` |

use std::collections::BTreeMap;

use http::{header, StatusCode};
use serde_json::json;
use tonic::{Code, Status};
use tracing::error;

use crate::core::{Error, Response};
use crate::validation::violations_from_status;

/// Body sent for Internal errors.
pub const INTERNAL_ERROR_BODY: &str = r#"{"code": 500, "message": "Internal Server Error"}"#;

/// Field key used when a violation carries no field path.
pub const UNKNOWN_FIELD: &str = "unknown";

const JSON_UTF8: &str = "application/json; charset=utf-8";

/// HTTP status for a gRPC code.
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        // Client Closed Request
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::FailedPrecondition => StatusCode::BAD_REQUEST,
        Code::Aborted => StatusCode::CONFLICT,
        Code::OutOfRange => StatusCode::BAD_REQUEST,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// HTTP response for a failed RPC.
pub fn status_response(status: &Status) -> Response {
    match status.code() {
        Code::Internal => internal_error(status.message()),
        Code::InvalidArgument => bad_request(status),
        code => generic(http_status(code), code, status.message()),
    }
}

/// HTTP response for any gateway translation error.
pub fn error_response(err: &Error) -> Response {
    match err {
        Error::Status(status) => status_response(status),
        Error::BodyTooLarge { .. } => generic(
            StatusCode::PAYLOAD_TOO_LARGE,
            Code::InvalidArgument,
            &err.to_string(),
        ),
        Error::Body(_) | Error::BadJson(_) => {
            generic(StatusCode::BAD_REQUEST, Code::InvalidArgument, &err.to_string())
        }
        Error::Encode(_) => internal_error(&err.to_string()),
    }
}

/// Field errors grouped by dotted path, in path order.
pub fn field_errors(status: &Status) -> BTreeMap<String, Vec<String>> {
    let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for violation in violations_from_status(status) {
        let mut field = violation.field_path();
        if field.is_empty() {
            field = UNKNOWN_FIELD.to_string();
        }
        errors
            .entry(field)
            .or_default()
            .push(violation.message().to_string());
    }
    errors
}

fn internal_error(message: &str) -> Response {
    error!(message = %message, "internal error");
    Response::empty(StatusCode::INTERNAL_SERVER_ERROR)
        .with_header(header::CONTENT_TYPE, JSON_UTF8)
        .with_body(INTERNAL_ERROR_BODY)
}

fn bad_request(status: &Status) -> Response {
    let mut errors = field_errors(status);
    // Plain InvalidArgument without structured details
    if errors.is_empty() && !status.message().is_empty() {
        errors.insert(UNKNOWN_FIELD.to_string(), vec![status.message().to_string()]);
    }

    Response::json(
        StatusCode::BAD_REQUEST,
        &json!({
            "code": 400,
            "message": "Bad Request",
            "errors": errors,
        }),
    )
    .with_header(header::CONTENT_TYPE, JSON_UTF8)
}

fn generic(http: StatusCode, code: Code, message: &str) -> Response {
    Response::json(
        http,
        &json!({
            "code": code as i32,
            "message": message,
            "details": [],
        }),
    )
}
