//! Response construction: results serialization and error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use switchboard::InvokeError;

/// Turns command result values into an HTTP response.
///
/// The default writer is [`JsonResultsWriter`]; supply your own to a
/// [`CommandRoute`](crate::CommandRoute) to change the wire format.
pub trait ResultsWriter: Send + Sync {
    fn write_results(&self, results: &[Value]) -> Response;
}

/// JSON responses: `204 No Content` for no values, the lone value for one,
/// an array for several.
pub struct JsonResultsWriter;

impl ResultsWriter for JsonResultsWriter {
    fn write_results(&self, results: &[Value]) -> Response {
        match results {
            [] => StatusCode::NO_CONTENT.into_response(),
            [value] => Json(value.clone()).into_response(),
            many => Json(Value::Array(many.to_vec())).into_response(),
        }
    }
}

/// Maps an invocation failure to an HTTP response.
pub trait ErrorResponder: Send + Sync {
    fn respond(&self, err: &InvokeError) -> Response;
}

/// Conversion failures are the client's fault (`400`); anything the handler
/// did wrong, including panics, is ours (`500`). The error text goes in the
/// body as plain text.
pub struct StatusErrorResponder;

impl ErrorResponder for StatusErrorResponder {
    fn respond(&self, err: &InvokeError) -> Response {
        let status = match err {
            InvokeError::Convert(_) => StatusCode::BAD_REQUEST,
            InvokeError::Handler(_) | InvokeError::Panicked(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, err.to_string()).into_response()
    }
}
