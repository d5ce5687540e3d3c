//! Request ID generation for tracing and log correlation.
//!
//! # Design Decisions
//! - UUID v4 in `x-request-id`, set as early as possible in the stack
//! - An id supplied by the client is kept (SetRequestIdLayer only fills
//!   the header when absent), so correlation survives chained proxies

use axum::http::Request;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Generates a fresh UUID v4 for requests arriving without an id.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        id.parse().ok().map(RequestId::new)
    }
}
