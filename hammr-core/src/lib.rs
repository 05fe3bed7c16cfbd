//! Core engine for hammr: HTTP transport, weighted scenario dispatch,
//! concurrent metric recording, aggregation, and threshold assessment.

mod http;

pub mod runner;

pub use http::{
    Error, HttpClient, HttpRequest, HttpResponse, HttpTransportErrorKind, Result,
    estimate_http1_request_bytes, estimate_http1_response_bytes,
};
