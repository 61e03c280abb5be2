//! HTTP middleware stack for the relay.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, one hub per request)
//! 2. CORS (permissive; browsers call the relay directly)
//! 3. `TraceLayer` (request span with method, URI, status, latency)
//! 4. Request ID (recorded on the span, echoed in the response)

pub mod request_id;

pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
