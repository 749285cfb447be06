/*!
 * Monitoring
 * Structured logging bootstrap
 */

mod tracer;

pub use tracer::{init_tracing, TRACE_JSON_ENV};
