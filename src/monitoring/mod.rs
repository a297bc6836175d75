/*!
 * Monitoring
 * Structured tracing setup and serialized result reports
 */

mod report;
mod tracer;

pub use report::{ReportFormat, ResultReporter};
pub use tracer::{generate_trace_id, init_tracing, job_span};
