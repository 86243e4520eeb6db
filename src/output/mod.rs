//! Output formatting
//!
//! Final presentation of the aggregate report.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter};
