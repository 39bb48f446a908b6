//! CLI library components for formcheck.

pub mod logging;
pub mod report;
pub mod scenario;
