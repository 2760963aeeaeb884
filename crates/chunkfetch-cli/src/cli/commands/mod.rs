//! CLI command handlers, one per file.

mod get;
mod plan;
mod probe;
mod progress;

pub use get::run_get;
#[cfg(test)]
pub(crate) use get::default_output;
#[cfg(test)]
pub(crate) use plan::format_plan;
pub use plan::run_plan;
pub use probe::run_probe;
