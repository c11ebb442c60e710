//! Markdown run reports rendered through Handlebars.

mod error;
mod generator;
mod helpers;
mod templates;

pub use error::ReportError;
pub use generator::ReportBuilder;
pub use helpers::coverage_percent;
