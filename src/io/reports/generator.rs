//! Markdown report rendering through Handlebars.

use std::fs;
use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::error::ReportError;
use super::helpers::{coverage_percent, register_helpers, safe_json_value};
use super::templates::{
    load_templates_from_dir, register_fallback_template, MARKDOWN_TEMPLATE_NAME,
    OVERRIDE_TEMPLATE_NAME,
};
use crate::core::config::ReportConfig;
use crate::core::run_report::RunReport;

/// Function row in the "found functions" section
#[derive(Debug, Serialize)]
struct FunctionStatus<'a> {
    name: &'a str,
    tested: bool,
}

/// Template data: the report plus values derived for display
#[derive(Debug, Serialize)]
struct ReportView<'a> {
    #[serde(flatten)]
    report: &'a RunReport,
    coverage_percent: String,
    functions: Vec<FunctionStatus<'a>>,
    validation_status: Option<&'static str>,
}

/// Renders a [`RunReport`] to Markdown and writes it to disk
#[derive(Debug)]
pub struct ReportBuilder {
    handlebars: Handlebars<'static>,
    config: ReportConfig,
    test_prefix: String,
}

impl ReportBuilder {
    /// Create a builder with the built-in template
    pub fn new(config: ReportConfig, test_prefix: impl Into<String>) -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        register_helpers(&mut handlebars);
        register_fallback_template(&mut handlebars);

        Self {
            handlebars,
            config,
            test_prefix: test_prefix.into(),
        }
    }

    /// Load `*.hbs` templates from a directory; a `report.hbs` replaces the built-in one
    pub fn with_templates_dir<P: AsRef<Path>>(mut self, templates_dir: P) -> Result<Self, ReportError> {
        let templates_dir = templates_dir.as_ref().to_path_buf();
        load_templates_from_dir(&mut self.handlebars, &templates_dir)?;
        self.config.templates_dir = Some(templates_dir);
        Ok(self)
    }

    /// Apply the configured templates directory, if any
    pub fn from_config(config: ReportConfig, test_prefix: impl Into<String>) -> Result<Self, ReportError> {
        let templates_dir = config.templates_dir.clone();
        let builder = Self::new(config, test_prefix);
        match templates_dir {
            Some(dir) => builder.with_templates_dir(dir),
            None => Ok(builder),
        }
    }

    fn prepare_template_data(&self, report: &RunReport) -> Value {
        let coverage_text = report.coverage.text().unwrap_or_default();
        let functions = report
            .functions_found
            .iter()
            .map(|name| FunctionStatus {
                name,
                tested: report.is_tested(&self.test_prefix, name),
            })
            .collect();
        let validation_status = report.validation_passed.map(|passed| {
            if passed {
                "✅ all tests passed"
            } else {
                "❌ tests still failing after the maximum number of fix attempts"
            }
        });

        safe_json_value(ReportView {
            report,
            coverage_percent: coverage_percent(coverage_text, &report.target_module),
            functions,
            validation_status,
        })
    }

    /// Render the Markdown document
    pub fn render(&self, report: &RunReport) -> Result<String, ReportError> {
        let template_name = if self.handlebars.get_templates().contains_key(OVERRIDE_TEMPLATE_NAME) {
            OVERRIDE_TEMPLATE_NAME
        } else {
            MARKDOWN_TEMPLATE_NAME
        };

        let data = self.prepare_template_data(report);
        Ok(self.handlebars.render(template_name, &data)?)
    }

    /// File name for a report written now: `<prefix><YYYYmmdd_HHMMSS>.md`
    pub fn report_file_name(&self) -> String {
        format!(
            "{}{}.md",
            self.config.file_prefix,
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        )
    }

    /// Render and write the report under `base_dir`, returning its path
    pub fn write(&self, report: &RunReport, base_dir: &Path) -> Result<PathBuf, ReportError> {
        let content = self.render(report)?;
        let output_dir = base_dir.join(&self.config.output_dir);
        fs::create_dir_all(&output_dir)?;

        let path = output_dir.join(self.report_file_name());
        fs::write(&path, content)?;
        info!("Report saved: {}", path.display());
        Ok(path)
    }
}
