use std::path::Path;

use handlebars::{Handlebars, Helper, HelperResult, RenderContext, RenderError};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Serialize a value to JSON for template consumption. Returns `Value::Null` on error.
pub fn safe_json_value<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        warn!("Failed to serialize value to JSON: {}", e);
        Value::Null
    })
}

/// Coverage percentage of `module` read from a pytest-cov terminal table.
///
/// Only tables with a `TOTAL` row are considered. The row whose first column
/// names `<module>.py` supplies its fourth column (`Cover`); when several rows
/// match, the last one wins. Anything else yields `N/A`.
pub fn coverage_percent(coverage: &str, module: &str) -> String {
    if !coverage.contains("TOTAL") {
        return "N/A".to_string();
    }

    let file_name = format!("{module}.py");
    coverage
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let names_module = parts
                .first()
                .and_then(|first| Path::new(first).file_name())
                .is_some_and(|name| name == file_name.as_str());
            (names_module && parts.len() >= 4).then(|| parts[3].to_string())
        })
        .last()
        .unwrap_or_else(|| "N/A".to_string())
}

/// Render a serialized stage outcome.
///
/// Completed output is returned as-is (or fenced as a code block), failures
/// become a warning quote naming the stage.
pub(super) fn render_stage(value: &Value, label: &str, fenced: bool) -> String {
    let status = value.get("status").and_then(Value::as_str).unwrap_or("skipped");
    let text = value.get("text").and_then(Value::as_str).unwrap_or_default();

    match status {
        "completed" if fenced => format!("```\n{text}\n```"),
        "completed" => text.to_string(),
        "failed" => format!("> ⚠️ {label} failed: {text}"),
        _ => format!("_{label} was not run._"),
    }
}

/// Register all Handlebars helpers used by the Markdown report.
pub fn register_helpers(handlebars: &mut Handlebars<'static>) {
    register_length_helper(handlebars);
    register_stage_helper(handlebars, "stage_block", true);
    register_stage_helper(handlebars, "stage_text", false);
}

/// Register the array length helper
fn register_length_helper(handlebars: &mut Handlebars<'static>) {
    handlebars.register_helper(
        "length",
        Box::new(
            |h: &Helper,
             _: &Handlebars,
             _: &handlebars::Context,
             _: &mut RenderContext,
             out: &mut dyn handlebars::Output|
             -> HelperResult {
                let array = h
                    .param(0)
                    .and_then(|v| v.value().as_array())
                    .ok_or_else(|| RenderError::new("length helper requires an array"))?;
                out.write(&array.len().to_string())?;
                Ok(())
            },
        ),
    );
}

/// Register a helper rendering a stage outcome with a label: `{{name outcome "Label"}}`
fn register_stage_helper(handlebars: &mut Handlebars<'static>, name: &'static str, fenced: bool) {
    handlebars.register_helper(
        name,
        Box::new(
            move |h: &Helper,
                  _: &Handlebars,
                  _: &handlebars::Context,
                  _: &mut RenderContext,
                  out: &mut dyn handlebars::Output|
                  -> HelperResult {
                let value = h.param(0).map(|v| v.value()).ok_or_else(|| {
                    RenderError::new(format!("{name} helper requires a stage outcome"))
                })?;
                let label = h.param(1).and_then(|v| v.value().as_str()).unwrap_or("Stage");
                out.write(&render_stage(value, label, fenced))?;
                Ok(())
            },
        ),
    );
}
