use std::fs;
use std::path::Path;

use handlebars::Handlebars;
use tracing::warn;

use super::error::ReportError;

pub(super) const MARKDOWN_TEMPLATE_NAME: &str = "markdown_report";

/// Name an external template must have to replace the built-in one
pub(super) const OVERRIDE_TEMPLATE_NAME: &str = "report";

pub(super) fn register_fallback_template(handlebars: &mut Handlebars<'static>) {
    if let Err(err) = handlebars.register_template_string(
        MARKDOWN_TEMPLATE_NAME,
        include_str!("./default_markdown.hbs"),
    ) {
        warn!("Failed to register fallback Markdown template: {}", err);
    }
}

pub(super) fn load_templates_from_dir(
    handlebars: &mut Handlebars<'static>,
    templates_dir: &Path,
) -> Result<(), ReportError> {
    for entry in fs::read_dir(templates_dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.extension().and_then(|s| s.to_str()) == Some("hbs") {
            let template_name = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "Invalid template filename")
            })?;

            let template_content = fs::read_to_string(&path)?;
            handlebars.register_template_string(template_name, template_content)?;
        }
    }

    let partials_dir = templates_dir.join("partials");
    if partials_dir.is_dir() {
        register_partials(handlebars, &partials_dir)?;
    }

    Ok(())
}

fn register_partials(
    handlebars: &mut Handlebars<'static>,
    partials_dir: &Path,
) -> Result<(), ReportError> {
    for entry in fs::read_dir(partials_dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.extension().and_then(|s| s.to_str()) == Some("hbs") {
            let partial_name = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "Invalid partial filename")
            })?;

            let partial_content = fs::read_to_string(&path)?;
            handlebars.register_partial(partial_name, partial_content)?;
        }
    }

    Ok(())
}
