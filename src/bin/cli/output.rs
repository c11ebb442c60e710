//! Output Formatting and Display Functions
//!
//! Console rendering for run and scan results, plus the progress bar fed by
//! the agent's progress callback.

use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use testgap_rs::api::engine::{AgentRunSummary, ScanSummary};
use testgap_rs::core::validation::ValidationState;
use testgap_rs::{ProgressCallback, StageOutcome, TestgapConfig, VERSION};

/// Print the CLI header
pub fn print_header() {
    println!(
        "{} {}",
        "🤖".bright_cyan(),
        format!("testgap v{} - Test Gap Agent", VERSION).bright_cyan().bold()
    );
    println!();
}

/// Print the settings a run will use
pub fn display_config_summary(config: &TestgapConfig) {
    println!("{}", "⚙️  Configuration".bright_blue().bold());
    println!("   Project:       {}", config.project.root.display().to_string().cyan());
    println!("   Module:        {}", config.project.target_module.cyan());
    println!(
        "   Test file:     {}",
        config.project.test_file_path().display().to_string().cyan()
    );
    println!(
        "   Model:         {} @ {}",
        config.model.name.cyan(),
        config.model.endpoint.dimmed()
    );
    println!(
        "   Fix attempts:  {} ({})",
        config.validation.max_attempts,
        if config.validation.apply_fixes {
            "applied"
        } else {
            "recorded only"
        }
    );
    println!();
}

/// Progress bar plus the callback that drives it
pub fn progress_bar() -> anyhow::Result<(ProgressBar, ProgressCallback)> {
    let pb = ProgressBar::new(100);
    pb.set_style(ProgressStyle::with_template(
        "{spinner:.blue} {msg:<32} [{bar:40.bright_blue/blue}] {pos:>3}% {elapsed_precise}",
    )?);
    pb.enable_steady_tick(Duration::from_millis(100));

    let callback: ProgressCallback = Box::new({
        let pb = pb.clone();
        move |stage: &str, progress: f64| {
            pb.set_message(stage.to_string());
            pb.set_position(progress.clamp(0.0, 100.0) as u64);
        }
    });

    Ok((pb, callback))
}

fn stage_line(label: &str, outcome: &StageOutcome) {
    match outcome {
        StageOutcome::Completed(_) => println!("   {} {}", "✅".green(), label),
        StageOutcome::Failed(reason) => {
            println!("   {} {}: {}", "⚠️ ".yellow(), label, reason.yellow())
        }
        StageOutcome::Skipped => println!("   {} {}", "➖".dimmed(), label.dimmed()),
    }
}

/// Print the outcome of a full run
pub fn display_run_summary(summary: &AgentRunSummary) {
    let report = &summary.report;

    println!();
    println!("{}", "📊 Run Summary".bright_blue().bold());
    println!("   Files analyzed:    {}", report.files_analyzed.len());
    println!("   Functions found:   {}", report.functions_found.len());
    println!("   Tests found:       {}", report.tests_found.len());
    println!("   Missing tests:     {}", report.missing_tests.len());
    println!(
        "   Generated tests:   {}",
        report.generated_tests.len().to_string().green()
    );
    if !report.synthesis_failures.is_empty() {
        println!(
            "   Failed generations: {}",
            report.synthesis_failures.len().to_string().red()
        );
        for failure in &report.synthesis_failures {
            println!("     • {}(): {}", failure.function, failure.reason.dimmed());
        }
    }

    if let Some(merge) = &summary.merge {
        println!(
            "   Test file:         {} (+{} tests, {} imports added)",
            merge.path.display().to_string().cyan(),
            merge.tests_written,
            merge.imports_added.len()
        );
    }

    println!();
    println!("{}", "🔎 Stages".bright_blue().bold());
    stage_line("Test run", &report.test_results);
    stage_line("Coverage run", &report.coverage);
    stage_line("Analysis", &report.analysis);
    stage_line("Recommendations", &report.recommendations);

    if let Some(validation) = &summary.validation {
        println!();
        match validation.state {
            ValidationState::Passed => println!(
                "{} after {} run(s) and {} fix attempt(s)",
                "✅ Generated tests pass".bright_green().bold(),
                validation.runs,
                validation.attempts.len()
            ),
            _ => println!(
                "{} after {} fix attempt(s)",
                "❌ Tests still failing".red().bold(),
                validation.attempts.len()
            ),
        }
    }

    println!();
    println!(
        "{} {}",
        "📄 Report saved:".bright_green().bold(),
        summary.report_file.display().to_string().cyan()
    );
}

/// Print a scan result as text
pub fn display_scan_summary(root: &Path, summary: &ScanSummary) {
    println!(
        "{} {}",
        "📂 Scanned".bright_blue().bold(),
        root.display().to_string().cyan()
    );
    println!();

    println!("{}", "Files".bold());
    for file in &summary.files {
        println!("   {}", file.display());
    }
    println!();

    println!("{}", "Functions".bold());
    let missing = summary.analysis.missing_functions();
    for source in &summary.sources {
        for function in &source.functions {
            if missing.contains(function) {
                println!("   {} {}()  {}", "❌".red(), function, source.path.display().to_string().dimmed());
            } else {
                println!("   {} {}()  {}", "✅".green(), function, source.path.display().to_string().dimmed());
            }
        }
    }
    println!();

    if missing.is_empty() {
        println!("{}", "✅ Every function has a matching test".bright_green().bold());
    } else {
        println!(
            "{} {}",
            format!("⚠️  {} function(s) without tests:", missing.len()).yellow().bold(),
            missing.join(", ")
        );
    }
}
