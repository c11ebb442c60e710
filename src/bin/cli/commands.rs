//! Command Execution Logic
//!
//! Handlers for every testgap subcommand.

use owo_colors::OwoColorize;
use tracing::info;

use crate::cli::args::{InitConfigArgs, RunArgs, ScanArgs, ScanFormat, ValidateConfigArgs};
use crate::cli::config_layer::{build_run_config, build_scan_config};
use crate::cli::output::{
    display_config_summary, display_run_summary, display_scan_summary, print_header, progress_bar,
};
use testgap_rs::{TestAgent, TestgapConfig};

/// Run the full agent over a project
pub async fn run_command(args: RunArgs) -> anyhow::Result<()> {
    let config = build_run_config(&args)?;

    if !args.quiet {
        print_header();
        display_config_summary(&config);
    }

    let agent = TestAgent::new(config)?;
    let summary = if args.quiet {
        agent.analyze_project().await?
    } else {
        let (pb, callback) = progress_bar()?;
        let agent = agent.with_progress(callback);
        let result = agent.analyze_project().await;
        match &result {
            Ok(_) => pb.finish_with_message("Run complete"),
            Err(_) => pb.abandon_with_message("Run aborted"),
        }
        result?
    };

    info!(
        "Generated {} tests for {} missing functions",
        summary.report.generated_tests.len(),
        summary.report.missing_tests.len()
    );

    if args.quiet {
        println!("{}", summary.report_file.display());
    } else {
        display_run_summary(&summary);
    }

    Ok(())
}

/// Scan a project and print its coverage gaps
pub async fn scan_command(args: ScanArgs) -> anyhow::Result<()> {
    let config = build_scan_config(&args)?;
    let root = config.project.root.clone();

    let agent = TestAgent::new(config)?;
    let summary = agent.scan()?;

    match args.format {
        ScanFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        ScanFormat::Text => display_scan_summary(&root, &summary),
    }

    Ok(())
}

/// Print default configuration in YAML format
pub async fn print_default_config() -> anyhow::Result<()> {
    println!("{}", "# Default testgap configuration".dimmed());
    println!("{}", "# Save this to a file and customize as needed".dimmed());
    println!("{}", "# Usage: testgap run --config your-config.yml".dimmed());
    println!();

    let config = TestgapConfig::default();
    let yaml_output = serde_yaml::to_string(&config)?;
    println!("{}", yaml_output);

    Ok(())
}

/// Initialize a configuration file with defaults
pub async fn init_config(args: InitConfigArgs) -> anyhow::Result<()> {
    if args.output.exists() && !args.force {
        eprintln!("{} {}", "❌ Configuration file already exists:".red(), args.output.display());
        eprintln!("   Use --force to overwrite or choose a different name with --output");
        std::process::exit(1);
    }

    let config = TestgapConfig::default();
    let yaml_content = serde_yaml::to_string(&config)?;
    tokio::fs::write(&args.output, yaml_content).await?;

    println!(
        "{} {}",
        "✅ Configuration saved to:".bright_green().bold(),
        args.output.display().to_string().cyan()
    );
    println!();
    println!("{}", "📝 Next steps:".bright_blue().bold());
    println!("   1. Edit the configuration file to point at your model and module");
    println!(
        "   2. Run the agent with: {}",
        format!("testgap run --config {} <project>", args.output.display()).cyan()
    );
    println!();
    println!("{}", "🔧 Key settings you can customize:".bright_blue().bold());
    println!("   • project.target_module     module whose functions get tests");
    println!("   • model.name / model.endpoint   Ollama model and server");
    println!("   • validation.max_attempts   repair rounds for failing tests");
    println!("   • report.output_dir         where Markdown reports are written");

    Ok(())
}

/// Validate a testgap configuration file
pub async fn validate_config(args: ValidateConfigArgs) -> anyhow::Result<()> {
    println!(
        "{} {}",
        "🔍 Validating configuration:".bright_blue().bold(),
        args.config.display().to_string().cyan()
    );
    println!();

    let loaded = TestgapConfig::from_yaml_file(&args.config)
        .and_then(|config| config.validate().map(|_| config));

    let config = match loaded {
        Ok(config) => {
            println!("{}", "✅ Configuration file is valid!".bright_green().bold());
            println!();
            config
        }
        Err(e) => {
            eprintln!("{} {}", "❌ Configuration validation failed:".red(), e);
            println!();
            println!("{}", "🔧 Common issues:".bright_blue().bold());
            println!("   • Check YAML syntax (indentation, colons, quotes)");
            println!("   • Make sure model.endpoint is a full URL");
            println!("   • Ensure numeric values such as max_attempts are positive");
            println!();
            println!(
                "{}",
                "💡 Tip: Use 'testgap print-default-config' to see valid format".dimmed()
            );
            std::process::exit(1);
        }
    };

    display_config_summary(&config);

    if args.detailed {
        println!("{}", "🔧 Detailed Settings".bright_blue().bold());
        println!();
        println!("{}", serde_yaml::to_string(&config)?);
    }

    Ok(())
}
