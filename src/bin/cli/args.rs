//! CLI Argument Structures
//!
//! Command definitions and argument structs for the testgap binary.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Test gap agent for Python projects
#[derive(Parser)]
#[command(name = "testgap")]
#[command(version = VERSION)]
#[command(about = "🤖 testgap - find untested Python functions and generate pytest tests with Ollama")]
#[command(long_about = "
Scan a Python project for functions without a matching test_<name> test,
ask a local Ollama model to write the missing tests, merge them into the
test file, re-run pytest with a bounded repair loop and write a Markdown
report.

Common Usage:

  # Full run over the current directory
  testgap run

  # Full run against another model and Ollama host
  testgap run --model codellama --ollama-host http://gpu-box:11434 ./my_project

  # Only list files, functions and missing tests
  testgap scan --format json ./my_project

  # Start from a configuration file
  testgap init-config && testgap run --config .testgap.yml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the whole agent: scan, generate, merge, validate and report
    Run(Box<RunArgs>),

    /// Scan a project and list coverage gaps without calling the model
    Scan(ScanArgs),

    /// Print default configuration in YAML format
    #[command(name = "print-default-config")]
    PrintDefaultConfig,

    /// Initialize a configuration file with defaults
    #[command(name = "init-config")]
    InitConfig(InitConfigArgs),

    /// Validate a testgap configuration file
    #[command(name = "validate-config")]
    ValidateConfig(ValidateConfigArgs),
}

/// Model service overrides
#[derive(Args, Debug, Default)]
pub struct ModelArgs {
    /// Model name to request from Ollama
    #[arg(long, env = "TESTGAP_MODEL")]
    pub model: Option<String>,

    /// Base URL of the Ollama server
    #[arg(long, env = "OLLAMA_HOST")]
    pub ollama_host: Option<String>,

    /// Per-request model timeout in seconds
    #[arg(long)]
    pub model_timeout: Option<u64>,
}

/// Validation loop overrides
#[derive(Args, Debug, Default)]
pub struct ValidationArgs {
    /// Maximum number of repair attempts for failing tests
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Record proposed repairs in the report without writing them to the test file
    #[arg(long)]
    pub no_apply_fixes: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Project directory to analyze
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Module whose functions are tested and imported
    #[arg(short, long)]
    pub module: Option<String>,

    /// Directory for Markdown reports, relative to the project
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Use the tree-sitter parser instead of the line scanner
    #[arg(long)]
    pub syntax_tree: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub validation: ValidationArgs,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Project directory to scan
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use the tree-sitter parser instead of the line scanner
    #[arg(long)]
    pub syntax_tree: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: ScanFormat,
}

#[derive(Args)]
pub struct InitConfigArgs {
    /// Output configuration file name
    #[arg(short, long, default_value = ".testgap.yml")]
    pub output: PathBuf,

    /// Overwrite existing configuration file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ValidateConfigArgs {
    /// Configuration file to validate
    #[arg(short, long, required = true)]
    pub config: PathBuf,

    /// Show every setting after validation
    #[arg(short, long)]
    pub detailed: bool,
}

/// Scan output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScanFormat {
    /// Human-readable summary
    Text,
    /// JSON document on stdout
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "testgap",
            "run",
            "proj",
            "--model",
            "codellama",
            "--max-attempts",
            "5",
            "--no-apply-fixes",
            "--module",
            "geometry",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.path, PathBuf::from("proj"));
                assert_eq!(args.model.model.as_deref(), Some("codellama"));
                assert_eq!(args.validation.max_attempts, Some(5));
                assert!(args.validation.no_apply_fixes);
                assert_eq!(args.module.as_deref(), Some("geometry"));
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn scan_defaults_to_text_in_current_directory() {
        let cli = Cli::try_parse_from(["testgap", "scan"]).unwrap();
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.path, PathBuf::from("."));
                assert_eq!(args.format, ScanFormat::Text);
            }
            _ => panic!("expected scan command"),
        }
    }

    #[test]
    fn validate_config_requires_a_path() {
        assert!(Cli::try_parse_from(["testgap", "validate-config"]).is_err());
    }
}
