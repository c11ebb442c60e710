//! Configuration Layer Management
//!
//! Layers the configuration in priority order: built-in defaults, then a
//! configuration file (`--config`, or an implicit `.testgap.yml` /
//! `.testgap.yaml`), then CLI flags and environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::cli::args::{ModelArgs, RunArgs, ScanArgs, ValidationArgs};
use testgap_rs::core::config::{ExtractionStrategy, ModelConfig, ValidationConfig};
use testgap_rs::TestgapConfig;

/// File names picked up without `--config`
pub const IMPLICIT_CONFIG_FILES: [&str; 2] = [".testgap.yml", ".testgap.yaml"];

/// Apply CLI arguments on top of an already loaded configuration layer
pub trait ApplyCliArgs<T> {
    /// Overwrite every field the arguments set
    fn apply_cli_args(&mut self, args: &T);
}

impl ApplyCliArgs<ModelArgs> for ModelConfig {
    fn apply_cli_args(&mut self, args: &ModelArgs) {
        if let Some(model) = &args.model {
            self.name = model.clone();
        }
        if let Some(host) = &args.ollama_host {
            self.endpoint = normalize_host(host);
        }
        if let Some(timeout) = args.model_timeout {
            self.timeout_secs = timeout;
        }
    }
}

impl ApplyCliArgs<ValidationArgs> for ValidationConfig {
    fn apply_cli_args(&mut self, args: &ValidationArgs) {
        if let Some(max_attempts) = args.max_attempts {
            self.max_attempts = max_attempts;
        }
        if args.no_apply_fixes {
            self.apply_fixes = false;
        }
    }
}

impl ApplyCliArgs<RunArgs> for TestgapConfig {
    fn apply_cli_args(&mut self, args: &RunArgs) {
        self.project.root = args.path.clone();
        if let Some(module) = &args.module {
            self.project.target_module = module.clone();
        }
        if args.syntax_tree {
            self.project.extraction = ExtractionStrategy::SyntaxTree;
        }
        if let Some(output_dir) = &args.output_dir {
            self.report.output_dir = output_dir.clone();
        }
        self.model.apply_cli_args(&args.model);
        self.validation.apply_cli_args(&args.validation);
    }
}

impl ApplyCliArgs<ScanArgs> for TestgapConfig {
    fn apply_cli_args(&mut self, args: &ScanArgs) {
        self.project.root = args.path.clone();
        if args.syntax_tree {
            self.project.extraction = ExtractionStrategy::SyntaxTree;
        }
    }
}

/// `OLLAMA_HOST` is often given without a scheme (`localhost:11434`)
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

/// Find an implicit configuration file in the project directory, then the
/// working directory
pub fn find_implicit_config(project_root: &Path) -> Option<PathBuf> {
    [project_root, Path::new(".")]
        .iter()
        .flat_map(|dir| IMPLICIT_CONFIG_FILES.iter().map(move |name| dir.join(name)))
        .find(|p| p.is_file())
}

/// Load the file layer: the explicit path when given, otherwise an implicit
/// file, otherwise defaults
pub fn load_file_layer(explicit: Option<&Path>, project_root: &Path) -> anyhow::Result<TestgapConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_implicit_config(project_root),
    };

    match path {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            TestgapConfig::from_yaml_file(&path).with_context(|| {
                format!("Failed to load configuration from {}", path.display())
            })
        }
        None => Ok(TestgapConfig::default()),
    }
}

/// Build the configuration for `testgap run`
pub fn build_run_config(args: &RunArgs) -> anyhow::Result<TestgapConfig> {
    let mut config = load_file_layer(args.config.as_deref(), &args.path)?;
    config.apply_cli_args(args);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

/// Build the configuration for `testgap scan`
pub fn build_scan_config(args: &ScanArgs) -> anyhow::Result<TestgapConfig> {
    let mut config = load_file_layer(args.config.as_deref(), &args.path)?;
    config.apply_cli_args(args);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}
