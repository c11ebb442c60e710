//! Configuration types and management for testgap-rs.
//!
//! Every section carries serde defaults so a partial YAML file (or none at
//! all) produces a runnable configuration. Sections validate themselves; the
//! top-level [`TestgapConfig::validate`] prefixes field names with the
//! section they belong to.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TestgapError};

/// Main configuration for a test agent run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestgapConfig {
    /// Project layout and naming conventions
    #[serde(default)]
    pub project: ProjectConfig,

    /// Language model service settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Test runner (pytest) settings
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Validate-and-repair loop settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Test file merge settings
    #[serde(default)]
    pub writer: WriterConfig,

    /// Markdown report settings
    #[serde(default)]
    pub report: ReportConfig,
}

impl TestgapConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            TestgapError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        serde_yaml::from_str(&content).map_err(Into::into)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content).map_err(|e| {
            TestgapError::io(
                format!("Failed to write config file: {}", path.display()),
                e,
            )
        })
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        self.project.validate()?;
        self.model.validate()?;
        self.runner.validate()?;
        self.validation.validate()?;
        self.writer.validate()?;
        Ok(())
    }
}

/// How function definitions and bodies are located in source text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Line-prefix scan for `def ` plus indentation tracking for bodies
    #[default]
    LinePrefix,
    /// tree-sitter-python walk over `function_definition` nodes
    SyntaxTree,
}

/// Project layout and naming conventions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Root directory of the project under analysis
    pub root: PathBuf,
    /// File name of the orchestrator script, never scanned
    pub self_file: String,
    /// Extension (with leading dot) of candidate source files
    pub source_extension: String,
    /// Directory names pruned from the walk
    pub skip_dirs: Vec<String>,
    /// File-name and function-name prefix marking tests
    pub test_prefix: String,
    /// Module whose import line is maintained in the test file
    pub target_module: String,
    /// Test file receiving generated tests (default: `<prefix><module>.py`)
    pub test_file: Option<PathBuf>,
    /// Function extraction strategy
    pub extraction: ExtractionStrategy,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            self_file: "test_agent.py".to_string(),
            source_extension: ".py".to_string(),
            skip_dirs: vec![
                "venv".to_string(),
                ".venv".to_string(),
                "__pycache__".to_string(),
                ".pytest_cache".to_string(),
                ".git".to_string(),
            ],
            test_prefix: "test_".to_string(),
            target_module: "calculator".to_string(),
            test_file: None,
            extraction: ExtractionStrategy::LinePrefix,
        }
    }
}

impl ProjectConfig {
    /// Test file path relative to the project root
    pub fn test_file_path(&self) -> PathBuf {
        self.test_file.clone().unwrap_or_else(|| {
            PathBuf::from(format!(
                "{}{}{}",
                self.test_prefix, self.target_module, self.source_extension
            ))
        })
    }

    /// Resolve a project-relative path against the configured root
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.root.join(relative)
        }
    }

    /// Validate project configuration
    pub fn validate(&self) -> Result<()> {
        if !self.source_extension.starts_with('.') || self.source_extension.len() < 2 {
            return Err(TestgapError::config_field(
                "source_extension must look like '.py'",
                "project.source_extension",
            ));
        }

        if self.test_prefix.trim().is_empty() {
            return Err(TestgapError::config_field(
                "test_prefix cannot be empty",
                "project.test_prefix",
            ));
        }

        let module_is_identifier = !self.target_module.is_empty()
            && self
                .target_module
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if !module_is_identifier {
            return Err(TestgapError::config_field(
                format!("'{}' is not a valid module name", self.target_module),
                "project.target_module",
            ));
        }

        Ok(())
    }
}

/// Sampling options for one kind of model request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum number of generated tokens
    pub max_tokens: u32,
}

impl GenerationOptions {
    /// Create options from a temperature and token limit
    pub const fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }

    fn validate(&self, field: &str) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TestgapError::config_field(
                "temperature must be between 0.0 and 2.0",
                format!("model.{field}.temperature"),
            ));
        }
        if self.max_tokens == 0 {
            return Err(TestgapError::config_field(
                "max_tokens must be greater than 0",
                format!("model.{field}.max_tokens"),
            ));
        }
        Ok(())
    }
}

/// Language model service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier sent with every request
    pub name: String,
    /// Base URL of the Ollama server
    pub endpoint: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Options for test generation
    pub generation: GenerationOptions,
    /// Options for repairing failing tests
    pub repair: GenerationOptions,
    /// Options for the project analysis summary
    pub analysis: GenerationOptions,
    /// Options for the recommendations list
    pub recommendations: GenerationOptions,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "llama3.2".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            timeout_secs: 120,
            generation: GenerationOptions::new(0.1, 500),
            repair: GenerationOptions::new(0.1, 1000),
            analysis: GenerationOptions::new(0.3, 500),
            recommendations: GenerationOptions::new(0.5, 500),
        }
    }
}

impl ModelConfig {
    /// Validate model configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TestgapError::config_field(
                "model name cannot be empty",
                "model.name",
            ));
        }

        if url::Url::parse(&self.endpoint).is_err() {
            return Err(TestgapError::config_field(
                format!("'{}' is not a valid URL", self.endpoint),
                "model.endpoint",
            ));
        }

        if self.timeout_secs == 0 {
            return Err(TestgapError::config_field(
                "timeout_secs must be greater than 0",
                "model.timeout_secs",
            ));
        }

        self.generation.validate("generation")?;
        self.repair.validate("repair")?;
        self.analysis.validate("analysis")?;
        self.recommendations.validate("recommendations")?;
        Ok(())
    }
}

/// Test runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Executable used for test and coverage runs
    pub program: String,
    /// Timeout for a single run, in seconds
    pub timeout_secs: u64,
    /// Token whose presence in the output marks a failing test
    pub failure_marker: String,
    /// Path argument handed to the runner, relative to the project root
    pub target: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: "pytest".to_string(),
            timeout_secs: 60,
            failure_marker: "FAILED".to_string(),
            target: ".".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Validate runner configuration
    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(TestgapError::config_field(
                "runner program cannot be empty",
                "runner.program",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(TestgapError::config_field(
                "timeout_secs must be greater than 0",
                "runner.timeout_secs",
            ));
        }
        if self.failure_marker.is_empty() {
            return Err(TestgapError::config_field(
                "failure_marker cannot be empty",
                "runner.failure_marker",
            ));
        }
        Ok(())
    }
}

/// Validate-and-repair loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Maximum number of repair attempts
    pub max_attempts: u32,
    /// Write proposed repairs back into the test file before re-running
    pub apply_fixes: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            apply_fixes: true,
        }
    }
}

impl ValidationConfig {
    /// Validate loop configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(TestgapError::config_field(
                "max_attempts must be at least 1",
                "validation.max_attempts",
            ));
        }
        Ok(())
    }
}

/// Test file merge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Call targets never added to the import line
    pub import_exclusions: Vec<String>,
    /// Import line placed above a synthesized module import
    pub assertion_import: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            import_exclusions: vec![
                "assert".to_string(),
                "pytest".to_string(),
                "raises".to_string(),
                "print".to_string(),
            ],
            assertion_import: "import pytest".to_string(),
        }
    }
}

impl WriterConfig {
    /// Validate writer configuration
    pub fn validate(&self) -> Result<()> {
        if self.assertion_import.contains('\n') {
            return Err(TestgapError::config_field(
                "assertion_import must be a single line",
                "writer.assertion_import",
            ));
        }
        Ok(())
    }
}

/// Markdown report settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory receiving the report, relative to the project root
    pub output_dir: PathBuf,
    /// File name prefix; the run timestamp and `.md` are appended
    pub file_prefix: String,
    /// Optional directory of `*.hbs` templates overriding the built-in one
    pub templates_dir: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            file_prefix: "test_report_".to_string(),
            templates_dir: None,
        }
    }
}
