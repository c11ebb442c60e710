//! Test runner integration (pytest and pytest-cov).
//!
//! Runs are never errors from the pipeline's point of view: spawn failures
//! and timeouts come back as a [`TestRun`] carrying the reason, so the report
//! section degrades instead of the whole run aborting.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::core::config::{ProjectConfig, RunnerConfig};
use crate::core::errors::TestgapError;

/// Outcome of one test runner invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestRun {
    /// Process exit code (`None` when killed or never started)
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// The run hit the configured timeout
    pub timed_out: bool,
    /// Why the run produced no exit status
    pub error: Option<String>,
}

impl TestRun {
    /// A finished run
    pub fn completed(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
            error: None,
        }
    }

    /// A run that could not produce an exit status
    pub fn failed(reason: impl Into<String>, timed_out: bool) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out,
            error: Some(reason.into()),
        }
    }

    /// Combined textual output in the `Return code: N` layout
    pub fn render(&self) -> String {
        match (&self.error, self.exit_code) {
            (Some(reason), _) => format!("Error: {reason}"),
            (None, Some(code)) => format!("Return code: {code}\n\n{}\n{}", self.stdout, self.stderr),
            (None, None) => format!("Return code: killed\n\n{}\n{}", self.stdout, self.stderr),
        }
    }

    /// The process exited with status zero
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// The output mentions the failure marker
    pub fn has_failures(&self, marker: &str) -> bool {
        self.stdout.contains(marker) || self.stderr.contains(marker)
    }

    /// Zero exit status and no failure marker
    pub fn passed(&self, marker: &str) -> bool {
        self.succeeded() && !self.has_failures(marker)
    }
}

/// The external test tool
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Verbose, short-traceback, stop-on-first-failure test run
    async fn run_tests(&self) -> TestRun;

    /// Test run with a terminal coverage report
    async fn run_coverage(&self) -> TestRun;
}

/// Runs pytest as a subprocess in the project root
#[derive(Debug, Clone)]
pub struct PytestRunner {
    root: PathBuf,
    self_file: String,
    config: RunnerConfig,
}

impl PytestRunner {
    /// Create a runner for a project
    pub fn new(project: &ProjectConfig, config: RunnerConfig) -> Self {
        Self {
            root: project.root.clone(),
            self_file: project.self_file.clone(),
            config,
        }
    }

    /// Arguments for a plain test run
    pub fn test_args(&self) -> Vec<String> {
        vec![
            self.config.target.clone(),
            "-v".to_string(),
            "--tb=short".to_string(),
            "-x".to_string(),
        ]
    }

    /// Arguments for a coverage run
    pub fn coverage_args(&self) -> Vec<String> {
        vec![
            self.config.target.clone(),
            "--cov=.".to_string(),
            "--cov-report=term-missing".to_string(),
            format!("--ignore={}", self.self_file),
        ]
    }

    async fn execute(&self, args: Vec<String>) -> TestRun {
        let command_line = format!("{} {}", self.config.program, args.join(" "));
        debug!("Running `{}` in {}", command_line, self.root.display());

        let mut command = Command::new(&self.config.program);
        command
            .args(&args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let limit = Duration::from_secs(self.config.timeout_secs);
        match tokio::time::timeout(limit, command.output()).await {
            Ok(Ok(output)) => {
                let code = output.status.code().unwrap_or(-1);
                TestRun::completed(
                    code,
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr),
                )
            }
            Ok(Err(err)) => {
                let err = TestgapError::runner(err.to_string(), command_line);
                warn!("{}", err);
                TestRun::failed(err.to_string(), false)
            }
            Err(_) => {
                warn!("`{}` timed out after {}s", command_line, self.config.timeout_secs);
                TestRun::failed(
                    format!(
                        "Command '{}' timed out after {} seconds",
                        command_line, self.config.timeout_secs
                    ),
                    true,
                )
            }
        }
    }
}

#[async_trait]
impl TestRunner for PytestRunner {
    async fn run_tests(&self) -> TestRun {
        self.execute(self.test_args()).await
    }

    async fn run_coverage(&self) -> TestRun {
        self.execute(self.coverage_args()).await
    }
}
