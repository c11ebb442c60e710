//! Bounded validate-and-repair loop over the test runner.
//!
//! ```text
//! Idle -> Running -> Passed
//!            |
//!            v
//!         Fixing -> Running   (while attempt <= max_attempts)
//!            |
//!            v
//!        Exhausted
//! ```
//!
//! A run passes only when the process exits with status zero and the output
//! carries no failure marker. Collection errors and timeouts are failures.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::core::config::ValidationConfig;
use crate::core::run_report::FixAttempt;
use crate::io::test_writer::TestFileWriter;
use crate::oracle::TestSynthesizer;
use crate::runner::TestRunner;

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    /// Not started
    Idle,
    /// Tests are executing
    Running,
    /// The last run passed
    Passed,
    /// Waiting on a repair from the model
    Fixing,
    /// Attempts ran out with tests still failing
    Exhausted,
}

/// Result of a completed loop
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    /// Whether the final run passed
    pub passed: bool,
    /// Terminal state, `Passed` or `Exhausted`
    pub state: ValidationState,
    /// Number of test runs performed
    pub runs: u32,
    /// Repair rounds, in order
    pub attempts: Vec<FixAttempt>,
}

/// Test file that repairs are written into
pub struct FixTarget<'a> {
    writer: &'a TestFileWriter,
    path: PathBuf,
}

impl<'a> FixTarget<'a> {
    /// Repairs for `path` go through `writer`
    pub fn new(writer: &'a TestFileWriter, path: impl Into<PathBuf>) -> Self {
        Self {
            writer,
            path: path.into(),
        }
    }

    /// Current generated block, empty when there is none or it cannot be read
    fn latest_tests(&self) -> String {
        match self.writer.latest_block(&self.path) {
            Ok(block) => block.unwrap_or_default(),
            Err(err) => {
                warn!("Could not read generated tests in {}: {}", self.path.display(), err);
                String::new()
            }
        }
    }

    /// Whether the fix replaced at least one generated test
    fn apply(&self, fix: &str) -> bool {
        match self.writer.replace_latest_block(&self.path, fix) {
            Ok(outcome) if outcome.tests_written > 0 => true,
            Ok(_) => {
                warn!(
                    "Fix names no generated test in {}, leaving it unchanged",
                    self.path.display()
                );
                false
            }
            Err(err) => {
                warn!("Could not apply fix to {}: {}", self.path.display(), err);
                false
            }
        }
    }
}

/// Runs the tests, asking the model for repairs until they pass or attempts run out
pub struct ValidationLoop<'a> {
    runner: &'a dyn TestRunner,
    synthesizer: &'a TestSynthesizer,
    config: ValidationConfig,
    failure_marker: String,
    test_file: String,
    fix_target: Option<FixTarget<'a>>,
    state: ValidationState,
}

impl<'a> ValidationLoop<'a> {
    /// Create a loop that validates `test_file` through `runner`
    pub fn new(
        runner: &'a dyn TestRunner,
        synthesizer: &'a TestSynthesizer,
        config: ValidationConfig,
        failure_marker: impl Into<String>,
        test_file: &Path,
    ) -> Self {
        Self {
            runner,
            synthesizer,
            config,
            failure_marker: failure_marker.into(),
            test_file: test_file.display().to_string(),
            fix_target: None,
            state: ValidationState::Idle,
        }
    }

    /// Write repairs into the test file before re-running
    pub fn with_fix_target(mut self, target: FixTarget<'a>) -> Self {
        self.fix_target = Some(target);
        self
    }

    /// Current state
    pub fn state(&self) -> ValidationState {
        self.state
    }

    /// Drive the loop to a terminal state
    pub async fn run(&mut self) -> ValidationOutcome {
        let max_attempts = self.config.max_attempts;
        let mut attempt = 1;
        let mut runs = 0;
        let mut attempts = Vec::new();

        while attempt <= max_attempts {
            self.state = ValidationState::Running;
            info!("Validation attempt {}/{}", attempt, max_attempts);

            let run = self.runner.run_tests().await;
            runs += 1;

            if run.passed(&self.failure_marker) {
                info!("All tests passed");
                self.state = ValidationState::Passed;
                return ValidationOutcome {
                    passed: true,
                    state: self.state,
                    runs,
                    attempts,
                };
            }

            self.state = ValidationState::Fixing;
            let error = run.render();
            warn!("Tests failing, requesting a fix (attempt {})", attempt);
            attempts.push(self.fix(attempt, error).await);
            attempt += 1;
        }

        warn!("Test fixing failed after {} attempts", max_attempts);
        self.state = ValidationState::Exhausted;
        ValidationOutcome {
            passed: false,
            state: self.state,
            runs,
            attempts,
        }
    }

    async fn fix(&self, attempt: u32, error: String) -> FixAttempt {
        let latest_tests = self
            .fix_target
            .as_ref()
            .map(FixTarget::latest_tests)
            .unwrap_or_default();

        let fix = match self
            .synthesizer
            .repair(&error, &self.test_file, &latest_tests)
            .await
        {
            Ok(fix) => fix,
            Err(err) => {
                warn!("Model failed to propose a fix: {}", err);
                return FixAttempt {
                    attempt,
                    error,
                    fix: String::new(),
                    applied: false,
                };
            }
        };

        let applied = match &self.fix_target {
            Some(target) if self.config.apply_fixes && !fix.trim().is_empty() => target.apply(&fix),
            _ => false,
        };

        FixAttempt {
            attempt,
            error,
            fix,
            applied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ModelConfig, ProjectConfig, WriterConfig};
    use crate::core::errors::{Result, TestgapError};
    use crate::oracle::{ChatRequest, LanguageModel};
    use crate::core::run_report::GeneratedTest;
    use crate::runner::TestRun;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    struct ScriptedRunner {
        results: Mutex<VecDeque<TestRun>>,
        calls: Mutex<u32>,
    }

    impl ScriptedRunner {
        fn new(results: Vec<TestRun>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl TestRunner for ScriptedRunner {
        async fn run_tests(&self) -> TestRun {
            *self.calls.lock().unwrap() += 1;
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(failing_run)
        }

        async fn run_coverage(&self) -> TestRun {
            TestRun::completed(0, "", "")
        }
    }

    struct FixedModel {
        reply: std::result::Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for FixedModel {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, request: &ChatRequest) -> Result<String> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            self.reply.clone().map_err(TestgapError::model)
        }
    }

    fn failing_run() -> TestRun {
        TestRun::completed(1, "FAILED test_calculator.py::test_lcm - assert 10 == 12", "")
    }

    fn fixed_model(reply: std::result::Result<&str, &str>) -> Arc<FixedModel> {
        Arc::new(FixedModel {
            reply: reply.map(str::to_string).map_err(str::to_string),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn synthesizer(reply: std::result::Result<&str, &str>) -> TestSynthesizer {
        TestSynthesizer::new(fixed_model(reply), ModelConfig::default())
    }

    fn generated(function: &str, code: &str) -> GeneratedTest {
        GeneratedTest {
            function: function.to_string(),
            code: code.to_string(),
        }
    }

    fn config(max_attempts: u32, apply_fixes: bool) -> ValidationConfig {
        ValidationConfig {
            max_attempts,
            apply_fixes,
        }
    }

    #[tokio::test]
    async fn always_failing_exhausts_exactly_max_attempts() {
        let runner = ScriptedRunner::new(vec![]);
        let synth = synthesizer(Ok("def test_lcm():\n    assert lcm(4, 6) == 12"));
        let mut validation = ValidationLoop::new(
            &runner,
            &synth,
            config(3, false),
            "FAILED",
            Path::new("test_calculator.py"),
        );

        let outcome = validation.run().await;

        assert!(!outcome.passed);
        assert_eq!(outcome.state, ValidationState::Exhausted);
        assert_eq!(outcome.attempts.len(), 3);
        assert_eq!(outcome.runs, 3);
        assert_eq!(
            outcome.attempts.iter().map(|a| a.attempt).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(outcome.attempts.iter().all(|a| !a.applied));
        assert_eq!(*runner.calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn pass_on_second_run_stops_there() {
        let runner = ScriptedRunner::new(vec![failing_run(), TestRun::completed(0, "2 passed", "")]);
        let synth = synthesizer(Ok("def test_lcm():\n    pass"));
        let mut validation = ValidationLoop::new(
            &runner,
            &synth,
            config(3, false),
            "FAILED",
            Path::new("test_calculator.py"),
        );

        let outcome = validation.run().await;

        assert!(outcome.passed);
        assert_eq!(outcome.state, ValidationState::Passed);
        assert_eq!(outcome.runs, 2);
        assert_eq!(outcome.attempts.len(), 1);
        assert!(outcome.attempts[0].error.contains("FAILED"));
    }

    #[tokio::test]
    async fn nonzero_exit_without_marker_is_a_failure() {
        let runner = ScriptedRunner::new(vec![
            TestRun::completed(2, "ERROR collecting test_calculator.py", ""),
            TestRun::completed(0, "1 passed", ""),
        ]);
        let synth = synthesizer(Ok("def test_add():\n    pass"));
        let mut validation = ValidationLoop::new(
            &runner,
            &synth,
            config(3, false),
            "FAILED",
            Path::new("test_calculator.py"),
        );

        let outcome = validation.run().await;
        assert!(outcome.passed);
        assert_eq!(outcome.runs, 2);
    }

    #[tokio::test]
    async fn model_failure_still_consumes_the_attempt() {
        let runner = ScriptedRunner::new(vec![]);
        let synth = synthesizer(Err("connection refused"));
        let mut validation = ValidationLoop::new(
            &runner,
            &synth,
            config(2, true),
            "FAILED",
            Path::new("test_calculator.py"),
        );

        let outcome = validation.run().await;

        assert_eq!(outcome.attempts.len(), 2);
        assert!(outcome.attempts.iter().all(|a| a.fix.is_empty() && !a.applied));
    }

    #[tokio::test]
    async fn applied_fix_replaces_the_failing_definition() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_calculator.py");
        let writer = TestFileWriter::new(&ProjectConfig::default(), &WriterConfig::default()).unwrap();
        writer
            .merge(
                &path,
                &[generated("lcm", "def test_lcm():\n    assert lcm(4, 6) == 10")],
                "2026-02-12 13:27:59",
            )
            .unwrap();

        let runner = ScriptedRunner::new(vec![failing_run(), TestRun::completed(0, "1 passed", "")]);
        let synth = synthesizer(Ok("```python\ndef test_lcm():\n    assert lcm(4, 6) == 12\n```"));
        let mut validation = ValidationLoop::new(&runner, &synth, config(3, true), "FAILED", &path)
            .with_fix_target(FixTarget::new(&writer, &path));

        let outcome = validation.run().await;

        assert!(outcome.passed);
        assert!(outcome.attempts[0].applied);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("assert lcm(4, 6) == 12"));
        assert!(!content.contains("== 10"));
        assert_eq!(validation.state(), ValidationState::Passed);
    }

    #[tokio::test]
    async fn repair_keeps_passing_generated_tests() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_calculator.py");
        let writer = TestFileWriter::new(&ProjectConfig::default(), &WriterConfig::default()).unwrap();
        writer
            .merge(
                &path,
                &[
                    generated("add", "def test_add():\n    assert add(1, 2) == 3"),
                    generated("gcd", "def test_gcd():\n    assert gcd(12, 15) == 3"),
                    generated("lcm", "def test_lcm():\n    assert lcm(4, 6) == 10"),
                ],
                "2026-02-12 13:27:59",
            )
            .unwrap();

        let runner = ScriptedRunner::new(vec![failing_run(), TestRun::completed(0, "3 passed", "")]);
        let model = fixed_model(Ok("def test_lcm():\n    assert lcm(4, 6) == 12"));
        let synth = TestSynthesizer::new(model.clone(), ModelConfig::default());
        let mut validation = ValidationLoop::new(&runner, &synth, config(3, true), "FAILED", &path)
            .with_fix_target(FixTarget::new(&writer, &path));

        let outcome = validation.run().await;

        assert!(outcome.passed);
        assert!(outcome.attempts[0].applied);

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("def test_add():\n    assert add(1, 2) == 3"));
        assert!(prompts[0].contains("assert lcm(4, 6) == 10"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("def test_add():\n    assert add(1, 2) == 3"));
        assert!(content.contains("def test_gcd():\n    assert gcd(12, 15) == 3"));
        assert!(content.contains("def test_lcm():\n    assert lcm(4, 6) == 12"));
        assert!(!content.contains("== 10"));
    }

    #[tokio::test]
    async fn fix_for_a_hand_written_test_is_not_applied() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_calculator.py");
        std::fs::write(
            &path,
            "import pytest\nfrom calculator import divide\n\n\ndef test_divide():\n    assert divide(1, 0) == 0\n",
        )
        .unwrap();
        let writer = TestFileWriter::new(&ProjectConfig::default(), &WriterConfig::default()).unwrap();
        writer
            .merge(
                &path,
                &[generated("gcd", "def test_gcd():\n    assert gcd(12, 15) == 3")],
                "2026-02-12 13:27:59",
            )
            .unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let runner = ScriptedRunner::new(vec![
            TestRun::completed(1, "FAILED test_calculator.py::test_divide", ""),
            TestRun::completed(0, "2 passed", ""),
        ]);
        let synth = synthesizer(Ok("def test_divide():\n    with pytest.raises(ValueError):\n        divide(1, 0)"));
        let mut validation = ValidationLoop::new(&runner, &synth, config(3, true), "FAILED", &path)
            .with_fix_target(FixTarget::new(&writer, &path));

        let outcome = validation.run().await;

        assert!(!outcome.attempts[0].applied);
        assert!(!outcome.attempts[0].fix.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }
}
