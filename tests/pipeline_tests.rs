//! End-to-end agent runs over the calculator fixture with scripted model and
//! runner backends.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

use testgap_rs::oracle::{ChatRequest, LanguageModel};
use testgap_rs::runner::{TestRun, TestRunner};
use testgap_rs::{StageOutcome, TestAgent, TestgapConfig, TestgapError};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/calculator");

/// Answers each prompt kind with a canned reply and records what it was asked
struct ScriptedModel {
    prompts: Mutex<Vec<String>>,
    fail_generation: bool,
}

impl ScriptedModel {
    fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail_generation: false,
        }
    }

    fn failing_generation() -> Self {
        Self {
            fail_generation: true,
            ..Self::new()
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> testgap_rs::Result<String> {
        self.prompts.lock().unwrap().push(request.prompt.clone());

        if let Some(rest) = request.prompt.split("Test function name: ").nth(1) {
            if self.fail_generation {
                return Err(TestgapError::model("connection refused"));
            }
            let name = rest.split('\n').next().unwrap_or_default();
            let function = name.trim_start_matches("test_");
            return Ok(format!(
                "```python\ndef {name}():\n    assert {function}(4, 6) is not None\n```"
            ));
        }
        if request.prompt.starts_with("Tests failed.") {
            return Ok("def test_lcm():\n    assert lcm(4, 6) == 12".to_string());
        }
        if request.prompt.starts_with("PROJECT ANALYSIS") {
            if self.fail_generation {
                return Err(TestgapError::model("connection refused"));
            }
            return Ok("Most arithmetic helpers lack tests.".to_string());
        }
        Ok("1. Add edge-case tests for lcm".to_string())
    }
}

/// Replays queued test runs, then passes
struct ScriptedRunner {
    test_runs: Mutex<VecDeque<TestRun>>,
    calls: Mutex<u32>,
}

impl ScriptedRunner {
    fn new(script: Vec<TestRun>) -> Self {
        Self {
            test_runs: Mutex::new(script.into()),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl TestRunner for ScriptedRunner {
    async fn run_tests(&self) -> TestRun {
        *self.calls.lock().unwrap() += 1;
        self.test_runs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| TestRun::completed(0, "collected 10 items\n10 passed", ""))
    }

    async fn run_coverage(&self) -> TestRun {
        TestRun::completed(
            0,
            "Name                 Stmts   Miss  Cover\n\
             calculator.py           40      6    85%\n\
             test_calculator.py      30      0   100%\n\
             TOTAL                   70      6    91%\n",
            "",
        )
    }
}

fn copy_fixture() -> TempDir {
    let dir = tempdir().unwrap();
    for name in ["calculator.py", "test_calculator.py"] {
        fs::copy(Path::new(FIXTURE).join(name), dir.path().join(name)).unwrap();
    }
    dir
}

fn config_for(root: &Path) -> TestgapConfig {
    let mut config = TestgapConfig::default();
    config.project.root = root.to_path_buf();
    config
}

#[tokio::test]
async fn full_run_generates_merges_repairs_and_reports() {
    let dir = copy_fixture();
    let model = Arc::new(ScriptedModel::new());
    let runner = Arc::new(ScriptedRunner::new(vec![
        TestRun::completed(0, "collected 2 items\n2 passed", ""),
        TestRun::completed(1, "FAILED test_calculator.py::test_lcm - AssertionError", ""),
    ]));

    let agent = TestAgent::with_collaborators(config_for(dir.path()), model.clone(), runner.clone())
        .unwrap();
    let summary = agent.analyze_project().await.unwrap();
    let report = &summary.report;

    assert_eq!(report.functions_found.len(), 10);
    assert_eq!(report.tests_found, vec!["test_add", "test_divide"]);
    assert_eq!(
        report.missing_tests,
        vec!["subtract", "multiply", "power", "factorial", "is_prime", "fibonacci", "gcd", "lcm"]
    );
    assert_eq!(report.generated_tests.len(), 8);
    assert!(report.synthesis_failures.is_empty());

    let merge = summary.merge.as_ref().unwrap();
    assert_eq!(merge.tests_written, 8);
    assert!(merge.imports_added.contains(&"lcm".to_string()));

    let validation = summary.validation.as_ref().unwrap();
    assert!(validation.passed);
    assert_eq!(validation.runs, 2);
    assert_eq!(report.fixed_tests.len(), 1);
    assert!(report.fixed_tests[0].applied);
    assert_eq!(report.validation_passed, Some(true));

    // initial run, two validation runs, final re-run
    assert_eq!(runner.calls(), 4);

    let test_file = fs::read_to_string(dir.path().join("test_calculator.py")).unwrap();
    let import_lines: Vec<&str> = test_file
        .lines()
        .filter(|l| l.starts_with("from calculator import"))
        .collect();
    assert_eq!(import_lines.len(), 1);
    for name in ["add", "divide", "gcd", "lcm", "fibonacci"] {
        assert!(import_lines[0].contains(name), "{name} missing from {}", import_lines[0]);
    }
    assert!(test_file.contains("def test_add():"));
    assert!(test_file.contains("# AUTO-GENERATED TESTS"));
    assert!(test_file.contains("assert lcm(4, 6) == 12"));
    assert!(!test_file.contains("assert lcm(4, 6) is not None"));
    for name in ["subtract", "multiply", "power", "factorial", "is_prime", "fibonacci", "gcd"] {
        assert!(
            test_file.contains(&format!("def test_{name}():")),
            "test_{name} lost during repair"
        );
    }

    let markdown = fs::read_to_string(&summary.report_file).unwrap();
    assert!(summary.report_file.starts_with(dir.path()));
    assert!(markdown.contains("**Model:** scripted"));
    assert!(markdown.contains("**Test Coverage:** 85%"));
    assert!(markdown.contains("Agent made 1 fix attempts for failing tests."));
    assert!(markdown.contains("Most arithmetic helpers lack tests."));
    assert!(markdown.contains("1. Add edge-case tests for lcm"));

    let prompts = model.prompts();
    assert_eq!(
        prompts.iter().filter(|p| p.contains("Test function name: ")).count(),
        8
    );
    assert!(prompts
        .iter()
        .any(|p| p.starts_with("Tests failed.")
            && p.contains("FAILED test_calculator.py::test_lcm")
            && p.contains("def test_gcd():")));
}

#[tokio::test]
async fn model_outage_is_recorded_without_touching_tests() {
    let dir = copy_fixture();
    let original = fs::read_to_string(dir.path().join("test_calculator.py")).unwrap();
    let runner = Arc::new(ScriptedRunner::new(Vec::new()));

    let agent = TestAgent::with_collaborators(
        config_for(dir.path()),
        Arc::new(ScriptedModel::failing_generation()),
        runner.clone(),
    )
    .unwrap();
    let summary = agent.analyze_project().await.unwrap();
    let report = &summary.report;

    assert!(report.generated_tests.is_empty());
    assert_eq!(report.synthesis_failures.len(), 8);
    assert!(summary.merge.is_none());
    assert!(summary.validation.is_none());
    assert_eq!(report.validation_passed, None);
    assert!(matches!(report.analysis, StageOutcome::Failed(_)));
    assert_eq!(report.recommendations, StageOutcome::Skipped);
    assert_eq!(runner.calls(), 1);

    let after = fs::read_to_string(dir.path().join("test_calculator.py")).unwrap();
    assert_eq!(after, original);

    let markdown = fs::read_to_string(&summary.report_file).unwrap();
    assert!(markdown.contains("- **Failed generations:** 8"));
    assert!(markdown.contains("Model error: connection refused"));
}

#[tokio::test]
async fn fully_tested_project_only_asks_for_analysis() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("calculator.py"), "def add(a, b):\n    return a + b\n").unwrap();
    fs::write(
        dir.path().join("test_calculator.py"),
        "from calculator import add\n\n\ndef test_add():\n    assert add(1, 2) == 3\n",
    )
    .unwrap();

    let model = Arc::new(ScriptedModel::new());
    let agent = TestAgent::with_collaborators(
        config_for(dir.path()),
        model.clone(),
        Arc::new(ScriptedRunner::new(Vec::new())),
    )
    .unwrap();
    let summary = agent.analyze_project().await.unwrap();

    assert!(summary.report.missing_tests.is_empty());
    assert!(summary.merge.is_none());
    assert_eq!(model.prompts().len(), 2);
    assert!(matches!(summary.report.analysis, StageOutcome::Completed(_)));
    assert!(matches!(summary.report.recommendations, StageOutcome::Completed(_)));
}

#[tokio::test]
async fn repairs_are_recorded_but_not_written_when_disabled() {
    let dir = copy_fixture();
    let failing = || TestRun::completed(1, "FAILED test_calculator.py::test_gcd", "");
    let runner = Arc::new(ScriptedRunner::new(vec![
        TestRun::completed(0, "2 passed", ""),
        failing(),
        failing(),
        failing(),
        failing(),
    ]));

    let mut config = config_for(dir.path());
    config.validation.apply_fixes = false;
    config.validation.max_attempts = 2;

    let agent =
        TestAgent::with_collaborators(config, Arc::new(ScriptedModel::new()), runner).unwrap();
    let summary = agent.analyze_project().await.unwrap();

    let validation = summary.validation.as_ref().unwrap();
    assert!(!validation.passed);
    assert_eq!(validation.attempts.len(), 2);
    assert!(validation.attempts.iter().all(|a| !a.applied));
    assert_eq!(summary.report.validation_passed, Some(false));

    let test_file = fs::read_to_string(dir.path().join("test_calculator.py")).unwrap();
    assert!(!test_file.contains("assert lcm(4, 6) == 12"));

    let markdown = fs::read_to_string(&summary.report_file).unwrap();
    assert!(markdown.contains("tests still failing"));
}
