//! The single aggregate a run fills in and the report renders.

use serde::Serialize;

use crate::detectors::gaps::GapAnalysis;
use crate::runner::TestRun;

/// Timestamp layout shared by the report header and test file marker blocks
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Result of one collaborator-backed stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum StageOutcome {
    /// The stage produced output
    Completed(String),
    /// The collaborator failed; the text says why
    Failed(String),
    /// The stage did not run
    Skipped,
}

impl Default for StageOutcome {
    fn default() -> Self {
        Self::Skipped
    }
}

impl StageOutcome {
    /// Output text when the stage completed
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Completed(text) => Some(text),
            _ => None,
        }
    }

    /// Text suitable for feeding into a later prompt
    pub fn as_prompt_text(&self) -> String {
        match self {
            Self::Completed(text) => text.clone(),
            Self::Failed(reason) => format!("Error: {reason}"),
            Self::Skipped => "Not run".to_string(),
        }
    }

    /// Whether the stage failed
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Test run output; runs that never produced an exit status are failures
    pub fn from_test_run(run: &TestRun) -> Self {
        match &run.error {
            Some(reason) => Self::Failed(reason.clone()),
            None => Self::Completed(run.render()),
        }
    }

    /// Coverage output keeps only the tool's stdout (its table)
    pub fn from_coverage_run(run: &TestRun) -> Self {
        match &run.error {
            Some(reason) => Self::Failed(reason.clone()),
            None => Self::Completed(run.stdout.clone()),
        }
    }
}

/// Test code written by the model for one coverage gap
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedTest {
    /// Function the test targets
    pub function: String,
    /// Fence-stripped test source
    pub code: String,
}

/// A gap the model could not produce a test for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesisFailure {
    /// Function left untested
    pub function: String,
    /// Why generation failed
    pub reason: String,
}

/// One round of the repair loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixAttempt {
    /// 1-based attempt number
    pub attempt: u32,
    /// Failing run output that triggered the repair
    pub error: String,
    /// Replacement code proposed by the model (empty when the model failed)
    pub fix: String,
    /// Whether the replacement was written into the test file
    pub applied: bool,
}

/// Everything one run records, in the order the stages fill it in
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Run start time, formatted with [`TIMESTAMP_FORMAT`]
    pub timestamp: String,
    /// Model identifier
    pub model: String,
    /// Module whose coverage row is summarised
    pub target_module: String,
    /// Every scanned file, relative to the project root
    pub files_analyzed: Vec<String>,
    /// Functions found in non-test sources
    pub functions_found: Vec<String>,
    /// Functions found in test files
    pub tests_found: Vec<String>,
    /// Functions lacking a test
    pub missing_tests: Vec<String>,
    /// Latest test run
    pub test_results: StageOutcome,
    /// Latest coverage run
    pub coverage: StageOutcome,
    /// Tests produced by the model
    pub generated_tests: Vec<GeneratedTest>,
    /// Gaps whose generation failed
    pub synthesis_failures: Vec<SynthesisFailure>,
    /// Repair rounds
    pub fixed_tests: Vec<FixAttempt>,
    /// Outcome of the validation loop, when it ran
    pub validation_passed: Option<bool>,
    /// Model-written analysis
    pub analysis: StageOutcome,
    /// Model-written recommendations
    pub recommendations: StageOutcome,
}

impl RunReport {
    /// Start a report for a run beginning now
    pub fn new(model: impl Into<String>, target_module: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            model: model.into(),
            target_module: target_module.into(),
            ..Self::default()
        }
    }

    /// Copy a gap analysis into the report
    pub fn record_gaps(&mut self, analysis: &GapAnalysis) {
        self.functions_found.extend(analysis.functions_found.iter().cloned());
        self.tests_found = analysis.tests_found.clone();
        self.missing_tests.extend(analysis.missing_functions());
    }

    /// Whether `function` has a test among the discovered test functions
    pub fn is_tested(&self, test_prefix: &str, function: &str) -> bool {
        let test_name = format!("{test_prefix}{function}");
        self.tests_found.iter().any(|t| t.contains(&test_name))
    }
}
