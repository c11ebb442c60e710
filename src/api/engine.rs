//! The test agent: one end-to-end run over a Python project.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::config::TestgapConfig;
use crate::core::errors::{Result, TestgapError};
use crate::core::file_utils::FileReader;
use crate::core::run_report::{GeneratedTest, RunReport, StageOutcome, SynthesisFailure};
use crate::core::validation::{FixTarget, ValidationLoop, ValidationOutcome};
use crate::detectors::gaps::{CoverageGap, CoverageGapDetector, GapAnalysis};
use crate::detectors::scanner::{SourceFile, SourceScanner};
use crate::io::reports::ReportBuilder;
use crate::io::test_writer::{MergeOutcome, TestFileWriter};
use crate::lang::python::FunctionExtractor;
use crate::oracle::{LanguageModel, OllamaClient, ProjectContext, TestSynthesizer};
use crate::runner::{PytestRunner, TestRunner};

/// Progress reporting hook: stage name and completion percentage
pub type ProgressCallback = Box<dyn Fn(&str, f64) + Send + Sync>;

/// Files and coverage gaps found by a scan, without running anything
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    /// Every candidate file, relative to the project root
    pub files: Vec<PathBuf>,
    /// Non-test sources
    pub sources: Vec<SourceFile>,
    /// Test files
    pub tests: Vec<SourceFile>,
    /// Detected gaps
    pub analysis: GapAnalysis,
}

/// What a full run produced
#[derive(Debug, Clone)]
pub struct AgentRunSummary {
    /// The filled-in report
    pub report: RunReport,
    /// Where the Markdown report was written
    pub report_file: PathBuf,
    /// Test file generated tests go into
    pub test_file: PathBuf,
    /// Merge result, when tests were written
    pub merge: Option<MergeOutcome>,
    /// Validation result, when the loop ran
    pub validation: Option<ValidationOutcome>,
}

/// Scans a project, fills coverage gaps with generated tests and reports on it
pub struct TestAgent {
    config: Arc<TestgapConfig>,
    synthesizer: TestSynthesizer,
    runner: Arc<dyn TestRunner>,
    writer: TestFileWriter,
    reports: ReportBuilder,
    progress: Option<ProgressCallback>,
}

impl TestAgent {
    /// Create an agent talking to Ollama and pytest
    pub fn new(config: TestgapConfig) -> Result<Self> {
        let model: Arc<dyn LanguageModel> = Arc::new(OllamaClient::new(&config.model)?);
        let runner: Arc<dyn TestRunner> =
            Arc::new(PytestRunner::new(&config.project, config.runner.clone()));
        Self::with_collaborators(config, model, runner)
    }

    /// Create an agent over explicit model and runner backends
    pub fn with_collaborators(
        config: TestgapConfig,
        model: Arc<dyn LanguageModel>,
        runner: Arc<dyn TestRunner>,
    ) -> Result<Self> {
        config.validate()?;

        let writer = TestFileWriter::new(&config.project, &config.writer)?;
        let reports = ReportBuilder::from_config(config.report.clone(), &config.project.test_prefix)?;
        let synthesizer = TestSynthesizer::new(model, config.model.clone());

        info!(
            "Test agent ready for {} (model {})",
            config.project.root.display(),
            synthesizer.model_name()
        );

        Ok(Self {
            config: Arc::new(config),
            synthesizer,
            runner,
            writer,
            reports,
            progress: None,
        })
    }

    /// Report stage progress through `callback`
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &TestgapConfig {
        &self.config
    }

    fn report_progress(&self, stage: &str, percent: f64) {
        if let Some(callback) = &self.progress {
            callback(stage, percent);
        }
    }

    fn ensure_project_root(&self) -> Result<()> {
        let root = &self.config.project.root;
        if !root.exists() {
            return Err(TestgapError::io(
                format!("Path does not exist: {}", root.display()),
                std::io::Error::new(std::io::ErrorKind::NotFound, "Path not found"),
            ));
        }
        if !root.is_dir() {
            return Err(TestgapError::validation(format!(
                "Path is not a directory: {}",
                root.display()
            )));
        }
        Ok(())
    }

    fn scan_with(&self, extractor: &mut FunctionExtractor) -> Result<ScanSummary> {
        self.ensure_project_root()?;

        let scanner = SourceScanner::new(self.config.project.clone());
        let files = scanner.scan()?;
        let (sources, tests) = scanner.load_paths(&files, extractor)?;
        let analysis =
            CoverageGapDetector::new(&self.config.project.test_prefix).detect(&sources, &tests);

        info!(
            "Found {} files, {} functions, {} missing tests",
            files.len(),
            analysis.functions_found.len(),
            analysis.gaps.len()
        );

        Ok(ScanSummary {
            files,
            sources,
            tests,
            analysis,
        })
    }

    /// Scan the project and detect coverage gaps
    pub fn scan(&self) -> Result<ScanSummary> {
        let mut extractor = FunctionExtractor::for_strategy(self.config.project.extraction)?;
        self.scan_with(&mut extractor)
    }

    /// Run the whole pipeline and write the report.
    ///
    /// Model and runner failures are recorded in the report; only an invalid
    /// project root or a failure to write the report aborts the run.
    pub async fn analyze_project(&self) -> Result<AgentRunSummary> {
        let project = &self.config.project;
        let mut report = RunReport::new(self.synthesizer.model_name(), &project.target_module);
        let mut extractor = FunctionExtractor::for_strategy(project.extraction)?;

        self.report_progress("Listing files", 5.0);
        let scan = self.scan_with(&mut extractor)?;
        report.files_analyzed = scan.files.iter().map(|p| p.display().to_string()).collect();
        report.record_gaps(&scan.analysis);

        self.report_progress("Running existing tests", 15.0);
        report.test_results = StageOutcome::from_test_run(&self.runner.run_tests().await);

        self.report_progress("Analyzing test coverage", 25.0);
        report.coverage = StageOutcome::from_coverage_run(&self.runner.run_coverage().await);

        let test_file = project.test_file_path();
        let test_path = project.resolve(&test_file);
        let mut merge = None;
        let mut validation = None;

        if scan.analysis.gaps.is_empty() {
            info!("All functions are tested");
        } else {
            self.report_progress("Generating missing tests", 35.0);
            let generated = self
                .synthesize_gaps(&scan.analysis.gaps, &scan.sources, &mut extractor, &mut report)
                .await?;

            if !generated.is_empty() {
                self.report_progress("Writing tests", 50.0);
                match self.writer.merge(&test_path, &generated, &report.timestamp) {
                    Ok(outcome) => {
                        merge = Some(outcome);

                        self.report_progress("Validating and fixing tests", 60.0);
                        let outcome = self.validate(&test_file, &test_path).await;
                        report.fixed_tests = outcome.attempts.clone();
                        report.validation_passed = Some(outcome.passed);
                        validation = Some(outcome);

                        self.report_progress("Re-running tests", 70.0);
                        report.test_results =
                            StageOutcome::from_test_run(&self.runner.run_tests().await);
                        report.coverage =
                            StageOutcome::from_coverage_run(&self.runner.run_coverage().await);
                    }
                    Err(err) => {
                        warn!("Could not write tests to {}: {}", test_path.display(), err);
                    }
                }
            }
        }

        self.report_progress("Analyzing project", 80.0);
        report.analysis = self.analysis_stage(&report).await;

        self.report_progress("Generating recommendations", 90.0);
        report.recommendations = match &report.analysis {
            StageOutcome::Completed(analysis) => {
                stage_from(self.synthesizer.recommend(analysis).await, "recommendations")
            }
            _ => StageOutcome::Skipped,
        };

        self.report_progress("Writing report", 95.0);
        let report_file = self.reports.write(&report, &project.root)?;

        self.report_progress("Done", 100.0);
        Ok(AgentRunSummary {
            report,
            report_file,
            test_file: test_path,
            merge,
            validation,
        })
    }

    /// Ask the model for one test per gap; failures are recorded, not written
    async fn synthesize_gaps(
        &self,
        gaps: &[CoverageGap],
        sources: &[SourceFile],
        extractor: &mut FunctionExtractor,
        report: &mut RunReport,
    ) -> Result<Vec<GeneratedTest>> {
        info!("Generating {} missing tests", gaps.len());
        let mut generated = Vec::new();

        for gap in gaps {
            let source_text = sources
                .iter()
                .find(|s| s.path == gap.file)
                .map(|s| s.text.as_str())
                .unwrap_or_default();
            let body = extractor
                .function_body(source_text, &gap.function)?
                .unwrap_or_else(|| {
                    debug!("No body found for {} in {}", gap.function, gap.file.display());
                    String::new()
                });
            let existing_tests = self.existing_tests_for(&gap.file);

            match self
                .synthesizer
                .synthesize(&gap.function, &body, &existing_tests)
                .await
            {
                Ok(code) => {
                    let test = GeneratedTest {
                        function: gap.function.clone(),
                        code,
                    };
                    report.generated_tests.push(test.clone());
                    generated.push(test);
                }
                Err(err) => {
                    warn!("Test generation failed for {}: {}", gap.function, err);
                    report.synthesis_failures.push(SynthesisFailure {
                        function: gap.function.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        Ok(generated)
    }

    /// Text of the test file paired with `source` (`test_<name>` beside it), or empty
    fn existing_tests_for(&self, source: &Path) -> String {
        let Some(file_name) = source.file_name() else {
            return String::new();
        };
        let paired = source.with_file_name(format!(
            "{}{}",
            self.config.project.test_prefix,
            file_name.to_string_lossy()
        ));

        FileReader::read_if_exists(&self.config.project.resolve(&paired)).unwrap_or_else(|err| {
            warn!("Could not read existing tests {}: {}", paired.display(), err);
            String::new()
        })
    }

    async fn validate(&self, test_file: &Path, test_path: &Path) -> ValidationOutcome {
        let mut validation = ValidationLoop::new(
            self.runner.as_ref(),
            &self.synthesizer,
            self.config.validation.clone(),
            &self.config.runner.failure_marker,
            test_file,
        )
        .with_fix_target(FixTarget::new(&self.writer, test_path));

        validation.run().await
    }

    async fn analysis_stage(&self, report: &RunReport) -> StageOutcome {
        let test_results = report.test_results.as_prompt_text();
        let coverage = report.coverage.as_prompt_text();
        let context = ProjectContext {
            files: &report.files_analyzed,
            functions: &report.functions_found,
            tests: &report.tests_found,
            missing: &report.missing_tests,
            test_results: &test_results,
            coverage: &coverage,
        };

        stage_from(self.synthesizer.analyze(&context).await, "analysis")
    }
}

fn stage_from(result: Result<String>, stage: &str) -> StageOutcome {
    match result {
        Ok(text) => StageOutcome::Completed(text),
        Err(err) => {
            warn!("Model {} failed: {}", stage, err);
            StageOutcome::Failed(err.to_string())
        }
    }
}
