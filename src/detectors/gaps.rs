//! Coverage gap detection by name containment.
//!
//! A function `f` counts as tested when the concatenated text of every test
//! file contains the literal `<prefix>f` anywhere, comments included. This is
//! a textual check, not a semantic one: `test_add` in a comment marks `add`
//! as tested, and `test_add_negative` does too.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use super::scanner::SourceFile;

/// A function with no detected test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageGap {
    /// Function lacking a test
    pub function: String,
    /// Source file defining it
    pub file: PathBuf,
}

/// Output of one detection pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct GapAnalysis {
    /// Untested functions, in source order
    pub gaps: Vec<CoverageGap>,
    /// Every function found in non-test sources
    pub functions_found: Vec<String>,
    /// Every function found in test files
    pub tests_found: Vec<String>,
}

impl GapAnalysis {
    /// Names of the untested functions
    pub fn missing_functions(&self) -> Vec<String> {
        self.gaps.iter().map(|g| g.function.clone()).collect()
    }
}

/// Computes coverage gaps from scanned sources and tests
#[derive(Debug, Clone)]
pub struct CoverageGapDetector {
    test_prefix: String,
}

impl CoverageGapDetector {
    /// Create a detector for the given test-name prefix
    pub fn new(test_prefix: impl Into<String>) -> Self {
        Self {
            test_prefix: test_prefix.into(),
        }
    }

    /// Whether `corpus` contains the test name for `function`
    pub fn is_tested(&self, corpus: &str, function: &str) -> bool {
        corpus.contains(&format!("{}{}", self.test_prefix, function))
    }

    /// Classify every source function as tested or missing
    pub fn detect(&self, sources: &[SourceFile], tests: &[SourceFile]) -> GapAnalysis {
        let corpus: String = tests.iter().map(|t| t.text.as_str()).collect();
        let tests_found: Vec<String> = tests
            .iter()
            .flat_map(|t| t.functions.iter().cloned())
            .collect();

        let mut analysis = GapAnalysis {
            tests_found,
            ..GapAnalysis::default()
        };

        for source in sources {
            debug!("Analyzing {}", source.path.display());
            for function in &source.functions {
                analysis.functions_found.push(function.clone());

                if self.is_tested(&corpus, function) {
                    debug!("Tested: {}", function);
                } else {
                    info!("Missing test for {} in {}", function, source.path.display());
                    analysis.gaps.push(CoverageGap {
                        function: function.clone(),
                        file: source.path.clone(),
                    });
                }
            }
        }

        analysis
    }
}
