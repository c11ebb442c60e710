//! Prompt templates sent to the language model.

/// Facts about the project handed to the analysis prompt
#[derive(Debug, Clone, Default)]
pub struct ProjectContext<'a> {
    /// Scanned file paths
    pub files: &'a [String],
    /// Functions found in sources
    pub functions: &'a [String],
    /// Test functions found in test files
    pub tests: &'a [String],
    /// Functions without tests
    pub missing: &'a [String],
    /// Rendered test run output
    pub test_results: &'a str,
    /// Rendered coverage output
    pub coverage: &'a str,
}

/// Prompt asking for one pytest test of `function_name`.
///
/// The requirements are numbered so the model treats them as a checklist;
/// the worked example shows the expected shape, including `pytest.raises`.
pub fn build_generation_prompt(
    function_name: &str,
    function_code: &str,
    existing_tests: &str,
) -> String {
    format!(
        "Create a pytest test for this Python function.\n\n\
        FUNCTION:\n\
        {function_code}\n\n\
        EXISTING TESTS (don't repeat these):\n\
        {existing_tests}\n\n\
        CRITICAL REQUIREMENTS:\n\
        1. Test function name: test_{function_name}\n\
        2. NEVER add import statements - they're already in the file!\n\
        3. Use function directly by name: {function_name}(...)\n\
        4. Test normal cases\n\
        5. Test edge cases (e.g., zero, negative numbers)\n\
        6. Test error conditions ONLY if function raises exceptions\n\
        7. IMPORTANT: Calculate mathematical results CORRECTLY (e.g., (-1)^2 = 1, NOT -1)\n\
        8. DO NOT add explanations or comments\n\n\
        EXAMPLE OF CORRECT TEST:\n\
        def test_power():\n    \
            assert power(2, 3) == 8\n    \
            assert power(-1, 2) == 1\n    \
            with pytest.raises(ValueError):\n        \
                power(10, \"text\")\n\n\
        Provide ONLY test code without ```python``` tags or explanations."
    )
}

/// Prompt asking the model to repair the most recently added tests.
///
/// `latest_tests` is the current generated block. Definitions the reply does
/// not mention stay in the file, so only the failing tests need returning.
pub fn build_repair_prompt(test_output: &str, test_file: &str, latest_tests: &str) -> String {
    let latest_tests = if latest_tests.trim().is_empty() {
        "(not available)"
    } else {
        latest_tests.trim_end()
    };

    format!(
        "Tests failed. Analyze the error and fix it.\n\n\
        TEST RESULTS:\n\
        {test_output}\n\n\
        LATEST GENERATED TESTS IN {test_file}:\n\
        {latest_tests}\n\n\
        Return corrected versions of the failing test functions only, keeping their names.\n\
        Tests you do not return are kept unchanged.\n\
        DO NOT provide explanations, only code."
    )
}

/// Prompt asking for a short written analysis of the project's tests
pub fn build_analysis_prompt(context: &ProjectContext<'_>) -> String {
    format!(
        "PROJECT ANALYSIS:\n\n\
        Files: {}\n\
        Functions: {}\n\
        Tests: {}\n\
        Missing tests: {}\n\n\
        Test results:\n\
        {}\n\n\
        Coverage:\n\
        {}\n\n\
        Provide a brief, concise analysis of the project's test situation (max 200 words).",
        context.files.join(", "),
        context.functions.join(", "),
        context.tests.join(", "),
        context.missing.join(", "),
        context.test_results,
        context.coverage,
    )
}

/// Prompt asking for five numbered recommendations based on an analysis
pub fn build_recommendations_prompt(analysis: &str) -> String {
    format!(
        "Based on this analysis, provide 5 concrete recommendations to improve the project's tests.\n\n\
        {analysis}\n\n\
        Provide recommendations briefly and clearly in the format:\n\
        1. [Recommendation]\n\
        2. [Recommendation]\n\
        ...\n\n\
        FOCUS ON:\n\
        - Test quality\n\
        - Missing tests\n\
        - Improving test coverage\n\
        - Best practices"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_prompt_embeds_body_corpus_and_requirements() {
        let prompt = build_generation_prompt(
            "gcd",
            "def gcd(a, b):\n    return a\n",
            "def test_add():\n    pass\n",
        );

        assert!(prompt.contains("FUNCTION:\ndef gcd(a, b):\n    return a\n"));
        assert!(prompt.contains("EXISTING TESTS (don't repeat these):\ndef test_add():"));
        assert!(prompt.contains("1. Test function name: test_gcd"));
        assert!(prompt.contains("2. NEVER add import statements"));
        assert!(prompt.contains("3. Use function directly by name: gcd(...)"));
        assert!(prompt.contains("6. Test error conditions ONLY if function raises exceptions"));
        assert!(prompt.contains("8. DO NOT add explanations or comments"));
        assert!(prompt.contains("def test_power():\n    assert power(2, 3) == 8\n"));
        assert!(prompt.contains("    with pytest.raises(ValueError):\n        power(10, \"text\")"));
    }

    #[test]
    fn repair_prompt_includes_failure_output_and_latest_block() {
        let prompt = build_repair_prompt(
            "FAILED test_calculator.py::test_lcm",
            "test_calculator.py",
            "# AUTO-GENERATED TESTS\ndef test_gcd():\n    pass\n\ndef test_lcm():\n    assert lcm(4, 6) == 10\n\n",
        );
        assert!(prompt.starts_with("Tests failed."));
        assert!(prompt.contains("TEST RESULTS:\nFAILED test_calculator.py::test_lcm"));
        assert!(prompt.contains(
            "LATEST GENERATED TESTS IN test_calculator.py:\n# AUTO-GENERATED TESTS\ndef test_gcd():"
        ));
        assert!(prompt.contains("assert lcm(4, 6) == 10\n\nReturn corrected versions"));
        assert!(prompt.contains("keeping their names"));
    }

    #[test]
    fn repair_prompt_without_block_says_so() {
        let prompt = build_repair_prompt("FAILED", "test_calculator.py", "  \n");
        assert!(prompt.contains("LATEST GENERATED TESTS IN test_calculator.py:\n(not available)\n"));
    }

    #[test]
    fn analysis_prompt_lists_project_facts() {
        let files = vec!["calculator.py".to_string(), "test_calculator.py".to_string()];
        let functions = vec!["add".to_string(), "gcd".to_string()];
        let tests = vec!["test_add".to_string()];
        let missing = vec!["gcd".to_string()];
        let context = ProjectContext {
            files: &files,
            functions: &functions,
            tests: &tests,
            missing: &missing,
            test_results: "Return code: 0",
            coverage: "TOTAL 10 0 100%",
        };

        let prompt = build_analysis_prompt(&context);
        assert!(prompt.contains("Files: calculator.py, test_calculator.py"));
        assert!(prompt.contains("Functions: add, gcd"));
        assert!(prompt.contains("Missing tests: gcd"));
        assert!(prompt.contains("(max 200 words)"));
    }

    #[test]
    fn recommendations_prompt_wraps_analysis() {
        let prompt = build_recommendations_prompt("Coverage is low.");
        assert!(prompt.contains("provide 5 concrete recommendations"));
        assert!(prompt.contains("\n\nCoverage is low.\n\n"));
    }
}
