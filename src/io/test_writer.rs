//! Merging generated tests into a Python test file.
//!
//! A merge makes sure every function the new tests call is imported from the
//! target module, then appends a timestamped block holding the tests. A
//! repair swaps individual test definitions inside the latest block. The new
//! file content is composed in memory and written once.

use std::ops::Range;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::config::{ProjectConfig, WriterConfig};
use crate::core::errors::{Result, TestgapError};
use crate::core::file_utils::{write_atomic, FileReader};
use crate::core::run_report::GeneratedTest;

/// Rule line framing the generated-tests banner
pub const BANNER_RULE: &str = "# ========================================";

/// Title line of the generated-tests banner
pub const BANNER_TITLE: &str = "# AUTO-GENERATED TESTS";

/// One `from <module> import a, b` statement, names kept in order without repeats
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDeclaration {
    module: String,
    names: IndexSet<String>,
}

impl ImportDeclaration {
    /// An empty declaration for `module`
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            names: IndexSet::new(),
        }
    }

    /// Parse a single line importing from `module`.
    ///
    /// Only statements at column 0 count. A parenthesised list left open on
    /// this line is not a complete declaration and yields `None`.
    pub fn parse(line: &str, module: &str) -> Option<Self> {
        Self::parse_lines(&[line], module).map(|(declaration, _)| declaration)
    }

    /// Parse the statement starting at `lines[0]`, returning it with the
    /// number of lines it spans.
    ///
    /// Handles `from m import (a,\n    b,\n)` as well as the one-line forms.
    /// Trailing comments are dropped.
    pub fn parse_lines(lines: &[&str], module: &str) -> Option<(Self, usize)> {
        let prefix = format!("from {module} import ");
        let head = strip_comment(lines.first()?.strip_prefix(&prefix)?).trim();

        if !head.starts_with('(') || head.contains(')') {
            return Some((Self::with_names(module, head), 1));
        }

        let mut list = head.to_string();
        for (offset, line) in lines.iter().enumerate().skip(1) {
            let part = strip_comment(line);
            list.push(',');
            list.push_str(part);
            if part.contains(')') {
                return Some((Self::with_names(module, &list), offset + 1));
            }
        }
        None
    }

    fn with_names(module: &str, list: &str) -> Self {
        let mut declaration = Self::new(module);
        let list = list.replace(['(', ')'], "");
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            declaration.names.insert(name.to_string());
        }
        declaration
    }

    /// Imported names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Whether `name` is imported
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Append names not yet imported, returning the ones that were added
    pub fn extend<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut added = Vec::new();
        for name in names {
            if self.names.insert(name.to_string()) {
                added.push(name.to_string());
            }
        }
        added
    }

    /// Render back to a single source line
    pub fn render(&self) -> String {
        let names: Vec<&str> = self.names().collect();
        format!("from {} import {}", self.module, names.join(", "))
    }
}

fn strip_comment(line: &str) -> &str {
    line.split('#').next().unwrap_or_default()
}

/// What a merge changed in the test file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// File that was rewritten
    pub path: PathBuf,
    /// Number of tests appended or replaced
    pub tests_written: usize,
    /// Names added to the module import
    pub imports_added: Vec<String>,
    /// Duplicate import statements folded into the first one
    pub declarations_folded: usize,
}

/// Import bookkeeping for one content rewrite
#[derive(Debug, Default)]
struct ImportChanges {
    added: Vec<String>,
    folded: usize,
}

/// Writes generated tests into the module's test file
#[derive(Debug, Clone)]
pub struct TestFileWriter {
    module: String,
    test_prefix: String,
    exclusions: Vec<String>,
    assertion_import: String,
    call_target: Regex,
    test_definition: Regex,
}

impl TestFileWriter {
    /// Create a writer for the project's target module
    pub fn new(project: &ProjectConfig, config: &WriterConfig) -> Result<Self> {
        let call_target = Regex::new(r"\b(\w+)\s*\(")
            .map_err(|e| TestgapError::internal(format!("Invalid call pattern: {e}")))?;
        let test_definition = Regex::new(&format!(
            r"^(?:async\s+)?def\s+({}\w*)\s*\(",
            regex::escape(&project.test_prefix)
        ))
        .map_err(|e| TestgapError::internal(format!("Invalid definition pattern: {e}")))?;

        Ok(Self {
            module: project.target_module.clone(),
            test_prefix: project.test_prefix.clone(),
            exclusions: config.import_exclusions.clone(),
            assertion_import: config.assertion_import.clone(),
            call_target,
            test_definition,
        })
    }

    /// Identifiers called in `code` that must be imported from the module
    pub fn call_targets(&self, code: &str) -> IndexSet<String> {
        self.call_target
            .captures_iter(code)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|name| self.is_importable(name))
            .map(str::to_string)
            .collect()
    }

    fn is_importable(&self, name: &str) -> bool {
        !self.exclusions.iter().any(|e| e == name) && !name.starts_with(&self.test_prefix)
    }

    /// Names every generated test needs: its target, then what it calls
    pub fn required_names(&self, tests: &[GeneratedTest]) -> IndexSet<String> {
        let mut required = IndexSet::new();
        for test in tests {
            required.insert(test.function.clone());
            required.extend(self.call_targets(&test.code));
        }
        required
    }

    /// Top-level test definitions in `lines` with their line spans.
    ///
    /// A span starts at the decorators directly above the `def` and ends
    /// after its last indented line, before any trailing blank lines.
    fn test_definitions(&self, lines: &[&str]) -> Vec<(String, Range<usize>)> {
        let mut found = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let Some(name) = self
                .test_definition
                .captures(lines[i])
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
            else {
                i += 1;
                continue;
            };

            let mut start = i;
            while start > 0 && lines[start - 1].starts_with('@') {
                start -= 1;
            }

            let mut end = i + 1;
            let mut last = end;
            while end < lines.len() {
                let line = lines[end];
                if line.trim().is_empty() {
                    end += 1;
                } else if line.starts_with(char::is_whitespace) {
                    end += 1;
                    last = end;
                } else {
                    break;
                }
            }

            found.push((name, start..last));
            i = end;
        }

        found
    }

    /// Append `tests` to the file at `path` and fix up its module import.
    ///
    /// Nothing is written when `tests` is empty. Merging the same tests
    /// twice appends them twice.
    pub fn merge(
        &self,
        path: &Path,
        tests: &[GeneratedTest],
        timestamp: &str,
    ) -> Result<MergeOutcome> {
        if tests.is_empty() {
            return Ok(MergeOutcome {
                path: path.to_path_buf(),
                ..MergeOutcome::default()
            });
        }

        info!("Writing {} tests to {}", tests.len(), path.display());
        let existing = FileReader::read_for_rewrite(path)?;
        let required = self.required_names(tests);

        let (mut content, changes) = self.merge_imports(&existing, &required);
        content.push_str(&render_banner(timestamp));
        for test in tests {
            content.push_str(&format!("# Test for function: {}\n", test.function));
            content.push_str(&test.code);
            content.push_str("\n\n");
        }

        write_atomic(path, &content)?;

        if !changes.added.is_empty() {
            info!("Added imports: {}", changes.added.join(", "));
        }

        Ok(MergeOutcome {
            path: path.to_path_buf(),
            tests_written: tests.len(),
            imports_added: changes.added,
            declarations_folded: changes.folded,
        })
    }

    /// Text of the latest generated block, banner included
    pub fn latest_block(&self, path: &Path) -> Result<Option<String>> {
        let existing = FileReader::read_for_rewrite(path)?;
        Ok(latest_block_start(&existing).map(|start| existing[start..].to_string()))
    }

    /// Swap test definitions in the latest generated block for repaired ones.
    ///
    /// Each `def test_*` in `code` replaces the definition of the same name in
    /// the latest block. Definitions the block does not hold are ignored, and
    /// every other test in the file is kept. The file is left untouched when
    /// nothing matches; `tests_written` counts the replaced definitions.
    pub fn replace_latest_block(&self, path: &Path, code: &str) -> Result<MergeOutcome> {
        let mut outcome = MergeOutcome {
            path: path.to_path_buf(),
            ..MergeOutcome::default()
        };

        let existing = FileReader::read_for_rewrite(path)?;
        let Some(block_start) = latest_block_start(&existing) else {
            debug!("No generated block in {}", path.display());
            return Ok(outcome);
        };
        let (head, block) = existing.split_at(block_start);

        let fix_lines: Vec<&str> = code.lines().collect();
        let mut block_lines: Vec<&str> = block.split('\n').collect();
        let mut replaced = Vec::new();

        for (name, span) in self.test_definitions(&fix_lines) {
            let target = self
                .test_definitions(&block_lines)
                .into_iter()
                .find(|(existing_name, _)| *existing_name == name);

            match target {
                Some((_, range)) => {
                    debug!("Replacing generated {} in {}", name, path.display());
                    block_lines.splice(range, fix_lines[span.clone()].iter().copied());
                    replaced.push(fix_lines[span].join("\n"));
                }
                None => debug!("No generated {} to replace in {}", name, path.display()),
            }
        }

        if replaced.is_empty() {
            return Ok(outcome);
        }

        let content = format!("{head}{}", block_lines.join("\n"));
        let required = self.call_targets(&replaced.join("\n"));
        let (content, changes) = self.merge_imports(&content, &required);

        write_atomic(path, &content)?;

        outcome.tests_written = replaced.len();
        outcome.imports_added = changes.added;
        outcome.declarations_folded = changes.folded;
        Ok(outcome)
    }

    /// Make the module import in `content` cover `required`.
    ///
    /// The first declaration absorbs later duplicates and any missing names,
    /// and is rewritten as one line. Without a declaration a header is
    /// prepended listing the names sorted.
    fn merge_imports(&self, content: &str, required: &IndexSet<String>) -> (String, ImportChanges) {
        let lines: Vec<&str> = content.split('\n').collect();
        let mut spans: Vec<(Range<usize>, ImportDeclaration)> = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            match ImportDeclaration::parse_lines(&lines[i..], &self.module) {
                Some((declaration, len)) => {
                    spans.push((i..i + len, declaration));
                    i += len;
                }
                None => i += 1,
            }
        }

        let mut changes = ImportChanges::default();

        let Some(((first_span, first), rest)) = spans.split_first() else {
            if required.is_empty() {
                return (content.to_string(), changes);
            }

            let mut names: Vec<&str> = required.iter().map(String::as_str).collect();
            names.sort_unstable();
            changes.added = names.iter().map(|n| n.to_string()).collect();

            let header = format!(
                "{}\nfrom {} import {}\n",
                self.assertion_import,
                self.module,
                names.join(", ")
            );
            let merged = if content.trim().is_empty() {
                header
            } else {
                format!("{header}\n{content}")
            };
            return (merged, changes);
        };

        let mut declaration = first.clone();
        for (_, duplicate) in rest {
            declaration.extend(duplicate.names());
        }
        changes.folded = rest.len();
        changes.added = declaration.extend(required.iter().map(String::as_str));

        let rendered = declaration.render();
        let mut merged: Vec<&str> = Vec::with_capacity(lines.len());
        for (index, &line) in lines.iter().enumerate() {
            if index == first_span.start {
                merged.push(&rendered);
            } else if first_span.contains(&index) || rest.iter().any(|(span, _)| span.contains(&index)) {
                continue;
            } else {
                merged.push(line);
            }
        }

        (merged.join("\n"), changes)
    }
}

fn latest_block_start(content: &str) -> Option<usize> {
    content.rfind(&format!("{BANNER_RULE}\n{BANNER_TITLE}\n"))
}

fn render_banner(timestamp: &str) -> String {
    format!("\n\n{BANNER_RULE}\n{BANNER_TITLE}\n# Generated: {timestamp}\n{BANNER_RULE}\n\n")
}
