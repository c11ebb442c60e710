//! Python function discovery.
//!
//! Two strategies share one interface:
//!
//! - **Line prefix** (default): a line is a definition when, after leading
//!   whitespace, it starts with `def ` but not `def __`. The name runs up to
//!   the first `(`. Bodies are sliced by indentation. There is no scope
//!   awareness, so methods and functions nested in conditionals are captured
//!   too, and multi-line signatures are only seen by their first line.
//! - **Syntax tree**: tree-sitter-python `function_definition` nodes, with the
//!   same dunder exclusion. Bodies are exact node ranges (decorators included).

use tree_sitter::{Language, Node, Parser};

use crate::core::config::ExtractionStrategy;
use crate::core::errors::{Result, TestgapError};

const DEF_KEYWORD: &str = "def ";
const DUNDER_DEF: &str = "def __";

/// Extract function names using the line-prefix heuristic, in source order.
pub fn extract_functions(source: &str) -> Vec<String> {
    source
        .split('\n')
        .filter_map(|line| {
            let trimmed = line.trim();
            if !trimmed.starts_with(DEF_KEYWORD) || trimmed.starts_with(DUNDER_DEF) {
                return None;
            }
            let signature = trimmed.split('(').next().unwrap_or(trimmed);
            Some(signature.replacen(DEF_KEYWORD, "", 1))
        })
        .collect()
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Slice the source of `name` out of `source` by indentation.
///
/// Capture starts at the first line containing `def <name>(` and continues
/// until a non-blank, non-comment line whose indentation is at most the
/// definition's; that boundary line is excluded. Blank and comment lines
/// between functions stay attached to the preceding body. Every captured line
/// keeps a trailing newline.
pub fn extract_function_body(source: &str, name: &str) -> Option<String> {
    let signature = format!("{DEF_KEYWORD}{name}(");
    let mut lines = source.split('\n');

    let header = lines.by_ref().find(|line| line.contains(&signature))?;
    let depth = indentation(header);
    let mut body = format!("{header}\n");

    for line in lines {
        let trimmed = line.trim();
        if !trimmed.is_empty() && indentation(line) <= depth && !trimmed.starts_with('#') {
            break;
        }
        body.push_str(line);
        body.push('\n');
    }

    Some(body)
}

/// tree-sitter backed function extraction
pub struct SyntaxTreeExtractor {
    parser: Parser,
}

impl SyntaxTreeExtractor {
    /// Create a new extractor with the Python grammar loaded
    pub fn new() -> Result<Self> {
        let language: Language = tree_sitter_python::LANGUAGE.into();
        let mut parser = Parser::new();
        parser.set_language(&language).map_err(|e| {
            TestgapError::parse("python", format!("Failed to set Python language: {e:?}"))
        })?;

        Ok(Self { parser })
    }

    /// All non-dunder function names in source order
    pub fn functions(&mut self, source: &str) -> Result<Vec<String>> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| TestgapError::parse("python", "Failed to parse Python source code"))?;

        let mut names = Vec::new();
        for node in definitions(tree.root_node()) {
            let name = definition_name(node, source)?;
            if !name.starts_with("__") {
                names.push(name.to_string());
            }
        }

        Ok(names)
    }

    /// Source text of the first definition named `name`, decorators included
    pub fn function_body(&mut self, source: &str, name: &str) -> Result<Option<String>> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| TestgapError::parse("python", "Failed to parse Python source code"))?;

        for node in definitions(tree.root_node()) {
            if definition_name(node, source)? != name {
                continue;
            }

            let span = match node.parent() {
                Some(parent) if parent.kind() == "decorated_definition" => parent,
                _ => node,
            };
            let text = span.utf8_text(source.as_bytes())?;
            return Ok(Some(format!("{text}\n")));
        }

        Ok(None)
    }
}

/// Pre-order walk collecting `function_definition` nodes
fn definitions(root: Node<'_>) -> Vec<Node<'_>> {
    let mut found = Vec::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if node.kind() == "function_definition" {
            found.push(node);
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    found
}

fn definition_name<'a>(node: Node<'_>, source: &'a str) -> Result<&'a str> {
    let name_node = node
        .child_by_field_name("name")
        .ok_or_else(|| TestgapError::parse("python", "function definition without a name"))?;
    Ok(name_node.utf8_text(source.as_bytes())?)
}

/// Function extraction dispatching on the configured strategy
pub enum FunctionExtractor {
    /// Line-prefix heuristic
    LinePrefix,
    /// tree-sitter walk
    SyntaxTree(SyntaxTreeExtractor),
}

impl FunctionExtractor {
    /// Build the extractor for a configured strategy
    pub fn for_strategy(strategy: ExtractionStrategy) -> Result<Self> {
        match strategy {
            ExtractionStrategy::LinePrefix => Ok(Self::LinePrefix),
            ExtractionStrategy::SyntaxTree => Ok(Self::SyntaxTree(SyntaxTreeExtractor::new()?)),
        }
    }

    /// Function names defined in `source`
    pub fn functions(&mut self, source: &str) -> Result<Vec<String>> {
        match self {
            Self::LinePrefix => Ok(extract_functions(source)),
            Self::SyntaxTree(extractor) => extractor.functions(source),
        }
    }

    /// Source of the function named `name`, if defined
    pub fn function_body(&mut self, source: &str, name: &str) -> Result<Option<String>> {
        match self {
            Self::LinePrefix => Ok(extract_function_body(source, name)),
            Self::SyntaxTree(extractor) => extractor.function_body(source, name),
        }
    }
}
