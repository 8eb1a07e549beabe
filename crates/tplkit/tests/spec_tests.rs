//! Integration tests using shared test cases from tests/*.json

use pretty_assertions::assert_eq;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tplkit::{render, ParseError, TemplateError};

#[derive(Debug, Deserialize)]
struct TestSuite {
    #[allow(dead_code)]
    description: String,
    tests: Vec<TestCase>,
}

#[derive(Debug, Deserialize)]
struct TestCase {
    name: String,
    template: String,
    data: serde_json::Value,
    #[serde(default)]
    expected: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn get_tests_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("tests")
}

fn load_test_suite(filename: &str) -> TestSuite {
    let path = get_tests_dir().join(filename);
    let content = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
    serde_json::from_str(&content).unwrap_or_else(|e| panic!("Failed to parse {filename}: {e}"))
}

/// Variant name used by the `error` field of a test case. Parse errors are
/// named by their inner variant.
fn error_kind(e: &TemplateError) -> &'static str {
    match e {
        TemplateError::Parse(ParseError::MalformedTag { .. }) => "MalformedTag",
        TemplateError::Parse(ParseError::MissingAttribute { .. }) => "MissingAttribute",
        TemplateError::Parse(ParseError::DepthExceeded { .. }) => "DepthExceeded",
        TemplateError::UnresolvedVariable { .. } => "UnresolvedVariable",
        TemplateError::TypeMismatch { .. } => "TypeMismatch",
        TemplateError::InvalidExpression { .. } => "InvalidExpression",
        TemplateError::ArithmeticError { .. } => "ArithmeticError",
        TemplateError::ResourceNotFound { .. } => "ResourceNotFound",
        TemplateError::ResourceLoad { .. } => "ResourceLoad",
        TemplateError::CyclicInclude { .. } => "CyclicInclude",
        TemplateError::DepthExceeded { .. } => "DepthExceeded",
        TemplateError::InvalidContext { .. } => "InvalidContext",
        TemplateError::Config(_) => "Config",
    }
}

fn run_test_case(case: &TestCase) {
    let result = render(&case.template, case.data.clone());

    match (&case.expected, &case.error, result) {
        (Some(expected), _, Ok(output)) => {
            assert_eq!(&output, expected, "Test '{}' rendered wrong output", case.name)
        }
        (Some(expected), _, Err(e)) => panic!(
            "Test '{}' should succeed with '{}', but got error: {:?}",
            case.name, expected, e
        ),
        (None, Some(error_type), Ok(output)) => panic!(
            "Test '{}' should fail with {}, but succeeded with '{}'",
            case.name, error_type, output
        ),
        (None, Some(error_type), Err(e)) => assert_eq!(
            error_kind(&e),
            error_type.as_str(),
            "Test '{}' failed with unexpected error: {e}",
            case.name
        ),
        (None, None, _) => panic!("Test '{}' has neither expected nor error", case.name),
    }
}

fn run_test_suite(filename: &str) {
    let suite = load_test_suite(filename);
    assert!(!suite.tests.is_empty(), "{filename} has no tests");

    for case in &suite.tests {
        run_test_case(case);
    }

    eprintln!("{}: {} tests passed", filename, suite.tests.len());
}

#[test]
fn test_basic() {
    run_test_suite("basic.json");
}

#[test]
fn test_blocks() {
    run_test_suite("blocks.json");
}

#[test]
fn test_expressions() {
    run_test_suite("expressions.json");
}

#[test]
fn test_errors() {
    run_test_suite("errors.json");
}
