//! Test runner for Cedar test files
//!
//! Discovers `test-*.cdr` files, runs each through the full pipeline,
//! and checks the expectation annotations embedded in the source:
//!
//! ```text
//! //: expect-error TYPE_DISAGREEMENT
//! //: expect-check 15
//! //: expect-output hello
//! ```
//!
//! `expect-error` compares against the first latched error code (`OK`
//! asserts a clean run). `expect-check` compares the module symbol named
//! `check` by tag and payload — floats bit-exactly, since literals are
//! expected to round-trip unchanged. `expect-output` lines must match
//! the captured `print` output in order.

use crate::errors::ErrorCode;
use crate::value::{Payload, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Result of checking a single expectation.
#[derive(Debug)]
pub struct TestResult {
    /// Name of the expectation, e.g. `error` or `check`.
    pub name: String,
    pub passed: bool,
    /// Explanation when the expectation failed.
    pub detail: Option<String>,
}

/// Results for a single test file.
#[derive(Debug)]
pub struct FileTestResults {
    pub path: PathBuf,
    pub tests: Vec<TestResult>,
    /// Set when the file could not be processed at all.
    pub error: Option<String>,
}

/// Summary of all test results.
#[derive(Debug, Default)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub file_results: Vec<FileTestResults>,
}

/// One annotation parsed out of a test file.
#[derive(Debug, Clone, PartialEq)]
enum Expectation {
    Error(ErrorCode),
    Check(ExpectedValue),
    Output(String),
}

/// A literal from an `expect-check` annotation.
#[derive(Debug, Clone, PartialEq)]
enum ExpectedValue {
    Int(i64),
    Uint(u64),
    Float(f64),
    Char(char),
    Str(String),
    Bool(bool),
}

impl ExpectedValue {
    fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();

        if text == "true" || text == "false" {
            return Ok(ExpectedValue::Bool(text == "true"));
        }
        if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
            return Ok(ExpectedValue::Str(inner.to_string()));
        }
        if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
            let mut chars = inner.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return Ok(ExpectedValue::Char(c));
            }
            return Err(format!("Invalid char literal '{}'", text));
        }
        if let Some(hex) = text.strip_prefix("0x") {
            return u64::from_str_radix(hex, 16)
                .map(ExpectedValue::Uint)
                .map_err(|e| format!("Invalid hex literal '{}': {}", text, e));
        }
        if text.contains('.') {
            return text
                .parse::<f64>()
                .map(ExpectedValue::Float)
                .map_err(|e| format!("Invalid float literal '{}': {}", text, e));
        }
        text.parse::<i64>()
            .map(ExpectedValue::Int)
            .map_err(|e| format!("Invalid integer literal '{}': {}", text, e))
    }

    /// Tag-aware payload comparison, the way the harness defines value
    /// equality: exact integers, bit-exact floats.
    fn matches(&self, value: &Value) -> bool {
        match (self, &value.payload) {
            (ExpectedValue::Int(expected), Payload::Int(actual)) => expected == actual,
            (ExpectedValue::Int(expected), Payload::Uint(actual)) => {
                *expected >= 0 && *expected as u64 == *actual
            }
            (ExpectedValue::Uint(expected), Payload::Uint(actual)) => expected == actual,
            (ExpectedValue::Uint(expected), Payload::Int(actual)) => {
                *actual >= 0 && *expected == *actual as u64
            }
            (ExpectedValue::Float(expected), Payload::Float(actual)) => {
                expected.to_bits() == actual.to_bits()
            }
            (ExpectedValue::Char(expected), Payload::Char(actual)) => expected == actual,
            (ExpectedValue::Str(expected), Payload::Str(actual)) => expected == actual,
            (ExpectedValue::Bool(expected), Payload::Bool(actual)) => expected == actual,
            _ => false,
        }
    }
}

pub struct TestRunner {
    pub verbose: bool,
    /// Only files whose name contains this pattern run.
    pub filter: Option<String>,
}

impl TestRunner {
    pub fn new(verbose: bool, filter: Option<String>) -> Self {
        TestRunner { verbose, filter }
    }

    /// Discover test files in the given paths, recursively.
    pub fn discover_test_files(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        let mut test_files = Vec::new();
        for path in paths {
            if path.is_file() {
                if self.is_test_file(path) {
                    test_files.push(path.clone());
                }
            } else if path.is_dir() {
                self.discover_in_directory(path, &mut test_files);
            }
        }
        test_files.sort();
        test_files
    }

    fn is_test_file(&self, path: &Path) -> bool {
        let matches_shape = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|name| name.starts_with("test-") && name.ends_with(".cdr"))
            .unwrap_or(false);

        matches_shape
            && match &self.filter {
                Some(pattern) => path.to_string_lossy().contains(pattern.as_str()),
                None => true,
            }
    }

    fn discover_in_directory(&self, dir: &Path, files: &mut Vec<PathBuf>) {
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() && self.is_test_file(&path) {
                    files.push(path);
                } else if path.is_dir() {
                    self.discover_in_directory(&path, files);
                }
            }
        }
    }

    /// Pull the `//:` annotations out of a source file.
    fn parse_expectations(source: &str) -> Result<Vec<Expectation>, String> {
        let mut expectations = Vec::new();

        for line in source.lines() {
            let Some(annotation) = line.trim().strip_prefix("//:") else {
                continue;
            };
            let annotation = annotation.trim();

            if let Some(code) = annotation.strip_prefix("expect-error") {
                let code = code
                    .trim()
                    .parse::<ErrorCode>()
                    .map_err(|e| format!("Bad expect-error annotation: {}", e))?;
                expectations.push(Expectation::Error(code));
            } else if let Some(value) = annotation.strip_prefix("expect-check") {
                expectations.push(Expectation::Check(ExpectedValue::parse(value)?));
            } else if let Some(text) = annotation.strip_prefix("expect-output") {
                expectations.push(Expectation::Output(
                    text.strip_prefix(' ').unwrap_or(text).to_string(),
                ));
            } else {
                return Err(format!("Unknown annotation '//: {}'", annotation));
            }
        }

        Ok(expectations)
    }

    /// Run one file and check all of its expectations.
    pub fn run_file(&self, path: &Path) -> FileTestResults {
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                return FileTestResults {
                    path: path.to_path_buf(),
                    tests: vec![],
                    error: Some(format!("Failed to read file: {}", e)),
                };
            }
        };

        let expectations = match Self::parse_expectations(&source) {
            Ok(e) => e,
            Err(message) => {
                return FileTestResults {
                    path: path.to_path_buf(),
                    tests: vec![],
                    error: Some(message),
                };
            }
        };

        let filename = path.to_string_lossy();
        let outcome = match crate::run_source_quiet(&filename, &source) {
            Ok(o) => o,
            Err(e) => {
                return FileTestResults {
                    path: path.to_path_buf(),
                    tests: vec![],
                    error: Some(format!("Runtime error: {}", e)),
                };
            }
        };

        let mut tests = Vec::new();
        let mut output_index = 0;

        for expectation in &expectations {
            let result = match expectation {
                Expectation::Error(expected) => {
                    let passed = outcome.error_code == *expected;
                    TestResult {
                        name: "error".to_string(),
                        passed,
                        detail: (!passed).then(|| {
                            format!("expected '{}', got '{}'", expected, outcome.error_code)
                        }),
                    }
                }

                Expectation::Check(expected) => match outcome.symbols.retrieve_by_name("check") {
                    Some(symbol) => {
                        let passed = expected.matches(&symbol.value);
                        TestResult {
                            name: "check".to_string(),
                            passed,
                            detail: (!passed).then(|| {
                                format!("expected {:?}, got {}", expected, symbol.value)
                            }),
                        }
                    }
                    None => TestResult {
                        name: "check".to_string(),
                        passed: false,
                        detail: Some("no symbol named 'check'".to_string()),
                    },
                },

                Expectation::Output(expected) => {
                    let actual = outcome.output.get(output_index);
                    output_index += 1;
                    let passed = actual.map(|a| a == expected).unwrap_or(false);
                    TestResult {
                        name: format!("output[{}]", output_index - 1),
                        passed,
                        detail: (!passed).then(|| {
                            format!("expected '{}', got {:?}", expected, actual)
                        }),
                    }
                }
            };
            tests.push(result);
        }

        FileTestResults {
            path: path.to_path_buf(),
            tests,
            error: None,
        }
    }

    /// Run tests and accumulate the summary.
    pub fn run(&self, paths: &[PathBuf]) -> TestSummary {
        let test_files = self.discover_test_files(paths);
        let mut summary = TestSummary::default();

        for path in test_files {
            let file_results = self.run_file(&path);

            for test in &file_results.tests {
                summary.total += 1;
                if test.passed {
                    summary.passed += 1;
                } else {
                    summary.failed += 1;
                }
            }

            summary.file_results.push(file_results);
        }

        summary
    }

    /// Print test results to the terminal.
    pub fn print_results(&self, summary: &TestSummary) {
        for file_result in &summary.file_results {
            if let Some(ref error) = file_result.error {
                eprintln!("\nFailed to process {}:", file_result.path.display());
                eprintln!("  {}", error);
                continue;
            }

            if file_result.tests.is_empty() {
                continue;
            }

            let all_passed = file_result.tests.iter().all(|t| t.passed);
            if self.verbose || !all_passed {
                println!("\n{}:", file_result.path.display());
                for test in &file_result.tests {
                    let status = if test.passed { "ok" } else { "FAILED" };
                    match &test.detail {
                        Some(detail) => println!("  {} ... {} ({})", test.name, status, detail),
                        None => println!("  {} ... {}", test.name, status),
                    }
                }
            }
        }

        println!(
            "\nResults: {} passed, {} failed",
            summary.passed, summary.failed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_test_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_is_test_file() {
        let runner = TestRunner::new(false, None);
        assert!(runner.is_test_file(Path::new("test-enums.cdr")));
        assert!(!runner.is_test_file(Path::new("enums.cdr")));
        assert!(!runner.is_test_file(Path::new("test-enums.txt")));
    }

    #[test]
    fn test_filter_narrows_discovery() {
        let dir = tempfile::tempdir().unwrap();
        write_test_file(dir.path(), "test-ints.cdr", "");
        write_test_file(dir.path(), "test-bools.cdr", "");

        let runner = TestRunner::new(false, Some("bools".to_string()));
        let files = runner.discover_test_files(&[dir.path().to_path_buf()]);
        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().contains("bools"));
    }

    #[test]
    fn test_parse_expectations() {
        let source = "\
//: expect-error OK
//: expect-check 15
//: expect-output hello
i64 check = 15;
print(\"hello\");
";
        let expectations = TestRunner::parse_expectations(source).unwrap();
        assert_eq!(expectations.len(), 3);
        assert_eq!(expectations[0], Expectation::Error(ErrorCode::Ok));
        assert_eq!(
            expectations[1],
            Expectation::Check(ExpectedValue::Int(15))
        );
        assert_eq!(
            expectations[2],
            Expectation::Output("hello".to_string())
        );
    }

    #[test]
    fn test_bad_annotation_is_reported() {
        assert!(TestRunner::parse_expectations("//: expect-error NOT_A_CODE\n").is_err());
        assert!(TestRunner::parse_expectations("//: expect-everything\n").is_err());
    }

    #[test]
    fn test_expected_value_parsing() {
        assert_eq!(ExpectedValue::parse("15").unwrap(), ExpectedValue::Int(15));
        assert_eq!(ExpectedValue::parse("-3").unwrap(), ExpectedValue::Int(-3));
        assert_eq!(
            ExpectedValue::parse("0xFF").unwrap(),
            ExpectedValue::Uint(255)
        );
        assert_eq!(
            ExpectedValue::parse("4.5").unwrap(),
            ExpectedValue::Float(4.5)
        );
        assert_eq!(
            ExpectedValue::parse("true").unwrap(),
            ExpectedValue::Bool(true)
        );
        assert_eq!(
            ExpectedValue::parse("'x'").unwrap(),
            ExpectedValue::Char('x')
        );
        assert_eq!(
            ExpectedValue::parse("\"hi\"").unwrap(),
            ExpectedValue::Str("hi".to_string())
        );
    }

    #[test]
    fn test_passing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_file(
            dir.path(),
            "test-add.cdr",
            "//: expect-error OK\n//: expect-check 15\ni64 check = 10;\ncheck += 5;\n",
        );

        let runner = TestRunner::new(false, None);
        let results = runner.run_file(&path);
        assert!(results.error.is_none());
        assert_eq!(results.tests.len(), 2);
        assert!(results.tests.iter().all(|t| t.passed));
    }

    #[test]
    fn test_expected_error_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_file(
            dir.path(),
            "test-overflow.cdr",
            "//: expect-error TYPE_DISAGREEMENT\ni8 check = 128;\n",
        );

        let runner = TestRunner::new(false, None);
        let results = runner.run_file(&path);
        assert_eq!(results.tests.len(), 1);
        assert!(results.tests[0].passed);
    }

    #[test]
    fn test_failing_expectation_has_detail() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_file(
            dir.path(),
            "test-wrong.cdr",
            "//: expect-check 99\ni64 check = 1;\n",
        );

        let runner = TestRunner::new(false, None);
        let results = runner.run_file(&path);
        assert!(!results.tests[0].passed);
        assert!(results.tests[0].detail.as_ref().unwrap().contains("99"));
    }

    #[test]
    fn test_output_expectations_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_file(
            dir.path(),
            "test-output.cdr",
            "//: expect-output 1\n//: expect-output 2\nprint(1);\nprint(2);\n",
        );

        let runner = TestRunner::new(false, None);
        let results = runner.run_file(&path);
        assert!(results.tests.iter().all(|t| t.passed));
    }

    #[test]
    fn test_summary_accumulates_per_file() {
        let dir = tempfile::tempdir().unwrap();
        write_test_file(
            dir.path(),
            "test-a.cdr",
            "//: expect-check 1\ni64 check = 1;\n",
        );
        write_test_file(
            dir.path(),
            "test-b.cdr",
            "//: expect-check 2\ni64 check = 3;\n",
        );

        let runner = TestRunner::new(false, None);
        let summary = runner.run(&[dir.path().to_path_buf()]);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.file_results.len(), 2);
    }

    #[test]
    fn test_float_check_is_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_file(
            dir.path(),
            "test-float.cdr",
            "//: expect-check 4.5\nf32 check = 4.5;\n",
        );

        let runner = TestRunner::new(false, None);
        let results = runner.run_file(&path);
        assert!(results.tests[0].passed);
    }
}
