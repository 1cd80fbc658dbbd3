//! Cedar compiler library
//!
//! Front-end pipeline for the Cedar language: lexer, Pratt parser with
//! inline declaration bookkeeping, type checker with literal-width
//! inference, and a tree-walking interpreter over the decorated AST.
//!
//! ```rust,ignore
//! let outcome = cedarc::run_source("demo.cdr", "i64 x = 10; print(x);")?;
//! assert_eq!(outcome.error_code, cedarc::ErrorCode::Ok);
//! ```
//!
//! Errors follow a first-error-wins discipline: every phase keeps going
//! to surface as many diagnostics as it can, but only the first
//! `ErrorCode` is reported as the result of the run. Internal faults
//! (compiler or interpreter bugs, runtime arithmetic traps) surface as
//! `Err` instead and never latch.

pub mod ast;
pub mod config;
pub mod errors;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod symbol_table;
pub mod test_runner;
pub mod token;
pub mod typechecker;
pub mod types;
pub mod value;

pub use ast::{AstNode, NodeKind};
pub use config::CompilerConfig;
pub use errors::{ErrorCode, Reporter};
pub use interpreter::Interpreter;
pub use lexer::Lexer;
pub use parser::Parser;
pub use symbol_table::{DeclarationState, ScopeStack, Symbol, SymbolTable};
pub use test_runner::{TestRunner, TestSummary};
pub use token::{Token, TokenKind};
pub use typechecker::TypeChecker;
pub use types::{Type, TypeCategory, TypeSpecifier};
pub use value::{Payload, Value};

use std::fs;
use std::path::Path;

/// Everything the front end produced for one source file.
pub struct Compilation {
    pub ast: AstNode,
    pub symbols: SymbolTable,
    /// First latched error, `Ok` for a clean compile.
    pub error_code: ErrorCode,
}

/// Result of compiling and interpreting one source file.
pub struct RunOutcome {
    pub error_code: ErrorCode,
    /// Module scope after execution; the harness reads `check` from here.
    pub symbols: SymbolTable,
    /// Lines `print` produced, in order.
    pub output: Vec<String>,
}

/// Lex, parse, and type-check a source string.
pub fn compile(filename: &str, source: &str) -> Compilation {
    compile_with(filename, source, false, None)
}

fn compile_with(
    filename: &str,
    source: &str,
    quiet: bool,
    max_errors: Option<usize>,
) -> Compilation {
    let mut reporter = Reporter::new(filename, source);
    if quiet {
        reporter = reporter.quiet();
    }
    if let Some(max) = max_errors {
        reporter = reporter.with_max_printed(max);
    }

    tracing::debug!(filename, bytes = source.len(), "compiling");

    let parser = Parser::new(source, &mut reporter);
    let (mut ast, mut symbols) = parser.build_ast();

    TypeChecker::new(&mut symbols, &mut reporter).check(&mut ast);

    Compilation {
        ast,
        symbols,
        error_code: reporter.latched(),
    }
}

/// Compile a source string and, when it is clean, interpret it.
///
/// User-level errors come back inside the outcome as the latched code.
/// `Err` is reserved for interpreter-internal faults.
pub fn run_source(filename: &str, source: &str) -> Result<RunOutcome, String> {
    run_with(filename, source, false, None)
}

/// Like [`run_source`], with configuration applied (diagnostic cap).
pub fn run_source_with_config(
    filename: &str,
    source: &str,
    config: &CompilerConfig,
) -> Result<RunOutcome, String> {
    run_with(filename, source, false, config.max_errors)
}

/// Like [`run_source`], but diagnostics and `print` output stay captured
/// instead of reaching the terminal. Tests and the harness run this way.
pub fn run_source_quiet(filename: &str, source: &str) -> Result<RunOutcome, String> {
    run_with(filename, source, true, None)
}

fn run_with(
    filename: &str,
    source: &str,
    quiet: bool,
    max_errors: Option<usize>,
) -> Result<RunOutcome, String> {
    let compilation = compile_with(filename, source, quiet, max_errors);

    if compilation.error_code != ErrorCode::Ok {
        return Ok(RunOutcome {
            error_code: compilation.error_code,
            symbols: compilation.symbols,
            output: Vec::new(),
        });
    }

    let mut interpreter = Interpreter::new(compilation.symbols);
    if quiet {
        interpreter = interpreter.quiet();
    }
    interpreter.interpret(&compilation.ast)?;

    let output = interpreter.output.clone();
    Ok(RunOutcome {
        error_code: ErrorCode::Ok,
        symbols: interpreter.into_module(),
        output,
    })
}

/// Read and run a source file from disk.
pub fn run_file(path: &Path) -> Result<RunOutcome, String> {
    let source = fs::read_to_string(path)
        .map_err(|e| format!("Could not read {}: {}", path.display(), e))?;
    let filename = path.to_string_lossy();
    run_source(&filename, &source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_run_end_to_end() {
        let outcome = run_source_quiet("test.txt", "i64 x = 10; x += 5; print(x);").unwrap();
        assert_eq!(outcome.error_code, ErrorCode::Ok);
        assert_eq!(outcome.output, vec!["15"]);
        assert_eq!(
            outcome.symbols.retrieve_by_name("x").unwrap().value.payload,
            Payload::Int(15)
        );
    }

    #[test]
    fn test_compile_errors_skip_interpretation() {
        let outcome = run_source_quiet("test.txt", "i8 check = 128; print(check);").unwrap();
        assert_eq!(outcome.error_code, ErrorCode::TypeDisagreement);
        assert!(outcome.output.is_empty());
    }

    #[test]
    fn test_internal_fault_is_err() {
        let result = run_source_quiet("test.txt", "i64 a = 1; i64 b = 0; i64 c = a / b;");
        assert!(result.is_err());
    }

    #[test]
    fn test_compile_reports_first_error_only() {
        let compilation = compile_with("test.txt", "u8 a = 0x1FF; bool b = 3;", true, None);
        assert_eq!(compilation.error_code, ErrorCode::TypeDisagreement);
    }
}
