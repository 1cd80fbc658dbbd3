//! Diagnostics
//!
//! Every user-visible failure is one of a closed set of `ErrorCode`s. The
//! `Reporter` owns the source text for caret rendering and latches the
//! first non-OK code; later errors still print so a run surfaces multiple
//! diagnostics, but they never overwrite the latch. Internal compiler and
//! interpreter faults do not go through the latch at all — they bubble up
//! as `Err(String)` and terminate with a distinct exit code.

use crate::token::Token;
use std::fmt;
use std::str::FromStr;

/// Closed taxonomy of user-visible error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorCode {
    #[default]
    Ok,
    Undeclared,
    Undefined,
    Uninitialized,
    Redeclared,
    Unexpected,
    TypeDisagreement,
    ImproperDeclaration,
    ImproperAssignment,
    ImproperAccess,
    Overflow,
    Underflow,
    TooMany,
    TooFew,
    EmptyBody,
    UnreachableCode,
    LexerError,
    MissingSize,
    MissingSemicolon,
    MissingReturn,
    Pebcak,
    Misc,
    Unknown,
    /// Internal fault in the front-end machinery. Not latchable.
    Compiler,
    /// Internal fault in the evaluator. Not latchable.
    Interpreter,
}

impl ErrorCode {
    /// Stable identifier used by harness annotations.
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::Ok => "OK",
            ErrorCode::Undeclared => "UNDECLARED",
            ErrorCode::Undefined => "UNDEFINED",
            ErrorCode::Uninitialized => "UNINITIALIZED",
            ErrorCode::Redeclared => "REDECLARED",
            ErrorCode::Unexpected => "UNEXPECTED",
            ErrorCode::TypeDisagreement => "TYPE_DISAGREEMENT",
            ErrorCode::ImproperDeclaration => "IMPROPER_DECLARATION",
            ErrorCode::ImproperAssignment => "IMPROPER_ASSIGNMENT",
            ErrorCode::ImproperAccess => "IMPROPER_ACCESS",
            ErrorCode::Overflow => "OVERFLOW",
            ErrorCode::Underflow => "UNDERFLOW",
            ErrorCode::TooMany => "TOO_MANY",
            ErrorCode::TooFew => "TOO_FEW",
            ErrorCode::EmptyBody => "EMPTY_BODY",
            ErrorCode::UnreachableCode => "UNREACHABLE_CODE",
            ErrorCode::LexerError => "LEXER_ERROR",
            ErrorCode::MissingSize => "MISSING_SIZE",
            ErrorCode::MissingSemicolon => "MISSING_SEMICOLON",
            ErrorCode::MissingReturn => "MISSING_RETURN",
            ErrorCode::Pebcak => "PEBCAK",
            ErrorCode::Misc => "MISC",
            ErrorCode::Unknown => "UNKNOWN",
            ErrorCode::Compiler => "COMPILER",
            ErrorCode::Interpreter => "INTERPRETER",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ErrorCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = match s {
            "OK" => ErrorCode::Ok,
            "UNDECLARED" => ErrorCode::Undeclared,
            "UNDEFINED" => ErrorCode::Undefined,
            "UNINITIALIZED" => ErrorCode::Uninitialized,
            "REDECLARED" => ErrorCode::Redeclared,
            "UNEXPECTED" => ErrorCode::Unexpected,
            "TYPE_DISAGREEMENT" => ErrorCode::TypeDisagreement,
            "IMPROPER_DECLARATION" => ErrorCode::ImproperDeclaration,
            "IMPROPER_ASSIGNMENT" => ErrorCode::ImproperAssignment,
            "IMPROPER_ACCESS" => ErrorCode::ImproperAccess,
            "OVERFLOW" => ErrorCode::Overflow,
            "UNDERFLOW" => ErrorCode::Underflow,
            "TOO_MANY" => ErrorCode::TooMany,
            "TOO_FEW" => ErrorCode::TooFew,
            "EMPTY_BODY" => ErrorCode::EmptyBody,
            "UNREACHABLE_CODE" => ErrorCode::UnreachableCode,
            "LEXER_ERROR" => ErrorCode::LexerError,
            "MISSING_SIZE" => ErrorCode::MissingSize,
            "MISSING_SEMICOLON" => ErrorCode::MissingSemicolon,
            "MISSING_RETURN" => ErrorCode::MissingReturn,
            "PEBCAK" => ErrorCode::Pebcak,
            "MISC" => ErrorCode::Misc,
            "UNKNOWN" => ErrorCode::Unknown,
            "COMPILER" => ErrorCode::Compiler,
            "INTERPRETER" => ErrorCode::Interpreter,
            other => return Err(format!("Unknown error code '{}'", other)),
        };
        Ok(code)
    }
}

/// Collects diagnostics for one compilation and remembers the first
/// error code it saw.
#[derive(Debug)]
pub struct Reporter {
    filename: String,
    lines: Vec<String>,
    first: ErrorCode,
    count: usize,
    /// Diagnostics beyond this many are counted but not printed.
    max_printed: usize,
    /// Rendered diagnostics, kept for tests and for callers that want
    /// to show them somewhere other than stderr.
    rendered: Vec<String>,
    quiet: bool,
}

impl Reporter {
    pub fn new(filename: &str, source: &str) -> Self {
        Reporter {
            filename: filename.to_string(),
            lines: source.lines().map(|l| l.to_string()).collect(),
            first: ErrorCode::Ok,
            count: 0,
            max_printed: usize::MAX,
            rendered: Vec::new(),
            quiet: false,
        }
    }

    /// Cap the number of diagnostics echoed to stderr.
    pub fn with_max_printed(mut self, max: usize) -> Self {
        self.max_printed = max;
        self
    }

    /// Keep diagnostics in memory only. Tests and the harness use this
    /// so expected failures do not spam the terminal.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Report an error at a token: latch the code if none is latched yet,
    /// then render file:line, the source line, a caret, and the message.
    pub fn error_at(&mut self, code: ErrorCode, token: &Token, message: &str) {
        if self.first == ErrorCode::Ok {
            self.first = code;
        }
        self.count += 1;

        let mut out = String::new();
        out.push_str(&format!("{}:{}\n", self.filename, token.line));
        if token.line >= 1 {
            if let Some(line) = self.lines.get(token.line - 1) {
                out.push_str(&format!("{:5} | {}\n", token.line, line));
                out.push_str(&format!("{:5} | {}^\n", "", " ".repeat(token.column)));
            }
        }
        out.push_str(message);

        if !self.quiet && self.count <= self.max_printed {
            eprintln!("{}\n", out);
        }
        self.rendered.push(out);
    }

    /// First latched code, or `Ok` when the run was clean.
    pub fn latched(&self) -> ErrorCode {
        self.first
    }

    /// Clear the latch between programs. Harness runs reuse a reporter
    /// per file and need a fresh latch each time.
    pub fn reset(&mut self) {
        self.first = ErrorCode::Ok;
        self.count = 0;
        self.rendered.clear();
    }

    pub fn has_errors(&self) -> bool {
        self.first != ErrorCode::Ok
    }

    pub fn error_count(&self) -> usize {
        self.count
    }

    pub fn rendered(&self) -> &[String] {
        &self.rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn reporter() -> Reporter {
        Reporter::new("test.txt", "i8 x = 1;\ni8 x = 2;").quiet()
    }

    #[test]
    fn test_first_error_wins() {
        let mut r = reporter();
        let t = Token::new(TokenKind::Identifier, "x", 2, 3);
        r.error_at(ErrorCode::Redeclared, &t, "Redeclaration of 'x'");
        r.error_at(ErrorCode::TypeDisagreement, &t, "later error");
        assert_eq!(r.latched(), ErrorCode::Redeclared);
        assert_eq!(r.error_count(), 2);
    }

    #[test]
    fn test_reset_clears_latch() {
        let mut r = reporter();
        let t = Token::new(TokenKind::Identifier, "x", 1, 0);
        r.error_at(ErrorCode::Misc, &t, "whoops");
        r.reset();
        assert_eq!(r.latched(), ErrorCode::Ok);
        assert!(!r.has_errors());
    }

    #[test]
    fn test_caret_lands_on_column() {
        let mut r = reporter();
        let t = Token::new(TokenKind::Identifier, "x", 2, 3);
        r.error_at(ErrorCode::Redeclared, &t, "Redeclaration of 'x'");
        let text = &r.rendered()[0];
        assert!(text.contains("test.txt:2"));
        assert!(text.contains("i8 x = 2;"));
        let caret_line = text.lines().nth(2).unwrap();
        assert_eq!(caret_line.find('^').unwrap(), caret_line.find('|').unwrap() + 2 + 3);
    }

    #[test]
    fn test_code_round_trip() {
        for code in [
            ErrorCode::Ok,
            ErrorCode::TypeDisagreement,
            ErrorCode::MissingSemicolon,
            ErrorCode::Pebcak,
        ] {
            assert_eq!(code.name().parse::<ErrorCode>().unwrap(), code);
        }
        assert!("BOGUS".parse::<ErrorCode>().is_err());
    }
}
