//! Source-snippet rendering for compile-phase errors.
//!
//! Formats lex/parse/compile errors with the offending source line, a
//! caret under the error column, and the line number gutter:
//!
//! ```text
//! error: parse error at 2:7: expected `end`, got end of input
//!   |
//! 2 | class Foo
//!   |       ^
//! ```

use std::fmt;

use crate::error::Error;

/// A compile-phase error positioned in its source.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub line: u32,
    pub column: u32,
    source: String,
}

impl Diagnostic {
    /// Build a diagnostic for a compile-phase error. Runtime errors carry
    /// their own backtraces and render without source context.
    pub fn from_error(source: &str, error: &Error) -> Option<Self> {
        let (line, column) = match error {
            Error::Lex { line, column, .. } | Error::Parse { line, column, .. } => {
                (*line, *column)
            }
            Error::Compile { line, .. } => (*line, 1),
            _ => return None,
        };
        Some(Self {
            message: error.to_string(),
            line,
            column,
            source: source.to_string(),
        })
    }

    fn source_line(&self) -> &str {
        self.source
            .lines()
            .nth(self.line.saturating_sub(1) as usize)
            .unwrap_or("")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        let content = self.source_line();
        if content.is_empty() {
            return Ok(());
        }

        let gutter = self.line.to_string();
        let width = gutter.len();
        writeln!(f, "{:width$} |", "")?;
        writeln!(f, "{gutter} | {content}")?;
        let caret_at = (self.column.max(1) - 1) as usize;
        writeln!(f, "{:width$} | {:caret_at$}^", "", "")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    #[test]
    fn renders_source_line_with_caret() {
        let source = "x = 10\ny = (";
        let err = parser::parse(source).unwrap_err();
        let diagnostic = Diagnostic::from_error(source, &err).expect("compile-phase error");
        let rendered = diagnostic.to_string();
        assert!(rendered.starts_with("error: parse error"));
        assert!(rendered.contains("2 | y = ("));
        assert!(rendered.contains('^'));
    }

    #[test]
    fn runtime_errors_have_no_diagnostic() {
        let err = Error::zero_division();
        assert!(Diagnostic::from_error("1 / 0", &err).is_none());
    }
}
