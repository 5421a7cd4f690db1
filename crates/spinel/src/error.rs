//! Error types shared by the compiler pipeline and the VM.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, self::Error>;

/// All errors the crate produces.
///
/// Compile-phase variants (`Lex`, `Parse`, `Compile`) carry source
/// positions and abort the pipeline. `Runtime` wraps the first-class
/// error object raised by executing code. The resource-limit variants are
/// uncatchable: they terminate the run regardless of frames in flight.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("lex error at {line}:{column}: {message}")]
    Lex {
        line: u32,
        column: u32,
        message: String,
    },

    #[error("parse error at {line}:{column}: expected {expected}, got {got}")]
    Parse {
        line: u32,
        column: u32,
        expected: String,
        got: String,
    },

    #[error("compile error at line {line}: {reason}")]
    Compile { line: u32, reason: String },

    #[error("{0}")]
    Runtime(RuntimeError),

    #[error("instruction limit of {0} exceeded")]
    InstructionLimitExceeded(u64),

    #[error("call depth limit of {0} exceeded")]
    FrameLimitExceeded(usize),
}

impl Error {
    /// Build a runtime error with an empty backtrace; the VM fills the
    /// backtrace in while unwinding.
    pub fn runtime(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Runtime(RuntimeError::new(kind, message))
    }

    pub fn name_error(name: &str) -> Self {
        Self::runtime(
            ErrorKind::NameError,
            format!("undefined local variable or constant `{name}`"),
        )
    }

    pub fn no_method(method: &str, class_name: &str) -> Self {
        Self::runtime(
            ErrorKind::NoMethodError,
            format!("undefined method `{method}` for {class_name}"),
        )
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::ArgumentError, message)
    }

    pub fn type_error(expected: &str, got: &str) -> Self {
        Self::runtime(
            ErrorKind::TypeError,
            format!("expected {expected}, got {got}"),
        )
    }

    pub fn zero_division() -> Self {
        Self::runtime(ErrorKind::ZeroDivisionError, "divided by 0")
    }

    pub fn unsupported_method(method: &str, class_name: &str) -> Self {
        Self::runtime(
            ErrorKind::UnsupportedMethodError,
            format!("`{method}` is not supported for {class_name}"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::InternalError, message)
    }

    /// Resource-limit errors may not be intercepted by any handler.
    pub fn is_uncatchable(&self) -> bool {
        matches!(
            self,
            Self::InstructionLimitExceeded(_) | Self::FrameLimitExceeded(_)
        )
    }

    /// Process exit code the CLI maps this error to: 2 for compile-phase
    /// errors, 1 for anything that happened while running.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Lex { .. } | Self::Parse { .. } | Self::Compile { .. } => 2,
            _ => 1,
        }
    }
}

/// A runtime error as a first-class object: kind, message, and one
/// backtrace entry per unwound frame (InstructionSet name and source line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub backtrace: Vec<String>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            backtrace: Vec::new(),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        for frame in &self.backtrace {
            write!(f, "\n\tfrom {frame}")?;
        }
        Ok(())
    }
}

/// The runtime error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NameError,
    NoMethodError,
    ArgumentError,
    TypeError,
    ZeroDivisionError,
    RangeError,
    NotImplementedError,
    InternalError,
    UnsupportedMethodError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NameError => "NameError",
            Self::NoMethodError => "NoMethodError",
            Self::ArgumentError => "ArgumentError",
            Self::TypeError => "TypeError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::RangeError => "RangeError",
            Self::NotImplementedError => "NotImplementedError",
            Self::InternalError => "InternalError",
            Self::UnsupportedMethodError => "UnsupportedMethodError",
        };
        f.write_str(name)
    }
}
