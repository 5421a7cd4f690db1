//! The embedding facade: compile-and-run with persistent classes.

use std::sync::Arc;

use crate::bytecode::Bytecode;
use crate::error::Result;
use crate::generator;
use crate::parser;
use crate::value::Value;
use crate::vm::{VmCore, VmThread};

/// Resource limits for script execution.
///
/// Both limits are optional — `None` means unlimited. Limits apply per
/// interpreter thread; the instruction counter resets at the start of each
/// [`Interpreter::run`].
///
/// # Example
///
/// ```
/// use spinel::{Interpreter, Limits};
///
/// let mut interpreter = Interpreter::new();
/// interpreter.limit(Limits {
///     max_instructions: Some(10_000),
///     max_frames: Some(64),
/// });
///
/// let err = interpreter.run("while true do\nend").unwrap_err();
/// assert!(err.to_string().contains("nstruction limit"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    /// Maximum bytecode instructions per thread per `run` call.
    pub max_instructions: Option<u64>,
    /// Maximum call-frame depth per thread.
    pub max_frames: Option<usize>,
}

/// Result of running code with output capture.
#[derive(Debug, Clone)]
pub struct Output {
    /// The value of the program's last expression.
    pub value: Value,
    /// Lines written by `puts` (including from spawned threads).
    pub output: Vec<String>,
}

/// A scripting-language interpreter.
///
/// Classes, modules, and constants defined by one `run` call remain
/// visible to later calls; top-level locals are per-program.
///
/// # Example
///
/// ```
/// use spinel::Interpreter;
///
/// let mut interpreter = Interpreter::new();
///
/// interpreter.run("class Counter\nattr_accessor(:total)\nend").unwrap();
/// let result = interpreter
///     .run("c = Counter.new\nc.total = 41\nc.total + 1")
///     .unwrap();
/// assert_eq!(result.as_int(), Some(42));
/// ```
pub struct Interpreter {
    core: Arc<VmCore>,
}

impl Interpreter {
    /// Create an interpreter with the built-in classes booted.
    pub fn new() -> Self {
        Self {
            core: VmCore::boot(),
        }
    }

    /// Compile and execute source, returning the last expression's value.
    ///
    /// # Example
    ///
    /// ```
    /// use spinel::Interpreter;
    ///
    /// let mut interpreter = Interpreter::new();
    /// let result = interpreter.run("a = [1, 2, 3]\na.map do |x|\nx * 10\nend").unwrap();
    /// assert_eq!(result, spinel::Value::array(vec![
    ///     spinel::Value::int(10),
    ///     spinel::Value::int(20),
    ///     spinel::Value::int(30),
    /// ]));
    /// ```
    pub fn run(&mut self, source: &str) -> Result<Value> {
        let code = Arc::new(self.compile_bytecode(source)?);
        let mut thread = VmThread::new(self.core.clone());
        thread.run_program(code)
    }

    /// Run source and collect `puts` output alongside the result.
    ///
    /// # Example
    ///
    /// ```
    /// use spinel::Interpreter;
    ///
    /// let mut interpreter = Interpreter::new();
    /// let output = interpreter.capture("puts(\"hello\")\n7").unwrap();
    /// assert_eq!(output.output, vec!["hello"]);
    /// assert_eq!(output.value.as_int(), Some(7));
    /// ```
    pub fn capture(&mut self, source: &str) -> Result<Output> {
        self.core.take_output();
        let value = self.run(source)?;
        let output = self.core.take_output();
        Ok(Output { value, output })
    }

    /// Compile source and return the bytecode textual form.
    ///
    /// # Example
    ///
    /// ```
    /// use spinel::Interpreter;
    ///
    /// let interpreter = Interpreter::new();
    /// let text = interpreter.compile("x = 1\nx").unwrap();
    /// assert!(text.starts_with("<ProgramStart>"));
    /// ```
    pub fn compile(&self, source: &str) -> Result<String> {
        Ok(self.compile_bytecode(source)?.to_string())
    }

    fn compile_bytecode(&self, source: &str) -> Result<Bytecode> {
        let program = parser::parse(source)?;
        generator::generate(&program)
    }

    /// Apply resource limits to subsequent runs (and threads they spawn).
    pub fn limit(&mut self, limits: Limits) {
        *self.core.instruction_limit.write().expect("limits lock") = limits.max_instructions;
        *self.core.frame_limit.write().expect("limits lock") = limits.max_frames;
    }

    /// When enabled, `puts` writes through to stdout instead of the
    /// capture buffer. The CLI runs in this mode.
    pub fn echo_output(&mut self, echo: bool) {
        self.core.set_echo(echo);
    }

    /// Take any buffered `puts` output without running code.
    pub fn flush(&mut self) -> Vec<String> {
        self.core.take_output()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
