//! Spinel — a small dynamic object-oriented scripting language.
//!
//! Spinel source is lowered to a stack-based bytecode and executed by a
//! virtual machine with full method dispatch, classes and modules,
//! lexical block closures, and OS-thread-backed interpreter threads that
//! share the object graph.
//!
//! # Quick start
//!
//! ```
//! use spinel::Interpreter;
//!
//! let mut interpreter = Interpreter::new();
//! let result = interpreter.run(r#"
//! class Greeter
//!   def initialize(name)
//!     @name = name
//!   end
//!
//!   def greet
//!     "hello, " + @name
//!   end
//! end
//!
//! Greeter.new("spinel").greet
//! "#).unwrap();
//!
//! assert_eq!(result.as_str().as_deref(), Some("hello, spinel"));
//! ```
//!
//! # The language
//!
//! - Classes with single inheritance, module mixins via `include`,
//!   re-openable definitions, `def self.x` class methods, and
//!   `attr_reader` / `attr_writer` / `attr_accessor`.
//! - Methods with optional, splat, keyword, and block parameters.
//! - Blocks (`do |x| … end` / `{ |x| … }`) closing over the defining
//!   frame's locals, invoked with `yield` or `Block#call`.
//! - `if`/`elsif`/`else` as expressions, `while` loops with `next`.
//! - Integers, floats, strings, symbols, arrays, hashes, inclusive
//!   ranges, `true`/`false`/`nil` singletons.
//! - `thread do … end` spawns an interpreter thread sharing classes and
//!   the object heap; `Thread#join` waits for it.
//!
//! # Pipeline
//!
//! Lexer → parser → bytecode generator → VM. [`compile`] exposes the
//! compiler half; the [`Interpreter`] facade drives the whole pipeline
//! and keeps classes alive across runs. The bytecode's textual form
//! (via `Display` on [`Bytecode`]) is stable and deterministic.

mod ast;
mod builtins;
mod bytecode;
mod class;
mod diagnostic;
mod error;
mod generator;
mod interpreter;
mod lexer;
mod parser;
mod token;
mod value;
mod vm;

pub use bytecode::{ArgKind, Bytecode, Instr, InstructionSet, Literal, ParamSpec, SetKind};
pub use class::{BuiltinFn, ClassId, ClassRegistry, MethodObject, RClass};
pub use diagnostic::Diagnostic;
pub use error::{Error, ErrorKind, Result, RuntimeError};
pub use interpreter::{Interpreter, Limits, Output};
pub use value::{Block, Env, Instance, RangeValue, Shared, ThreadHandle, Value};
pub use vm::{VmCore, VmThread};

/// Compile source text to bytecode without executing it.
///
/// ```
/// use spinel::compile;
///
/// let bytecode = compile("1 + 2").unwrap();
/// let text = bytecode.to_string();
/// assert!(text.contains("send + 1"));
/// ```
pub fn compile(source: &str) -> Result<Bytecode> {
    let program = parser::parse(source)?;
    generator::generate(&program)
}
