//! Built-in classes: native method tables installed at boot.
//!
//! One module per class, each exposing an `install` function that
//! registers its methods with the shared core. Builtins are plain
//! functions (no captured state); the receiver, arguments, and the
//! caller's block arrive as parameters, and the thread handle allows
//! re-entering the interpreter to run blocks or `initialize`.

mod array;
mod block;
mod boolean;
mod class;
mod float;
mod hash;
mod integer;
mod nil;
mod object;
mod range;
mod string;
mod symbol;
mod thread;

use crate::error::{Error, Result};
use crate::value::{Block, Value};
use crate::vm::VmCore;

pub(crate) fn install(core: &VmCore) {
    object::install(core);
    class::install(core);
    integer::install(core);
    float::install(core);
    string::install(core);
    array::install(core);
    hash::install(core);
    boolean::install(core);
    nil::install(core);
    range::install(core);
    symbol::install(core);
    block::install(core);
    thread::install(core);
}

// ---------------------------------------------------------------------------
// Argument helpers shared by the class modules
// ---------------------------------------------------------------------------

pub(crate) fn check_args(method: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(Error::argument(format!(
            "`{method}` expects {expected} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

pub(crate) fn check_args_range(
    method: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<()> {
    if args.len() < min || args.len() > max {
        return Err(Error::argument(format!(
            "`{method}` expects {min}..{max} arguments, got {}",
            args.len()
        )));
    }
    Ok(())
}

pub(crate) fn arg_int(method: &str, args: &[Value], index: usize) -> Result<i64> {
    args.get(index)
        .and_then(Value::as_int)
        .ok_or_else(|| Error::type_error("Integer", arg_kind(args, index)))
        .map_err(|e| annotate(e, method))
}

pub(crate) fn arg_str(method: &str, args: &[Value], index: usize) -> Result<String> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::type_error("String", arg_kind(args, index)))
        .map_err(|e| annotate(e, method))
}

pub(crate) fn expect_block<'a>(method: &str, block: Option<&'a Block>) -> Result<&'a Block> {
    block.ok_or_else(|| Error::argument(format!("`{method}` requires a block")))
}

fn arg_kind(args: &[Value], index: usize) -> &'static str {
    args.get(index).map_or("nothing", Value::kind_name)
}

fn annotate(err: Error, method: &str) -> Error {
    match err {
        Error::Runtime(mut runtime) => {
            runtime.message = format!("{} (in `{method}`)", runtime.message);
            Error::Runtime(runtime)
        }
        other => other,
    }
}
