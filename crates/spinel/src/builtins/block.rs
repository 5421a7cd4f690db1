//! Block objects (captured via `&blk` parameters) respond to `call`.

use crate::error::{Error, Result};
use crate::value::{Block, Value};
use crate::vm::{VmCore, VmThread};

pub(super) fn install(core: &VmCore) {
    core.define_method(core.block_class, "call", call);
}

/// Invoke the captured block with the given arguments by re-entering the
/// interpreter.
fn call(t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    match receiver {
        Value::Block(block) => t.call_block(block, args),
        other => Err(Error::type_error("Block", other.kind_name())),
    }
}
