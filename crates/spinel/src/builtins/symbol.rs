//! Symbol methods.

use super::check_args;
use crate::error::{Error, Result};
use crate::value::{Block, Value};
use crate::vm::{VmCore, VmThread};

pub(super) fn install(core: &VmCore) {
    core.define_method(core.symbol_class, "to_s", to_s);
}

fn to_s(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("to_s", &args, 0)?;
    match receiver {
        Value::Symbol(name) => Ok(Value::str(name.to_string())),
        other => Err(Error::type_error("Symbol", other.kind_name())),
    }
}
