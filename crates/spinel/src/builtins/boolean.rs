//! Boolean methods. `&&` and `||` are ordinary methods on the evaluated
//! operands (both sides are computed before the send), and they require a
//! boolean argument. `Boolean.new` is not supported; the two boolean
//! values are shared singletons.

use super::check_args;
use crate::error::{Error, Result};
use crate::value::{Block, Value};
use crate::vm::{VmCore, VmThread};

pub(super) fn install(core: &VmCore) {
    let boolean = core.boolean_class;
    core.define_method(boolean, "&&", and);
    core.define_method(boolean, "||", or);
    core.define_class_method(boolean, "new", new);
}

fn receiver_bool(receiver: &Value) -> Result<bool> {
    match receiver {
        Value::Boolean(b) => Ok(*b),
        other => Err(Error::type_error("Boolean", other.kind_name())),
    }
}

fn bool_arg(method: &str, args: &[Value]) -> Result<bool> {
    check_args(method, args, 1)?;
    match &args[0] {
        Value::Boolean(b) => Ok(*b),
        other => Err(Error::type_error("Boolean", other.kind_name())),
    }
}

fn and(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    let left = receiver_bool(receiver)?;
    let right = bool_arg("&&", &args)?;
    Ok(Value::bool(left && right))
}

fn or(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    let left = receiver_bool(receiver)?;
    let right = bool_arg("||", &args)?;
    Ok(Value::bool(left || right))
}

fn new(t: &mut VmThread, receiver: &Value, _args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    Err(Error::unsupported_method(
        "new",
        &t.core().value_to_s(receiver),
    ))
}
