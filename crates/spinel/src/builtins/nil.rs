//! Nil methods. `nil` stringifies to the empty string; `nil?` and `!` are
//! the two places nil answers differently from every other object.

use super::check_args;
use crate::error::Result;
use crate::value::{Block, Value};
use crate::vm::{VmCore, VmThread};

pub(super) fn install(core: &VmCore) {
    let nil = core.nil_class;
    core.define_method(nil, "nil?", nil_p);
    core.define_method(nil, "!", not);
    core.define_method(nil, "to_s", to_s);
}

fn nil_p(_t: &mut VmThread, _receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("nil?", &args, 0)?;
    Ok(Value::TRUE)
}

fn not(_t: &mut VmThread, _receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("!", &args, 0)?;
    Ok(Value::TRUE)
}

fn to_s(_t: &mut VmThread, _receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("to_s", &args, 0)?;
    Ok(Value::str(""))
}
