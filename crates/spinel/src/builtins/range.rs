//! Range methods. Ranges are immutable inclusive integer spans; an empty
//! range (start past end) enumerates nothing.

use super::{check_args, expect_block};
use crate::error::{Error, Result};
use crate::value::{Block, RangeValue, Value};
use crate::vm::{VmCore, VmThread};

pub(super) fn install(core: &VmCore) {
    let range = core.range_class;
    core.define_method(range, "to_a", to_a);
    core.define_method(range, "each", each);
    core.define_method(range, "map", map);
    core.define_method(range, "first", first);
    core.define_method(range, "last", last);
    core.define_method(range, "size", size);
    core.define_method(range, "include?", include);
}

fn receiver_range(receiver: &Value) -> Result<RangeValue> {
    match receiver {
        Value::Range(range) => Ok(**range),
        other => Err(Error::type_error("Range", other.kind_name())),
    }
}

fn to_a(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("to_a", &args, 0)?;
    let range = receiver_range(receiver)?;
    Ok(Value::array((range.start..=range.end).map(Value::int).collect()))
}

fn each(t: &mut VmThread, receiver: &Value, args: Vec<Value>, block: Option<&Block>) -> Result<Value> {
    check_args("each", &args, 0)?;
    let block = expect_block("each", block)?;
    let range = receiver_range(receiver)?;
    for i in range.start..=range.end {
        t.call_block(block, vec![Value::int(i)])?;
    }
    Ok(receiver.clone())
}

fn map(t: &mut VmThread, receiver: &Value, args: Vec<Value>, block: Option<&Block>) -> Result<Value> {
    check_args("map", &args, 0)?;
    let block = expect_block("map", block)?;
    let range = receiver_range(receiver)?;
    let mut mapped = Vec::new();
    for i in range.start..=range.end {
        mapped.push(t.call_block(block, vec![Value::int(i)])?);
    }
    Ok(Value::array(mapped))
}

fn first(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("first", &args, 0)?;
    Ok(Value::int(receiver_range(receiver)?.start))
}

fn last(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("last", &args, 0)?;
    Ok(Value::int(receiver_range(receiver)?.end))
}

fn size(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("size", &args, 0)?;
    let range = receiver_range(receiver)?;
    Ok(Value::int((range.end - range.start + 1).max(0)))
}

fn include(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("include?", &args, 1)?;
    let range = receiver_range(receiver)?;
    let found = args[0]
        .as_int()
        .is_some_and(|i| i >= range.start && i <= range.end);
    Ok(Value::bool(found))
}
