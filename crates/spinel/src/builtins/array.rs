//! Array methods. Arrays are shared mutable; iteration methods snapshot
//! the elements before running the block so a block that mutates the
//! receiver cannot deadlock against the element lock.

use super::{arg_int, check_args, check_args_range, expect_block};
use crate::error::{Error, Result};
use crate::value::{Block, Shared, Value};
use crate::vm::{VmCore, VmThread};

pub(super) fn install(core: &VmCore) {
    let array = core.array_class;
    core.define_method(array, "[]", index);
    core.define_method(array, "[]=", index_set);
    core.define_method(array, "push", push);
    core.define_method(array, "<<", shovel);
    core.define_method(array, "pop", pop);
    core.define_method(array, "shift", shift);
    core.define_method(array, "unshift", unshift);
    core.define_method(array, "length", length);
    core.define_method(array, "size", length);
    core.define_method(array, "count", length);
    core.define_method(array, "empty?", empty);
    core.define_method(array, "first", first);
    core.define_method(array, "last", last);
    core.define_method(array, "include?", include);
    core.define_method(array, "join", join);
    core.define_method(array, "each", each);
    core.define_method(array, "map", map);
}

fn receiver_items(receiver: &Value) -> Result<&Shared<Vec<Value>>> {
    match receiver {
        Value::Array(items) => Ok(items),
        other => Err(Error::type_error("Array", other.kind_name())),
    }
}

fn index(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("[]", &args, 1)?;
    let items = receiver_items(receiver)?.read().expect("value lock").clone();
    let mut i = arg_int("[]", &args, 0)?;
    if i < 0 {
        i += items.len() as i64;
    }
    if i < 0 {
        return Ok(Value::Nil);
    }
    Ok(items.get(i as usize).cloned().unwrap_or(Value::Nil))
}

/// Assigning past the end fills the gap with nil, matching the growth
/// semantics of the original implementation.
fn index_set(
    _t: &mut VmThread,
    receiver: &Value,
    args: Vec<Value>,
    _b: Option<&Block>,
) -> Result<Value> {
    check_args("[]=", &args, 2)?;
    let mut i = arg_int("[]=", &args, 0)?;
    let value = args[1].clone();
    let items = receiver_items(receiver)?;
    let mut items = items.write().expect("value lock");
    if i < 0 {
        i += items.len() as i64;
        if i < 0 {
            return Err(Error::argument("index out of range"));
        }
    }
    let i = i as usize;
    if i >= items.len() {
        items.resize(i + 1, Value::Nil);
    }
    items[i] = value.clone();
    Ok(value)
}

fn push(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    let items = receiver_items(receiver)?;
    items.write().expect("value lock").extend(args);
    Ok(receiver.clone())
}

fn shovel(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("<<", &args, 1)?;
    let items = receiver_items(receiver)?;
    items.write().expect("value lock").push(args[0].clone());
    Ok(receiver.clone())
}

fn pop(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("pop", &args, 0)?;
    let items = receiver_items(receiver)?;
    Ok(items.write().expect("value lock").pop().unwrap_or(Value::Nil))
}

fn shift(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("shift", &args, 0)?;
    let items = receiver_items(receiver)?;
    let mut items = items.write().expect("value lock");
    if items.is_empty() {
        return Ok(Value::Nil);
    }
    Ok(items.remove(0))
}

fn unshift(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    let items = receiver_items(receiver)?;
    let mut items = items.write().expect("value lock");
    for (i, value) in args.into_iter().enumerate() {
        items.insert(i, value);
    }
    Ok(receiver.clone())
}

fn length(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("length", &args, 0)?;
    let items = receiver_items(receiver)?;
    let len = items.read().expect("value lock").len();
    Ok(Value::int(len as i64))
}

fn empty(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("empty?", &args, 0)?;
    let items = receiver_items(receiver)?;
    let empty = items.read().expect("value lock").is_empty();
    Ok(Value::bool(empty))
}

fn first(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("first", &args, 0)?;
    let items = receiver_items(receiver)?;
    let first = items.read().expect("value lock").first().cloned();
    Ok(first.unwrap_or(Value::Nil))
}

fn last(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("last", &args, 0)?;
    let items = receiver_items(receiver)?;
    let last = items.read().expect("value lock").last().cloned();
    Ok(last.unwrap_or(Value::Nil))
}

fn include(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("include?", &args, 1)?;
    let items = receiver_items(receiver)?;
    let found = items.read().expect("value lock").contains(&args[0]);
    Ok(Value::bool(found))
}

fn join(t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args_range("join", &args, 0, 1)?;
    let separator = match args.first() {
        Some(sep) => sep
            .as_str()
            .ok_or_else(|| Error::type_error("String", sep.kind_name()))?,
        None => String::new(),
    };
    let items = receiver_items(receiver)?.read().expect("value lock").clone();
    let parts: Vec<String> = items.iter().map(|v| t.core().value_to_s(v)).collect();
    Ok(Value::str(parts.join(&separator)))
}

fn each(t: &mut VmThread, receiver: &Value, args: Vec<Value>, block: Option<&Block>) -> Result<Value> {
    check_args("each", &args, 0)?;
    let block = expect_block("each", block)?;
    let items = receiver_items(receiver)?.read().expect("value lock").clone();
    for item in items {
        t.call_block(block, vec![item])?;
    }
    Ok(receiver.clone())
}

fn map(t: &mut VmThread, receiver: &Value, args: Vec<Value>, block: Option<&Block>) -> Result<Value> {
    check_args("map", &args, 0)?;
    let block = expect_block("map", block)?;
    let items = receiver_items(receiver)?.read().expect("value lock").clone();
    let mut mapped = Vec::with_capacity(items.len());
    for item in items {
        mapped.push(t.call_block(block, vec![item])?);
    }
    Ok(Value::array(mapped))
}
