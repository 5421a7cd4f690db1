//! Hash methods. Hashes are insertion-ordered pair lists; keys compare by
//! value equality.

use super::{check_args, expect_block};
use crate::error::{Error, Result};
use crate::value::{Block, Shared, Value};
use crate::vm::{VmCore, VmThread};

pub(super) fn install(core: &VmCore) {
    let hash = core.hash_class;
    core.define_method(hash, "[]", index);
    core.define_method(hash, "[]=", index_set);
    core.define_method(hash, "keys", keys);
    core.define_method(hash, "values", values);
    core.define_method(hash, "length", length);
    core.define_method(hash, "size", length);
    core.define_method(hash, "empty?", empty);
    core.define_method(hash, "has_key?", has_key);
    core.define_method(hash, "delete", delete);
    core.define_method(hash, "each", each);
}

fn receiver_pairs(receiver: &Value) -> Result<&Shared<Vec<(Value, Value)>>> {
    match receiver {
        Value::Hash(pairs) => Ok(pairs),
        other => Err(Error::type_error("Hash", other.kind_name())),
    }
}

fn index(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("[]", &args, 1)?;
    let pairs = receiver_pairs(receiver)?.read().expect("value lock").clone();
    let found = pairs.iter().find(|(k, _)| *k == args[0]);
    Ok(found.map(|(_, v)| v.clone()).unwrap_or(Value::Nil))
}

/// Replaces an existing key's value in place; new keys append, keeping
/// insertion order.
fn index_set(
    _t: &mut VmThread,
    receiver: &Value,
    args: Vec<Value>,
    _b: Option<&Block>,
) -> Result<Value> {
    check_args("[]=", &args, 2)?;
    let key = args[0].clone();
    let value = args[1].clone();
    let pairs = receiver_pairs(receiver)?;
    let mut pairs = pairs.write().expect("value lock");
    match pairs.iter_mut().find(|(k, _)| *k == key) {
        Some(pair) => pair.1 = value.clone(),
        None => pairs.push((key, value.clone())),
    }
    Ok(value)
}

fn keys(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("keys", &args, 0)?;
    let pairs = receiver_pairs(receiver)?.read().expect("value lock").clone();
    Ok(Value::array(pairs.into_iter().map(|(k, _)| k).collect()))
}

fn values(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("values", &args, 0)?;
    let pairs = receiver_pairs(receiver)?.read().expect("value lock").clone();
    Ok(Value::array(pairs.into_iter().map(|(_, v)| v).collect()))
}

fn length(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("length", &args, 0)?;
    let len = receiver_pairs(receiver)?.read().expect("value lock").len();
    Ok(Value::int(len as i64))
}

fn empty(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("empty?", &args, 0)?;
    let empty = receiver_pairs(receiver)?.read().expect("value lock").is_empty();
    Ok(Value::bool(empty))
}

fn has_key(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("has_key?", &args, 1)?;
    let pairs = receiver_pairs(receiver)?.read().expect("value lock").clone();
    Ok(Value::bool(pairs.iter().any(|(k, _)| *k == args[0])))
}

fn delete(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("delete", &args, 1)?;
    let pairs = receiver_pairs(receiver)?;
    let mut pairs = pairs.write().expect("value lock");
    match pairs.iter().position(|(k, _)| *k == args[0]) {
        Some(at) => Ok(pairs.remove(at).1),
        None => Ok(Value::Nil),
    }
}

fn each(t: &mut VmThread, receiver: &Value, args: Vec<Value>, block: Option<&Block>) -> Result<Value> {
    check_args("each", &args, 0)?;
    let block = expect_block("each", block)?;
    let pairs = receiver_pairs(receiver)?.read().expect("value lock").clone();
    for (key, value) in pairs {
        t.call_block(block, vec![key, value])?;
    }
    Ok(receiver.clone())
}
