//! String methods. Strings are shared mutable cells; `concat` mutates in
//! place, everything else allocates.

use super::{check_args, check_args_range, arg_int, arg_str};
use crate::error::{Error, Result};
use crate::value::{Block, Value};
use crate::vm::{VmCore, VmThread};

pub(super) fn install(core: &VmCore) {
    let string = core.string_class;
    core.define_method(string, "+", add);
    core.define_method(string, "*", mul);
    core.define_method(string, "length", length);
    core.define_method(string, "size", length);
    core.define_method(string, "empty?", empty);
    core.define_method(string, "reverse", reverse);
    core.define_method(string, "upcase", upcase);
    core.define_method(string, "downcase", downcase);
    core.define_method(string, "include?", include);
    core.define_method(string, "[]", index);
    core.define_method(string, "concat", concat);
    core.define_method(string, "split", split);
    core.define_method(string, "to_s", to_s);
    core.define_method(string, "to_sym", to_sym);
}

fn receiver_str(receiver: &Value) -> Result<String> {
    receiver
        .as_str()
        .ok_or_else(|| Error::type_error("String", receiver.kind_name()))
}

fn add(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("+", &args, 1)?;
    let a = receiver_str(receiver)?;
    let b = arg_str("+", &args, 0)?;
    Ok(Value::str(format!("{a}{b}")))
}

fn mul(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    let s = receiver_str(receiver)?;
    check_args("*", &args, 1)?;
    let n = arg_int("*", &args, 0)?;
    if n < 0 {
        return Err(Error::argument("negative repeat count"));
    }
    Ok(Value::str(s.repeat(n as usize)))
}

fn length(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("length", &args, 0)?;
    Ok(Value::int(receiver_str(receiver)?.chars().count() as i64))
}

fn empty(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("empty?", &args, 0)?;
    Ok(Value::bool(receiver_str(receiver)?.is_empty()))
}

fn reverse(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("reverse", &args, 0)?;
    Ok(Value::str(receiver_str(receiver)?.chars().rev().collect::<String>()))
}

fn upcase(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("upcase", &args, 0)?;
    Ok(Value::str(receiver_str(receiver)?.to_uppercase()))
}

fn downcase(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("downcase", &args, 0)?;
    Ok(Value::str(receiver_str(receiver)?.to_lowercase()))
}

fn include(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("include?", &args, 1)?;
    let s = receiver_str(receiver)?;
    let needle = arg_str("include?", &args, 0)?;
    Ok(Value::bool(s.contains(&needle)))
}

/// Single-character index; negative counts from the end; out of range is
/// nil.
fn index(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("[]", &args, 1)?;
    let s = receiver_str(receiver)?;
    let len = s.chars().count() as i64;
    let mut i = arg_int("[]", &args, 0)?;
    if i < 0 {
        i += len;
    }
    if i < 0 || i >= len {
        return Ok(Value::Nil);
    }
    let ch = s.chars().nth(i as usize).map(|c| c.to_string());
    Ok(ch.map_or(Value::Nil, Value::str))
}

fn concat(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("concat", &args, 1)?;
    let suffix = arg_str("concat", &args, 0)?;
    let Value::Str(cell) = receiver else {
        return Err(Error::type_error("String", receiver.kind_name()));
    };
    cell.write().expect("value lock").push_str(&suffix);
    Ok(receiver.clone())
}

fn split(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args_range("split", &args, 0, 1)?;
    let s = receiver_str(receiver)?;
    let parts: Vec<Value> = if args.is_empty() {
        s.split_whitespace().map(Value::str).collect()
    } else {
        let sep = arg_str("split", &args, 0)?;
        if sep.is_empty() {
            return Err(Error::argument("empty string separator"));
        }
        s.split(sep.as_str()).map(Value::str).collect()
    };
    Ok(Value::array(parts))
}

fn to_s(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("to_s", &args, 0)?;
    Ok(receiver.clone())
}

fn to_sym(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("to_sym", &args, 0)?;
    Ok(Value::symbol(&receiver_str(receiver)?))
}
