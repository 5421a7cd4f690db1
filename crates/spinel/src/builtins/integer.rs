//! Integer arithmetic, comparison, and iteration.
//!
//! Integers are shared mutable cells; `++` and `--` mutate the receiver
//! in place, which is how a bare `i++` statement is visible through the
//! local that holds the same cell. All other operators allocate.

use super::{check_args, expect_block};
use crate::error::{Error, Result};
use crate::value::{Block, Value};
use crate::vm::{VmCore, VmThread};

pub(super) fn install(core: &VmCore) {
    let integer = core.integer_class;
    core.define_method(integer, "+", add);
    core.define_method(integer, "-", sub);
    core.define_method(integer, "*", mul);
    core.define_method(integer, "/", div);
    core.define_method(integer, "%", rem);
    core.define_method(integer, "**", pow);
    core.define_method(integer, "==", eq);
    core.define_method(integer, "!=", not_eq);
    core.define_method(integer, "<", lt);
    core.define_method(integer, "<=", lt_eq);
    core.define_method(integer, ">", gt);
    core.define_method(integer, ">=", gt_eq);
    core.define_method(integer, "++", incr);
    core.define_method(integer, "--", decr);
    core.define_method(integer, "to_s", to_s);
    core.define_method(integer, "to_f", to_f);
    core.define_method(integer, "to_i", to_i);
    core.define_method(integer, "even?", even);
    core.define_method(integer, "odd?", odd);
    core.define_method(integer, "zero?", zero);
    core.define_method(integer, "times", times);
}

fn receiver_int(receiver: &Value) -> Result<i64> {
    receiver
        .as_int()
        .ok_or_else(|| Error::type_error("Integer", receiver.kind_name()))
}

/// Either-numeric right operand; integers stay integers, floats widen.
enum Operand {
    Int(i64),
    Float(f64),
}

fn operand(method: &str, args: &[Value]) -> Result<Operand> {
    check_args(method, args, 1)?;
    if let Some(i) = args[0].as_int() {
        Ok(Operand::Int(i))
    } else if let Some(x) = args[0].as_float() {
        Ok(Operand::Float(x))
    } else {
        Err(Error::type_error("Integer or Float", args[0].kind_name()))
    }
}

fn add(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    let a = receiver_int(receiver)?;
    Ok(match operand("+", &args)? {
        Operand::Int(b) => Value::int(a.wrapping_add(b)),
        Operand::Float(b) => Value::float(a as f64 + b),
    })
}

fn sub(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    let a = receiver_int(receiver)?;
    Ok(match operand("-", &args)? {
        Operand::Int(b) => Value::int(a.wrapping_sub(b)),
        Operand::Float(b) => Value::float(a as f64 - b),
    })
}

fn mul(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    let a = receiver_int(receiver)?;
    Ok(match operand("*", &args)? {
        Operand::Int(b) => Value::int(a.wrapping_mul(b)),
        Operand::Float(b) => Value::float(a as f64 * b),
    })
}

fn div(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    let a = receiver_int(receiver)?;
    Ok(match operand("/", &args)? {
        Operand::Int(0) => return Err(Error::zero_division()),
        Operand::Int(b) => Value::int(a.wrapping_div(b)),
        Operand::Float(b) => Value::float(a as f64 / b),
    })
}

fn rem(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    let a = receiver_int(receiver)?;
    Ok(match operand("%", &args)? {
        Operand::Int(0) => return Err(Error::zero_division()),
        Operand::Int(b) => Value::int(a.wrapping_rem(b)),
        Operand::Float(b) => Value::float(a as f64 % b),
    })
}

fn pow(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    let a = receiver_int(receiver)?;
    Ok(match operand("**", &args)? {
        Operand::Int(b) if b >= 0 => Value::int(a.wrapping_pow(b.min(u32::MAX as i64) as u32)),
        Operand::Int(b) => Value::float((a as f64).powi(b as i32)),
        Operand::Float(b) => Value::float((a as f64).powf(b)),
    })
}

fn compare(
    method: &'static str,
    receiver: &Value,
    args: &[Value],
    op: fn(f64, f64) -> bool,
) -> Result<Value> {
    let a = receiver_int(receiver)? as f64;
    let b = match operand(method, args)? {
        Operand::Int(b) => b as f64,
        Operand::Float(b) => b,
    };
    Ok(Value::bool(op(a, b)))
}

fn eq(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("==", &args, 1)?;
    Ok(Value::bool(*receiver == args[0]))
}

fn not_eq(
    _t: &mut VmThread,
    receiver: &Value,
    args: Vec<Value>,
    _b: Option<&Block>,
) -> Result<Value> {
    check_args("!=", &args, 1)?;
    Ok(Value::bool(*receiver != args[0]))
}

fn lt(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    compare("<", receiver, &args, |a, b| a < b)
}

fn lt_eq(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    compare("<=", receiver, &args, |a, b| a <= b)
}

fn gt(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    compare(">", receiver, &args, |a, b| a > b)
}

fn gt_eq(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    compare(">=", receiver, &args, |a, b| a >= b)
}

fn incr(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("++", &args, 0)?;
    let Value::Integer(cell) = receiver else {
        return Err(Error::type_error("Integer", receiver.kind_name()));
    };
    *cell.write().expect("value lock") += 1;
    Ok(receiver.clone())
}

fn decr(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("--", &args, 0)?;
    let Value::Integer(cell) = receiver else {
        return Err(Error::type_error("Integer", receiver.kind_name()));
    };
    *cell.write().expect("value lock") -= 1;
    Ok(receiver.clone())
}

fn to_s(t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("to_s", &args, 0)?;
    Ok(Value::str(t.core().value_to_s(receiver)))
}

fn to_f(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("to_f", &args, 0)?;
    Ok(Value::float(receiver_int(receiver)? as f64))
}

fn to_i(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("to_i", &args, 0)?;
    Ok(Value::int(receiver_int(receiver)?))
}

fn even(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("even?", &args, 0)?;
    Ok(Value::bool(receiver_int(receiver)? % 2 == 0))
}

fn odd(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("odd?", &args, 0)?;
    Ok(Value::bool(receiver_int(receiver)? % 2 != 0))
}

fn zero(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("zero?", &args, 0)?;
    Ok(Value::bool(receiver_int(receiver)? == 0))
}

/// Run the block once per count, passing the index. Re-enters the
/// interpreter for each invocation.
fn times(t: &mut VmThread, receiver: &Value, args: Vec<Value>, block: Option<&Block>) -> Result<Value> {
    check_args("times", &args, 0)?;
    let count = receiver_int(receiver)?;
    let block = expect_block("times", block)?;
    for i in 0..count {
        t.call_block(block, vec![Value::int(i)])?;
    }
    Ok(receiver.clone())
}
