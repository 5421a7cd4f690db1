//! Float arithmetic and conversions. Division follows IEEE semantics;
//! only integers raise on a zero divisor.

use super::check_args;
use crate::error::{Error, Result};
use crate::value::{Block, Value};
use crate::vm::{VmCore, VmThread};

pub(super) fn install(core: &VmCore) {
    let float = core.float_class;
    core.define_method(float, "+", add);
    core.define_method(float, "-", sub);
    core.define_method(float, "*", mul);
    core.define_method(float, "/", div);
    core.define_method(float, "%", rem);
    core.define_method(float, "**", pow);
    core.define_method(float, "<", lt);
    core.define_method(float, "<=", lt_eq);
    core.define_method(float, ">", gt);
    core.define_method(float, ">=", gt_eq);
    core.define_method(float, "to_i", to_i);
    core.define_method(float, "to_f", to_f);
    core.define_method(float, "to_s", to_s);
    core.define_method(float, "zero?", zero);
}

fn receiver_float(receiver: &Value) -> Result<f64> {
    receiver
        .as_float()
        .ok_or_else(|| Error::type_error("Float", receiver.kind_name()))
}

fn number_arg(method: &str, args: &[Value]) -> Result<f64> {
    check_args(method, args, 1)?;
    args[0]
        .as_number()
        .ok_or_else(|| Error::type_error("Integer or Float", args[0].kind_name()))
}

fn binary(
    method: &'static str,
    receiver: &Value,
    args: &[Value],
    op: fn(f64, f64) -> f64,
) -> Result<Value> {
    let a = receiver_float(receiver)?;
    let b = number_arg(method, args)?;
    Ok(Value::float(op(a, b)))
}

fn add(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    binary("+", receiver, &args, |a, b| a + b)
}

fn sub(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    binary("-", receiver, &args, |a, b| a - b)
}

fn mul(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    binary("*", receiver, &args, |a, b| a * b)
}

fn div(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    binary("/", receiver, &args, |a, b| a / b)
}

fn rem(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    binary("%", receiver, &args, |a, b| a % b)
}

fn pow(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    binary("**", receiver, &args, f64::powf)
}

fn compare(
    method: &'static str,
    receiver: &Value,
    args: &[Value],
    op: fn(f64, f64) -> bool,
) -> Result<Value> {
    let a = receiver_float(receiver)?;
    let b = number_arg(method, args)?;
    Ok(Value::bool(op(a, b)))
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

fn to_i(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("to_i", &args, 0)?;
    Ok(Value::int(receiver_float(receiver)? as i64))
}

fn to_f(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("to_f", &args, 0)?;
    Ok(Value::float(receiver_float(receiver)?))
}

fn to_s(t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("to_s", &args, 0)?;
    Ok(Value::str(t.core().value_to_s(receiver)))
}

fn zero(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("zero?", &args, 0)?;
    Ok(Value::bool(receiver_float(receiver)? == 0.0))
}
