//! Methods every object inherits, installed on `Object`.

use std::sync::{Arc, Mutex};

use super::{check_args, check_args_range, expect_block};
use crate::error::{Error, Result};
use crate::value::{Block, ThreadHandle, Value};
use crate::vm::{VmCore, VmThread};

pub(super) fn install(core: &VmCore) {
    let object = core.object_class;
    core.define_method(object, "==", eq);
    core.define_method(object, "!=", not_eq);
    core.define_method(object, "equal?", equal);
    core.define_method(object, "!", not);
    core.define_method(object, "class", class);
    core.define_method(object, "nil?", nil_p);
    core.define_method(object, "is_a?", is_a);
    core.define_method(object, "respond_to?", respond_to);
    core.define_method(object, "to_s", to_s);
    core.define_method(object, "to_json", to_json);
    core.define_method(object, "puts", puts);
    core.define_method(object, "sleep", sleep);
    core.define_method(object, "thread", thread_spawn);
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

fn equal(
    _t: &mut VmThread,
    receiver: &Value,
    args: Vec<Value>,
    _b: Option<&Block>,
) -> Result<Value> {
    check_args("equal?", &args, 1)?;
    Ok(Value::bool(receiver.is_identical(&args[0])))
}

fn not(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("!", &args, 0)?;
    Ok(Value::bool(!receiver.is_truthy()))
}

fn class(t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("class", &args, 0)?;
    Ok(Value::Class(t.core().value_class(receiver)))
}

fn nil_p(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("nil?", &args, 0)?;
    Ok(Value::bool(receiver.is_nil()))
}

fn is_a(t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("is_a?", &args, 1)?;
    let Value::Class(target) = &args[0] else {
        return Err(Error::type_error("Class", args[0].kind_name()));
    };
    let class = t.core().value_class(receiver);
    Ok(Value::bool(t.core().registry.is_descendant(class, *target)))
}

fn respond_to(
    t: &mut VmThread,
    receiver: &Value,
    args: Vec<Value>,
    _b: Option<&Block>,
) -> Result<Value> {
    check_args("respond_to?", &args, 1)?;
    let name = match &args[0] {
        Value::Symbol(name) => name.to_string(),
        Value::Str(_) => args[0].as_str().unwrap_or_default(),
        other => return Err(Error::type_error("Symbol or String", other.kind_name())),
    };
    Ok(Value::bool(t.responds_to(receiver, &name)))
}

fn to_s(t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("to_s", &args, 0)?;
    Ok(Value::str(t.core().value_to_s(receiver)))
}

fn to_json(
    t: &mut VmThread,
    receiver: &Value,
    args: Vec<Value>,
    _b: Option<&Block>,
) -> Result<Value> {
    check_args("to_json", &args, 0)?;
    Ok(Value::str(t.core().value_to_json(receiver).to_string()))
}

/// Write each argument's string form to the output sink, one per line.
fn puts(t: &mut VmThread, _receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    if args.is_empty() {
        t.core().write_line(String::new());
    }
    for arg in &args {
        let line = t.core().value_to_s(arg);
        t.core().write_line(line);
    }
    Ok(Value::Nil)
}

fn sleep(
    _t: &mut VmThread,
    _receiver: &Value,
    args: Vec<Value>,
    _b: Option<&Block>,
) -> Result<Value> {
    check_args_range("sleep", &args, 0, 1)?;
    let seconds = match args.first() {
        None => 0.0,
        Some(value) => value
            .as_number()
            .ok_or_else(|| Error::type_error("Integer or Float", value.kind_name()))?,
    };
    if seconds > 0.0 {
        std::thread::sleep(std::time::Duration::from_secs_f64(seconds));
    }
    Ok(Value::Nil)
}

/// Spawn an interpreter thread running the attached block on a fresh
/// frame stack over the shared core. Returns a Thread handle; an
/// unhandled error in the thread prints its backtrace to the output sink
/// and terminates only that thread.
fn thread_spawn(
    t: &mut VmThread,
    _receiver: &Value,
    args: Vec<Value>,
    block: Option<&Block>,
) -> Result<Value> {
    check_args("thread", &args, 0)?;
    let block = expect_block("thread", block)?.clone();
    let core = t.core().clone();
    let handle = std::thread::spawn(move || {
        let mut thread = VmThread::new(core.clone());
        if let Err(err) = thread.call_block(&block, Vec::new()) {
            core.write_line(err.to_string());
        }
    });
    Ok(Value::Thread(Arc::new(ThreadHandle {
        handle: Mutex::new(Some(handle)),
    })))
}
