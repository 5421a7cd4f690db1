//! Methods on class and module objects, installed on `Class`.
//!
//! Class objects dispatch through their metaclass chain, which roots at
//! `Class`, so everything here is reachable from any class or module.

use std::sync::Arc;

use super::check_args;
use crate::class::MethodObject;
use crate::error::{Error, Result};
use crate::value::{Block, Instance, Value};
use crate::vm::{VmCore, VmThread};

pub(super) fn install(core: &VmCore) {
    let class = core.class_class;
    core.define_method(class, "new", new);
    core.define_method(class, "name", name);
    core.define_method(class, "superclass", superclass);
    core.define_method(class, "include", include);
    core.define_method(class, "attr_reader", attr_reader);
    core.define_method(class, "attr_writer", attr_writer);
    core.define_method(class, "attr_accessor", attr_accessor);
}

fn class_id(receiver: &Value) -> Result<usize> {
    match receiver {
        Value::Class(id) => Ok(*id),
        other => Err(Error::type_error("Class", other.kind_name())),
    }
}

/// Allocate an instance and run its `initialize`, passing the arguments
/// and block through.
fn new(t: &mut VmThread, receiver: &Value, args: Vec<Value>, block: Option<&Block>) -> Result<Value> {
    let id = class_id(receiver)?;
    let class = t.core().registry.get(id);
    if class.is_module {
        return Err(Error::unsupported_method("new", &class.name));
    }
    let instance = Value::Instance(Arc::new(Instance::new(id)));
    if t.responds_to(&instance, "initialize") {
        t.call_method(&instance, "initialize", args, block)?;
    }
    Ok(instance)
}

fn name(t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("name", &args, 0)?;
    let id = class_id(receiver)?;
    Ok(Value::str(t.core().registry.get(id).name.clone()))
}

fn superclass(
    t: &mut VmThread,
    receiver: &Value,
    args: Vec<Value>,
    _b: Option<&Block>,
) -> Result<Value> {
    check_args("superclass", &args, 0)?;
    let id = class_id(receiver)?;
    match t.core().registry.get(id).superclass_id() {
        Some(superclass) => Ok(Value::Class(superclass)),
        None => Ok(Value::Nil),
    }
}

/// Append a module to the receiver's included-module list. Lookup walks
/// the list in reverse include order, so a later include wins.
fn include(
    t: &mut VmThread,
    receiver: &Value,
    args: Vec<Value>,
    _b: Option<&Block>,
) -> Result<Value> {
    check_args("include", &args, 1)?;
    let id = class_id(receiver)?;
    let Value::Class(module_id) = &args[0] else {
        return Err(Error::type_error("Module", args[0].kind_name()));
    };
    let module = t.core().registry.get(*module_id);
    if !module.is_module {
        return Err(Error::type_error("Module", "Class"));
    }
    t.core()
        .registry
        .get(id)
        .included
        .write()
        .expect("class lock")
        .push(*module_id);
    Ok(receiver.clone())
}

fn attr_reader(
    t: &mut VmThread,
    receiver: &Value,
    args: Vec<Value>,
    _b: Option<&Block>,
) -> Result<Value> {
    define_accessors(t, receiver, &args, true, false)
}

fn attr_writer(
    t: &mut VmThread,
    receiver: &Value,
    args: Vec<Value>,
    _b: Option<&Block>,
) -> Result<Value> {
    define_accessors(t, receiver, &args, false, true)
}

fn attr_accessor(
    t: &mut VmThread,
    receiver: &Value,
    args: Vec<Value>,
    _b: Option<&Block>,
) -> Result<Value> {
    define_accessors(t, receiver, &args, true, true)
}

fn define_accessors(
    t: &mut VmThread,
    receiver: &Value,
    args: &[Value],
    reader: bool,
    writer: bool,
) -> Result<Value> {
    let id = class_id(receiver)?;
    let class = t.core().registry.get(id);
    for arg in args {
        let attr = match arg {
            Value::Symbol(name) => name.to_string(),
            Value::Str(_) => arg.as_str().unwrap_or_default(),
            other => return Err(Error::type_error("Symbol or String", other.kind_name())),
        };
        if reader {
            class.define_method(attr.clone(), MethodObject::AttrReader(attr.clone()));
        }
        if writer {
            class.define_method(format!("{attr}="), MethodObject::AttrWriter(attr));
        }
    }
    Ok(receiver.clone())
}
