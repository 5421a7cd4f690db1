//! Thread handle objects returned by `thread do … end`.

use super::check_args;
use crate::error::{Error, Result};
use crate::value::{Block, Value};
use crate::vm::{VmCore, VmThread};

pub(super) fn install(core: &VmCore) {
    core.define_method(core.thread_class, "join", join);
}

/// Wait for the thread to finish. Joining twice is a no-op; a panicked
/// interpreter thread surfaces as an internal error.
fn join(_t: &mut VmThread, receiver: &Value, args: Vec<Value>, _b: Option<&Block>) -> Result<Value> {
    check_args("join", &args, 0)?;
    let Value::Thread(handle) = receiver else {
        return Err(Error::type_error("Thread", receiver.kind_name()));
    };
    let taken = handle.handle.lock().expect("thread handle lock").take();
    if let Some(join_handle) = taken {
        join_handle
            .join()
            .map_err(|_| Error::internal("interpreter thread panicked"))?;
    }
    Ok(receiver.clone())
}
