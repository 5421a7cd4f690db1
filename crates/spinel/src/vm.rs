//! The bytecode virtual machine.
//!
//! [`VmCore`] is the shared half: the class registry, the well-known class
//! ids, the output sink, and resource limits. [`VmThread`] is the
//! per-interpreter-thread half: a private call-frame stack driving a
//! fetch-decode-execute loop. Spawned `thread do … end` blocks get their
//! own `VmThread` over the same core, so the object graph, classes, and
//! constants are shared while execution state is not.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::builtins;
use crate::bytecode::{ArgKind, Bytecode, Instr, InstructionSet, Literal};
use crate::class::{BuiltinFn, ClassId, ClassRegistry, MethodObject};
use crate::error::{Error, ErrorKind, Result};
use crate::value::{Block, Env, Instance, Value};

// ---------------------------------------------------------------------------
// Shared core
// ---------------------------------------------------------------------------

/// State shared by every interpreter thread.
pub struct VmCore {
    pub registry: ClassRegistry,

    pub object_class: ClassId,
    pub class_class: ClassId,
    pub module_class: ClassId,
    pub integer_class: ClassId,
    pub float_class: ClassId,
    pub string_class: ClassId,
    pub boolean_class: ClassId,
    pub nil_class: ClassId,
    pub symbol_class: ClassId,
    pub array_class: ClassId,
    pub hash_class: ClassId,
    pub range_class: ClassId,
    pub block_class: ClassId,
    pub thread_class: ClassId,

    /// The top-level `self`, an Object instance.
    main: Value,
    /// Captured `puts` output (echo mode writes to stdout instead).
    output: Mutex<Vec<String>>,
    echo: AtomicBool,
    pub(crate) instruction_limit: RwLock<Option<u64>>,
    pub(crate) frame_limit: RwLock<Option<usize>>,
}

impl VmCore {
    /// Build the class registry, the singleton classes, and the built-in
    /// method tables. Runs once before any user code.
    pub fn boot() -> Arc<Self> {
        let registry = ClassRegistry::new();
        let (object_class, class_class, module_class) = registry.bootstrap();

        let define =
            |name: &str| registry.define_class(name, Some(object_class), false, class_class);
        let integer_class = define("Integer");
        let float_class = define("Float");
        let string_class = define("String");
        let boolean_class = define("Boolean");
        let nil_class = define("Nil");
        let symbol_class = define("Symbol");
        let array_class = define("Array");
        let hash_class = define("Hash");
        let range_class = define("Range");
        let block_class = define("Block");
        let thread_class = define("Thread");

        let object = registry.get(object_class);
        for (name, id) in [
            ("Object", object_class),
            ("Class", class_class),
            ("Module", module_class),
            ("Integer", integer_class),
            ("Float", float_class),
            ("String", string_class),
            ("Boolean", boolean_class),
            ("Nil", nil_class),
            ("Symbol", symbol_class),
            ("Array", array_class),
            ("Hash", hash_class),
            ("Range", range_class),
            ("Block", block_class),
            ("Thread", thread_class),
        ] {
            object.set_constant(name, Value::Class(id));
        }

        let core = Arc::new(Self {
            main: Value::Instance(Arc::new(Instance::new(object_class))),
            registry,
            object_class,
            class_class,
            module_class,
            integer_class,
            float_class,
            string_class,
            boolean_class,
            nil_class,
            symbol_class,
            array_class,
            hash_class,
            range_class,
            block_class,
            thread_class,
            output: Mutex::new(Vec::new()),
            echo: AtomicBool::new(false),
            instruction_limit: RwLock::new(None),
            frame_limit: RwLock::new(None),
        });
        builtins::install(&core);
        core
    }

    pub fn main_value(&self) -> Value {
        self.main.clone()
    }

    fn is_main(&self, value: &Value) -> bool {
        value.is_identical(&self.main)
    }

    /// Register a native instance method.
    pub fn define_method(&self, class: ClassId, name: &'static str, func: BuiltinFn) {
        self.registry
            .get(class)
            .define_method(name, MethodObject::Builtin { name, func });
    }

    /// Register a native class method (on the metaclass).
    pub fn define_class_method(&self, class: ClassId, name: &'static str, func: BuiltinFn) {
        let meta = self
            .registry
            .get(class)
            .metaclass_id()
            .unwrap_or(self.class_class);
        self.define_method(meta, name, func);
    }

    /// The class dispatch starts at for a receiver. Class objects dispatch
    /// through their metaclass so singleton methods are found first.
    pub fn class_of(&self, value: &Value) -> ClassId {
        match value {
            Value::Integer(_) => self.integer_class,
            Value::Float(_) => self.float_class,
            Value::Str(_) => self.string_class,
            Value::Boolean(_) => self.boolean_class,
            Value::Nil => self.nil_class,
            Value::Symbol(_) => self.symbol_class,
            Value::Array(_) => self.array_class,
            Value::Hash(_) => self.hash_class,
            Value::Range(_) => self.range_class,
            Value::Block(_) => self.block_class,
            Value::Thread(_) => self.thread_class,
            Value::Instance(instance) => instance.class,
            Value::Class(id) => self
                .registry
                .get(*id)
                .metaclass_id()
                .unwrap_or(self.class_class),
        }
    }

    /// The class the `class` method reports — for class objects that is
    /// `Class` (or `Module`), never the metaclass.
    pub fn value_class(&self, value: &Value) -> ClassId {
        match value {
            Value::Class(id) => {
                if self.registry.get(*id).is_module {
                    self.module_class
                } else {
                    self.class_class
                }
            }
            Value::Instance(instance) => instance.class,
            other => self.class_of(other),
        }
    }

    pub fn class_name_of(&self, value: &Value) -> String {
        self.registry.get(self.value_class(value)).name.clone()
    }

    // -----------------------------------------------------------------------
    // Output sink
    // -----------------------------------------------------------------------

    /// In echo mode lines go straight to stdout; otherwise they are
    /// buffered for [`take_output`](Self::take_output).
    pub fn write_line(&self, line: String) {
        if self.echo.load(Ordering::Relaxed) {
            println!("{line}");
        } else {
            self.output.lock().expect("output lock").push(line);
        }
    }

    pub fn take_output(&self) -> Vec<String> {
        std::mem::take(&mut *self.output.lock().expect("output lock"))
    }

    pub fn set_echo(&self, echo: bool) {
        self.echo.store(echo, Ordering::Relaxed);
    }

    // -----------------------------------------------------------------------
    // The toString / toJSON capabilities
    // -----------------------------------------------------------------------

    pub fn value_to_s(&self, value: &Value) -> String {
        match value {
            Value::Integer(cell) => cell.read().expect("value lock").to_string(),
            Value::Float(cell) => format_float(*cell.read().expect("value lock")),
            Value::Str(cell) => cell.read().expect("value lock").clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Nil => String::new(),
            Value::Symbol(name) => name.to_string(),
            Value::Array(items) => {
                let items = items.read().expect("value lock");
                let parts: Vec<String> = items.iter().map(|v| self.value_inspect(v)).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Hash(pairs) => {
                let pairs = pairs.read().expect("value lock");
                if pairs.is_empty() {
                    return "{}".into();
                }
                let parts: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", self.value_to_s(k), self.value_inspect(v)))
                    .collect();
                format!("{{ {} }}", parts.join(", "))
            }
            Value::Range(range) => format!("({}..{})", range.start, range.end),
            Value::Class(id) => self.registry.get(*id).name.clone(),
            Value::Instance(_) if self.is_main(value) => "main".into(),
            Value::Instance(instance) => {
                format!("#<{}>", self.registry.get(instance.class).name)
            }
            Value::Block(_) => "#<Block>".into(),
            Value::Thread(_) => "#<Thread>".into(),
        }
    }

    /// Like `value_to_s`, but strings are quoted and nil is spelled out;
    /// used inside collections.
    pub fn value_inspect(&self, value: &Value) -> String {
        match value {
            Value::Str(cell) => format!("{:?}", cell.read().expect("value lock")),
            Value::Nil => "nil".into(),
            other => self.value_to_s(other),
        }
    }

    pub fn value_to_json(&self, value: &Value) -> serde_json::Value {
        use serde_json::Value as Json;
        match value {
            Value::Integer(cell) => Json::from(*cell.read().expect("value lock")),
            Value::Float(cell) => serde_json::Number::from_f64(*cell.read().expect("value lock"))
                .map_or(Json::Null, Json::Number),
            Value::Str(cell) => Json::from(cell.read().expect("value lock").clone()),
            Value::Boolean(b) => Json::from(*b),
            Value::Nil => Json::Null,
            Value::Symbol(name) => Json::from(name.to_string()),
            Value::Array(items) => Json::Array(
                items
                    .read()
                    .expect("value lock")
                    .iter()
                    .map(|v| self.value_to_json(v))
                    .collect(),
            ),
            Value::Hash(pairs) => {
                let mut map = serde_json::Map::new();
                for (k, v) in pairs.read().expect("value lock").iter() {
                    map.insert(self.value_to_s(k), self.value_to_json(v));
                }
                Json::Object(map)
            }
            Value::Range(range) => {
                Json::Array((range.start..=range.end).map(Json::from).collect())
            }
            Value::Class(id) => Json::from(self.registry.get(*id).name.clone()),
            Value::Instance(instance) => {
                let mut map = serde_json::Map::new();
                for (k, v) in instance.ivars.read().expect("ivar lock").iter() {
                    map.insert(k.trim_start_matches('@').to_string(), self.value_to_json(v));
                }
                Json::Object(map)
            }
            Value::Block(_) | Value::Thread(_) => Json::Null,
        }
    }
}

/// Deterministic float rendering: whole floats keep one decimal place.
fn format_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

// ---------------------------------------------------------------------------
// Frames and the per-thread VM
// ---------------------------------------------------------------------------

/// One activation record: the set being executed, its program counter,
/// `self`, local environment, private evaluation stack, and the block
/// passed to the invocation (if any).
struct CallFrame {
    iset: Arc<InstructionSet>,
    code: Arc<Bytecode>,
    pc: usize,
    self_value: Value,
    env: Arc<Env>,
    stack: Vec<Value>,
    block: Option<Arc<Block>>,
    /// Entry frames mark re-entry boundaries: their `leave` hands the
    /// result back to the host caller instead of a caller frame.
    entry: bool,
}

/// A single interpreter thread: a call-frame stack over a shared core.
pub struct VmThread {
    core: Arc<VmCore>,
    frames: Vec<CallFrame>,
    instruction_count: u64,
    instruction_limit: Option<u64>,
    frame_limit: Option<usize>,
    pending: Option<Value>,
}

impl VmThread {
    pub fn new(core: Arc<VmCore>) -> Self {
        let instruction_limit = *core.instruction_limit.read().expect("limits lock");
        let frame_limit = *core.frame_limit.read().expect("limits lock");
        Self {
            core,
            frames: Vec::new(),
            instruction_count: 0,
            instruction_limit,
            frame_limit,
            pending: None,
        }
    }

    pub fn core(&self) -> &Arc<VmCore> {
        &self.core
    }

    /// Execute a compiled program from its `<ProgramStart>` set. The
    /// instruction budget resets per call.
    pub fn run_program(&mut self, code: Arc<Bytecode>) -> Result<Value> {
        self.instruction_count = 0;
        let program = code.program().clone();
        let env = Env::new(program.locals_count, None);
        let frame = CallFrame {
            iset: program,
            code,
            pc: 0,
            self_value: self.core.main_value(),
            env,
            stack: Vec::new(),
            block: None,
            entry: true,
        };
        self.execute_frame(frame)
    }

    /// Run a block to completion and return its value. This is the
    /// re-entry path built-in methods use (`Integer#times`, `Array#each`,
    /// the `thread` spawn, `Block#call`).
    pub fn call_block(&mut self, block: &Block, args: Vec<Value>) -> Result<Value> {
        let frame = self.block_frame(block, args, true);
        self.execute_frame(frame)
    }

    /// Invoke a method by name and return its value (builtin re-entry,
    /// e.g. `Class#new` running `initialize`).
    pub fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        block: Option<&Block>,
    ) -> Result<Value> {
        let class = self.core.class_of(receiver);
        let Some(method) = self.core.registry.lookup_method(class, name) else {
            return Err(Error::no_method(name, &self.core.class_name_of(receiver)));
        };
        let block = block.map(|b| Arc::new(b.clone()));
        let value = self
            .invoke(receiver.clone(), &method, args, block, true)?
            .unwrap_or(Value::Nil);
        Ok(value)
    }

    /// Whether `receiver`'s class chain defines `name`.
    pub fn responds_to(&self, receiver: &Value, name: &str) -> bool {
        let class = self.core.class_of(receiver);
        self.core.registry.lookup_method(class, name).is_some()
    }

    // -----------------------------------------------------------------------
    // Execution loop
    // -----------------------------------------------------------------------

    fn execute_frame(&mut self, frame: CallFrame) -> Result<Value> {
        let base = self.frames.len();
        self.push_frame(frame)?;
        match self.run_until(base) {
            Ok(value) => Ok(value),
            Err(err) => Err(self.unwind(base, err)),
        }
    }

    fn push_frame(&mut self, frame: CallFrame) -> Result<()> {
        if let Some(limit) = self.frame_limit
            && self.frames.len() >= limit
        {
            return Err(Error::FrameLimitExceeded(limit));
        }
        self.frames.push(frame);
        Ok(())
    }

    fn run_until(&mut self, base: usize) -> Result<Value> {
        loop {
            let instr = {
                let frame = self.frames.last_mut().expect("active frame");
                if frame.pc >= frame.iset.instructions.len() {
                    // The generator always terminates a set with `leave`;
                    // falling off the end behaves the same way.
                    Instr::Leave
                } else {
                    let instr = frame.iset.instructions[frame.pc].clone();
                    frame.pc += 1;
                    instr
                }
            };

            self.instruction_count += 1;
            if let Some(limit) = self.instruction_limit
                && self.instruction_count > limit
            {
                return Err(Error::InstructionLimitExceeded(limit));
            }

            self.dispatch(instr)?;

            if self.frames.len() == base {
                return Ok(self.pending.take().unwrap_or(Value::Nil));
            }
        }
    }

    /// Attach a backtrace (set label + source line per frame) to a runtime
    /// error and drop the frames above `base`. Uncatchable limit errors
    /// pass through untouched.
    fn unwind(&mut self, base: usize, err: Error) -> Error {
        let err = match err {
            Error::Runtime(mut runtime) => {
                for frame in self.frames[base..].iter().rev() {
                    let line = frame
                        .iset
                        .lines
                        .get(frame.pc.saturating_sub(1))
                        .copied()
                        .unwrap_or(0);
                    runtime
                        .backtrace
                        .push(format!("{}:{}", frame.iset.label(), line));
                }
                Error::Runtime(runtime)
            }
            other => other,
        };
        self.frames.truncate(base);
        err
    }

    // -----------------------------------------------------------------------
    // Stack helpers
    // -----------------------------------------------------------------------

    fn frame(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("active frame")
    }

    fn push(&mut self, value: Value) {
        self.frame().stack.push(value);
    }

    fn pop(&mut self) -> Result<Value> {
        self.frame()
            .stack
            .pop()
            .ok_or_else(|| Error::internal("value stack underflow"))
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        let stack = &mut self.frame().stack;
        if stack.len() < n {
            return Err(Error::internal("value stack underflow"));
        }
        let at = stack.len() - n;
        Ok(stack.split_off(at))
    }

    /// Resolve a set referenced by the current frame's compilation unit.
    fn set_at(&mut self, index: usize) -> Result<(Arc<InstructionSet>, Arc<Bytecode>)> {
        let frame = self.frame();
        let iset = frame
            .code
            .sets
            .get(index)
            .cloned()
            .ok_or_else(|| Error::internal(format!("missing instruction set #{index}")))?;
        Ok((iset, frame.code.clone()))
    }

    /// The class unqualified constant lookup and definition start from:
    /// the class being defined when `self` is a class, otherwise the
    /// receiver's class (Object at the top level).
    fn constant_scope(&mut self) -> ClassId {
        let self_value = self.frame().self_value.clone();
        match &self_value {
            Value::Class(id) => *id,
            other => self.core.value_class(other),
        }
    }

    // -----------------------------------------------------------------------
    // Instruction dispatch
    // -----------------------------------------------------------------------

    fn dispatch(&mut self, instr: Instr) -> Result<()> {
        match instr {
            Instr::PutObject(literal) => {
                let value = match literal {
                    Literal::Integer(i) => Value::int(i),
                    Literal::Float(x) => Value::float(x),
                    Literal::Boolean(b) => Value::Boolean(b),
                    Literal::Symbol(name) => Value::symbol(&name),
                };
                self.push(value);
            }
            Instr::PutSelf => {
                let value = self.frame().self_value.clone();
                self.push(value);
            }
            Instr::PutNil => self.push(Value::Nil),
            Instr::PutString(s) => self.push(Value::str(s)),

            Instr::NewArray(n) => {
                let items = self.pop_n(n as usize)?;
                self.push(Value::array(items));
            }
            Instr::NewHash(n) => {
                let values = self.pop_n(n as usize)?;
                let mut pairs = Vec::with_capacity(values.len() / 2);
                for chunk in values.chunks_exact(2) {
                    pairs.push((chunk[0].clone(), chunk[1].clone()));
                }
                self.push(Value::hash(pairs));
            }
            Instr::NewRange => {
                let end = self.pop()?;
                let start = self.pop()?;
                let (Some(start), Some(end)) = (start.as_int(), end.as_int()) else {
                    return Err(Error::runtime(
                        ErrorKind::RangeError,
                        "range bounds must be integers",
                    ));
                };
                self.push(Value::range(start, end));
            }

            Instr::GetLocal { depth, index } => {
                let value = self
                    .frame()
                    .env
                    .get(depth, index)
                    .ok_or_else(|| Error::internal("local slot out of range"))?;
                self.push(value);
            }
            Instr::SetLocal { depth, index } => {
                let value = self.pop()?;
                let env = self.frame().env.clone();
                if !env.set(depth, index, value) {
                    return Err(Error::internal("local slot out of range"));
                }
            }

            Instr::GetConstant { name, namespaced } => {
                let value = if namespaced {
                    let scope = self.pop()?;
                    let Value::Class(scope_id) = scope else {
                        return Err(Error::type_error("class or module", scope.kind_name()));
                    };
                    self.core
                        .registry
                        .lookup_constant(scope_id, &name)
                        .ok_or_else(|| {
                            let owner = self.core.registry.get(scope_id).name.clone();
                            Error::runtime(
                                ErrorKind::NameError,
                                format!("uninitialized constant {owner}::{name}"),
                            )
                        })?
                } else {
                    let start = self.constant_scope();
                    self.core
                        .registry
                        .lookup_constant(start, &name)
                        .ok_or_else(|| {
                            Error::runtime(
                                ErrorKind::NameError,
                                format!("uninitialized constant {name}"),
                            )
                        })?
                };
                self.push(value);
            }
            Instr::SetConstant(name) => {
                let value = self.pop()?;
                let scope = self.constant_scope();
                self.core.registry.get(scope).set_constant(name, value);
            }

            Instr::GetInstanceVariable(name) => {
                let self_value = self.frame().self_value.clone();
                let value = match &self_value {
                    Value::Instance(instance) => instance
                        .ivars
                        .read()
                        .expect("ivar lock")
                        .get(&name)
                        .cloned()
                        .unwrap_or(Value::Nil),
                    Value::Class(id) => self
                        .core
                        .registry
                        .get(*id)
                        .ivars
                        .read()
                        .expect("ivar lock")
                        .get(&name)
                        .cloned()
                        .unwrap_or(Value::Nil),
                    _ => Value::Nil,
                };
                self.push(value);
            }
            Instr::SetInstanceVariable(name) => {
                let value = self.pop()?;
                let self_value = self.frame().self_value.clone();
                match &self_value {
                    Value::Instance(instance) => {
                        instance.ivars.write().expect("ivar lock").insert(name, value);
                    }
                    Value::Class(id) => {
                        self.core
                            .registry
                            .get(*id)
                            .ivars
                            .write()
                            .expect("ivar lock")
                            .insert(name, value);
                    }
                    other => {
                        return Err(Error::type_error(
                            "object with instance variables",
                            other.kind_name(),
                        ));
                    }
                }
            }

            Instr::Send {
                method,
                argc,
                block,
            } => {
                let args = self.pop_n(argc as usize)?;
                let receiver = self.pop()?;
                let block = match block {
                    Some(n) => Some(Arc::new(self.capture_block(n)?)),
                    None => None,
                };
                self.send(receiver, &method, args, block)?;
            }

            Instr::InvokeBlock(argc) => {
                let args = self.pop_n(argc as usize)?;
                let Some(block) = self.frame().block.clone() else {
                    return Err(Error::argument("no block given (yield)"));
                };
                let frame = self.block_frame(&block, args, false);
                self.push_frame(frame)?;
            }

            Instr::DefMethod { set, .. } => {
                self.define_compiled_method(set, false)?;
            }
            Instr::DefSingletonMethod { set, .. } => {
                self.define_compiled_method(set, true)?;
            }

            Instr::DefClass {
                is_module,
                name,
                superclass,
                set,
            } => {
                let super_value = if superclass.is_some() {
                    Some(self.pop()?)
                } else {
                    None
                };
                let _receiver = self.pop()?;

                let super_id = match &super_value {
                    Some(Value::Class(id)) => Some(*id),
                    Some(other) => {
                        return Err(Error::type_error("class", other.kind_name()));
                    }
                    None => None,
                };

                let scope = self.constant_scope();
                let scope_class = self.core.registry.get(scope);
                let class_id = match scope_class.constant(&name) {
                    Some(Value::Class(existing)) => {
                        // Re-opening merges into the existing class; a
                        // repeated superclass must agree with the original.
                        if let Some(sup) = super_id
                            && self.core.registry.get(existing).superclass_id() != Some(sup)
                        {
                            return Err(Error::runtime(
                                ErrorKind::TypeError,
                                format!("superclass mismatch for class {name}"),
                            ));
                        }
                        existing
                    }
                    Some(other) => {
                        return Err(Error::runtime(
                            ErrorKind::TypeError,
                            format!("{name} is not a class ({})", other.kind_name()),
                        ));
                    }
                    None => {
                        let superclass = super_id.unwrap_or(self.core.object_class);
                        let id = self.core.registry.define_class(
                            &name,
                            Some(superclass),
                            is_module,
                            self.core.class_class,
                        );
                        scope_class.set_constant(name.as_str(), Value::Class(id));
                        id
                    }
                };

                let (iset, code) = self.set_at(set)?;
                let env = Env::new(iset.locals_count, None);
                let frame = CallFrame {
                    iset,
                    code,
                    pc: 0,
                    self_value: Value::Class(class_id),
                    env,
                    stack: Vec::new(),
                    block: None,
                    entry: false,
                };
                self.push_frame(frame)?;
            }

            Instr::Pop => {
                self.pop()?;
            }
            Instr::Dup => {
                let value = self
                    .frame()
                    .stack
                    .last()
                    .cloned()
                    .ok_or_else(|| Error::internal("value stack underflow"))?;
                self.push(value);
            }

            Instr::Jump(target) => {
                self.frame().pc = target as usize;
            }
            Instr::BranchIf(target) => {
                if self.pop()?.is_truthy() {
                    self.frame().pc = target as usize;
                }
            }
            Instr::BranchUnless(target) => {
                if !self.pop()?.is_truthy() {
                    self.frame().pc = target as usize;
                }
            }

            Instr::Leave => {
                let mut frame = self
                    .frames
                    .pop()
                    .ok_or_else(|| Error::internal("leave without a frame"))?;
                let result = frame.stack.pop().unwrap_or(Value::Nil);
                if frame.entry {
                    self.pending = Some(result);
                } else {
                    let caller = self
                        .frames
                        .last_mut()
                        .ok_or_else(|| Error::internal("leave without a caller"))?;
                    caller.stack.push(result);
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    /// Snapshot the current frame's environment as a block capture.
    fn capture_block(&mut self, id: u32) -> Result<Block> {
        let label = format!("Block:{id}");
        let frame = self.frame();
        let iset = frame
            .code
            .get(&label)
            .cloned()
            .ok_or_else(|| Error::internal(format!("missing instruction set {label}")))?;
        Ok(Block {
            iset,
            code: frame.code.clone(),
            env: frame.env.clone(),
            self_value: frame.self_value.clone(),
        })
    }

    /// Build an invocation frame for a block. Block arity is loose:
    /// missing parameters are nil, extra arguments are dropped.
    fn block_frame(&self, block: &Block, mut args: Vec<Value>, entry: bool) -> CallFrame {
        args.truncate(block.iset.params.len());
        let env = Env::new(block.iset.locals_count, Some(block.env.clone()));
        env.fill(args);
        CallFrame {
            iset: block.iset.clone(),
            code: block.code.clone(),
            pc: 0,
            self_value: block.self_value.clone(),
            env,
            stack: Vec::new(),
            block: None,
            entry,
        }
    }

    /// Dispatch `method` on `receiver`: walk the class chain, fall back to
    /// `method_missing`, raise NoMethodError otherwise.
    fn send(
        &mut self,
        receiver: Value,
        method: &str,
        args: Vec<Value>,
        block: Option<Arc<Block>>,
    ) -> Result<()> {
        let class = self.core.class_of(&receiver);
        let (resolved, args) = match self.core.registry.lookup_method(class, method) {
            Some(found) => (found, args),
            None => match self.core.registry.lookup_method(class, "method_missing") {
                Some(fallback) => {
                    let mut fallback_args = vec![Value::symbol(method)];
                    fallback_args.extend(args);
                    (fallback, fallback_args)
                }
                None => {
                    return Err(Error::no_method(
                        method,
                        &self.core.class_name_of(&receiver),
                    ));
                }
            },
        };

        if let Some(value) = self.invoke(receiver, &resolved, args, block, false)? {
            self.push(value);
        }
        Ok(())
    }

    /// Invoke a resolved method object. Native methods run synchronously
    /// and return `Some(result)`. Compiled methods push a frame and return
    /// `None` — unless `entry` is set, in which case they run to
    /// completion (the builtin re-entry path).
    fn invoke(
        &mut self,
        receiver: Value,
        method: &MethodObject,
        args: Vec<Value>,
        block: Option<Arc<Block>>,
        entry: bool,
    ) -> Result<Option<Value>> {
        match method {
            MethodObject::Builtin { func, .. } => {
                let value = func(self, &receiver, args, block.as_deref())?;
                Ok(Some(value))
            }
            MethodObject::AttrReader(attr) => {
                let key = format!("@{attr}");
                let value = match &receiver {
                    Value::Instance(instance) => instance
                        .ivars
                        .read()
                        .expect("ivar lock")
                        .get(&key)
                        .cloned()
                        .unwrap_or(Value::Nil),
                    _ => Value::Nil,
                };
                Ok(Some(value))
            }
            MethodObject::AttrWriter(attr) => {
                let mut args = args;
                if args.len() != 1 {
                    return Err(Error::argument(format!(
                        "wrong number of arguments (given {}, expected 1)",
                        args.len()
                    )));
                }
                let value = args.remove(0);
                match &receiver {
                    Value::Instance(instance) => {
                        instance
                            .ivars
                            .write()
                            .expect("ivar lock")
                            .insert(format!("@{attr}"), value.clone());
                    }
                    other => {
                        return Err(Error::type_error(
                            "object with instance variables",
                            other.kind_name(),
                        ));
                    }
                }
                Ok(Some(value))
            }
            MethodObject::Compiled { iset, code } => {
                let slots = self.bind_args(iset, args, block.as_deref())?;
                let env = Env::new(iset.locals_count, None);
                env.fill(slots);
                let frame = CallFrame {
                    iset: iset.clone(),
                    code: code.clone(),
                    pc: 0,
                    self_value: receiver,
                    env,
                    stack: Vec::new(),
                    block,
                    entry,
                };
                if entry {
                    Ok(Some(self.execute_frame(frame)?))
                } else {
                    self.push_frame(frame)?;
                    Ok(None)
                }
            }
        }
    }

    /// Bind call arguments to parameter slots: positionals to
    /// normal/optional parameters in order, the rest into the splat array,
    /// keyword arguments from a trailing hash matched by name, and the
    /// block capture into the block-parameter slot.
    fn bind_args(
        &self,
        iset: &InstructionSet,
        mut args: Vec<Value>,
        block: Option<&Block>,
    ) -> Result<Vec<Value>> {
        let params = &iset.params;
        let mut slots = vec![Value::Nil; params.len()];

        let has_keywords = params
            .iter()
            .any(|p| matches!(p.kind, ArgKind::Keyword { .. }));
        let mut keyword_args: Vec<(Value, Value)> = Vec::new();
        if has_keywords
            && let Some(Value::Hash(pairs)) = args.last()
        {
            keyword_args = pairs.read().expect("value lock").clone();
            args.pop();
        }

        let positional: Vec<usize> = params
            .iter()
            .enumerate()
            .filter(|(_, p)| matches!(p.kind, ArgKind::Normal | ArgKind::Optional))
            .map(|(i, _)| i)
            .collect();
        let required = params
            .iter()
            .filter(|p| matches!(p.kind, ArgKind::Normal))
            .count();
        let splat = params.iter().position(|p| matches!(p.kind, ArgKind::Splat));

        if args.len() < required || (args.len() > positional.len() && splat.is_none()) {
            return Err(Error::argument(format!(
                "wrong number of arguments (given {}, expected {required})",
                args.len()
            )));
        }

        let bound = args.len().min(positional.len());
        let rest = args.split_off(bound);
        for (value, &slot) in args.into_iter().zip(positional.iter()) {
            slots[slot] = value;
        }
        if let Some(slot) = splat {
            slots[slot] = Value::array(rest);
        }

        for (i, param) in params.iter().enumerate() {
            if let ArgKind::Keyword { required } = param.kind {
                let found = keyword_args
                    .iter()
                    .position(|(k, _)| k.as_str().is_some_and(|s| s == param.name));
                match found {
                    Some(at) => slots[i] = keyword_args.remove(at).1,
                    None if required => {
                        return Err(Error::argument(format!("missing keyword: {}", param.name)));
                    }
                    None => {}
                }
            }
        }
        if let Some((key, _)) = keyword_args.first() {
            return Err(Error::argument(format!(
                "unknown keyword: {}",
                self.core.value_to_s(key)
            )));
        }

        if let Some(slot) = params.iter().position(|p| matches!(p.kind, ArgKind::Block)) {
            slots[slot] = block
                .map(|b| Value::Block(Arc::new(b.clone())))
                .unwrap_or(Value::Nil);
        }

        Ok(slots)
    }

    /// `def_method` / `def_singleton_method`: pop the canonical name and
    /// the receiver, attach the compiled body under the short method name.
    fn define_compiled_method(&mut self, set: usize, singleton: bool) -> Result<()> {
        let name_value = self.pop()?;
        let receiver = self.pop()?;
        let canonical = name_value
            .as_str()
            .ok_or_else(|| Error::internal("method name must be a string"))?;
        let short = canonical
            .rsplit(['#', '.'])
            .next()
            .unwrap_or(canonical.as_str())
            .to_string();

        let owner = match &receiver {
            Value::Class(id) => *id,
            other => self.core.value_class(other),
        };
        let target = if singleton {
            self.core
                .registry
                .get(owner)
                .metaclass_id()
                .unwrap_or(self.core.class_class)
        } else {
            owner
        };

        let (iset, code) = self.set_at(set)?;
        self.core
            .registry
            .get(target)
            .define_method(short, MethodObject::Compiled { iset, code });
        Ok(())
    }
}
