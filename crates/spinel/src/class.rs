//! Classes, modules, metaclasses, and the class registry.
//!
//! Classes live in a typed arena ([`ClassRegistry`]); every cross-reference
//! is a [`ClassId`] index, so the class ↔ metaclass and class ↔ superclass
//! cycles never need owning pointers. Method and constant tables are
//! `RwLock`-protected so method definition publishes atomically to
//! concurrently running interpreter threads.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::bytecode::{Bytecode, InstructionSet};
use crate::error::Result;
use crate::value::{Block, Value};
use crate::vm::VmThread;

/// Index into the class arena.
pub type ClassId = usize;

/// A native method: a plain function, no captured state. The receiver and
/// the current thread arrive as arguments, and the optional block is the
/// caller's block capture.
pub type BuiltinFn =
    fn(&mut VmThread, &Value, Vec<Value>, Option<&Block>) -> Result<Value>;

/// An entry in a method table.
#[derive(Clone)]
pub enum MethodObject {
    /// Bytecode-backed method; `code` is the compilation unit the body
    /// belongs to, used to resolve its block references.
    Compiled {
        iset: Arc<InstructionSet>,
        code: Arc<Bytecode>,
    },
    /// Native method.
    Builtin { name: &'static str, func: BuiltinFn },
    /// Reads `@name` (generated by `attr_reader` / `attr_accessor`).
    AttrReader(String),
    /// Writes `@name` (generated by `attr_writer` / `attr_accessor`).
    AttrWriter(String),
}

impl std::fmt::Debug for MethodObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compiled { iset, .. } => write!(f, "Compiled({})", iset.label()),
            Self::Builtin { name, .. } => write!(f, "Builtin({name})"),
            Self::AttrReader(name) => write!(f, "AttrReader({name})"),
            Self::AttrWriter(name) => write!(f, "AttrWriter({name})"),
        }
    }
}

/// A class or module object.
///
/// The mutable tables are append-mostly; redefinition replaces the table
/// entry under the write lock, which readers observe atomically.
pub struct RClass {
    pub name: String,
    pub is_module: bool,
    /// Metaclasses themselves have no metaclass.
    pub is_meta: bool,
    pub superclass: RwLock<Option<ClassId>>,
    pub metaclass: RwLock<Option<ClassId>>,
    /// Included modules, in include order; lookup walks them in reverse.
    pub included: RwLock<Vec<ClassId>>,
    pub methods: RwLock<HashMap<String, Arc<MethodObject>>>,
    pub constants: RwLock<HashMap<String, Value>>,
    /// Class-level instance variables (`@x` while `self` is the class).
    pub ivars: RwLock<HashMap<String, Value>>,
}

impl RClass {
    fn new(name: impl Into<String>, superclass: Option<ClassId>, is_module: bool) -> Self {
        Self {
            name: name.into(),
            is_module,
            is_meta: false,
            superclass: RwLock::new(superclass),
            metaclass: RwLock::new(None),
            included: RwLock::new(Vec::new()),
            methods: RwLock::new(HashMap::new()),
            constants: RwLock::new(HashMap::new()),
            ivars: RwLock::new(HashMap::new()),
        }
    }

    pub fn superclass_id(&self) -> Option<ClassId> {
        *self.superclass.read().expect("class lock")
    }

    pub fn metaclass_id(&self) -> Option<ClassId> {
        *self.metaclass.read().expect("class lock")
    }

    pub fn define_method(&self, name: impl Into<String>, method: MethodObject) {
        self.methods
            .write()
            .expect("class lock")
            .insert(name.into(), Arc::new(method));
    }

    pub fn constant(&self, name: &str) -> Option<Value> {
        self.constants.read().expect("class lock").get(name).cloned()
    }

    pub fn set_constant(&self, name: impl Into<String>, value: Value) {
        self.constants
            .write()
            .expect("class lock")
            .insert(name.into(), value);
    }
}

/// The arena of all classes, shared by every interpreter thread.
pub struct ClassRegistry {
    classes: RwLock<Vec<Arc<RClass>>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self {
            classes: RwLock::new(Vec::new()),
        }
    }

    pub fn get(&self, id: ClassId) -> Arc<RClass> {
        self.classes.read().expect("registry lock")[id].clone()
    }

    fn add(&self, class: RClass) -> ClassId {
        let mut classes = self.classes.write().expect("registry lock");
        classes.push(Arc::new(class));
        classes.len() - 1
    }

    /// Wire up the root of the class graph: `Object`, `Class`, and
    /// `Module`, plus their metaclasses. `Class` must exist before any
    /// metaclass can name a superclass, so the root three are built by
    /// hand rather than through [`define_class`](Self::define_class).
    ///
    /// Returns `(object, class, module)`.
    pub fn bootstrap(&self) -> (ClassId, ClassId, ClassId) {
        let object = self.add(RClass::new("Object", None, false));
        let class = self.add(RClass::new("Class", Some(object), false));
        let module = self.add(RClass::new("Module", Some(object), false));

        let object_meta = self.add_meta("Object", class);
        *self.get(object).metaclass.write().expect("class lock") = Some(object_meta);
        let class_meta = self.add_meta("Class", object_meta);
        *self.get(class).metaclass.write().expect("class lock") = Some(class_meta);
        let module_meta = self.add_meta("Module", object_meta);
        *self.get(module).metaclass.write().expect("class lock") = Some(module_meta);

        (object, class, module)
    }

    fn add_meta(&self, name: &str, superclass: ClassId) -> ClassId {
        let mut meta = RClass::new(format!("#<Class:{name}>"), Some(superclass), false);
        meta.is_meta = true;
        self.add(meta)
    }

    /// Create a class (or module) together with its metaclass. The
    /// metaclass inherits from the superclass's metaclass so that class
    /// methods are inherited; `class_class` roots that chain.
    pub fn define_class(
        &self,
        name: &str,
        superclass: Option<ClassId>,
        is_module: bool,
        class_class: ClassId,
    ) -> ClassId {
        let id = self.add(RClass::new(name, superclass, is_module));

        let meta_super = superclass
            .and_then(|sup| self.get(sup).metaclass_id())
            .unwrap_or(class_class);
        let mut meta = RClass::new(format!("#<Class:{name}>"), Some(meta_super), false);
        meta.is_meta = true;
        let meta_id = self.add(meta);

        *self.get(id).metaclass.write().expect("class lock") = Some(meta_id);
        id
    }

    /// Method dispatch walk: the class itself, its included modules in
    /// reverse include order, then up the superclass chain.
    pub fn lookup_method(&self, class: ClassId, name: &str) -> Option<Arc<MethodObject>> {
        let mut current = Some(class);
        while let Some(id) = current {
            let class = self.get(id);
            if let Some(method) = class.methods.read().expect("class lock").get(name) {
                return Some(method.clone());
            }
            let included = class.included.read().expect("class lock").clone();
            for module in included.iter().rev() {
                let module = self.get(*module);
                if let Some(method) = module.methods.read().expect("class lock").get(name) {
                    return Some(method.clone());
                }
            }
            current = class.superclass_id();
        }
        None
    }

    /// Constant resolution: the starting class's own table, then its
    /// superclass chain.
    pub fn lookup_constant(&self, start: ClassId, name: &str) -> Option<Value> {
        let mut current = Some(start);
        while let Some(id) = current {
            let class = self.get(id);
            if let Some(value) = class.constant(name) {
                return Some(value);
            }
            current = class.superclass_id();
        }
        None
    }

    /// True when `class` or anything on its lookup chain (superclasses or
    /// included modules) is `target`. Backs `is_a?`.
    pub fn is_descendant(&self, class: ClassId, target: ClassId) -> bool {
        let mut current = Some(class);
        while let Some(id) = current {
            if id == target {
                return true;
            }
            let class = self.get(id);
            if class
                .included
                .read()
                .expect("class lock")
                .iter()
                .any(|m| *m == target)
            {
                return true;
            }
            current = class.superclass_id();
        }
        false
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}
