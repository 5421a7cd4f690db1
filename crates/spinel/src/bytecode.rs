//! Bytecode instruction set and compiled code representation.
//!
//! The generator produces named [`InstructionSet`]s — one per program,
//! class body, method body, and anonymous block — and the VM executes them.
//! The textual rendering implemented by the `Display` impls is the
//! authoritative serialization used by the test suite; it is stable and
//! deterministic for a given source input.

use std::fmt;
use std::sync::Arc;

/// A literal operand for `putobject`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Symbol(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Symbol(s) => write!(f, ":{s}"),
        }
    }
}

/// A single bytecode instruction.
///
/// Branch targets are absolute instruction indices within the same
/// [`InstructionSet`]. Stack effects are documented per variant; `argc`
/// style operands count values popped in addition to any receiver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instr {
    /// Push a literal (integer, float, boolean, or symbol).
    PutObject(Literal),
    /// Push the current frame's `self`.
    PutSelf,
    /// Push nil.
    PutNil,
    /// Push a freshly allocated string.
    PutString(String),
    /// Pop `n` values, push an array of them in push order.
    NewArray(u32),
    /// Pop `n` values (`n` is even: alternating key, value), push a hash.
    NewHash(u32),
    /// Pop end and start, push an inclusive range.
    NewRange,
    /// Read a local `depth` block frames out, slot `index`.
    GetLocal { depth: u32, index: u32 },
    /// Pop the top of stack into that local.
    SetLocal { depth: u32, index: u32 },
    /// Look up a constant. `namespaced` marks a `A::B` chain link, which
    /// scopes the lookup to the class just pushed; it is not part of the
    /// printed form.
    GetConstant { name: String, namespaced: bool },
    /// Pop the top of stack and define a constant in the current scope.
    SetConstant(String),
    /// Read `@name` from `self`.
    GetInstanceVariable(String),
    /// Pop the top of stack into `@name` on `self`.
    SetInstanceVariable(String),
    /// Invoke `method` with `argc` arguments; the receiver sits beneath
    /// them on the stack. `block` references an anonymous block set.
    Send {
        method: String,
        argc: u32,
        block: Option<u32>,
    },
    /// Invoke the block attached to the current method frame.
    InvokeBlock(u32),
    /// Pop a canonical method name and a receiver; define an instance
    /// method from the `Def:` set at `set` (an index into the compiled
    /// set list, not part of the printed form). The printed operand is
    /// the declared parameter count.
    DefMethod { argc: u32, set: usize },
    /// As `DefMethod`, on the receiver's metaclass.
    DefSingletonMethod { argc: u32, set: usize },
    /// Create or re-open the class/module `name` and execute the
    /// `DefClass:` body at `set` with `self` set to the class. A
    /// superclass operand names the expression pushed beneath `self`.
    DefClass {
        is_module: bool,
        name: String,
        superclass: Option<String>,
        set: usize,
    },
    /// Discard the top of stack.
    Pop,
    /// Duplicate the top of stack.
    Dup,
    Jump(u32),
    /// Pop; branch if truthy.
    BranchIf(u32),
    /// Pop; branch if falsy.
    BranchUnless(u32),
    /// Return the top of stack (nil when empty) from the current frame.
    Leave,
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PutObject(lit) => write!(f, "putobject {lit}"),
            Self::PutSelf => write!(f, "putself"),
            Self::PutNil => write!(f, "putnil"),
            Self::PutString(s) => write!(f, "putstring {s:?}"),
            Self::NewArray(n) => write!(f, "newarray {n}"),
            Self::NewHash(n) => write!(f, "newhash {n}"),
            Self::NewRange => write!(f, "newrange"),
            Self::GetLocal { depth, index } => write!(f, "getlocal {depth} {index}"),
            Self::SetLocal { depth, index } => write!(f, "setlocal {depth} {index}"),
            Self::GetConstant { name, .. } => write!(f, "getconstant {name}"),
            Self::SetConstant(name) => write!(f, "setconstant {name}"),
            Self::GetInstanceVariable(name) => write!(f, "getinstancevariable {name}"),
            Self::SetInstanceVariable(name) => write!(f, "setinstancevariable {name}"),
            Self::Send {
                method,
                argc,
                block,
            } => {
                write!(f, "send {method} {argc}")?;
                if let Some(n) = block {
                    write!(f, " block:{n}")?;
                }
                Ok(())
            }
            Self::InvokeBlock(argc) => write!(f, "invokeblock {argc}"),
            Self::DefMethod { argc, .. } => write!(f, "def_method {argc}"),
            Self::DefSingletonMethod { argc, .. } => {
                write!(f, "def_singleton_method {argc}")
            }
            Self::DefClass {
                is_module,
                name,
                superclass,
                ..
            } => {
                let kind = if *is_module { "module" } else { "class" };
                write!(f, "def_class {kind}:{name}")?;
                if let Some(sup) = superclass {
                    write!(f, " {sup}")?;
                }
                Ok(())
            }
            Self::Pop => write!(f, "pop"),
            Self::Dup => write!(f, "dup"),
            Self::Jump(t) => write!(f, "jump {t}"),
            Self::BranchIf(t) => write!(f, "branchif {t}"),
            Self::BranchUnless(t) => write!(f, "branchunless {t}"),
            Self::Leave => write!(f, "leave"),
        }
    }
}

/// What a compiled set is the body of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SetKind {
    Program,
    Class,
    Method,
    Block,
}

/// Parameter binding categories, recorded per declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArgKind {
    Normal,
    /// Has a compiled default; bound when no positional is supplied.
    Optional,
    /// Collects excess positionals into an array.
    Splat,
    /// Matched by name from a trailing hash argument.
    Keyword { required: bool },
    /// Captures the attached block.
    Block,
}

/// One declared parameter of a method or block body.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamSpec {
    pub name: String,
    pub kind: ArgKind,
}

/// A named, immutable sequence of instructions with its local table size
/// and parameter list.
///
/// `lines` parallels `instructions`: the source line each instruction was
/// generated from, used for backtraces after the AST is gone.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstructionSet {
    pub kind: SetKind,
    /// Canonical name: `Object::A::B#m` for methods, the short class name
    /// for class bodies, the block number for blocks.
    pub name: String,
    pub instructions: Vec<Instr>,
    pub lines: Vec<u32>,
    pub locals_count: usize,
    pub params: Vec<ParamSpec>,
}

impl InstructionSet {
    /// The lookup key and display header, e.g. `Def:Object::Foo#bar`,
    /// `DefClass:Baz`, `Block:0`, `ProgramStart`.
    pub fn label(&self) -> String {
        match self.kind {
            SetKind::Program => "ProgramStart".into(),
            SetKind::Class => format!("DefClass:{}", self.name),
            SetKind::Method => format!("Def:{}", self.name),
            SetKind::Block => format!("Block:{}", self.name),
        }
    }
}

impl fmt::Display for InstructionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<{}>", self.label())?;
        for (i, instr) in self.instructions.iter().enumerate() {
            writeln!(f, "{i} {instr}")?;
        }
        Ok(())
    }
}

/// The complete output of compiling one program: every instruction set in
/// completion order, the program set last.
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub sets: Vec<Arc<InstructionSet>>,
}

impl Bytecode {
    /// The `<ProgramStart>` entry point.
    pub fn program(&self) -> &Arc<InstructionSet> {
        self.sets
            .last()
            .expect("bytecode always contains the program set")
    }

    /// Look up a set by its label.
    pub fn get(&self, label: &str) -> Option<&Arc<InstructionSet>> {
        self.sets.iter().find(|s| s.label() == label)
    }
}

impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for set in &self.sets {
            write!(f, "{set}")?;
        }
        Ok(())
    }
}
