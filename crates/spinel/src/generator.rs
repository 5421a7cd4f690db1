//! Bytecode generator: AST → named instruction sets.
//!
//! Walks the AST once per scope and emits a flat instruction stream per
//! [`InstructionSet`]. Jumps use a placeholder/patch approach: emitted with
//! a dummy target, then patched once the real target offset is known.
//!
//! Instruction sets are recorded in completion order — a nested method or
//! block body finishes before the scope that contains it — and the program
//! set always comes last. This is the order the textual form prints.

use std::sync::Arc;

use crate::ast::{
    BlockArg, ExprKind, Expression, Param, ParamKind, PrefixOp, Program, Statement, StmtKind,
};
use crate::bytecode::{ArgKind, Bytecode, Instr, InstructionSet, Literal, ParamSpec, SetKind};
use crate::error::{Error, Result};

/// Compile a parsed program into bytecode.
pub fn generate(program: &Program) -> Result<Bytecode> {
    let mut generator = Generator::new();
    generator.push_scope(SetKind::Program, "ProgramStart", true);
    generator.compile_statements(&program.statements, true)?;
    let line = program.statements.last().map_or(1, |s| s.line);
    generator.emit(Instr::Leave, line);
    generator.finish_scope();
    Ok(Bytecode {
        sets: generator.sets,
    })
}

/// Loop bookkeeping: `next` emits a jump patched to the loop's test label
/// once the body is fully compiled.
#[derive(Default)]
struct LoopContext {
    next_placeholders: Vec<usize>,
}

/// One instruction set under construction, with its local table.
struct CodeScope {
    kind: SetKind,
    name: String,
    /// Method, class, and program scopes stop outward local lookup;
    /// block scopes are transparent.
    barrier: bool,
    locals: Vec<String>,
    params: Vec<ParamSpec>,
    instructions: Vec<Instr>,
    lines: Vec<u32>,
    loops: Vec<LoopContext>,
}

impl CodeScope {
    fn new(kind: SetKind, name: impl Into<String>, barrier: bool) -> Self {
        Self {
            kind,
            name: name.into(),
            barrier,
            locals: Vec::new(),
            params: Vec::new(),
            instructions: Vec::new(),
            lines: Vec::new(),
            loops: Vec::new(),
        }
    }
}

struct Generator {
    sets: Vec<Arc<InstructionSet>>,
    scopes: Vec<CodeScope>,
    /// Enclosing class/module names, for canonical method naming.
    class_path: Vec<String>,
    block_count: u32,
}

impl Generator {
    fn new() -> Self {
        Self {
            sets: Vec::new(),
            scopes: Vec::new(),
            class_path: Vec::new(),
            block_count: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Scope and emission helpers
    // -----------------------------------------------------------------------

    fn scope(&mut self) -> &mut CodeScope {
        self.scopes.last_mut().expect("a scope is always open")
    }

    fn push_scope(&mut self, kind: SetKind, name: impl Into<String>, barrier: bool) {
        self.scopes.push(CodeScope::new(kind, name, barrier));
    }

    /// Close the current scope and record its instruction set.
    fn finish_scope(&mut self) {
        let scope = self.scopes.pop().expect("a scope is always open");
        self.sets.push(Arc::new(InstructionSet {
            kind: scope.kind,
            name: scope.name,
            instructions: scope.instructions,
            lines: scope.lines,
            locals_count: scope.locals.len(),
            params: scope.params,
        }));
    }

    fn emit(&mut self, instr: Instr, line: u32) {
        let scope = self.scope();
        scope.instructions.push(instr);
        scope.lines.push(line);
    }

    /// Emit a jump with a placeholder target; returns its index for
    /// patching.
    fn emit_jump(&mut self, make: fn(u32) -> Instr, line: u32) -> usize {
        let idx = self.scope().instructions.len();
        self.emit(make(0), line);
        idx
    }

    fn patch(&mut self, idx: usize, target: u32) {
        match &mut self.scope().instructions[idx] {
            Instr::Jump(t) | Instr::BranchIf(t) | Instr::BranchUnless(t) => *t = target,
            other => panic!("patch on non-jump instruction {other:?}"),
        }
    }

    fn offset(&mut self) -> u32 {
        self.scope().instructions.len() as u32
    }

    // -----------------------------------------------------------------------
    // Local table
    // -----------------------------------------------------------------------

    /// Walk outward through enclosing block scopes (stopping at the first
    /// method/class/program barrier) for `name`. Returns (depth, index).
    fn resolve_local(&self, name: &str) -> Option<(u32, u32)> {
        let mut depth = 0u32;
        for scope in self.scopes.iter().rev() {
            if let Some(idx) = scope.locals.iter().position(|l| l == name) {
                return Some((depth, idx as u32));
            }
            if scope.barrier {
                break;
            }
            depth += 1;
        }
        None
    }

    /// Resolve an assignment target, allocating a slot in the current
    /// scope on first assignment.
    fn resolve_or_define(&mut self, name: &str) -> (u32, u32) {
        if let Some(found) = self.resolve_local(name) {
            return found;
        }
        let scope = self.scope();
        scope.locals.push(name.to_string());
        (0, (scope.locals.len() - 1) as u32)
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    /// Compile a statement sequence. Only the last statement may produce
    /// the sequence's value, and only when `last_used` is set.
    fn compile_statements(&mut self, statements: &[Statement], last_used: bool) -> Result<()> {
        let n = statements.len();
        for (i, statement) in statements.iter().enumerate() {
            self.compile_statement(statement, last_used && i == n - 1)?;
        }
        Ok(())
    }

    fn compile_statement(&mut self, statement: &Statement, used: bool) -> Result<()> {
        let line = statement.line;
        match &statement.kind {
            StmtKind::Expression(expr) => {
                // Unused side-effect-free literals vanish entirely.
                if !used && expr.is_pure_literal() {
                    return Ok(());
                }
                self.compile_expression(expr, used)?;
                // Postfix increment/decrement leave their result behind;
                // drop it in statement position.
                let is_incr = matches!(
                    &expr.kind,
                    ExprKind::Call { method, .. } if method == "++" || method == "--"
                );
                if !used && is_incr {
                    self.emit(Instr::Pop, line);
                }
                Ok(())
            }
            StmtKind::While { condition, body } => self.compile_while(condition, body, line),
            StmtKind::Next => {
                if self.scope().loops.is_empty() {
                    return Err(Error::Compile {
                        line,
                        reason: "`next` outside of a loop".into(),
                    });
                }
                let placeholder = self.emit_jump(Instr::Jump, line);
                self.scope()
                    .loops
                    .last_mut()
                    .expect("loop context checked above")
                    .next_placeholders
                    .push(placeholder);
                Ok(())
            }
            StmtKind::Return { value } => {
                if !matches!(self.scope().kind, SetKind::Method | SetKind::Block) {
                    return Err(Error::Compile {
                        line,
                        reason: "`return` outside of a method".into(),
                    });
                }
                match value {
                    Some(expr) => self.compile_expression(expr, true)?,
                    None => self.emit(Instr::PutNil, line),
                }
                self.emit(Instr::Leave, line);
                Ok(())
            }
            StmtKind::Def {
                receiver,
                name,
                params,
                body,
            } => self.compile_def(receiver.as_ref(), name, params, body, line),
            StmtKind::Class {
                name,
                superclass,
                body,
            } => self.compile_class(name, superclass.as_ref(), body, false, line),
            StmtKind::Module { name, body } => self.compile_class(name, None, body, true, line),
        }
    }

    /// The test-at-bottom loop shape:
    ///
    /// ```text
    /// jump TEST
    /// putnil; pop; jump TEST     (reserved prologue; `next` targets TEST)
    /// BODY: …
    /// TEST: <condition>
    /// branchif BODY
    /// putnil; pop                (a while statement never yields a value)
    /// ```
    fn compile_while(&mut self, condition: &Expression, body: &[Statement], line: u32) -> Result<()> {
        let jump_to_test = self.emit_jump(Instr::Jump, line);
        self.emit(Instr::PutNil, line);
        self.emit(Instr::Pop, line);
        let prologue_jump = self.emit_jump(Instr::Jump, line);

        let body_start = self.offset();
        self.scope().loops.push(LoopContext::default());
        self.compile_statements(body, false)?;
        let context = self
            .scope()
            .loops
            .pop()
            .expect("loop context pushed above");

        let test = self.offset();
        self.patch(jump_to_test, test);
        self.patch(prologue_jump, test);
        for placeholder in context.next_placeholders {
            self.patch(placeholder, test);
        }

        self.compile_expression(condition, true)?;
        self.emit(Instr::BranchIf(body_start), line);
        self.emit(Instr::PutNil, line);
        self.emit(Instr::Pop, line);
        Ok(())
    }

    fn compile_def(
        &mut self,
        receiver: Option<&Expression>,
        name: &str,
        params: &[Param],
        body: &[Statement],
        line: u32,
    ) -> Result<()> {
        let singleton = match receiver {
            None => false,
            Some(expr) if matches!(expr.kind, ExprKind::SelfRef) => true,
            Some(expr) => {
                return Err(Error::Compile {
                    line: expr.line,
                    reason: format!("invalid receiver in `def` for method `{name}`"),
                });
            }
        };

        let canonical = self.canonical_method_name(name, singleton);

        self.push_scope(SetKind::Method, canonical.clone(), true);
        for param in params {
            let kind = match &param.kind {
                ParamKind::Normal => ArgKind::Normal,
                ParamKind::Optional(_) => ArgKind::Optional,
                ParamKind::Splat => ArgKind::Splat,
                ParamKind::Keyword(default) => ArgKind::Keyword {
                    required: default.is_none(),
                },
                ParamKind::Block => ArgKind::Block,
            };
            let scope = self.scope();
            scope.locals.push(param.name.clone());
            scope.params.push(ParamSpec {
                name: param.name.clone(),
                kind,
            });
        }

        // Defaults prologue: a parameter slot still nil after binding
        // takes its compiled default.
        for (index, param) in params.iter().enumerate() {
            let default = match &param.kind {
                ParamKind::Optional(d) => Some(d),
                ParamKind::Keyword(Some(d)) => Some(d),
                _ => None,
            };
            if let Some(default) = default {
                self.emit(
                    Instr::GetLocal {
                        depth: 0,
                        index: index as u32,
                    },
                    default.line,
                );
                let skip = self.emit_jump(Instr::BranchIf, default.line);
                self.compile_expression(default, true)?;
                self.emit(
                    Instr::SetLocal {
                        depth: 0,
                        index: index as u32,
                    },
                    default.line,
                );
                let after = self.offset();
                self.patch(skip, after);
            }
        }

        if body.is_empty() {
            self.emit(Instr::PutNil, line);
        } else {
            self.compile_statements(body, true)?;
        }
        self.emit(Instr::Leave, line);
        self.finish_scope();
        let set = self.sets.len() - 1;

        self.emit(Instr::PutSelf, line);
        self.emit(Instr::PutString(canonical), line);
        let argc = params.len() as u32;
        if singleton {
            self.emit(Instr::DefSingletonMethod { argc, set }, line);
        } else {
            self.emit(Instr::DefMethod { argc, set }, line);
        }
        Ok(())
    }

    fn canonical_method_name(&self, name: &str, singleton: bool) -> String {
        let mut path = String::from("Object");
        for segment in &self.class_path {
            path.push_str("::");
            path.push_str(segment);
        }
        let separator = if singleton { '.' } else { '#' };
        format!("{path}{separator}{name}")
    }

    fn compile_class(
        &mut self,
        name: &str,
        superclass: Option<&Expression>,
        body: &[Statement],
        is_module: bool,
        line: u32,
    ) -> Result<()> {
        self.class_path.push(name.to_string());
        self.push_scope(SetKind::Class, name, true);
        self.compile_statements(body, true)?;
        self.emit(Instr::Leave, line);
        self.finish_scope();
        self.class_path.pop();
        let set = self.sets.len() - 1;

        self.emit(Instr::PutSelf, line);
        let superclass_name = match superclass {
            Some(expr) => {
                self.compile_expression(expr, true)?;
                Some(self.superclass_name(expr)?)
            }
            None => None,
        };
        self.emit(
            Instr::DefClass {
                is_module,
                name: name.to_string(),
                superclass: superclass_name,
                set,
            },
            line,
        );
        self.emit(Instr::Pop, line);
        Ok(())
    }

    fn superclass_name(&self, expr: &Expression) -> Result<String> {
        match &expr.kind {
            ExprKind::Constant(name) => Ok(name.clone()),
            ExprKind::ScopedConstant { name, .. } => Ok(name.clone()),
            _ => Err(Error::Compile {
                line: expr.line,
                reason: "superclass must be a constant".into(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    /// Compile one expression. `used` only changes the shape of
    /// assignments (which otherwise consume their value) and `if`
    /// expressions (which otherwise skip the nil arm); every other
    /// expression pushes exactly one value.
    fn compile_expression(&mut self, expr: &Expression, used: bool) -> Result<()> {
        let line = expr.line;
        match &expr.kind {
            ExprKind::Integer(value) => {
                self.emit(Instr::PutObject(Literal::Integer(*value)), line);
            }
            ExprKind::Float(value) => {
                self.emit(Instr::PutObject(Literal::Float(*value)), line);
            }
            ExprKind::Boolean(value) => {
                self.emit(Instr::PutObject(Literal::Boolean(*value)), line);
            }
            ExprKind::Symbol(name) => {
                self.emit(Instr::PutObject(Literal::Symbol(name.clone())), line);
            }
            ExprKind::Str(value) => self.emit(Instr::PutString(value.clone()), line),
            ExprKind::Nil => self.emit(Instr::PutNil, line),
            ExprKind::SelfRef => self.emit(Instr::PutSelf, line),

            ExprKind::Array(elements) => {
                for element in elements {
                    self.compile_expression(element, true)?;
                }
                self.emit(Instr::NewArray(elements.len() as u32), line);
            }
            ExprKind::Hash(pairs) => {
                for (key, value) in pairs {
                    self.emit(Instr::PutString(key.clone()), line);
                    self.compile_expression(value, true)?;
                }
                self.emit(Instr::NewHash((pairs.len() * 2) as u32), line);
            }
            ExprKind::Range { start, end } => {
                self.compile_expression(start, true)?;
                self.compile_expression(end, true)?;
                self.emit(Instr::NewRange, line);
            }

            ExprKind::Identifier(name) => match self.resolve_local(name) {
                Some((depth, index)) => self.emit(Instr::GetLocal { depth, index }, line),
                // An unknown name is a parenless method call on self.
                None => {
                    self.emit(Instr::PutSelf, line);
                    self.emit(
                        Instr::Send {
                            method: name.clone(),
                            argc: 0,
                            block: None,
                        },
                        line,
                    );
                }
            },
            ExprKind::Constant(name) => self.emit(
                Instr::GetConstant {
                    name: name.clone(),
                    namespaced: false,
                },
                line,
            ),
            ExprKind::ScopedConstant { scope, name } => {
                self.compile_expression(scope, true)?;
                self.emit(
                    Instr::GetConstant {
                        name: name.clone(),
                        namespaced: true,
                    },
                    line,
                );
            }
            ExprKind::InstanceVariable(name) => {
                self.emit(Instr::GetInstanceVariable(name.clone()), line);
            }

            ExprKind::Prefix { operator, operand } => match operator {
                PrefixOp::Neg => {
                    self.emit(Instr::PutObject(Literal::Integer(0)), line);
                    self.compile_expression(operand, true)?;
                    self.emit(
                        Instr::Send {
                            method: "-".into(),
                            argc: 1,
                            block: None,
                        },
                        line,
                    );
                }
                PrefixOp::Not => {
                    self.compile_expression(operand, true)?;
                    self.emit(
                        Instr::Send {
                            method: "!".into(),
                            argc: 0,
                            block: None,
                        },
                        line,
                    );
                }
            },
            ExprKind::Infix {
                left,
                operator,
                right,
            } => {
                self.compile_expression(left, true)?;
                self.compile_expression(right, true)?;
                self.emit(
                    Instr::Send {
                        method: operator.clone(),
                        argc: 1,
                        block: None,
                    },
                    line,
                );
            }

            ExprKind::Assign { target, value } => {
                self.compile_expression(value, true)?;
                if used {
                    self.emit(Instr::Dup, line);
                }
                match &target.kind {
                    ExprKind::Identifier(name) => {
                        let (depth, index) = self.resolve_or_define(name);
                        self.emit(Instr::SetLocal { depth, index }, line);
                    }
                    ExprKind::InstanceVariable(name) => {
                        self.emit(Instr::SetInstanceVariable(name.clone()), line);
                    }
                    ExprKind::Constant(name) => {
                        self.emit(Instr::SetConstant(name.clone()), line);
                    }
                    _ => {
                        return Err(Error::Compile {
                            line,
                            reason: "invalid assignment target".into(),
                        });
                    }
                }
            }

            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_expression(condition, true)?;
                let branch = self.emit_jump(Instr::BranchUnless, line);
                if used {
                    if consequence.is_empty() {
                        self.emit(Instr::PutNil, line);
                    } else {
                        self.compile_statements(consequence, true)?;
                    }
                    let jump_end = self.emit_jump(Instr::Jump, line);
                    let alt_start = self.offset();
                    self.patch(branch, alt_start);
                    match alternative {
                        Some(alt) if !alt.is_empty() => self.compile_statements(alt, true)?,
                        _ => self.emit(Instr::PutNil, line),
                    }
                    let end = self.offset();
                    self.patch(jump_end, end);
                } else {
                    self.compile_statements(consequence, false)?;
                    match alternative {
                        Some(alt) => {
                            let jump_end = self.emit_jump(Instr::Jump, line);
                            let alt_start = self.offset();
                            self.patch(branch, alt_start);
                            self.compile_statements(alt, false)?;
                            let end = self.offset();
                            self.patch(jump_end, end);
                        }
                        None => {
                            let end = self.offset();
                            self.patch(branch, end);
                        }
                    }
                }
            }

            ExprKind::Call {
                receiver,
                method,
                args,
                block,
            } => {
                match receiver {
                    Some(receiver) => self.compile_expression(receiver, true)?,
                    None => self.emit(Instr::PutSelf, line),
                }
                for arg in args {
                    self.compile_expression(arg, true)?;
                }
                let block_id = match block {
                    Some(block) => Some(self.compile_block(block)?),
                    None => None,
                };
                self.emit(
                    Instr::Send {
                        method: method.clone(),
                        argc: args.len() as u32,
                        block: block_id,
                    },
                    line,
                );
            }

            ExprKind::Yield { args } => {
                for arg in args {
                    self.compile_expression(arg, true)?;
                }
                self.emit(Instr::InvokeBlock(args.len() as u32), line);
            }
        }
        Ok(())
    }

    /// Compile an anonymous block body into its own `Block:N` set and
    /// return N. Block scopes are transparent to local lookup, which is
    /// what gives blocks closure semantics over the enclosing frame.
    fn compile_block(&mut self, block: &BlockArg) -> Result<u32> {
        let id = self.block_count;
        self.block_count += 1;

        self.push_scope(SetKind::Block, id.to_string(), false);
        for name in &block.params {
            let scope = self.scope();
            scope.locals.push(name.clone());
            scope.params.push(ParamSpec {
                name: name.clone(),
                kind: ArgKind::Normal,
            });
        }
        if block.body.is_empty() {
            self.emit(Instr::PutNil, block.line);
        } else {
            self.compile_statements(&block.body, true)?;
        }
        self.emit(Instr::Leave, block.line);
        self.finish_scope();
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser;

    use super::*;

    fn bytecode_text(source: &str) -> String {
        let program = parser::parse(source).expect("source should parse");
        generate(&program).expect("program should compile").to_string()
    }

    #[test]
    fn assignment_in_value_position_duplicates() {
        let text = bytecode_text("x = 10");
        let expected = "\
<ProgramStart>
0 putobject 10
1 dup
2 setlocal 0 0
3 leave
";
        assert_eq!(text, expected);
    }

    #[test]
    fn assignment_in_statement_position_just_stores() {
        let text = bytecode_text("x = 10\nx");
        let expected = "\
<ProgramStart>
0 putobject 10
1 setlocal 0 0
2 getlocal 0 0
3 leave
";
        assert_eq!(text, expected);
    }

    #[test]
    fn unknown_identifier_compiles_to_a_self_send() {
        let text = bytecode_text("foo");
        let expected = "\
<ProgramStart>
0 putself
1 send foo 0
2 leave
";
        assert_eq!(text, expected);
    }

    #[test]
    fn if_without_else_pushes_nil_arm_in_value_position() {
        let text = bytecode_text("if true\n1\nend");
        let expected = "\
<ProgramStart>
0 putobject true
1 branchunless 4
2 putobject 1
3 jump 5
4 putnil
5 leave
";
        assert_eq!(text, expected);
    }

    #[test]
    fn next_outside_loop_is_a_compile_error() {
        let program = parser::parse("next").unwrap();
        let err = generate(&program).unwrap_err();
        assert!(err.to_string().contains("next"));
    }

    #[test]
    fn return_at_top_level_is_a_compile_error() {
        let program = parser::parse("return 1").unwrap();
        let err = generate(&program).unwrap_err();
        assert!(err.to_string().contains("return"));
    }

    #[test]
    fn def_with_invalid_receiver_is_a_compile_error() {
        let program = parser::parse("def x.bar\nend").unwrap();
        let err = generate(&program).unwrap_err();
        assert!(err.to_string().contains("receiver"));
    }

    #[test]
    fn optional_parameter_defaults_compile_into_a_prologue() {
        let text = bytecode_text("def m(a = 7)\na\nend");
        let expected = "\
<Def:Object#m>
0 getlocal 0 0
1 branchif 4
2 putobject 7
3 setlocal 0 0
4 getlocal 0 0
5 leave
<ProgramStart>
0 putself
1 putstring \"Object#m\"
2 def_method 1
3 leave
";
        assert_eq!(text, expected);
    }

    #[test]
    fn range_and_collection_literals() {
        let text = bytecode_text("[1, 2]\n{ a: 1 }\n1..5");
        let expected = "\
<ProgramStart>
0 putobject 1
1 putobject 2
2 newarray 2
3 putstring \"a\"
4 putobject 1
5 newhash 2
6 putobject 1
7 putobject 5
8 newrange
9 leave
";
        assert_eq!(text, expected);
    }

    #[test]
    fn compilation_is_deterministic() {
        let source = "class Foo\ndef bar\n10\nend\nend\nFoo.new.bar";
        assert_eq!(bytecode_text(source), bytecode_text(source));
    }
}
