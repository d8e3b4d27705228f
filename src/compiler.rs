// File: src/compiler.rs
//
// Bytecode compiler: walks the AST and emits instructions plus a constant
// pool for the gslang stack VM. Lexical resolution (globals/locals/
// builtins/free variables) is delegated entirely to `symbol::SymbolTable`;
// this module's job is control-flow lowering (short-circuit, ternary,
// for/for-in with break/continue back-patching), closure capture emission
// and import handling.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{ArrayElement, AssignTarget, BinOpKind, CallArg, Expr, FunctionLiteral, MapElement, Program, Stmt, UnOpKind};
use crate::bytecode::{BytecodeChunk, CompiledFunction, Constant, FileSet, OpCode};
use crate::builtins::{builtin_index, BUILTIN_NAMES};
use crate::config::CompilerConfig;
use crate::errors::{ErrorKind, GsError, SourceLocation};
use crate::module::ModuleRegistry;
use crate::symbol::{SymbolObject, SymbolScope, SymbolTable};

/// Per-loop back-patch bookkeeping. `continue` jumps to the post-step (or
/// the condition re-check, for `for-in`); `break` jumps past the loop end.
struct LoopCtx {
    break_jumps: Vec<usize>,
    continue_jumps: Vec<usize>,
}

/// One function body under construction: its own instruction stream,
/// source map and symbol table. The compiler keeps a stack of these, one
/// per nested function literal / module currently being compiled.
struct FuncState {
    instructions: Vec<OpCode>,
    source_map: Vec<SourceLocation>,
    loops: Vec<LoopCtx>,
    symtab: SymbolTable,
    num_parameters: usize,
    varargs: bool,
    name: Option<String>,
}

impl FuncState {
    fn new(symtab: SymbolTable, num_parameters: usize, varargs: bool, name: Option<String>) -> Self {
        Self { instructions: Vec::new(), source_map: Vec::new(), loops: Vec::new(), symtab, num_parameters, varargs, name }
    }

    fn here(&self) -> usize {
        self.instructions.len()
    }

    fn emit(&mut self, op: OpCode, loc: SourceLocation) -> usize {
        self.instructions.push(op);
        self.source_map.push(loc);
        self.instructions.len() - 1
    }

    fn patch_jump(&mut self, pos: usize, target: usize) {
        let target = target as u16;
        match &mut self.instructions[pos] {
            OpCode::Jump(t) | OpCode::JumpFalsy(t) | OpCode::AndJump(t) | OpCode::OrJump(t) => *t = target,
            other => unreachable!("patch_jump on non-jump instruction {other:?}"),
        }
    }

    fn last_is_return(&self) -> bool {
        matches!(self.instructions.last(), Some(OpCode::Return) | Some(OpCode::ReturnValue))
    }
}

pub struct Compiler<'a> {
    scopes: Vec<FuncState>,
    constants: Vec<Constant>,
    file_set: FileSet,
    /// Module-name -> constant index of its already-compiled wrapper
    /// function, so re-importing the same source module within one
    /// compilation doesn't recompile it.
    import_cache: HashMap<String, u16>,
    config: CompilerConfig,
    modules: &'a ModuleRegistry,
    errors: Vec<GsError>,
    errors_per_line: HashMap<usize, usize>,
    in_module: bool,
}

type CResult = Result<(), ()>;

impl<'a> Compiler<'a> {
    pub fn new(modules: &'a ModuleRegistry, config: CompilerConfig) -> Self {
        let root = SymbolTable::new();
        for (i, name) in BUILTIN_NAMES.iter().enumerate() {
            root.define_builtin(i, name);
        }
        Self::with_symtab(modules, config, root)
    }

    /// Like `new`, but seeded with an existing root symbol table instead of
    /// a fresh one. Used by the REPL so `x := 1` in one line is still
    /// visible by name when compiling the next.
    pub fn with_symtab(modules: &'a ModuleRegistry, config: CompilerConfig, root: SymbolTable) -> Self {
        let main = FuncState::new(root, 0, false, None);
        Self {
            scopes: vec![main],
            constants: Vec::new(),
            file_set: FileSet::default(),
            import_cache: HashMap::new(),
            config,
            modules,
            errors: Vec::new(),
            errors_per_line: HashMap::new(),
            in_module: false,
        }
    }

    /// The root symbol table this compiler is using, for the caller to
    /// retain and feed into the next `with_symtab` call.
    pub fn root_symtab(&self) -> SymbolTable {
        self.scopes[0].symtab.clone()
    }

    fn func(&mut self) -> &mut FuncState {
        self.scopes.last_mut().expect("compiler scope stack is never empty")
    }

    fn symtab(&self) -> SymbolTable {
        self.scopes.last().expect("compiler scope stack is never empty").symtab.clone()
    }

    fn emit(&mut self, op: OpCode, loc: SourceLocation) -> usize {
        self.func().emit(op, loc)
    }

    fn error(&mut self, kind: ErrorKind, message: impl Into<String>, loc: SourceLocation) {
        let count = self.errors_per_line.entry(loc.line).or_insert(0);
        if *count >= 10 {
            return;
        }
        *count += 1;
        self.errors.push(GsError::new(kind, message.into(), loc));
    }

    fn add_constant(&mut self, c: Constant) -> u16 {
        self.constants.push(c);
        (self.constants.len() - 1) as u16
    }

    /// Compile a complete top-level program (a file run directly, or a
    /// source module body) into a `BytecodeChunk`. `export expr` anywhere
    /// at top level supplies the program's/module's return value.
    pub fn compile_program(mut self, program: &Program) -> Result<BytecodeChunk, Vec<GsError>> {
        for stmt in &program.stmts {
            let _ = self.compile_stmt(stmt);
        }
        if !self.func().last_is_return() {
            let loc = SourceLocation::unknown();
            self.emit(OpCode::Nil, loc.clone());
            self.emit(OpCode::ReturnValue, loc);
        }

        if !self.errors.is_empty() {
            self.errors.sort_by(|a, b| (a.location.line, a.location.column).cmp(&(b.location.line, b.location.column)));
            return Err(self.errors);
        }

        let main = self.scopes.pop().expect("main scope present");
        let main_fn = Rc::new(CompiledFunction {
            instructions: std::cell::RefCell::new(main.instructions),
            source_map: std::cell::RefCell::new(main.source_map),
            num_locals: main.symtab.max_definitions(),
            num_parameters: 0,
            varargs: false,
            name: None,
        });

        let mut chunk = BytecodeChunk { file_set: self.file_set, main_function: main_fn, constants: self.constants };
        chunk.remove_duplicates();
        Ok(chunk)
    }

    // ---- statements ------------------------------------------------------

    fn compile_block(&mut self, stmts: &[Stmt], block_scope: bool) -> CResult {
        let inner = self.symtab().fork(block_scope);
        let saved = std::mem::replace(&mut self.func().symtab, inner);
        for stmt in stmts {
            let _ = self.compile_stmt(stmt);
        }
        self.func().symtab = saved;
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> CResult {
        match stmt {
            Stmt::ExprStmt(e) => {
                self.compile_expr(e)?;
                self.emit(OpCode::Pop, SourceLocation::unknown());
                Ok(())
            }
            Stmt::Define { names, values, loc } => self.compile_define(names, values, loc),
            Stmt::Assign { target, op, value, loc } => self.compile_assign(target, op.clone(), value, loc),
            Stmt::Export(e) => {
                if self.scopes.len() != 1 {
                    self.error(ErrorKind::CompileError, "export must be at module top level", SourceLocation::unknown());
                }
                self.compile_expr(e)?;
                self.emit(OpCode::ReturnValue, SourceLocation::unknown());
                Ok(())
            }
            Stmt::If { cond, then_block, else_block } => self.compile_if(cond, then_block, else_block),
            Stmt::For { init, cond, post, body } => self.compile_for(init, cond, post, body),
            Stmt::ForIn { key, value, iterable, body } => self.compile_for_in(key, value, iterable, body),
            Stmt::Return(expr) => {
                match expr {
                    Some(e) => {
                        self.compile_expr(e)?;
                        self.emit(OpCode::ReturnValue, SourceLocation::unknown());
                    }
                    None => {
                        self.emit(OpCode::Return, SourceLocation::unknown());
                    }
                }
                Ok(())
            }
            Stmt::Break => {
                if self.func().loops.is_empty() {
                    self.error(ErrorKind::CompileError, "break outside of a loop", SourceLocation::unknown());
                    return Ok(());
                }
                let pos = self.emit(OpCode::Jump(0xFFFF), SourceLocation::unknown());
                self.func().loops.last_mut().unwrap().break_jumps.push(pos);
                Ok(())
            }
            Stmt::Continue => {
                if self.func().loops.is_empty() {
                    self.error(ErrorKind::CompileError, "continue outside of a loop", SourceLocation::unknown());
                    return Ok(());
                }
                let pos = self.emit(OpCode::Jump(0xFFFF), SourceLocation::unknown());
                self.func().loops.last_mut().unwrap().continue_jumps.push(pos);
                Ok(())
            }
            Stmt::Block(stmts) => self.compile_block(stmts, true),
        }
    }

    fn compile_define(&mut self, names: &[String], values: &[Expr], loc: &SourceLocation) -> CResult {
        if names.len() != values.len() && values.len() != 1 {
            self.error(ErrorKind::CompileError, "mismatched number of names and values in :=", loc.clone());
        }
        if names.len() == values.len() {
            for (name, value) in names.iter().zip(values) {
                self.compile_expr(value)?;
                self.define_and_store(name, loc);
            }
        } else {
            // Single multi-value RHS is not supported without tuples; treat
            // each extra name as nil, matching a best-effort recovery.
            for (i, name) in names.iter().enumerate() {
                if i < values.len() {
                    self.compile_expr(&values[i])?;
                } else {
                    self.emit(OpCode::Nil, loc.clone());
                }
                self.define_and_store(name, loc);
            }
        }
        Ok(())
    }

    fn define_and_store(&mut self, name: &str, loc: &SourceLocation) {
        let symtab = self.symtab();
        let already = symtab.resolve(name).is_some();
        let sym = symtab.define(name);
        match sym.scope {
            SymbolScope::Global => {
                self.emit(OpCode::SetGlobal(sym.index as u16), loc.clone());
            }
            SymbolScope::Local => {
                self.emit(OpCode::DefineLocal(sym.index as u8), loc.clone());
            }
            _ => unreachable!("define() never produces Builtin/Free"),
        }
        symtab.mark_assigned(name);
        let _ = already;
    }

    fn compile_if(&mut self, cond: &Expr, then_block: &[Stmt], else_block: &Option<Vec<Stmt>>) -> CResult {
        self.compile_expr(cond)?;
        let jump_else = self.emit(OpCode::JumpFalsy(0xFFFF), SourceLocation::unknown());
        self.compile_block(then_block, true)?;
        if let Some(else_stmts) = else_block {
            let jump_end = self.emit(OpCode::Jump(0xFFFF), SourceLocation::unknown());
            let else_target = self.func().here();
            self.func().patch_jump(jump_else, else_target);
            self.compile_block(else_stmts, true)?;
            let end_target = self.func().here();
            self.func().patch_jump(jump_end, end_target);
        } else {
            let end_target = self.func().here();
            self.func().patch_jump(jump_else, end_target);
        }
        Ok(())
    }

    fn compile_for(&mut self, init: &Option<Box<Stmt>>, cond: &Option<Expr>, post: &Option<Box<Stmt>>, body: &[Stmt]) -> CResult {
        let outer = self.symtab().fork(true);
        let saved = std::mem::replace(&mut self.func().symtab, outer);

        if let Some(init) = init {
            self.compile_stmt(init)?;
        }

        self.func().loops.push(LoopCtx { break_jumps: Vec::new(), continue_jumps: Vec::new() });
        let cond_target = self.func().here();
        let jump_end = if let Some(cond) = cond {
            self.compile_expr(cond)?;
            Some(self.emit(OpCode::JumpFalsy(0xFFFF), SourceLocation::unknown()))
        } else {
            None
        };

        self.compile_block(body, true)?;

        let post_target = self.func().here();
        if let Some(post) = post {
            self.compile_stmt(post)?;
        }
        let back = self.emit(OpCode::Jump(0xFFFF), SourceLocation::unknown());
        self.func().patch_jump(back, cond_target);

        let end_target = self.func().here();
        if let Some(j) = jump_end {
            self.func().patch_jump(j, end_target);
        }

        let loop_ctx = self.func().loops.pop().unwrap();
        for b in loop_ctx.break_jumps {
            self.func().patch_jump(b, end_target);
        }
        for c in loop_ctx.continue_jumps {
            self.func().patch_jump(c, post_target);
        }

        self.func().symtab = saved;
        Ok(())
    }

    fn compile_for_in(&mut self, key: &Option<String>, value: &str, iterable: &Expr, body: &[Stmt]) -> CResult {
        let outer = self.symtab().fork(true);
        let saved = std::mem::replace(&mut self.func().symtab, outer);

        self.compile_expr(iterable)?;
        self.emit(OpCode::IteratorInit, SourceLocation::unknown());

        self.func().loops.push(LoopCtx { break_jumps: Vec::new(), continue_jumps: Vec::new() });
        let cond_target = self.func().here();
        self.emit(OpCode::IteratorNext, SourceLocation::unknown());
        let jump_end = self.emit(OpCode::JumpFalsy(0xFFFF), SourceLocation::unknown());

        if let Some(key_name) = key {
            self.emit(OpCode::IteratorKey, SourceLocation::unknown());
            self.define_and_store(key_name, &SourceLocation::unknown());
        }
        self.emit(OpCode::IteratorValue, SourceLocation::unknown());
        self.define_and_store(value, &SourceLocation::unknown());

        self.compile_block(body, true)?;

        let back = self.emit(OpCode::Jump(0xFFFF), SourceLocation::unknown());
        self.func().patch_jump(back, cond_target);

        let end_target = self.func().here();
        self.func().patch_jump(jump_end, end_target);
        self.emit(OpCode::Pop, SourceLocation::unknown());

        let loop_ctx = self.func().loops.pop().unwrap();
        for b in loop_ctx.break_jumps {
            self.func().patch_jump(b, end_target);
        }
        for c in loop_ctx.continue_jumps {
            self.func().patch_jump(c, cond_target);
        }

        self.func().symtab = saved;
        Ok(())
    }

    fn compile_assign(&mut self, target: &AssignTarget, op: Option<BinOpKind>, value: &Expr, loc: &SourceLocation) -> CResult {
        match target {
            AssignTarget::Ident(name) => {
                let symtab = self.symtab();
                let Some(sym) = symtab.resolve(name) else {
                    self.error(ErrorKind::UndefinedVariable, format!("unresolved reference '{name}'"), loc.clone());
                    self.compile_expr(value)?;
                    self.emit(OpCode::Pop, loc.clone());
                    return Ok(());
                };
                if matches!(sym.scope, SymbolScope::Builtin) {
                    self.error(ErrorKind::CompileError, format!("cannot assign to builtin '{name}'"), loc.clone());
                }
                if let Some(op) = op {
                    self.load_symbol(&sym, loc);
                    self.compile_expr(value)?;
                    self.emit(binop_opcode(&op), loc.clone());
                } else {
                    self.compile_expr(value)?;
                }
                self.store_symbol(&sym, loc);
                Ok(())
            }
            // Both arms follow one protocol: push the new value, then the
            // object, then the index/key; `SetSelector` pops index, object,
            // value (in that order) and calls `object.index_set(&index,
            // value)`. Compound assignment re-evaluates object/index once
            // more to read the current value, since there is no stack
            // duplication opcode.
            AssignTarget::Index { object, index } => {
                if let Some(op) = op {
                    self.compile_expr(object)?;
                    self.compile_expr(index)?;
                    self.emit(OpCode::Index, loc.clone());
                    self.compile_expr(value)?;
                    self.emit(binop_opcode(&op), loc.clone());
                } else {
                    self.compile_expr(value)?;
                }
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.emit(OpCode::SetSelector, loc.clone());
                Ok(())
            }
            AssignTarget::Selector { object, field } => {
                if let Some(op) = op {
                    self.compile_expr(object)?;
                    let key_idx = self.add_constant(Constant::String(field.clone()));
                    self.emit(OpCode::Constant(key_idx), loc.clone());
                    self.emit(OpCode::GetSelector, loc.clone());
                    self.compile_expr(value)?;
                    self.emit(binop_opcode(&op), loc.clone());
                } else {
                    self.compile_expr(value)?;
                }
                self.compile_expr(object)?;
                let key_idx = self.add_constant(Constant::String(field.clone()));
                self.emit(OpCode::Constant(key_idx), loc.clone());
                self.emit(OpCode::SetSelector, loc.clone());
                Ok(())
            }
        }
    }

    fn load_symbol(&mut self, sym: &SymbolObject, loc: &SourceLocation) {
        match sym.scope {
            SymbolScope::Global => self.emit(OpCode::GetGlobal(sym.index as u16), loc.clone()),
            SymbolScope::Local => self.emit(OpCode::GetLocal(sym.index as u8), loc.clone()),
            SymbolScope::Builtin => self.emit(OpCode::GetBuiltin(sym.index as u8), loc.clone()),
            SymbolScope::Free => self.emit(OpCode::GetFree(sym.index as u8), loc.clone()),
        };
    }

    fn store_symbol(&mut self, sym: &SymbolObject, loc: &SourceLocation) {
        match sym.scope {
            SymbolScope::Global => self.emit(OpCode::SetGlobal(sym.index as u16), loc.clone()),
            SymbolScope::Local => self.emit(OpCode::SetLocal(sym.index as u8), loc.clone()),
            SymbolScope::Free => self.emit(OpCode::SetFree(sym.index as u8), loc.clone()),
            SymbolScope::Builtin => unreachable!("caught earlier"),
        };
    }

    // ---- expressions -------------------------------------------------

    fn compile_expr(&mut self, expr: &Expr) -> CResult {
        let loc = SourceLocation::unknown();
        match expr {
            Expr::IntLit(v) => {
                let idx = self.add_constant(Constant::Int(*v));
                self.emit(OpCode::Constant(idx), loc);
            }
            Expr::FloatLit(v) => {
                let idx = self.add_constant(Constant::Float(*v));
                self.emit(OpCode::Constant(idx), loc);
            }
            Expr::CharLit(v) => {
                let idx = self.add_constant(Constant::Char(*v));
                self.emit(OpCode::Constant(idx), loc);
            }
            Expr::StringLit(v) => {
                let idx = self.add_constant(Constant::String(v.clone()));
                self.emit(OpCode::Constant(idx), loc);
            }
            Expr::BoolLit(true) => {
                self.emit(OpCode::True, loc);
            }
            Expr::BoolLit(false) => {
                self.emit(OpCode::False, loc);
            }
            Expr::Nil => {
                self.emit(OpCode::Nil, loc);
            }
            Expr::Ident(name) => {
                let symtab = self.symtab();
                match symtab.resolve(name) {
                    Some(sym) => self.load_symbol(&sym, &loc),
                    None => {
                        self.error(ErrorKind::UndefinedVariable, format!("unresolved reference '{name}'"), loc.clone());
                        self.emit(OpCode::Nil, loc)
                    }
                };
            }
            Expr::ArrayLit(elems) => self.compile_array_lit(elems)?,
            Expr::MapLit(elems) => self.compile_map_lit(elems)?,
            Expr::FunctionLit(lit) => self.compile_function_lit(lit)?,
            Expr::BinaryOp { op, left, right } => self.compile_binary(op, left, right)?,
            Expr::UnaryOp { op, operand } => {
                self.compile_expr(operand)?;
                let opcode = match op {
                    UnOpKind::Neg => OpCode::Minus,
                    UnOpKind::Not => OpCode::LNot,
                    UnOpKind::BitNot => OpCode::BComplement,
                };
                self.emit(opcode, loc);
            }
            Expr::Ternary { cond, then_expr, else_expr } => {
                self.compile_expr(cond)?;
                let jump_else = self.emit(OpCode::JumpFalsy(0xFFFF), loc.clone());
                self.compile_expr(then_expr)?;
                let jump_end = self.emit(OpCode::Jump(0xFFFF), loc.clone());
                let else_target = self.func().here();
                self.func().patch_jump(jump_else, else_target);
                self.compile_expr(else_expr)?;
                let end_target = self.func().here();
                self.func().patch_jump(jump_end, end_target);
            }
            Expr::Index { object, index } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.emit(OpCode::Index, loc);
            }
            Expr::Slice { object, low, high } => {
                self.compile_expr(object)?;
                match low {
                    Some(e) => self.compile_expr(e)?,
                    None => {
                        let idx = self.add_constant(Constant::Int(0));
                        self.emit(OpCode::Constant(idx), loc.clone());
                    }
                }
                match high {
                    Some(e) => self.compile_expr(e)?,
                    None => {
                        self.emit(OpCode::Nil, loc.clone());
                    }
                }
                self.emit(OpCode::SliceIndex, loc);
            }
            Expr::Selector { object, field } => {
                self.compile_expr(object)?;
                let idx = self.add_constant(Constant::String(field.clone()));
                self.emit(OpCode::Constant(idx), loc.clone());
                self.emit(OpCode::GetSelector, loc);
            }
            Expr::Call { func, args } => self.compile_call(func, args)?,
            Expr::ErrorWrap(inner) => {
                self.compile_expr(inner)?;
                self.emit(OpCode::Error, loc);
            }
            Expr::Import(name) => self.compile_import(name, &loc)?,
        }
        Ok(())
    }

    fn compile_array_lit(&mut self, elems: &[ArrayElement]) -> CResult {
        let loc = SourceLocation::unknown();
        let has_spread = elems.iter().any(|e| matches!(e, ArrayElement::Spread(_)));
        if !has_spread {
            for e in elems {
                let ArrayElement::Single(expr) = e else { unreachable!() };
                self.compile_expr(expr)?;
            }
            self.emit(OpCode::Array(elems.len() as u16), loc);
            return Ok(());
        }
        // Spreads require runtime concatenation: build the non-spread run
        // as an Array literal, then `+`-fold in each spread/single value.
        let mut started = false;
        for e in elems {
            match e {
                ArrayElement::Single(expr) => {
                    self.compile_expr(expr)?;
                    self.emit(OpCode::Array(1), loc.clone());
                }
                ArrayElement::Spread(expr) => {
                    self.compile_expr(expr)?;
                }
            }
            if started {
                self.emit(OpCode::Add, loc.clone());
            } else {
                started = true;
            }
        }
        if !started {
            self.emit(OpCode::Array(0), loc);
        }
        Ok(())
    }

    fn compile_map_lit(&mut self, elems: &[MapElement]) -> CResult {
        let loc = SourceLocation::unknown();
        for e in elems {
            let idx = self.add_constant(Constant::String(e.key.clone()));
            self.emit(OpCode::Constant(idx), loc.clone());
            self.compile_expr(&e.value)?;
        }
        self.emit(OpCode::Map(elems.len() as u16), loc);
        Ok(())
    }

    fn compile_binary(&mut self, op: &BinOpKind, left: &Expr, right: &Expr) -> CResult {
        let loc = SourceLocation::unknown();
        match op {
            BinOpKind::LAnd => {
                self.compile_expr(left)?;
                let jump = self.emit(OpCode::AndJump(0xFFFF), loc.clone());
                self.emit(OpCode::Pop, loc.clone());
                self.compile_expr(right)?;
                let target = self.func().here();
                self.func().patch_jump(jump, target);
            }
            BinOpKind::LOr => {
                self.compile_expr(left)?;
                let jump = self.emit(OpCode::OrJump(0xFFFF), loc.clone());
                self.emit(OpCode::Pop, loc.clone());
                self.compile_expr(right)?;
                let target = self.func().here();
                self.func().patch_jump(jump, target);
            }
            _ => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emit(binop_opcode(op), loc);
            }
        }
        Ok(())
    }

    fn compile_call(&mut self, func: &Expr, args: &[CallArg]) -> CResult {
        let loc = SourceLocation::unknown();
        self.compile_expr(func)?;
        let has_spread = args.iter().any(|a| matches!(a, CallArg::Spread(_)));
        if !has_spread {
            for a in args {
                let CallArg::Single(e) = a else { unreachable!() };
                self.compile_expr(e)?;
            }
            self.emit(OpCode::Call(args.len() as u8), loc);
            return Ok(());
        }
        // `f(a, b, ...xs)`: push the fixed args, then the spread expression
        // itself (must evaluate to an array), and let `CallSpread` splice
        // its elements in at call time.
        let mut fixed = Vec::new();
        let mut spread = None;
        for a in args {
            match a {
                CallArg::Single(e) => fixed.push(e),
                CallArg::Spread(e) => spread = Some(e),
            }
        }
        for e in &fixed {
            self.compile_expr(e)?;
        }
        self.compile_expr(spread.expect("has_spread guarantees a Spread arg is present"))?;
        self.emit(OpCode::CallSpread(fixed.len() as u8), loc);
        Ok(())
    }

    fn compile_function_lit(&mut self, lit: &FunctionLiteral) -> CResult {
        let loc = SourceLocation::unknown();
        let inner_st = self.symtab().fork(false);
        for p in &lit.params {
            let sym = inner_st.define(p);
            inner_st.mark_assigned(&sym.name);
        }
        let name = None;
        self.scopes.push(FuncState::new(inner_st, lit.params.len(), lit.variadic, name));

        for stmt in &lit.body {
            let _ = self.compile_stmt(stmt);
        }
        if !self.func().last_is_return() {
            self.emit(OpCode::Return, loc.clone());
        }

        let finished = self.scopes.pop().expect("pushed above");
        let free_symbols = finished.symtab.free_symbols();
        let num_locals = finished.symtab.max_definitions().max(finished.num_parameters);

        let compiled = Rc::new(CompiledFunction {
            instructions: std::cell::RefCell::new(finished.instructions),
            source_map: std::cell::RefCell::new(finished.source_map),
            num_locals,
            num_parameters: finished.num_parameters,
            varargs: finished.varargs,
            name: finished.name,
        });
        let const_idx = self.add_constant(Constant::CompiledFunction(compiled));

        for free in &free_symbols {
            match free.scope {
                SymbolScope::Local => {
                    self.emit(OpCode::GetLocalPtr(free.index as u8), loc.clone());
                }
                SymbolScope::Free => {
                    self.emit(OpCode::GetFreePtr(free.index as u8), loc.clone());
                }
                _ => unreachable!("free symbols are only ever Local or Free"),
            }
        }
        self.emit(OpCode::Closure(const_idx, free_symbols.len() as u8), loc);
        Ok(())
    }

    fn compile_import(&mut self, name: &str, loc: &SourceLocation) -> CResult {
        if self.modules.is_host(name) {
            let mut marker = HashMap::new();
            marker.insert("__module_name__".to_string(), Constant::String(name.to_string()));
            let idx = self.add_constant(Constant::Map(marker));
            self.emit(OpCode::Constant(idx), loc.clone());
            return Ok(());
        }

        if let Some(&idx) = self.import_cache.get(name) {
            self.emit(OpCode::Closure(idx, 0), loc.clone());
            self.emit(OpCode::Call(0), loc.clone());
            return Ok(());
        }

        let Some(source) = self.modules.resolve_source(name) else {
            self.error(ErrorKind::CompileError, format!("module not found: {name}"), loc.clone());
            self.emit(OpCode::Nil, loc.clone());
            return Ok(());
        };

        self.file_set.files.push(name.to_string());
        let program = match crate::parser::Parser::parse_program(&source) {
            Ok(p) => p,
            Err(e) => {
                self.error(ErrorKind::CompileError, format!("failed to compile module '{name}': {e}"), loc.clone());
                self.emit(OpCode::Nil, loc.clone());
                return Ok(());
            }
        };

        let root = SymbolTable::new();
        for (i, n) in BUILTIN_NAMES.iter().enumerate() {
            root.define_builtin(i, n);
        }
        self.scopes.push(FuncState::new(root, 0, false, Some(name.to_string())));
        let was_in_module = self.in_module;
        self.in_module = true;
        for stmt in &program.stmts {
            let _ = self.compile_stmt(stmt);
        }
        self.in_module = was_in_module;
        if !self.func().last_is_return() {
            self.emit(OpCode::Nil, loc.clone());
            self.emit(OpCode::ReturnValue, loc.clone());
        }
        let finished = self.scopes.pop().expect("pushed above");
        let compiled = Rc::new(CompiledFunction {
            instructions: std::cell::RefCell::new(finished.instructions),
            source_map: std::cell::RefCell::new(finished.source_map),
            num_locals: finished.symtab.max_definitions(),
            num_parameters: 0,
            varargs: false,
            name: Some(name.to_string()),
        });
        let idx = self.add_constant(Constant::CompiledFunction(compiled));
        self.import_cache.insert(name.to_string(), idx);
        self.emit(OpCode::Closure(idx, 0), loc.clone());
        self.emit(OpCode::Call(0), loc.clone());
        Ok(())
    }
}

fn binop_opcode(op: &BinOpKind) -> OpCode {
    match op {
        BinOpKind::Add => OpCode::Add,
        BinOpKind::Sub => OpCode::Sub,
        BinOpKind::Mul => OpCode::Mul,
        BinOpKind::Div => OpCode::Quo,
        BinOpKind::Rem => OpCode::Rem,
        BinOpKind::And => OpCode::And,
        BinOpKind::Or => OpCode::Or,
        BinOpKind::Xor => OpCode::Xor,
        BinOpKind::AndNot => OpCode::AndNot,
        BinOpKind::Shl => OpCode::Shl,
        BinOpKind::Shr => OpCode::Shr,
        BinOpKind::Equal => OpCode::Equal,
        BinOpKind::NotEqual => OpCode::NotEqual,
        BinOpKind::Less => OpCode::Less,
        BinOpKind::Greater => OpCode::Greater,
        BinOpKind::LessEq => OpCode::LessEq,
        BinOpKind::GreaterEq => OpCode::GreaterEq,
        BinOpKind::LAnd | BinOpKind::LOr => unreachable!("handled by compile_binary short-circuit path"),
    }
}

/// Compile a standalone program (the common entry point used by the CLI,
/// REPL and tests): parse, resolve symbols, lower to bytecode.
pub fn compile(source: &str, modules: &ModuleRegistry) -> Result<BytecodeChunk, Vec<GsError>> {
    tracing::debug!(bytes = source.len(), "compiling program");
    let program = crate::parser::Parser::parse_program(source).map_err(|e| vec![e])?;
    let compiler = Compiler::new(modules, CompilerConfig::default());
    let result = compiler.compile_program(&program);
    match &result {
        Ok(chunk) => tracing::info!(constants = chunk.constants.len(), "compiled program"),
        Err(errs) => tracing::warn!(count = errs.len(), "compile failed"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::Vm;
    use crate::config::VmConfig;

    fn run(src: &str) -> Result<crate::value::Value, GsError> {
        let modules = ModuleRegistry::with_stdlib();
        let chunk = compile(src, &modules).expect("compiles");
        let mut vm = Vm::new(chunk, &modules, VmConfig::default());
        vm.run()
    }

    #[test]
    fn compiles_literal_and_returns_it() {
        let v = run("export 41 + 1").unwrap();
        assert!(matches!(v, crate::value::Value::Int(42)));
    }

    #[test]
    fn if_else_chooses_branch() {
        let v = run("x := 5; if x > 3 { export \"big\" } else { export \"small\" }").unwrap();
        match v {
            crate::value::Value::String(s) => assert_eq!(s.as_str(), "big"),
            _ => panic!("expected string"),
        }
    }

    #[test]
    fn for_loop_accumulates() {
        let v = run("s := 0; for i := 0; i < 5; i++ { s = s + i }; export s").unwrap();
        assert!(matches!(v, crate::value::Value::Int(10)));
    }

    #[test]
    fn closure_counter_matches_spec_scenario() {
        let v = run(
            "f := func() { x := 0; return func() { x = x + 1; return x } }\n\
             c := f(); export [c(), c(), c()]",
        )
        .unwrap();
        match v {
            crate::value::Value::Array(a) => {
                let a = a.borrow();
                let ints: Vec<i64> = a.iter().map(|v| match v { crate::value::Value::Int(i) => *i, _ => panic!() }).collect();
                assert_eq!(ints, vec![1, 2, 3]);
            }
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn undefined_reference_is_a_compile_error() {
        let modules = ModuleRegistry::with_stdlib();
        let err = compile("export undefined_name", &modules).unwrap_err();
        assert_eq!(err[0].kind, ErrorKind::UndefinedVariable);
    }
}
