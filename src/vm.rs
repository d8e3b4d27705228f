// File: src/vm.rs
//
// The gslang stack machine. A `Frame` per active call, a flat operand
// stack, a fixed globals slice. Call/return follow the standard
// Monkey/Tengo convention: the callee sits at `stack[basePointer-1]`,
// `basePointer = sp - numArgs`, and returning sets `sp = basePointer - 1`
// then pushes the result, so one call leaves exactly one value where the
// callee and its arguments used to be.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::builtins::call_builtin;
use crate::bytecode::{BytecodeChunk, Constant, OpCode};
use crate::config::VmConfig;
use crate::errors::{ErrorKind, GsError, SourceLocation};
use crate::module::ModuleRegistry;
use crate::value::{BinOp, Cell, Closure, GsString, Value};

const GLOBALS_SIZE: usize = 1024;

struct Frame {
    closure: Rc<Closure>,
    ip: usize,
    base_pointer: usize,
}

pub struct Vm<'a> {
    stack: Vec<Value>,
    sp: usize,
    frames: Vec<Frame>,
    globals: Vec<Value>,
    constants: Vec<Value>,
    modules: &'a ModuleRegistry,
    pub config: VmConfig,
    alloc_used: u64,
}

impl<'a> Vm<'a> {
    pub fn new(chunk: BytecodeChunk, modules: &'a ModuleRegistry, config: VmConfig) -> Self {
        let constants = chunk.constants.iter().map(|c| constant_to_value(c, modules)).collect();
        let main_closure = Rc::new(Closure { function: chunk.main_function, free: Vec::new() });
        let frame = Frame { closure: main_closure, ip: 0, base_pointer: 0 };
        Self {
            stack: vec![Value::Nil; config.stack_size],
            sp: 0,
            frames: vec![frame],
            globals: vec![Value::Nil; GLOBALS_SIZE],
            constants,
            modules,
            config,
            alloc_used: 0,
        }
    }

    /// Seed a fresh VM (new chunk, e.g. one REPL line) with globals carried
    /// over from a previous run, so top-level bindings persist across
    /// lines.
    pub fn with_globals(chunk: BytecodeChunk, modules: &'a ModuleRegistry, config: VmConfig, globals: Vec<Value>) -> Self {
        let mut vm = Self::new(chunk, modules, config);
        for (i, v) in globals.into_iter().enumerate().take(GLOBALS_SIZE) {
            vm.globals[i] = v;
        }
        vm
    }

    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    fn cur_loc(&self) -> SourceLocation {
        let frame = self.frames.last().expect("at least one frame");
        let sm = frame.closure.function.source_map.borrow();
        sm.get(frame.ip.saturating_sub(1)).cloned().unwrap_or_else(SourceLocation::unknown)
    }

    fn attribute(&self, mut e: GsError) -> GsError {
        if e.location.line == 0 && e.location.column == 0 {
            e.location = self.cur_loc();
        }
        e
    }

    fn charge_alloc(&mut self, n: u64) -> Result<(), GsError> {
        if let Some(limit) = self.config.max_alloc {
            self.alloc_used += n;
            if self.alloc_used > limit {
                return Err(self.attribute(GsError::new(
                    ErrorKind::ObjectAllocLimit,
                    "exceeded allocation limit".to_string(),
                    SourceLocation::unknown(),
                )));
            }
        }
        Ok(())
    }

    fn push(&mut self, v: Value) -> Result<(), GsError> {
        if self.sp >= self.stack.len() {
            return Err(self.attribute(GsError::new(ErrorKind::StackOverflow, "stack overflow".to_string(), SourceLocation::unknown())));
        }
        self.stack[self.sp] = v;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.sp -= 1;
        std::mem::replace(&mut self.stack[self.sp], Value::Nil)
    }

    fn peek(&self) -> &Value {
        &self.stack[self.sp - 1]
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub fn run(&mut self) -> Result<Value, GsError> {
        loop {
            let frame_idx = self.frames.len() - 1;
            let ip = self.frames[frame_idx].ip;
            let op = self.frames[frame_idx].closure.function.instructions.borrow()[ip];
            self.frames[frame_idx].ip += 1;

            match op {
                OpCode::Constant(idx) => self.push(self.constants[idx as usize].clone())?,
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Nil => self.push(Value::Nil)?,

                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Quo | OpCode::Rem | OpCode::And | OpCode::Or
                | OpCode::Xor | OpCode::AndNot | OpCode::Shl | OpCode::Shr | OpCode::Equal | OpCode::NotEqual
                | OpCode::Less | OpCode::Greater | OpCode::LessEq | OpCode::GreaterEq => {
                    let b = self.pop();
                    let a = self.pop();
                    let binop = to_binop(op);
                    let result = a
                        .binary_op(binop, &b, self.config.max_string_len, self.config.max_bytes_len)
                        .map_err(|e| self.attribute(e))?;
                    self.push(result)?;
                }

                OpCode::LNot => {
                    let v = self.pop();
                    self.push(Value::Bool(v.is_falsy()))?;
                }
                OpCode::Minus => {
                    let v = self.pop();
                    let result = match v {
                        Value::Int(i) => Value::Int(i.wrapping_neg()),
                        Value::Float(f) => Value::Float(-f),
                        other => return Err(self.attribute(GsError::invalid_operator("-", other.type_name(), ""))),
                    };
                    self.push(result)?;
                }
                OpCode::BComplement => {
                    let v = self.pop();
                    let result = match v {
                        Value::Int(i) => Value::Int(!i),
                        other => return Err(self.attribute(GsError::invalid_operator("^", other.type_name(), ""))),
                    };
                    self.push(result)?;
                }

                OpCode::Jump(target) => self.frames[frame_idx].ip = target as usize,
                OpCode::JumpFalsy(target) => {
                    let v = self.pop();
                    if v.is_falsy() {
                        self.frames[frame_idx].ip = target as usize;
                    }
                }
                OpCode::AndJump(target) => {
                    if self.peek().is_falsy() {
                        self.frames[frame_idx].ip = target as usize;
                    } else {
                        self.pop();
                    }
                }
                OpCode::OrJump(target) => {
                    if !self.peek().is_falsy() {
                        self.frames[frame_idx].ip = target as usize;
                    } else {
                        self.pop();
                    }
                }

                OpCode::SetGlobal(idx) => {
                    let v = self.pop();
                    self.set_global(idx as usize, v)?;
                }
                OpCode::GetGlobal(idx) => {
                    let v = self.get_global(idx as usize);
                    self.push(v)?;
                }
                OpCode::SetLocal(idx) => {
                    let v = self.pop();
                    let slot = self.frames[frame_idx].base_pointer + idx as usize;
                    self.store_local_slot(slot, v);
                }
                OpCode::DefineLocal(idx) => {
                    let v = self.pop();
                    let slot = self.frames[frame_idx].base_pointer + idx as usize;
                    self.stack[slot] = v;
                }
                OpCode::GetLocal(idx) => {
                    let slot = self.frames[frame_idx].base_pointer + idx as usize;
                    let v = self.load_local_slot(slot);
                    self.push(v)?;
                }
                OpCode::GetBuiltin(idx) => self.push(Value::Builtin(idx))?,
                OpCode::GetFree(idx) => {
                    let cell = self.frames[frame_idx].closure.free[idx as usize].clone();
                    let v = cell.borrow().clone();
                    self.push(v)?;
                }
                OpCode::SetFree(idx) => {
                    let v = self.pop();
                    let cell = self.frames[frame_idx].closure.free[idx as usize].clone();
                    *cell.borrow_mut() = v;
                }
                OpCode::GetLocalPtr(idx) => {
                    let slot = self.frames[frame_idx].base_pointer + idx as usize;
                    let cell = self.boxed_local_slot(slot);
                    self.push(Value::Pointer(cell))?;
                }
                OpCode::GetFreePtr(idx) => {
                    let cell = self.frames[frame_idx].closure.free[idx as usize].clone();
                    self.push(Value::Pointer(cell))?;
                }

                OpCode::Closure(const_idx, num_free) => {
                    let function = match &self.constants[const_idx as usize] {
                        Value::CompiledFunction(f) => f.clone(),
                        other => {
                            return Err(self.attribute(GsError::new(
                                ErrorKind::NotImplemented,
                                format!("constant at {const_idx} is not a function: {}", other.type_name()),
                                SourceLocation::unknown(),
                            )))
                        }
                    };
                    let mut free: Vec<Cell> = Vec::with_capacity(num_free as usize);
                    for _ in 0..num_free {
                        let v = self.pop();
                        let cell: Cell = match v {
                            Value::Pointer(c) => c,
                            other => Rc::new(RefCell::new(other)),
                        };
                        free.push(cell);
                    }
                    free.reverse();
                    self.charge_alloc(1)?;
                    self.push(Value::Closure(Rc::new(Closure { function, free })))?;
                }

                OpCode::Call(n) => self.call_value(n as usize)?,
                OpCode::CallSpread(n) => {
                    let spread = self.pop();
                    let extra = match spread {
                        Value::Array(a) => a.borrow().clone(),
                        other => {
                            return Err(self.attribute(GsError::invalid_argument_type(
                                "spread argument",
                                "array",
                                other.type_name(),
                            )))
                        }
                    };
                    for v in &extra {
                        self.push(v.clone())?;
                    }
                    self.call_value(n as usize + extra.len())?;
                }
                OpCode::ReturnValue => {
                    let ret = self.pop();
                    if self.frames.len() == 1 {
                        return Ok(ret);
                    }
                    let frame = self.frames.pop().expect("len checked above");
                    self.sp = frame.base_pointer - 1;
                    self.push(ret)?;
                }
                OpCode::Return => {
                    if self.frames.len() == 1 {
                        return Ok(Value::Nil);
                    }
                    let frame = self.frames.pop().expect("len checked above");
                    self.sp = frame.base_pointer - 1;
                    self.push(Value::Nil)?;
                }

                OpCode::Array(n) => {
                    let mut items = Vec::with_capacity(n as usize);
                    for _ in 0..n {
                        items.push(self.pop());
                    }
                    items.reverse();
                    self.charge_alloc(1)?;
                    self.push(Value::Array(Rc::new(RefCell::new(items))))?;
                }
                OpCode::Map(n) => {
                    let total = 2 * n as usize;
                    let mut items = Vec::with_capacity(total);
                    for _ in 0..total {
                        items.push(self.pop());
                    }
                    items.reverse();
                    let mut map = HashMap::new();
                    let mut it = items.into_iter();
                    while let (Some(k), Some(v)) = (it.next(), it.next()) {
                        let key = match k {
                            Value::String(s) => s.as_str().to_string(),
                            other => {
                                return Err(self.attribute(GsError::invalid_argument_type(
                                    "map key",
                                    "string",
                                    other.type_name(),
                                )))
                            }
                        };
                        map.insert(key, v);
                    }
                    self.charge_alloc(1)?;
                    self.push(Value::Map(Rc::new(RefCell::new(map))))?;
                }
                OpCode::Index => {
                    let index = self.pop();
                    let object = self.pop();
                    let v = object.index_get(&index).map_err(|e| self.attribute(e))?;
                    self.push(v)?;
                }
                OpCode::SliceIndex => {
                    let high = self.pop();
                    let low = self.pop();
                    let object = self.pop();
                    let v = slice_index(&object, &low, &high).map_err(|e| self.attribute(e))?;
                    self.push(v)?;
                }
                OpCode::GetSelector => {
                    let key = self.pop();
                    let object = self.pop();
                    let v = object.index_get(&key).map_err(|e| self.attribute(e))?;
                    self.push(v)?;
                }
                OpCode::SetSelector => {
                    let index = self.pop();
                    let object = self.pop();
                    let value = self.pop();
                    object.index_set(&index, value).map_err(|e| self.attribute(e))?;
                }

                OpCode::IteratorInit => {
                    let v = self.pop();
                    self.push(v.into_iterator_value())?;
                }
                OpCode::IteratorNext => {
                    let Value::Iterator(it) = self.peek().clone() else {
                        return Err(self.attribute(GsError::new(
                            ErrorKind::NotImplemented,
                            "IteratorNext on a non-iterator".to_string(),
                            SourceLocation::unknown(),
                        )));
                    };
                    let advanced = it.borrow_mut().advance();
                    self.push(Value::Bool(advanced))?;
                }
                OpCode::IteratorKey => {
                    let Value::Iterator(it) = self.peek().clone() else {
                        return Err(self.attribute(GsError::new(
                            ErrorKind::NotImplemented,
                            "IteratorKey on a non-iterator".to_string(),
                            SourceLocation::unknown(),
                        )));
                    };
                    let key = it.borrow().key();
                    self.push(key)?;
                }
                OpCode::IteratorValue => {
                    let Value::Iterator(it) = self.peek().clone() else {
                        return Err(self.attribute(GsError::new(
                            ErrorKind::NotImplemented,
                            "IteratorValue on a non-iterator".to_string(),
                            SourceLocation::unknown(),
                        )));
                    };
                    let value = it.borrow().value();
                    self.push(value)?;
                }

                OpCode::Error => {
                    let v = self.pop();
                    self.push(Value::Error(Rc::new(v)))?;
                }
                OpCode::Immutable => {}
            }
        }
    }

    fn set_global(&mut self, idx: usize, v: Value) -> Result<(), GsError> {
        if idx >= self.globals.len() {
            return Err(self.attribute(GsError::new(
                ErrorKind::ObjectAllocLimit,
                "too many global bindings".to_string(),
                SourceLocation::unknown(),
            )));
        }
        self.globals[idx] = v;
        Ok(())
    }

    fn get_global(&self, idx: usize) -> Value {
        self.globals.get(idx).cloned().unwrap_or(Value::Nil)
    }

    fn load_local_slot(&self, slot: usize) -> Value {
        match &self.stack[slot] {
            Value::Pointer(c) => c.borrow().clone(),
            other => other.clone(),
        }
    }

    fn store_local_slot(&mut self, slot: usize, v: Value) {
        let is_ptr = matches!(&self.stack[slot], Value::Pointer(_));
        if is_ptr {
            if let Value::Pointer(c) = &self.stack[slot] {
                *c.borrow_mut() = v;
                return;
            }
        }
        self.stack[slot] = v;
    }

    fn boxed_local_slot(&mut self, slot: usize) -> Cell {
        if let Value::Pointer(c) = &self.stack[slot] {
            return c.clone();
        }
        let cell = Rc::new(RefCell::new(std::mem::replace(&mut self.stack[slot], Value::Nil)));
        self.stack[slot] = Value::Pointer(cell.clone());
        cell
    }

    fn call_value(&mut self, num_args: usize) -> Result<(), GsError> {
        let callee_idx = self.sp - 1 - num_args;
        let callee = self.stack[callee_idx].clone();
        match callee {
            Value::Closure(cl) => self.call_closure(cl, callee_idx, num_args),
            Value::CompiledFunction(f) => {
                let cl = Rc::new(Closure { function: f, free: Vec::new() });
                self.call_closure(cl, callee_idx, num_args)
            }
            Value::Builtin(idx) => {
                let args: Vec<Value> = self.stack[callee_idx + 1..self.sp].to_vec();
                self.sp = callee_idx;
                let result = call_builtin(idx, &args).map_err(|e| self.attribute(e))?;
                self.push(result)
            }
            Value::HostFunction(hf) => {
                let args: Vec<Value> = self.stack[callee_idx + 1..self.sp].to_vec();
                self.sp = callee_idx;
                let result = (hf.func)(&args).map_err(|e| self.attribute(e))?;
                self.push(result)
            }
            other => Err(self.attribute(GsError::new(
                ErrorKind::InvalidArgumentType,
                format!("not callable: {}", other.type_name()),
                SourceLocation::unknown(),
            ))),
        }
    }

    fn call_closure(&mut self, cl: Rc<Closure>, callee_idx: usize, mut num_args: usize) -> Result<(), GsError> {
        let num_params = cl.function.num_parameters;
        if cl.function.varargs {
            let fixed = num_params.saturating_sub(1);
            if num_args < fixed {
                return Err(self.attribute(GsError::wrong_num_arguments(format!(
                    "expected at least {fixed} argument(s), got {num_args}"
                ))));
            }
            let extra: Vec<Value> = self.stack[callee_idx + 1 + fixed..self.sp].to_vec();
            self.sp = callee_idx + 1 + fixed;
            self.charge_alloc(1)?;
            self.push(Value::Array(Rc::new(RefCell::new(extra))))?;
            num_args = fixed + 1;
        } else if num_args != num_params {
            return Err(self.attribute(GsError::wrong_num_arguments(format!(
                "expected {num_params} argument(s), got {num_args}"
            ))));
        }

        if self.frames.len() >= self.config.max_frames {
            return Err(self.attribute(GsError::new(ErrorKind::FrameOverflow, "frame overflow".to_string(), SourceLocation::unknown())));
        }

        let base_pointer = self.sp - num_args;
        let num_locals = cl.function.num_locals.max(num_args);
        self.sp = base_pointer + num_locals;
        if self.sp > self.stack.len() {
            return Err(self.attribute(GsError::new(ErrorKind::StackOverflow, "stack overflow".to_string(), SourceLocation::unknown())));
        }
        for slot in &mut self.stack[base_pointer + num_args..self.sp] {
            *slot = Value::Nil;
        }
        self.frames.push(Frame { closure: cl, ip: 0, base_pointer });
        Ok(())
    }
}

fn to_binop(op: OpCode) -> BinOp {
    match op {
        OpCode::Add => BinOp::Add,
        OpCode::Sub => BinOp::Sub,
        OpCode::Mul => BinOp::Mul,
        OpCode::Quo => BinOp::Div,
        OpCode::Rem => BinOp::Rem,
        OpCode::And => BinOp::And,
        OpCode::Or => BinOp::Or,
        OpCode::Xor => BinOp::Xor,
        OpCode::AndNot => BinOp::AndNot,
        OpCode::Shl => BinOp::Shl,
        OpCode::Shr => BinOp::Shr,
        OpCode::Equal => BinOp::Equal,
        OpCode::NotEqual => BinOp::NotEqual,
        OpCode::Less => BinOp::Less,
        OpCode::Greater => BinOp::Greater,
        OpCode::LessEq => BinOp::LessEq,
        OpCode::GreaterEq => BinOp::GreaterEq,
        other => unreachable!("to_binop called on non-arithmetic opcode {other:?}"),
    }
}

/// `String[lo:hi]` bounds are byte offsets, matching `len(String)` (spec.md
/// §3/§8: `len(String[i:j]) == j-i` for `i`,`j` in byte range) — slicing by
/// codepoint index would make the result's byte length diverge from `hi-lo`
/// for any non-ASCII string, so this indexes `as_str()` directly rather
/// than going through the codepoint cache `char_len`/`char_at` use.
fn slice_index(obj: &Value, low: &Value, high: &Value) -> Result<Value, GsError> {
    let len = match obj {
        Value::Array(a) => a.borrow().len() as i64,
        Value::String(s) => s.as_str().len() as i64,
        Value::Bytes(b) => b.len() as i64,
        other => return Err(GsError::not_indexable(other.type_name())),
    };
    let clamp = |v: i64| -> i64 {
        if v < 0 {
            (v + len).max(0)
        } else {
            v.min(len)
        }
    };
    let lo = match low {
        Value::Int(i) => clamp(*i),
        _ => 0,
    };
    let hi = match high {
        Value::Int(i) => clamp(*i),
        _ => len,
    };
    let hi = hi.max(lo);
    match obj {
        Value::Array(a) => Ok(Value::Array(Rc::new(RefCell::new(a.borrow()[lo as usize..hi as usize].to_vec())))),
        Value::String(s) => {
            let bytes = s.as_str();
            let (lo, hi) = (lo as usize, hi as usize);
            if !bytes.is_char_boundary(lo) || !bytes.is_char_boundary(hi) {
                return Err(GsError::new(
                    ErrorKind::IndexOutOfBounds,
                    format!("string slice [{lo}:{hi}] does not fall on a character boundary"),
                    SourceLocation::unknown(),
                ));
            }
            Ok(Value::String(GsString::new(bytes[lo..hi].to_string())))
        }
        Value::Bytes(b) => Ok(Value::Bytes(Rc::new(b[lo as usize..hi as usize].to_vec()))),
        _ => unreachable!("len computation above already rejected other kinds"),
    }
}

/// Convert a pool `Constant` to a live `Value`, re-binding host-module
/// markers (`{"__module_name__": name}`) to the registry's live export
/// table instead of constructing a literal empty map.
pub fn constant_to_value(c: &Constant, modules: &ModuleRegistry) -> Value {
    match c {
        Constant::Int(i) => Value::Int(*i),
        Constant::Float(f) => Value::Float(*f),
        Constant::Char(ch) => Value::Char(*ch),
        Constant::String(s) => Value::String(GsString::new(s.clone())),
        Constant::CompiledFunction(f) => Value::CompiledFunction(f.clone()),
        Constant::Map(m) => {
            if let Some(Constant::String(name)) = m.get("__module_name__") {
                if let Some(v) = modules.get_host(name) {
                    return v;
                }
            }
            let converted: HashMap<String, Value> = m.iter().map(|(k, v)| (k.clone(), constant_to_value(v, modules))).collect();
            Value::Map(Rc::new(RefCell::new(converted)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;

    fn run(src: &str) -> Value {
        let modules = ModuleRegistry::with_stdlib();
        let chunk = compile(src, &modules).expect("compiles");
        let mut vm = Vm::new(chunk, &modules, VmConfig::default());
        vm.run().expect("runs")
    }

    #[test]
    fn recursion_factorial() {
        let v = run(
            "fact := func(n) { if n <= 1 { return 1 }; return n * fact(n - 1) }\n\
             export fact(10)",
        );
        assert!(matches!(v, Value::Int(3628800)));
    }

    #[test]
    fn variadic_splat_sums() {
        let v = run(
            "sum := func(...xs) { total := 0; for x in xs { total += x }; return total }\n\
             export sum(1, 2, 3, 4)",
        );
        assert!(matches!(v, Value::Int(10)));
    }

    #[test]
    fn for_in_break_and_continue() {
        let v = run(
            "s := 0\n\
             for _, x in [1,2,3,4,5] {\n\
               if x == 2 { continue }\n\
               if x == 5 { break }\n\
               s += x\n\
             }\n\
             export s",
        );
        assert!(matches!(v, Value::Int(1 + 3 + 4)));
    }

    #[test]
    fn string_over_limit_is_an_error() {
        let modules = ModuleRegistry::with_stdlib();
        let chunk = compile("export \"a\" + \"b\"", &modules).unwrap();
        let mut vm = Vm::new(chunk, &modules, VmConfig::default());
        vm.config.max_string_len = 1;
        let err = vm.run().unwrap_err();
        assert_eq!(err.kind, ErrorKind::StringLimit);
    }

    #[test]
    fn copy_is_independent_of_original() {
        let v = run(
            "a := [1, 2, 3]\n\
             b := copy(a)\n\
             b[0] = 99\n\
             export a[0]",
        );
        assert!(matches!(v, Value::Int(1)));
    }
}
