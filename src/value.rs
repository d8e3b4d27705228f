// File: src/value.rs
//
// The closed gslang value model. Every runtime value is one variant of
// `Value`; there is no open trait hierarchy for value kinds the way a
// generic interpreter might do it; the VM and builtins dispatch on the
// enum directly, matching the table in SPEC_FULL.md's value-model section.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::bytecode::CompiledFunction;
use crate::errors::GsError;

/// A lexically-captured slot: a heap cell an inner closure and its
/// enclosing scope both point to. Single-threaded VM, so `Rc<RefCell<_>>`
/// rather than the `Arc<Mutex<_>>` the teacher reaches for elsewhere.
pub type Cell = Rc<RefCell<Value>>;

/// A closure: a compiled function paired with the free-variable cells it
/// captured at creation time.
#[derive(Debug)]
pub struct Closure {
    pub function: Rc<CompiledFunction>,
    pub free: Vec<Cell>,
}

/// A host function exposed to gslang code by a builtin module. Equality
/// and identity are by `Rc` pointer, matching `UserFunction.Equals` in the
/// original implementation (always considered distinct from every other
/// value, including another wrapper around the same underlying fn).
pub struct HostFunction {
    pub name: String,
    pub func: Box<dyn Fn(&[Value]) -> Result<Value, GsError>>,
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction").field("name", &self.name).finish()
    }
}

/// An immutable string value with a lazily-computed codepoint index,
/// mirroring the original's lazy `runeStr` cache used for O(1) char
/// indexing after the first index/iterate touches a given string.
pub struct GsString {
    pub value: Box<str>,
    runes: RefCell<Option<Rc<[char]>>>,
}

impl GsString {
    pub fn new(value: impl Into<Box<str>>) -> Rc<Self> {
        Rc::new(Self { value: value.into(), runes: RefCell::new(None) })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    fn runes(&self) -> Rc<[char]> {
        if let Some(r) = self.runes.borrow().as_ref() {
            return r.clone();
        }
        let r: Rc<[char]> = self.value.chars().collect::<Vec<char>>().into();
        *self.runes.borrow_mut() = Some(r.clone());
        r
    }

    pub fn char_len(&self) -> usize {
        self.runes().len()
    }

    pub fn char_at(&self, idx: usize) -> Option<char> {
        self.runes().get(idx).copied()
    }
}

impl fmt::Debug for GsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.value)
    }
}

/// The closed set of gslang runtime values.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(Rc<GsString>),
    Bytes(Rc<Vec<u8>>),
    /// Reference semantics: assignment aliases, `copy()` deep-copies.
    Array(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<HashMap<String, Value>>>),
    /// Wraps the payload reachable through the `value` pseudo-field;
    /// always falsy, compared by pointer identity.
    Error(Rc<Value>),
    Time(DateTime<Utc>),
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    /// Upvalue indirection used internally by the VM; never observable
    /// as an ordinary gslang value.
    Pointer(Cell),
    /// Index into the fixed builtin-function table (`src/builtins.rs`).
    Builtin(u8),
    HostFunction(Rc<HostFunction>),
    /// The cursor `IteratorInit` leaves on the stack for a `for`/`for-in`
    /// loop; VM-internal like `Pointer`, never surfaced to user code.
    Iterator(Rc<RefCell<Box<dyn ValueIter>>>),
}

/// Binary operators the VM's arithmetic/comparison opcodes reduce to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    AndNot,
    Shl,
    Shr,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEq,
    GreaterEq,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::AndNot => "&^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Equal => "==",
            BinOp::NotEqual => "!=",
            BinOp::Less => "<",
            BinOp::Greater => ">",
            BinOp::LessEq => "<=",
            BinOp::GreaterEq => ">=",
        };
        write!(f, "{s}")
    }
}

/// Uniform iteration cursor for `for x in v` / `for k, v in v`, covering
/// Array, String (by rune), Bytes (by byte), Map (by key) and `Nil` (a
/// cursor that never advances, so `for _ in nil {}` just runs zero times).
pub trait ValueIter: fmt::Debug {
    fn advance(&mut self) -> bool;
    fn key(&self) -> Value;
    fn value(&self) -> Value;
}

#[derive(Debug)]
struct ArrayIter {
    data: Rc<RefCell<Vec<Value>>>,
    idx: i64,
}
impl ValueIter for ArrayIter {
    fn advance(&mut self) -> bool {
        self.idx += 1;
        (self.idx as usize) < self.data.borrow().len()
    }
    fn key(&self) -> Value {
        Value::Int(self.idx)
    }
    fn value(&self) -> Value {
        self.data.borrow()[self.idx as usize].clone()
    }
}

#[derive(Debug)]
struct StringIter {
    data: Rc<GsString>,
    idx: i64,
}
impl ValueIter for StringIter {
    fn advance(&mut self) -> bool {
        self.idx += 1;
        (self.idx as usize) < self.data.char_len()
    }
    fn key(&self) -> Value {
        Value::Int(self.idx)
    }
    fn value(&self) -> Value {
        Value::Char(self.data.char_at(self.idx as usize).unwrap())
    }
}

#[derive(Debug)]
struct BytesIter {
    data: Rc<Vec<u8>>,
    idx: i64,
}
impl ValueIter for BytesIter {
    fn advance(&mut self) -> bool {
        self.idx += 1;
        (self.idx as usize) < self.data.len()
    }
    fn key(&self) -> Value {
        Value::Int(self.idx)
    }
    fn value(&self) -> Value {
        Value::Int(self.data[self.idx as usize] as i64)
    }
}

#[derive(Debug)]
struct MapIter {
    keys: Vec<String>,
    data: Rc<RefCell<HashMap<String, Value>>>,
    idx: i64,
}
impl ValueIter for MapIter {
    fn advance(&mut self) -> bool {
        self.idx += 1;
        (self.idx as usize) < self.keys.len()
    }
    fn key(&self) -> Value {
        Value::String(GsString::new(self.keys[self.idx as usize].clone()))
    }
    fn value(&self) -> Value {
        self.data.borrow().get(&self.keys[self.idx as usize]).cloned().unwrap_or(Value::Nil)
    }
}

#[derive(Debug)]
struct NilIter;
impl ValueIter for NilIter {
    fn advance(&mut self) -> bool {
        false
    }
    fn key(&self) -> Value {
        Value::Nil
    }
    fn value(&self) -> Value {
        Value::Nil
    }
}

/// Convert a value to a map-index key. Mirrors the original's coercion of
/// scalar kinds to string keys; anything else is `InvalidIndexType`.
fn to_index_key(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.as_str().to_string()),
        Value::Int(i) => Some(i.to_string()),
        Value::Char(c) => Some(c.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Float(f) => Some(f.to_string()),
        _ => None,
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "undefined",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Error(_) => "error",
            Value::Time(_) => "time",
            Value::CompiledFunction(_) => "compiled-function",
            Value::Closure(_) => "compiled-function",
            Value::Pointer(_) => "<free-var>",
            Value::Builtin(_) => "builtin-function",
            Value::HostFunction(_) => "user-function",
            Value::Iterator(_) => "<iterator>",
        }
    }

    /// Truthiness used by `if`, `&&`, `||`, ternary and `!`.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => f.is_nan(),
            Value::Char(c) => *c == '\0',
            Value::String(s) => s.value.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Array(a) => a.borrow().is_empty(),
            Value::Map(m) => m.borrow().is_empty(),
            Value::Error(_) => true,
            _ => false,
        }
    }

    /// `copy()` builtin: deep for arrays/maps/bytes, identity for
    /// everything else (scalars are already value types; functions,
    /// closures and errors copy as themselves per the original).
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Array(a) => {
                let copied: Vec<Value> = a.borrow().iter().map(|v| v.deep_copy()).collect();
                Value::Array(Rc::new(RefCell::new(copied)))
            }
            Value::Map(m) => {
                let copied: HashMap<String, Value> =
                    m.borrow().iter().map(|(k, v)| (k.clone(), v.deep_copy())).collect();
                Value::Map(Rc::new(RefCell::new(copied)))
            }
            Value::Bytes(b) => Value::Bytes(Rc::new(b.as_ref().clone())),
            other => other.clone(),
        }
    }

    /// Structural `==`. Error values compare by pointer identity, not
    /// structurally, matching the original's always-distinct errors.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a.as_str() == b.as_str(),
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.equals(w)))
            }
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            (Value::CompiledFunction(a), Value::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::HostFunction(a), Value::HostFunction(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn can_iterate(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::String(_) | Value::Bytes(_) | Value::Map(_) | Value::Nil
        )
    }

    pub fn iterate(&self) -> Box<dyn ValueIter> {
        match self {
            Value::Array(a) => Box::new(ArrayIter { data: a.clone(), idx: -1 }),
            Value::String(s) => Box::new(StringIter { data: s.clone(), idx: -1 }),
            Value::Bytes(b) => Box::new(BytesIter { data: b.clone(), idx: -1 }),
            Value::Map(m) => {
                let mut keys: Vec<String> = m.borrow().keys().cloned().collect();
                keys.sort();
                Box::new(MapIter { keys, data: m.clone(), idx: -1 })
            }
            _ => Box::new(NilIter),
        }
    }

    /// `IteratorInit`: wrap `self.iterate()` as a stack value the VM can
    /// hold across `IteratorNext`/`IteratorKey`/`IteratorValue` opcodes.
    pub fn into_iterator_value(&self) -> Value {
        Value::Iterator(Rc::new(RefCell::new(self.iterate())))
    }

    pub fn can_call(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::CompiledFunction(_) | Value::Builtin(_) | Value::HostFunction(_))
    }

    /// Index read (`v[i]`). Every indexable kind handles out-of-range or
    /// wrong-key-type access by its own rule, not a shared default:
    /// arrays/bytes/strings bounds-check into `IndexOutOfBounds`, maps
    /// return `Nil` for a missing key, `Error` only accepts `"value"`.
    pub fn index_get(&self, index: &Value) -> Result<Value, GsError> {
        match self {
            Value::Array(a) => {
                let Value::Int(i) = index else {
                    return Err(GsError::new(
                        crate::errors::ErrorKind::InvalidIndexType,
                        "index must be an int".to_string(),
                        crate::errors::SourceLocation::unknown(),
                    ));
                };
                let a = a.borrow();
                let len = a.len() as i64;
                let idx = if *i < 0 { *i + len } else { *i };
                if idx < 0 || idx >= len {
                    return Ok(Value::Nil);
                }
                Ok(a[idx as usize].clone())
            }
            Value::Bytes(b) => {
                let Value::Int(i) = index else {
                    return Err(GsError::new(
                        crate::errors::ErrorKind::InvalidIndexType,
                        "index must be an int".to_string(),
                        crate::errors::SourceLocation::unknown(),
                    ));
                };
                let len = b.len() as i64;
                let idx = if *i < 0 { *i + len } else { *i };
                if idx < 0 || idx >= len {
                    return Ok(Value::Nil);
                }
                Ok(Value::Int(b[idx as usize] as i64))
            }
            Value::String(s) => {
                let Value::Int(i) = index else {
                    return Err(GsError::new(
                        crate::errors::ErrorKind::InvalidIndexType,
                        "index must be an int".to_string(),
                        crate::errors::SourceLocation::unknown(),
                    ));
                };
                let len = s.char_len() as i64;
                let idx = if *i < 0 { *i + len } else { *i };
                if idx < 0 || idx >= len {
                    return Ok(Value::Nil);
                }
                Ok(Value::Char(s.char_at(idx as usize).unwrap()))
            }
            Value::Map(m) => {
                let Some(key) = to_index_key(index) else {
                    return Err(GsError::new(
                        crate::errors::ErrorKind::InvalidIndexType,
                        "map index must be a string-like value".to_string(),
                        crate::errors::SourceLocation::unknown(),
                    ));
                };
                Ok(m.borrow().get(&key).cloned().unwrap_or(Value::Nil))
            }
            Value::Error(inner) => {
                let Some(key) = to_index_key(index) else {
                    return Err(GsError::new(
                        crate::errors::ErrorKind::InvalidIndexOnError,
                        "error values only index 'value'".to_string(),
                        crate::errors::SourceLocation::unknown(),
                    ));
                };
                if key == "value" {
                    Ok((**inner).clone())
                } else {
                    Err(GsError::new(
                        crate::errors::ErrorKind::InvalidIndexOnError,
                        "error values only index 'value'".to_string(),
                        crate::errors::SourceLocation::unknown(),
                    ))
                }
            }
            Value::Nil => Ok(Value::Nil),
            other => Err(GsError::not_indexable(other.type_name())),
        }
    }

    /// Index write (`v[i] = x`). Strings, errors and scalars aren't
    /// index-assignable; arrays auto-extend-on-OOB is explicitly rejected
    /// (the original errors rather than growing the array).
    pub fn index_set(&self, index: &Value, value: Value) -> Result<(), GsError> {
        match self {
            Value::Array(a) => {
                let Value::Int(i) = index else {
                    return Err(GsError::new(
                        crate::errors::ErrorKind::InvalidIndexType,
                        "index must be an int".to_string(),
                        crate::errors::SourceLocation::unknown(),
                    ));
                };
                let mut a = a.borrow_mut();
                let len = a.len() as i64;
                let idx = if *i < 0 { *i + len } else { *i };
                if idx < 0 || idx >= len {
                    return Err(GsError::index_out_of_bounds());
                }
                a[idx as usize] = value;
                Ok(())
            }
            Value::Map(m) => {
                let Some(key) = to_index_key(index) else {
                    return Err(GsError::new(
                        crate::errors::ErrorKind::InvalidIndexType,
                        "map index must be a string-like value".to_string(),
                        crate::errors::SourceLocation::unknown(),
                    ));
                };
                m.borrow_mut().insert(key, value);
                Ok(())
            }
            other => Err(GsError::not_index_assignable(other.type_name())),
        }
    }

    /// Unquoted display form used for string interpolation, `print`/`fmt`
    /// output and the `+` coercion when the right-hand side of a string
    /// concatenation isn't itself a string. Differs deliberately from the
    /// quoted form a debugger/REPL echo would use.
    pub fn display_string(&self) -> String {
        match self {
            Value::Nil => "<nil>".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("{f}"),
            Value::Char(c) => c.to_string(),
            Value::String(s) => s.as_str().to_string(),
            Value::Bytes(b) => String::from_utf8_lossy(b).to_string(),
            Value::Array(a) => {
                let items: Vec<String> = a.borrow().iter().map(|v| v.display_string()).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Map(m) => {
                let m = m.borrow();
                let mut keys: Vec<&String> = m.keys().collect();
                keys.sort();
                let items: Vec<String> =
                    keys.into_iter().map(|k| format!("{}: {}", k, m[k].display_string())).collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::Error(inner) => format!("error: {}", inner.display_string()),
            Value::Time(t) => t.to_rfc3339(),
            Value::CompiledFunction(_) | Value::Closure(_) => "<compiled-function>".to_string(),
            Value::Pointer(_) => "<free-var>".to_string(),
            Value::Builtin(_) => "<builtin-function>".to_string(),
            Value::HostFunction(h) => format!("<user-function:{}>", h.name),
            Value::Iterator(_) => "<iterator>".to_string(),
        }
    }

    /// Binary arithmetic/comparison dispatch. Int/Float/Char/Time share the
    /// original's identity short-circuit: an operation that would produce
    /// a value bit-for-bit equal to the left operand returns that operand
    /// unchanged rather than allocating a new one.
    pub fn binary_op(&self, op: BinOp, rhs: &Value, max_string_len: usize, max_bytes_len: usize) -> Result<Value, GsError> {
        use BinOp::*;
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => int_binary_op(*a, *b, op),
            (Value::Int(a), Value::Float(b)) => float_binary_op(*a as f64, *b, op),
            (Value::Float(a), Value::Float(b)) => float_binary_op(*a, *b, op),
            (Value::Float(a), Value::Int(b)) => float_binary_op(*a, *b as f64, op),
            (Value::Char(a), Value::Char(b)) => char_binary_op(*a, *b as i64, op),
            (Value::Char(a), Value::Int(b)) => char_binary_op(*a, *b, op),
            (Value::Time(a), Value::Int(ns)) => time_binary_op(*a, *ns, op),
            (Value::Time(a), Value::Time(b)) => time_cmp(*a, *b, op),
            (Value::String(a), Value::String(b)) => match op {
                Add => {
                    let combined = format!("{}{}", a.as_str(), b.as_str());
                    if combined.len() > max_string_len {
                        return Err(GsError::new(
                            crate::errors::ErrorKind::StringLimit,
                            "exceeded max string length".to_string(),
                            crate::errors::SourceLocation::unknown(),
                        ));
                    }
                    Ok(Value::String(GsString::new(combined)))
                }
                Equal => Ok(Value::Bool(a.as_str() == b.as_str())),
                NotEqual => Ok(Value::Bool(a.as_str() != b.as_str())),
                Less => Ok(Value::Bool(a.as_str() < b.as_str())),
                Greater => Ok(Value::Bool(a.as_str() > b.as_str())),
                LessEq => Ok(Value::Bool(a.as_str() <= b.as_str())),
                GreaterEq => Ok(Value::Bool(a.as_str() >= b.as_str())),
                _ => Err(GsError::invalid_operator(&op.to_string(), "string", "string")),
            },
            (Value::String(a), other) => match op {
                // REDESIGN: unquoted coercion of the right-hand side,
                // rather than the debug/quoted form.
                Add => {
                    let combined = format!("{}{}", a.as_str(), other.display_string());
                    if combined.len() > max_string_len {
                        return Err(GsError::new(
                            crate::errors::ErrorKind::StringLimit,
                            "exceeded max string length".to_string(),
                            crate::errors::SourceLocation::unknown(),
                        ));
                    }
                    Ok(Value::String(GsString::new(combined)))
                }
                _ => Err(GsError::invalid_operator(&op.to_string(), "string", other.type_name())),
            },
            (Value::Bytes(a), Value::Bytes(b)) => match op {
                Add => {
                    if b.is_empty() {
                        return Ok(self.clone());
                    }
                    let mut combined = a.as_ref().clone();
                    combined.extend_from_slice(b);
                    if combined.len() > max_bytes_len {
                        return Err(GsError::new(
                            crate::errors::ErrorKind::BytesLimit,
                            "exceeded max bytes length".to_string(),
                            crate::errors::SourceLocation::unknown(),
                        ));
                    }
                    Ok(Value::Bytes(Rc::new(combined)))
                }
                Equal => Ok(Value::Bool(a == b)),
                NotEqual => Ok(Value::Bool(a != b)),
                _ => Err(GsError::invalid_operator(&op.to_string(), "bytes", "bytes")),
            },
            (Value::Array(a), Value::Array(b)) => match op {
                Add => {
                    if b.borrow().is_empty() {
                        return Ok(self.clone());
                    }
                    let mut combined = a.borrow().clone();
                    combined.extend(b.borrow().iter().cloned());
                    Ok(Value::Array(Rc::new(RefCell::new(combined))))
                }
                Equal => Ok(Value::Bool(self.equals(rhs))),
                NotEqual => Ok(Value::Bool(!self.equals(rhs))),
                _ => Err(GsError::invalid_operator(&op.to_string(), "array", "array")),
            },
            (Value::Bool(a), Value::Bool(b)) => match op {
                Equal => Ok(Value::Bool(a == b)),
                NotEqual => Ok(Value::Bool(a != b)),
                _ => Err(GsError::invalid_operator(&op.to_string(), "bool", "bool")),
            },
            (Value::Nil, Value::Nil) => match op {
                Equal => Ok(Value::Bool(true)),
                NotEqual => Ok(Value::Bool(false)),
                _ => Err(GsError::invalid_operator(&op.to_string(), "undefined", "undefined")),
            },
            _ => match op {
                Equal => Ok(Value::Bool(self.equals(rhs))),
                NotEqual => Ok(Value::Bool(!self.equals(rhs))),
                _ => Err(GsError::invalid_operator(&op.to_string(), self.type_name(), rhs.type_name())),
            },
        }
    }
}

fn int_binary_op(a: i64, b: i64, op: BinOp) -> Result<Value, GsError> {
    use BinOp::*;
    let r = match op {
        Add => a.wrapping_add(b),
        Sub => a.wrapping_sub(b),
        Mul => a.wrapping_mul(b),
        Div => {
            if b == 0 {
                return Err(GsError::new(
                    crate::errors::ErrorKind::DivisionByZero,
                    "division by zero".to_string(),
                    crate::errors::SourceLocation::unknown(),
                ));
            }
            a.wrapping_div(b)
        }
        Rem => {
            if b == 0 {
                return Err(GsError::new(
                    crate::errors::ErrorKind::DivisionByZero,
                    "division by zero".to_string(),
                    crate::errors::SourceLocation::unknown(),
                ));
            }
            a.wrapping_rem(b)
        }
        And => a & b,
        Or => a | b,
        Xor => a ^ b,
        AndNot => a & !b,
        Shl => a.wrapping_shl(b as u32),
        Shr => a.wrapping_shr(b as u32),
        Less => return Ok(Value::Bool(a < b)),
        Greater => return Ok(Value::Bool(a > b)),
        LessEq => return Ok(Value::Bool(a <= b)),
        GreaterEq => return Ok(Value::Bool(a >= b)),
        Equal => return Ok(Value::Bool(a == b)),
        NotEqual => return Ok(Value::Bool(a != b)),
    };
    if r == a {
        return Ok(Value::Int(a));
    }
    Ok(Value::Int(r))
}

fn float_binary_op(a: f64, b: f64, op: BinOp) -> Result<Value, GsError> {
    use BinOp::*;
    let r = match op {
        Add => a + b,
        Sub => a - b,
        Mul => a * b,
        Div => a / b,
        Less => return Ok(Value::Bool(a < b)),
        Greater => return Ok(Value::Bool(a > b)),
        LessEq => return Ok(Value::Bool(a <= b)),
        GreaterEq => return Ok(Value::Bool(a >= b)),
        Equal => return Ok(Value::Bool(a == b)),
        NotEqual => return Ok(Value::Bool(a != b)),
        Rem | And | Or | Xor | AndNot | Shl | Shr => {
            return Err(GsError::invalid_operator(&op.to_string(), "float", "float"));
        }
    };
    if r == a {
        return Ok(Value::Float(a));
    }
    Ok(Value::Float(r))
}

fn char_binary_op(a: char, b: i64, op: BinOp) -> Result<Value, GsError> {
    use BinOp::*;
    let ai = a as i64;
    match op {
        Add => {
            let r = ai + b;
            char::from_u32(r as u32).map(Value::Char).ok_or_else(|| {
                GsError::invalid_operator("+", "char", "int")
            })
        }
        Sub => {
            let r = ai - b;
            char::from_u32(r as u32).map(Value::Char).ok_or_else(|| {
                GsError::invalid_operator("-", "char", "int")
            })
        }
        Less => Ok(Value::Bool(ai < b)),
        Greater => Ok(Value::Bool(ai > b)),
        LessEq => Ok(Value::Bool(ai <= b)),
        GreaterEq => Ok(Value::Bool(ai >= b)),
        Equal => Ok(Value::Bool(ai == b)),
        NotEqual => Ok(Value::Bool(ai != b)),
        _ => Err(GsError::invalid_operator(&op.to_string(), "char", "int")),
    }
}

fn time_binary_op(a: DateTime<Utc>, ns: i64, op: BinOp) -> Result<Value, GsError> {
    use BinOp::*;
    match op {
        Add => {
            if ns == 0 {
                return Ok(Value::Time(a));
            }
            Ok(Value::Time(a + chrono::Duration::nanoseconds(ns)))
        }
        Sub => {
            if ns == 0 {
                return Ok(Value::Time(a));
            }
            Ok(Value::Time(a - chrono::Duration::nanoseconds(ns)))
        }
        _ => Err(GsError::invalid_operator(&op.to_string(), "time", "int")),
    }
}

fn time_cmp(a: DateTime<Utc>, b: DateTime<Utc>, op: BinOp) -> Result<Value, GsError> {
    use BinOp::*;
    match op {
        Sub => Ok(Value::Int((a - b).num_nanoseconds().unwrap_or(0))),
        Less => Ok(Value::Bool(a < b)),
        Greater => Ok(Value::Bool(a > b)),
        LessEq => Ok(Value::Bool(a <= b)),
        GreaterEq => Ok(Value::Bool(a >= b)),
        Equal => Ok(Value::Bool(a == b)),
        NotEqual => Ok(Value::Bool(a != b)),
        _ => Err(GsError::invalid_operator(&op.to_string(), "time", "time")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_identity_short_circuit_returns_same_value() {
        let v = Value::Int(5).binary_op(BinOp::Add, &Value::Int(0), 1024, 1024).unwrap();
        assert!(matches!(v, Value::Int(5)));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(Value::Int(1).binary_op(BinOp::Div, &Value::Int(0), 1024, 1024).is_err());
    }

    #[test]
    fn string_plus_non_string_is_unquoted() {
        let s = Value::String(GsString::new("n = "));
        let r = s.binary_op(BinOp::Add, &Value::Int(42), 1024, 1024).unwrap();
        match r {
            Value::String(s) => assert_eq!(s.as_str(), "n = 42"),
            _ => panic!("expected string"),
        }
    }

    #[test]
    fn array_index_negative_wraps() {
        let a = Value::Array(Rc::new(RefCell::new(vec![Value::Int(1), Value::Int(2), Value::Int(3)])));
        let v = a.index_get(&Value::Int(-1)).unwrap();
        assert!(matches!(v, Value::Int(3)));
    }

    #[test]
    fn map_missing_key_is_nil_not_error() {
        let m = Value::Map(Rc::new(RefCell::new(HashMap::new())));
        let v = m.index_get(&Value::String(GsString::new("missing"))).unwrap();
        assert!(matches!(v, Value::Nil));
    }

    #[test]
    fn error_only_indexes_value() {
        let e = Value::Error(Rc::new(Value::Int(7)));
        assert!(e.index_get(&Value::String(GsString::new("value"))).is_ok());
        assert!(e.index_get(&Value::String(GsString::new("other"))).is_err());
    }

    #[test]
    fn nil_iterates_zero_times() {
        let mut it = Value::Nil.iterate();
        assert!(!it.advance());
    }
}
