// File: src/stdlib/mod.rs
//
// Host modules resolved by `import("name")`. Each submodule builds a
// `Value::Map` of `HostFunction`s and constants, grounded function-for-
// function on the corresponding original `stdlib/*.go` file; only the
// most commonly used subset of each is ported rather than every export.

pub mod base64_mod;
pub mod crypto;
pub mod fmt;
pub mod hex;
pub mod http;
pub mod json;
pub mod math;
pub mod os;
pub mod random;
pub mod regex_mod;
pub mod text;
pub mod time;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::errors::GsError;
use crate::value::{GsString, HostFunction, Value};

pub(crate) fn host_fn(name: &str, f: impl Fn(&[Value]) -> Result<Value, GsError> + 'static) -> Value {
    Value::HostFunction(Rc::new(HostFunction { name: name.to_string(), func: Box::new(f) }))
}

pub(crate) fn module_of(entries: Vec<(&str, Value)>) -> Value {
    let map: HashMap<String, Value> = entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    Value::Map(Rc::new(RefCell::new(map)))
}

pub(crate) fn str_val(s: impl Into<Box<str>>) -> Value {
    Value::String(GsString::new(s))
}

pub(crate) fn want(n: usize, args: &[Value]) -> Result<(), GsError> {
    if args.len() != n {
        return Err(GsError::wrong_num_arguments(format!("expected {n} argument(s), got {}", args.len())));
    }
    Ok(())
}

pub(crate) fn as_f64(v: &Value) -> Result<f64, GsError> {
    match v {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        other => Err(GsError::invalid_argument_type("argument", "float(compatible)", other.type_name())),
    }
}

pub(crate) fn as_i64(v: &Value) -> Result<i64, GsError> {
    match v {
        Value::Int(i) => Ok(*i),
        Value::Float(f) => Ok(*f as i64),
        other => Err(GsError::invalid_argument_type("argument", "int(compatible)", other.type_name())),
    }
}

pub(crate) fn as_str(v: &Value) -> Result<String, GsError> {
    match v {
        Value::String(s) => Ok(s.as_str().to_string()),
        other => Err(GsError::invalid_argument_type("argument", "string(compatible)", other.type_name())),
    }
}
