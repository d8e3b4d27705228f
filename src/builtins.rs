// File: src/builtins.rs
//
// The canonical builtin function table, registered on the root symbol
// table in this fixed order so `GetBuiltin u8` is stable across runs.
// Order and names match the original implementation's `builtinFuncs`
// table exactly.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::errors::GsError;
use crate::value::{GsString, Value};

pub const BUILTIN_NAMES: &[&str] = &[
    "len",
    "type",
    "range",
    "format",
    "copy",
    "map_keys",
    "map_values",
    "array_sort",
    "array_rand",
    "array_push",
    "array_pop",
    "array_unshift",
    "array_shift",
    "array_reverse",
    "array_unique",
    "array_column",
    "array_splice",
    "append",
    "delete",
    "exists",
    "string",
    "int",
    "bool",
    "float",
    "char",
    "bytes",
    "is_int",
    "is_float",
    "is_string",
    "is_bool",
    "is_char",
    "is_bytes",
    "is_array",
    "is_map",
    "is_function",
    "is_callable",
    "is_iterable",
    "is_error",
    "is_nil",
];

pub fn builtin_index(name: &str) -> Option<u8> {
    BUILTIN_NAMES.iter().position(|n| *n == name).map(|i| i as u8)
}

type BResult = Result<Value, GsError>;

fn want(n: usize, args: &[Value]) -> Result<(), GsError> {
    if args.len() != n {
        return Err(GsError::wrong_num_arguments(format!("expected {n} argument(s), got {}", args.len())));
    }
    Ok(())
}

fn arr(v: &Value) -> Option<Rc<RefCell<Vec<Value>>>> {
    match v {
        Value::Array(a) => Some(a.clone()),
        _ => None,
    }
}

pub fn call_builtin(index: u8, args: &[Value]) -> BResult {
    match BUILTIN_NAMES.get(index as usize).copied() {
        Some("len") => builtin_len(args),
        Some("type") => builtin_type(args),
        Some("range") => builtin_range(args),
        Some("format") => builtin_format(args),
        Some("copy") => {
            want(1, args)?;
            Ok(args[0].deep_copy())
        }
        Some("map_keys") => builtin_map_keys(args),
        Some("map_values") => builtin_map_values(args),
        Some("array_sort") => builtin_array_sort(args),
        Some("array_rand") => builtin_array_rand(args),
        Some("array_push") => builtin_array_push(args),
        Some("array_pop") => builtin_array_pop(args),
        Some("array_unshift") => builtin_array_unshift(args),
        Some("array_shift") => builtin_array_shift(args),
        Some("array_reverse") => builtin_array_reverse(args),
        Some("array_unique") => builtin_array_unique(args),
        Some("array_column") => builtin_array_column(args),
        Some("array_splice") => builtin_array_splice(args),
        Some("append") => builtin_append(args),
        Some("delete") => builtin_delete(args),
        Some("exists") => builtin_exists(args),
        Some("string") => builtin_string(args),
        Some("int") => builtin_int(args),
        Some("bool") => builtin_bool(args),
        Some("float") => builtin_float(args),
        Some("char") => builtin_char(args),
        Some("bytes") => builtin_bytes(args),
        Some("is_int") => Ok(Value::Bool(matches!(args.first(), Some(Value::Int(_))))),
        Some("is_float") => Ok(Value::Bool(matches!(args.first(), Some(Value::Float(_))))),
        Some("is_string") => Ok(Value::Bool(matches!(args.first(), Some(Value::String(_))))),
        Some("is_bool") => Ok(Value::Bool(matches!(args.first(), Some(Value::Bool(_))))),
        Some("is_char") => Ok(Value::Bool(matches!(args.first(), Some(Value::Char(_))))),
        Some("is_bytes") => Ok(Value::Bool(matches!(args.first(), Some(Value::Bytes(_))))),
        Some("is_array") => Ok(Value::Bool(matches!(args.first(), Some(Value::Array(_))))),
        Some("is_map") => Ok(Value::Bool(matches!(args.first(), Some(Value::Map(_))))),
        Some("is_function") => {
            Ok(Value::Bool(matches!(args.first(), Some(Value::Closure(_)) | Some(Value::CompiledFunction(_)))))
        }
        Some("is_callable") => Ok(Value::Bool(args.first().is_some_and(Value::can_call))),
        Some("is_iterable") => Ok(Value::Bool(args.first().is_some_and(Value::can_iterate))),
        Some("is_error") => Ok(Value::Bool(matches!(args.first(), Some(Value::Error(_))))),
        Some("is_nil") => Ok(Value::Bool(matches!(args.first(), Some(Value::Nil)))),
        _ => Err(GsError::new(
            crate::errors::ErrorKind::NotImplemented,
            format!("unknown builtin index {index}"),
            crate::errors::SourceLocation::unknown(),
        )),
    }
}

fn builtin_len(args: &[Value]) -> BResult {
    want(1, args)?;
    match &args[0] {
        Value::Array(a) => Ok(Value::Int(a.borrow().len() as i64)),
        Value::String(s) => Ok(Value::Int(s.as_str().len() as i64)),
        Value::Bytes(b) => Ok(Value::Int(b.len() as i64)),
        Value::Map(m) => Ok(Value::Int(m.borrow().len() as i64)),
        other => Err(GsError::invalid_argument_type("first", "array/string/bytes/map", other.type_name())),
    }
}

fn builtin_type(args: &[Value]) -> BResult {
    want(1, args)?;
    Ok(Value::String(GsString::new(args[0].type_name())))
}

fn builtin_range(args: &[Value]) -> BResult {
    if args.len() < 2 || args.len() > 3 {
        return Err(GsError::wrong_num_arguments("range(start, stop[, step])"));
    }
    let mut ints = [0i64; 3];
    for (i, a) in args.iter().enumerate() {
        match a {
            Value::Int(v) => ints[i] = *v,
            other => {
                let name = ["start", "stop", "step"][i];
                return Err(GsError::invalid_argument_type(name, "int", other.type_name()));
            }
        }
    }
    let (start, stop) = (ints[0], ints[1]);
    let step = if args.len() == 3 { ints[2] } else if stop < start { -1 } else { 1 };
    if step == 0 {
        return Err(GsError::new(
            crate::errors::ErrorKind::InvalidRangeStep,
            "range step must not be zero".to_string(),
            crate::errors::SourceLocation::unknown(),
        ));
    }
    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i < stop {
            out.push(Value::Int(i));
            i += step;
        }
    } else {
        while i > stop {
            out.push(Value::Int(i));
            i += step;
        }
    }
    Ok(Value::Array(Rc::new(RefCell::new(out))))
}

/// Minimal `%v`/`%d`/`%s`/`%f` substitution, applied left to right.
fn builtin_format(args: &[Value]) -> BResult {
    if args.is_empty() {
        return Err(GsError::wrong_num_arguments("format(fmt, ...)"));
    }
    let Value::String(fmt) = &args[0] else {
        return Err(GsError::invalid_argument_type("first", "string", args[0].type_name()));
    };
    let mut out = String::new();
    let mut arg_idx = 1;
    let mut chars = fmt.as_str().chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.peek() {
                Some('v') | Some('d') | Some('s') | Some('f') => {
                    chars.next();
                    if let Some(a) = args.get(arg_idx) {
                        out.push_str(&a.display_string());
                        arg_idx += 1;
                    }
                }
                Some('%') => {
                    chars.next();
                    out.push('%');
                }
                _ => out.push('%'),
            }
        } else {
            out.push(c);
        }
    }
    Ok(Value::String(GsString::new(out)))
}

fn builtin_map_keys(args: &[Value]) -> BResult {
    want(1, args)?;
    let Value::Map(m) = &args[0] else {
        return Err(GsError::invalid_argument_type("first", "map", args[0].type_name()));
    };
    let mut keys: Vec<String> = m.borrow().keys().cloned().collect();
    keys.sort();
    Ok(Value::Array(Rc::new(RefCell::new(keys.into_iter().map(|k| Value::String(GsString::new(k))).collect()))))
}

fn builtin_map_values(args: &[Value]) -> BResult {
    want(1, args)?;
    let Value::Map(m) = &args[0] else {
        return Err(GsError::invalid_argument_type("first", "map", args[0].type_name()));
    };
    let m = m.borrow();
    let mut keys: Vec<&String> = m.keys().collect();
    keys.sort();
    Ok(Value::Array(Rc::new(RefCell::new(keys.into_iter().map(|k| m[k].clone()).collect()))))
}

fn cmp_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.as_str().cmp(y.as_str()),
        _ => Ordering::Equal,
    }
}

fn builtin_array_sort(args: &[Value]) -> BResult {
    want(1, args)?;
    let a = arr(&args[0]).ok_or_else(|| GsError::invalid_argument_type("first", "array", args[0].type_name()))?;
    a.borrow_mut().sort_by(cmp_values);
    Ok(args[0].clone())
}

fn builtin_array_rand(args: &[Value]) -> BResult {
    want(1, args)?;
    let a = arr(&args[0]).ok_or_else(|| GsError::invalid_argument_type("first", "array", args[0].type_name()))?;
    let a = a.borrow();
    if a.is_empty() {
        return Ok(Value::Nil);
    }
    let idx = rand::random::<usize>() % a.len();
    Ok(a[idx].clone())
}

fn builtin_array_push(args: &[Value]) -> BResult {
    if args.is_empty() {
        return Err(GsError::wrong_num_arguments("array_push(arr, ...items)"));
    }
    let a = arr(&args[0]).ok_or_else(|| GsError::invalid_argument_type("first", "array", args[0].type_name()))?;
    a.borrow_mut().extend(args[1..].iter().cloned());
    Ok(args[0].clone())
}

fn builtin_array_pop(args: &[Value]) -> BResult {
    want(1, args)?;
    let a = arr(&args[0]).ok_or_else(|| GsError::invalid_argument_type("first", "array", args[0].type_name()))?;
    Ok(a.borrow_mut().pop().unwrap_or(Value::Nil))
}

fn builtin_array_unshift(args: &[Value]) -> BResult {
    if args.is_empty() {
        return Err(GsError::wrong_num_arguments("array_unshift(arr, ...items)"));
    }
    let a = arr(&args[0]).ok_or_else(|| GsError::invalid_argument_type("first", "array", args[0].type_name()))?;
    for (i, v) in args[1..].iter().enumerate() {
        a.borrow_mut().insert(i, v.clone());
    }
    Ok(args[0].clone())
}

fn builtin_array_shift(args: &[Value]) -> BResult {
    want(1, args)?;
    let a = arr(&args[0]).ok_or_else(|| GsError::invalid_argument_type("first", "array", args[0].type_name()))?;
    let mut a = a.borrow_mut();
    if a.is_empty() {
        Ok(Value::Nil)
    } else {
        Ok(a.remove(0))
    }
}

fn builtin_array_reverse(args: &[Value]) -> BResult {
    want(1, args)?;
    let a = arr(&args[0]).ok_or_else(|| GsError::invalid_argument_type("first", "array", args[0].type_name()))?;
    let mut reversed = a.borrow().clone();
    reversed.reverse();
    Ok(Value::Array(Rc::new(RefCell::new(reversed))))
}

fn builtin_array_unique(args: &[Value]) -> BResult {
    want(1, args)?;
    let a = arr(&args[0]).ok_or_else(|| GsError::invalid_argument_type("first", "array", args[0].type_name()))?;
    let mut out: Vec<Value> = Vec::new();
    for v in a.borrow().iter() {
        if !out.iter().any(|existing| existing.equals(v)) {
            out.push(v.clone());
        }
    }
    Ok(Value::Array(Rc::new(RefCell::new(out))))
}

fn builtin_array_column(args: &[Value]) -> BResult {
    want(2, args)?;
    let a = arr(&args[0]).ok_or_else(|| GsError::invalid_argument_type("first", "array", args[0].type_name()))?;
    let Value::String(key) = &args[1] else {
        return Err(GsError::invalid_argument_type("second", "string", args[1].type_name()));
    };
    let mut out = Vec::new();
    for row in a.borrow().iter() {
        if let Value::Map(m) = row {
            out.push(m.borrow().get(key.as_str()).cloned().unwrap_or(Value::Nil));
        } else {
            out.push(Value::Nil);
        }
    }
    Ok(Value::Array(Rc::new(RefCell::new(out))))
}

fn builtin_array_splice(args: &[Value]) -> BResult {
    if args.len() < 2 {
        return Err(GsError::wrong_num_arguments("array_splice(arr, start[, deleteCount, ...items])"));
    }
    let a = arr(&args[0]).ok_or_else(|| GsError::invalid_argument_type("first", "array", args[0].type_name()))?;
    let Value::Int(start) = args[1] else {
        return Err(GsError::invalid_argument_type("second", "int", args[1].type_name()));
    };
    let mut a = a.borrow_mut();
    let len = a.len() as i64;
    let start = if start < 0 { (start + len).max(0) } else { start.min(len) } as usize;
    let delete_count = if args.len() >= 3 {
        match args[2] {
            Value::Int(n) => (n.max(0) as usize).min(a.len() - start),
            _ => return Err(GsError::invalid_argument_type("third", "int", args[2].type_name())),
        }
    } else {
        a.len() - start
    };
    let removed: Vec<Value> = a.splice(start..start + delete_count, args[3..].iter().cloned()).collect();
    Ok(Value::Array(Rc::new(RefCell::new(removed))))
}

fn builtin_append(args: &[Value]) -> BResult {
    if args.is_empty() {
        return Err(GsError::wrong_num_arguments("append(arr, ...items)"));
    }
    let a = arr(&args[0]).ok_or_else(|| GsError::invalid_argument_type("first", "array", args[0].type_name()))?;
    let mut out = a.borrow().clone();
    out.extend(args[1..].iter().cloned());
    Ok(Value::Array(Rc::new(RefCell::new(out))))
}

fn builtin_delete(args: &[Value]) -> BResult {
    want(2, args)?;
    match &args[0] {
        Value::Map(m) => {
            let key = match &args[1] {
                Value::String(s) => s.as_str().to_string(),
                other => return Err(GsError::invalid_argument_type("second", "string", other.type_name())),
            };
            m.borrow_mut().remove(&key);
            Ok(Value::Nil)
        }
        other => Err(GsError::invalid_argument_type("first", "map", other.type_name())),
    }
}

fn builtin_exists(args: &[Value]) -> BResult {
    want(2, args)?;
    match &args[0] {
        Value::Map(m) => {
            let key = match &args[1] {
                Value::String(s) => s.as_str().to_string(),
                other => return Err(GsError::invalid_argument_type("second", "string", other.type_name())),
            };
            Ok(Value::Bool(m.borrow().contains_key(&key)))
        }
        Value::Array(a) => match &args[1] {
            Value::Int(i) => Ok(Value::Bool(*i >= 0 && (*i as usize) < a.borrow().len())),
            other => Err(GsError::invalid_argument_type("second", "int", other.type_name())),
        },
        other => Err(GsError::invalid_argument_type("first", "map/array", other.type_name())),
    }
}

fn builtin_string(args: &[Value]) -> BResult {
    want(1, args)?;
    Ok(Value::String(GsString::new(args[0].display_string())))
}

fn builtin_int(args: &[Value]) -> BResult {
    want(1, args)?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Int(*f as i64)),
        Value::Char(c) => Ok(Value::Int(*c as i64)),
        Value::Bool(b) => Ok(Value::Int(if *b { 1 } else { 0 })),
        Value::String(s) => s
            .as_str()
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| GsError::invalid_argument_type("first", "int-compatible", "string")),
        other => Err(GsError::invalid_argument_type("first", "int-compatible", other.type_name())),
    }
}

fn builtin_bool(args: &[Value]) -> BResult {
    want(1, args)?;
    Ok(Value::Bool(!args[0].is_falsy()))
}

fn builtin_float(args: &[Value]) -> BResult {
    want(1, args)?;
    match &args[0] {
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::String(s) => s
            .as_str()
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| GsError::invalid_argument_type("first", "float-compatible", "string")),
        other => Err(GsError::invalid_argument_type("first", "float-compatible", other.type_name())),
    }
}

fn builtin_char(args: &[Value]) -> BResult {
    want(1, args)?;
    match &args[0] {
        Value::Char(c) => Ok(Value::Char(*c)),
        Value::Int(i) => char::from_u32(*i as u32)
            .map(Value::Char)
            .ok_or_else(|| GsError::invalid_argument_type("first", "char-compatible", "int")),
        Value::String(s) if s.char_len() == 1 => Ok(Value::Char(s.char_at(0).unwrap())),
        other => Err(GsError::invalid_argument_type("first", "char-compatible", other.type_name())),
    }
}

fn builtin_bytes(args: &[Value]) -> BResult {
    want(1, args)?;
    match &args[0] {
        Value::Bytes(b) => Ok(Value::Bytes(b.clone())),
        Value::String(s) => Ok(Value::Bytes(Rc::new(s.as_str().as_bytes().to_vec()))),
        Value::Int(n) => Ok(Value::Bytes(Rc::new(vec![0u8; (*n).max(0) as usize]))),
        other => Err(GsError::invalid_argument_type("first", "bytes-compatible", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_are_unique_and_stable() {
        let mut seen = HashMap::new();
        for (i, name) in BUILTIN_NAMES.iter().enumerate() {
            assert!(seen.insert(*name, i).is_none(), "duplicate builtin name {name}");
        }
        assert_eq!(builtin_index("len"), Some(0));
        assert_eq!(builtin_index("is_nil"), Some(BUILTIN_NAMES.len() as u8 - 1));
    }

    #[test]
    fn len_rejects_wrong_arity() {
        assert!(call_builtin(builtin_index("len").unwrap(), &[]).is_err());
    }

    #[test]
    fn range_default_step_direction() {
        let r = call_builtin(builtin_index("range").unwrap(), &[Value::Int(3), Value::Int(0)]).unwrap();
        match r {
            Value::Array(a) => assert_eq!(a.borrow().len(), 3),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn array_push_mutates_in_place() {
        let a = Value::Array(Rc::new(RefCell::new(vec![Value::Int(1)])));
        call_builtin(builtin_index("array_push").unwrap(), &[a.clone(), Value::Int(2)]).unwrap();
        match &a {
            Value::Array(arr) => assert_eq!(arr.borrow().len(), 2),
            _ => unreachable!(),
        }
    }
}
