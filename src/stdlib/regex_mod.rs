// File: src/stdlib/regex_mod.rs
//
// Grounded on `stdlib/text_regexp.go`: `compile(pattern)` returns a map of
// bound methods (`match`, `find`, `replace`, `split`) closing over the
// compiled pattern, mirroring the original's per-pattern `gslang.Map`.

use std::rc::Rc;

use regex::Regex;

use crate::errors::GsError;
use crate::value::Value;

use super::{as_i64, as_str, host_fn, module_of, str_val, want};

fn match_map(text: &str, start: usize, end: usize) -> Value {
    module_of(vec![
        ("text", str_val(&text[start..end])),
        ("begin", Value::Int(start as i64)),
        ("end", Value::Int(end as i64)),
    ])
}

fn compiled_methods(re: Rc<Regex>) -> Value {
    let match_re = re.clone();
    let find_re = re.clone();
    let replace_re = re.clone();
    let split_re = re;

    module_of(vec![
        ("match", host_fn("match", move |a| {
            want(1, a)?;
            let text = as_str(&a[0])?;
            Ok(Value::Bool(match_re.is_match(&text)))
        })),
        ("find", host_fn("find", move |a| {
            if a.is_empty() || a.len() > 2 {
                return Err(GsError::wrong_num_arguments("find(text) or find(text, max_count)"));
            }
            let text = as_str(&a[0])?;
            if a.len() == 1 {
                return Ok(match find_re.captures(&text) {
                    Some(caps) => {
                        let entries: Vec<Value> = caps
                            .iter()
                            .map(|m| match m {
                                Some(m) => match_map(&text, m.start(), m.end()),
                                None => match_map(&text, 0, 0),
                            })
                            .collect();
                        Value::Array(Rc::new(std::cell::RefCell::new(vec![Value::Array(Rc::new(
                            std::cell::RefCell::new(entries),
                        ))])))
                    }
                    None => Value::Nil,
                });
            }
            let max_count = as_i64(&a[1])?;
            let mut results = Vec::new();
            for (i, caps) in find_re.captures_iter(&text).enumerate() {
                if max_count >= 0 && i as i64 >= max_count {
                    break;
                }
                let entries: Vec<Value> = caps
                    .iter()
                    .map(|m| match m {
                        Some(m) => match_map(&text, m.start(), m.end()),
                        None => match_map(&text, 0, 0),
                    })
                    .collect();
                results.push(Value::Array(Rc::new(std::cell::RefCell::new(entries))));
            }
            Ok(if results.is_empty() { Value::Nil } else { Value::Array(Rc::new(std::cell::RefCell::new(results))) })
        })),
        ("replace", host_fn("replace", move |a| {
            want(2, a)?;
            let (text, repl) = (as_str(&a[0])?, as_str(&a[1])?);
            Ok(str_val(replace_re.replace_all(&text, repl.replace('$', "$$").as_str()).into_owned()))
        })),
        ("split", host_fn("split", move |a| {
            want(1, a)?;
            let text = as_str(&a[0])?;
            let parts: Vec<Value> = split_re.split(&text).map(str_val).collect();
            Ok(Value::Array(Rc::new(std::cell::RefCell::new(parts))))
        })),
    ])
}

pub fn module() -> Value {
    module_of(vec![("compile", host_fn("compile", |a| {
        want(1, a)?;
        let pattern = as_str(&a[0])?;
        match Regex::new(&pattern) {
            Ok(re) => Ok(compiled_methods(Rc::new(re))),
            Err(e) => Ok(Value::Error(Rc::new(str_val(e.to_string())))),
        }
    }))])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiled_pattern_matches_and_replaces() {
        let Value::Map(m) = module() else { panic!() };
        let Value::HostFunction(compile) = m.borrow().get("compile").cloned().unwrap() else { panic!() };
        let compiled = (compile.func)(&[str_val(r"\d+")]).unwrap();
        let Value::Map(methods) = compiled else { panic!() };
        let Value::HostFunction(is_match) = methods.borrow().get("match").cloned().unwrap() else { panic!() };
        let Value::HostFunction(replace) = methods.borrow().get("replace").cloned().unwrap() else { panic!() };
        assert!(matches!((is_match.func)(&[str_val("abc123")]).unwrap(), Value::Bool(true)));
        let replaced = (replace.func)(&[str_val("abc123"), str_val("#")]).unwrap();
        match replaced {
            Value::String(s) => assert_eq!(s.as_str(), "abc#"),
            _ => panic!("expected string"),
        }
    }
}
