// File: src/stdlib/text.rs
//
// Grounded on `stdlib/text.go`: common string utilities (case conversion,
// trimming, splitting/joining, containment, padding).

use crate::value::Value;

use super::{as_i64, as_str, host_fn, module_of, str_val, want};

pub fn module() -> Value {
    module_of(vec![
        ("to_upper", host_fn("to_upper", |a| {
            want(1, a)?;
            Ok(str_val(as_str(&a[0])?.to_uppercase()))
        })),
        ("to_lower", host_fn("to_lower", |a| {
            want(1, a)?;
            Ok(str_val(as_str(&a[0])?.to_lowercase()))
        })),
        ("trim_space", host_fn("trim_space", |a| {
            want(1, a)?;
            Ok(str_val(as_str(&a[0])?.trim().to_string()))
        })),
        ("trim_prefix", host_fn("trim_prefix", |a| {
            want(2, a)?;
            let (s, p) = (as_str(&a[0])?, as_str(&a[1])?);
            Ok(str_val(s.strip_prefix(&p).unwrap_or(&s).to_string()))
        })),
        ("trim_suffix", host_fn("trim_suffix", |a| {
            want(2, a)?;
            let (s, p) = (as_str(&a[0])?, as_str(&a[1])?);
            Ok(str_val(s.strip_suffix(&p).unwrap_or(&s).to_string()))
        })),
        ("contains", host_fn("contains", |a| {
            want(2, a)?;
            Ok(Value::Bool(as_str(&a[0])?.contains(&as_str(&a[1])?)))
        })),
        ("has_prefix", host_fn("has_prefix", |a| {
            want(2, a)?;
            Ok(Value::Bool(as_str(&a[0])?.starts_with(&as_str(&a[1])?)))
        })),
        ("has_suffix", host_fn("has_suffix", |a| {
            want(2, a)?;
            Ok(Value::Bool(as_str(&a[0])?.ends_with(&as_str(&a[1])?)))
        })),
        ("index_of", host_fn("index_of", |a| {
            want(2, a)?;
            let (s, sub) = (as_str(&a[0])?, as_str(&a[1])?);
            Ok(Value::Int(s.find(&sub).map(|i| i as i64).unwrap_or(-1)))
        })),
        ("replace", host_fn("replace", |a| {
            want(3, a)?;
            let (s, from, to) = (as_str(&a[0])?, as_str(&a[1])?, as_str(&a[2])?);
            Ok(str_val(s.replace(&from, &to)))
        })),
        ("split", host_fn("split", |a| {
            want(2, a)?;
            let (s, sep) = (as_str(&a[0])?, as_str(&a[1])?);
            let parts: Vec<Value> = s.split(&sep as &str).map(str_val).collect();
            Ok(Value::Array(std::rc::Rc::new(std::cell::RefCell::new(parts))))
        })),
        ("join", host_fn("join", |a| {
            want(2, a)?;
            let Value::Array(items) = &a[0] else {
                return Err(crate::errors::GsError::invalid_argument_type("first", "array", a[0].type_name()));
            };
            let sep = as_str(&a[1])?;
            let parts: Vec<String> = items.borrow().iter().map(|v| v.display_string()).collect();
            Ok(str_val(parts.join(&sep)))
        })),
        ("repeat", host_fn("repeat", |a| {
            want(2, a)?;
            let s = as_str(&a[0])?;
            let n = as_i64(&a[1])?.max(0) as usize;
            Ok(str_val(s.repeat(n)))
        })),
        ("pad_left", host_fn("pad_left", |a| {
            want(3, a)?;
            let s = as_str(&a[0])?;
            let width = as_i64(&a[1])?.max(0) as usize;
            let pad = as_str(&a[2])?;
            Ok(str_val(pad_to(&s, width, &pad, true)))
        })),
        ("pad_right", host_fn("pad_right", |a| {
            want(3, a)?;
            let s = as_str(&a[0])?;
            let width = as_i64(&a[1])?.max(0) as usize;
            let pad = as_str(&a[2])?;
            Ok(str_val(pad_to(&s, width, &pad, false)))
        })),
    ])
}

fn pad_to(s: &str, width: usize, pad: &str, left: bool) -> String {
    let len = s.chars().count();
    if len >= width || pad.is_empty() {
        return s.to_string();
    }
    let fill: String = pad.chars().cycle().take(width - len).collect();
    if left {
        format!("{fill}{s}")
    } else {
        format!("{s}{fill}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_join_roundtrip() {
        let Value::Map(m) = module() else { panic!() };
        let Value::HostFunction(split) = m.borrow().get("split").cloned().unwrap() else { panic!() };
        let Value::HostFunction(join) = m.borrow().get("join").cloned().unwrap() else { panic!() };
        let parts = (split.func)(&[str_val("a,b,c"), str_val(",")]).unwrap();
        let rejoined = (join.func)(&[parts, str_val("-")]).unwrap();
        match rejoined {
            Value::String(s) => assert_eq!(s.as_str(), "a-b-c"),
            _ => panic!("expected string"),
        }
    }
}
