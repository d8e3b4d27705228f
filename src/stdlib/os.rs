// File: src/stdlib/os.rs
//
// Grounded on `stdlib/os.go`: a sandboxed subset (environment/args/exit
// time) that doesn't touch the filesystem, since gslang's execution model
// has no file-object type of its own.

use crate::value::Value;

use super::{as_str, host_fn, module_of, str_val, want};

pub fn module() -> Value {
    module_of(vec![
        ("args", host_fn("args", |a| {
            want(0, a)?;
            let items = std::env::args().map(str_val).collect();
            Ok(Value::Array(std::rc::Rc::new(std::cell::RefCell::new(items))))
        })),
        ("getenv", host_fn("getenv", |a| {
            want(1, a)?;
            let name = as_str(&a[0])?;
            Ok(std::env::var(&name).map(str_val).unwrap_or(Value::String(crate::value::GsString::new(""))))
        })),
        ("environ", host_fn("environ", |a| {
            want(0, a)?;
            let items = std::env::vars().map(|(k, v)| str_val(format!("{k}={v}"))).collect();
            Ok(Value::Array(std::rc::Rc::new(std::cell::RefCell::new(items))))
        })),
        ("exit", host_fn("exit", |a| {
            want(1, a)?;
            let code = super::as_i64(&a[0])?;
            std::process::exit(code as i32);
        })),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getenv_missing_is_empty_string() {
        let Value::Map(m) = module() else { panic!() };
        let Value::HostFunction(getenv) = m.borrow().get("getenv").cloned().unwrap() else { panic!() };
        let r = (getenv.func)(&[str_val("GSLANG_DEFINITELY_UNSET_VAR")]).unwrap();
        match r {
            Value::String(s) => assert_eq!(s.as_str(), ""),
            _ => panic!("expected string"),
        }
    }
}
