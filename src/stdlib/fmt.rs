// File: src/stdlib/fmt.rs
//
// Grounded on `stdlib/fmt.go`: `print`/`printf`/`println`/`sprintf`, built
// on the same `%v`/`%d`/`%s`/`%f` substitution as the `format` builtin.

use crate::builtins::{builtin_index, call_builtin};
use crate::errors::GsError;
use crate::value::Value;

use super::{host_fn, module_of};

fn format_args(args: &[Value]) -> Result<Value, GsError> {
    let idx = builtin_index("format").expect("format builtin is always registered");
    call_builtin(idx, args)
}

pub fn module() -> Value {
    module_of(vec![
        ("print", host_fn("print", |a| {
            for v in a {
                print!("{}", v.display_string());
            }
            Ok(Value::Nil)
        })),
        ("println", host_fn("println", |a| {
            for v in a {
                print!("{}", v.display_string());
            }
            println!();
            Ok(Value::Nil)
        })),
        ("printf", host_fn("printf", |a| {
            if a.is_empty() {
                return Err(GsError::wrong_num_arguments("printf(fmt, ...)"));
            }
            if a.len() == 1 {
                print!("{}", a[0].display_string());
                return Ok(Value::Nil);
            }
            let formatted = format_args(a)?;
            print!("{}", formatted.display_string());
            Ok(Value::Nil)
        })),
        ("sprintf", host_fn("sprintf", |a| {
            if a.is_empty() {
                return Err(GsError::wrong_num_arguments("sprintf(fmt, ...)"));
            }
            if a.len() == 1 {
                return Ok(a[0].clone());
            }
            format_args(a)
        })),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::GsString;

    #[test]
    fn sprintf_substitutes_args() {
        let Value::Map(m) = module() else { panic!() };
        let Value::HostFunction(sprintf) = m.borrow().get("sprintf").cloned().unwrap() else { panic!() };
        let r = (sprintf.func)(&[Value::String(GsString::new("%s is %d")), Value::String(GsString::new("x")), Value::Int(5)]).unwrap();
        match r {
            Value::String(s) => assert_eq!(s.as_str(), "x is 5"),
            _ => panic!("expected string"),
        }
    }
}
