// File: src/stdlib/math.rs
//
// Grounded on `stdlib/math.go`: float constants plus a subset of the
// `math.*` wrapper functions.

use crate::value::Value;

use super::{as_f64, host_fn, module_of, want};

pub fn module() -> Value {
    module_of(vec![
        ("e", Value::Float(std::f64::consts::E)),
        ("pi", Value::Float(std::f64::consts::PI)),
        ("phi", Value::Float(1.618_033_988_749_895)),
        ("sqrt2", Value::Float(std::f64::consts::SQRT_2)),
        ("ln2", Value::Float(std::f64::consts::LN_2)),
        ("ln10", Value::Float(std::f64::consts::LN_10)),
        ("abs", host_fn("abs", |a| {
            want(1, a)?;
            Ok(Value::Float(as_f64(&a[0])?.abs()))
        })),
        ("ceil", host_fn("ceil", |a| {
            want(1, a)?;
            Ok(Value::Float(as_f64(&a[0])?.ceil()))
        })),
        ("floor", host_fn("floor", |a| {
            want(1, a)?;
            Ok(Value::Float(as_f64(&a[0])?.floor()))
        })),
        ("round", host_fn("round", |a| {
            want(1, a)?;
            Ok(Value::Float(as_f64(&a[0])?.round()))
        })),
        ("trunc", host_fn("trunc", |a| {
            want(1, a)?;
            Ok(Value::Float(as_f64(&a[0])?.trunc()))
        })),
        ("sqrt", host_fn("sqrt", |a| {
            want(1, a)?;
            Ok(Value::Float(as_f64(&a[0])?.sqrt()))
        })),
        ("cbrt", host_fn("cbrt", |a| {
            want(1, a)?;
            Ok(Value::Float(as_f64(&a[0])?.cbrt()))
        })),
        ("pow", host_fn("pow", |a| {
            want(2, a)?;
            Ok(Value::Float(as_f64(&a[0])?.powf(as_f64(&a[1])?)))
        })),
        ("exp", host_fn("exp", |a| {
            want(1, a)?;
            Ok(Value::Float(as_f64(&a[0])?.exp()))
        })),
        ("log", host_fn("log", |a| {
            want(1, a)?;
            Ok(Value::Float(as_f64(&a[0])?.ln()))
        })),
        ("log2", host_fn("log2", |a| {
            want(1, a)?;
            Ok(Value::Float(as_f64(&a[0])?.log2()))
        })),
        ("log10", host_fn("log10", |a| {
            want(1, a)?;
            Ok(Value::Float(as_f64(&a[0])?.log10()))
        })),
        ("sin", host_fn("sin", |a| {
            want(1, a)?;
            Ok(Value::Float(as_f64(&a[0])?.sin()))
        })),
        ("cos", host_fn("cos", |a| {
            want(1, a)?;
            Ok(Value::Float(as_f64(&a[0])?.cos()))
        })),
        ("tan", host_fn("tan", |a| {
            want(1, a)?;
            Ok(Value::Float(as_f64(&a[0])?.tan()))
        })),
        ("atan2", host_fn("atan2", |a| {
            want(2, a)?;
            Ok(Value::Float(as_f64(&a[0])?.atan2(as_f64(&a[1])?)))
        })),
        ("hypot", host_fn("hypot", |a| {
            want(2, a)?;
            Ok(Value::Float(as_f64(&a[0])?.hypot(as_f64(&a[1])?)))
        })),
        ("max", host_fn("max", |a| {
            want(2, a)?;
            Ok(Value::Float(as_f64(&a[0])?.max(as_f64(&a[1])?)))
        })),
        ("min", host_fn("min", |a| {
            want(2, a)?;
            Ok(Value::Float(as_f64(&a[0])?.min(as_f64(&a[1])?)))
        })),
        ("is_nan", host_fn("is_nan", |a| {
            want(1, a)?;
            Ok(Value::Bool(as_f64(&a[0])?.is_nan()))
        })),
        ("is_inf", host_fn("is_inf", |a| {
            want(1, a)?;
            Ok(Value::Bool(as_f64(&a[0])?.is_infinite()))
        })),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn pow_matches_scenario() {
        let Value::Map(m) = module() else { panic!() };
        let Value::HostFunction(pow) = m.borrow().get("pow").cloned().unwrap() else { panic!() };
        let r = (pow.func)(&[Value::Int(2), Value::Int(10)]).unwrap();
        assert!(matches!(r, Value::Float(f) if f == 1024.0));
    }
}
