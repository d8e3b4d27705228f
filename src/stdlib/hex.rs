// File: src/stdlib/hex.rs
//
// Grounded on `stdlib/hex.go`: `encode(bytes) => string`, `decode(string) => bytes`.

use std::rc::Rc;

use crate::errors::GsError;
use crate::value::Value;

use super::{as_str, host_fn, module_of, str_val, want};

pub fn module() -> Value {
    module_of(vec![
        ("encode", host_fn("encode", |a| {
            want(1, a)?;
            match &a[0] {
                Value::Bytes(b) => Ok(str_val(hex::encode(b.as_slice()))),
                Value::String(s) => Ok(str_val(hex::encode(s.as_str().as_bytes()))),
                other => Err(GsError::invalid_argument_type("first", "bytes/string", other.type_name())),
            }
        })),
        ("decode", host_fn("decode", |a| {
            want(1, a)?;
            let s = as_str(&a[0])?;
            hex::decode(&s)
                .map(|b| Value::Bytes(Rc::new(b)))
                .map_err(|e| GsError::invalid_argument_type("first", "hex-encoded string", &e.to_string()))
        })),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let Value::Map(m) = module() else { panic!() };
        let Value::HostFunction(encode) = m.borrow().get("encode").cloned().unwrap() else { panic!() };
        let Value::HostFunction(decode) = m.borrow().get("decode").cloned().unwrap() else { panic!() };
        let encoded = (encode.func)(&[str_val("abc")]).unwrap();
        let Value::String(s) = &encoded else { panic!() };
        assert_eq!(s.as_str(), "616263");
        let decoded = (decode.func)(&[encoded]).unwrap();
        match decoded {
            Value::Bytes(b) => assert_eq!(&*b, b"abc"),
            _ => panic!("expected bytes"),
        }
    }
}
