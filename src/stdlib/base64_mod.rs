// File: src/stdlib/base64_mod.rs
//
// Grounded on `stdlib/base64.go`: standard/raw/url-safe encode+decode pairs,
// one per `base64::Engine` variant.

use std::rc::Rc;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::errors::GsError;
use crate::value::Value;

use super::{as_str, host_fn, module_of, str_val, want};

fn bytes_of(v: &Value) -> Result<Vec<u8>, GsError> {
    match v {
        Value::Bytes(b) => Ok(b.as_slice().to_vec()),
        Value::String(s) => Ok(s.as_str().as_bytes().to_vec()),
        other => Err(GsError::invalid_argument_type("first", "bytes/string", other.type_name())),
    }
}

fn encode_with(engine: &impl Engine, name: &'static str) -> Value {
    let engine = engine.clone();
    host_fn(name, move |a| {
        want(1, a)?;
        Ok(str_val(engine.encode(bytes_of(&a[0])?)))
    })
}

fn decode_with(engine: &impl Engine, name: &'static str) -> Value {
    let engine = engine.clone();
    host_fn(name, move |a| {
        want(1, a)?;
        let s = as_str(&a[0])?;
        engine
            .decode(s)
            .map(|b| Value::Bytes(Rc::new(b)))
            .map_err(|e| GsError::invalid_argument_type("first", "base64-encoded string", &e.to_string()))
    })
}

pub fn module() -> Value {
    module_of(vec![
        ("encode", encode_with(&STANDARD, "encode")),
        ("decode", decode_with(&STANDARD, "decode")),
        ("raw_encode", encode_with(&STANDARD_NO_PAD, "raw_encode")),
        ("raw_decode", decode_with(&STANDARD_NO_PAD, "raw_decode")),
        ("url_encode", encode_with(&URL_SAFE, "url_encode")),
        ("url_decode", decode_with(&URL_SAFE, "url_decode")),
        ("raw_url_encode", encode_with(&URL_SAFE_NO_PAD, "raw_url_encode")),
        ("raw_url_decode", decode_with(&URL_SAFE_NO_PAD, "raw_url_decode")),
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
        let encoded = (encode.func)(&[str_val("hello")]).unwrap();
        let decoded = (decode.func)(&[encoded]).unwrap();
        match decoded {
            Value::Bytes(b) => assert_eq!(&*b, b"hello"),
            _ => panic!("expected bytes"),
        }
    }
}
