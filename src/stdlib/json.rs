// File: src/stdlib/json.rs
//
// Grounded on `stdlib/json.go`: `decode`/`encode`/`indent`/`html_escape`.
// Decode/encode failures surface as gslang `Error` values rather than
// propagating a Rust error, matching the original's `(*gslang.Error, nil)`
// return convention.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value as Json;

use crate::errors::GsError;
use crate::value::{GsString, Value};

use super::{as_str, host_fn, module_of, str_val, want};

fn json_to_value(j: &Json) -> Value {
    match j {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => str_val(s.clone()),
        Json::Array(items) => {
            Value::Array(Rc::new(RefCell::new(items.iter().map(json_to_value).collect())))
        }
        Json::Object(map) => {
            let out: HashMap<String, Value> = map.iter().map(|(k, v)| (k.clone(), json_to_value(v))).collect();
            Value::Map(Rc::new(RefCell::new(out)))
        }
    }
}

fn value_to_json(v: &Value) -> Result<Json, GsError> {
    Ok(match v {
        Value::Nil => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        Value::Char(c) => Json::String(c.to_string()),
        Value::String(s) => Json::String(s.as_str().to_string()),
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items.borrow().iter() {
                out.push(value_to_json(item)?);
            }
            Json::Array(out)
        }
        Value::Map(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map.borrow().iter() {
                out.insert(k.clone(), value_to_json(v)?);
            }
            Json::Object(out)
        }
        other => {
            return Err(GsError::invalid_argument_type("value", "json-encodable value", other.type_name()));
        }
    })
}

fn decode_str(s: &str) -> Value {
    match serde_json::from_str::<Json>(s) {
        Ok(j) => json_to_value(&j),
        Err(e) => Value::Error(Rc::new(str_val(e.to_string()))),
    }
}

pub fn module() -> Value {
    module_of(vec![
        ("decode", host_fn("decode", |a| {
            want(1, a)?;
            match &a[0] {
                Value::String(s) => Ok(decode_str(s.as_str())),
                Value::Bytes(b) => Ok(match std::str::from_utf8(b) {
                    Ok(s) => decode_str(s),
                    Err(e) => Value::Error(Rc::new(str_val(e.to_string()))),
                }),
                other => Err(GsError::invalid_argument_type("first", "bytes/string", other.type_name())),
            }
        })),
        ("encode", host_fn("encode", |a| {
            want(1, a)?;
            match value_to_json(&a[0]).and_then(|j| {
                serde_json::to_vec(&j).map_err(|e| GsError::invalid_argument_type("value", "encodable", &e.to_string()))
            }) {
                Ok(bytes) => Ok(Value::Bytes(Rc::new(bytes))),
                Err(e) => Ok(Value::Error(Rc::new(str_val(e.message.clone())))),
            }
        })),
        ("indent", host_fn("indent", |a| {
            want(3, a)?;
            let prefix = as_str(&a[1])?;
            let indent = as_str(&a[2])?;
            let json = value_to_json(&a[0])?;
            let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
            let mut buf = Vec::new();
            let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
            use serde::Serialize;
            json.serialize(&mut ser).map_err(|e| GsError::invalid_argument_type("value", "encodable", &e.to_string()))?;
            let mut out = String::from_utf8(buf).unwrap_or_default();
            if !prefix.is_empty() {
                out = out.lines().collect::<Vec<_>>().join(&format!("\n{prefix}"));
            }
            Ok(Value::Bytes(Rc::new(out.into_bytes())))
        })),
        ("html_escape", host_fn("html_escape", |a| {
            want(1, a)?;
            let s = as_str(&a[0])?;
            let escaped = s
                .replace('&', "\\u0026")
                .replace('<', "\\u003c")
                .replace('>', "\\u003e");
            Ok(Value::String(GsString::new(escaped)))
        })),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_then_encode_roundtrips_object() {
        let Value::Map(m) = module() else { panic!() };
        let Value::HostFunction(decode) = m.borrow().get("decode").cloned().unwrap() else { panic!() };
        let Value::HostFunction(encode) = m.borrow().get("encode").cloned().unwrap() else { panic!() };
        let decoded = (decode.func)(&[str_val(r#"{"a":1,"b":[true,null]}"#)]).unwrap();
        assert!(matches!(decoded, Value::Map(_)));
        let encoded = (encode.func)(&[decoded]).unwrap();
        assert!(matches!(encoded, Value::Bytes(_)));
    }

    #[test]
    fn decode_invalid_json_is_a_gslang_error() {
        let Value::Map(m) = module() else { panic!() };
        let Value::HostFunction(decode) = m.borrow().get("decode").cloned().unwrap() else { panic!() };
        let decoded = (decode.func)(&[str_val("not json")]).unwrap();
        assert!(matches!(decoded, Value::Error(_)));
    }
}
