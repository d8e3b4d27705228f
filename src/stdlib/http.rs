// File: src/stdlib/http.rs
//
// Grounded on `stdlib/http.go`: `request(method, url)` builds a mutable
// request description (timeout/headers/body set via further calls) and
// `get_response` fires it with a blocking client, returning a map exposing
// `get_header`/`get_body`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::GsError;
use crate::value::{GsString, Value};

use super::{as_i64, as_str, host_fn, module_of, str_val, want};

struct PendingRequest {
    method: String,
    url: String,
    headers: HashMap<String, String>,
    body: Option<Vec<u8>>,
    timeout: Duration,
}

pub fn module() -> Value {
    module_of(vec![("request", host_fn("request", |a| {
        want(2, a)?;
        let method = as_str(&a[0])?;
        let url = as_str(&a[1])?;
        Ok(request_methods(PendingRequest {
            method,
            url,
            headers: HashMap::new(),
            body: None,
            timeout: Duration::from_secs(30),
        }))
    }))])
}

fn request_methods(req: PendingRequest) -> Value {
    let req = std::rc::Rc::new(RefCell::new(req));

    let r1 = req.clone();
    let set_timeout = host_fn("set_timeout", move |a| {
        want(1, a)?;
        let secs = as_i64(&a[0])?;
        r1.borrow_mut().timeout = Duration::from_secs(secs.max(0) as u64);
        Ok(Value::Nil)
    });

    let r2 = req.clone();
    let set_header = host_fn("set_header", move |a| {
        want(2, a)?;
        let (k, v) = (as_str(&a[0])?, as_str(&a[1])?);
        r2.borrow_mut().headers.insert(k, v);
        Ok(Value::Nil)
    });

    let r3 = req.clone();
    let set_body = host_fn("set_body", move |a| {
        want(1, a)?;
        r3.borrow_mut().body = Some(a[0].display_string().into_bytes());
        Ok(Value::Nil)
    });

    let r4 = req;
    let get_response = host_fn("get_response", move |a| {
        want(0, a)?;
        let req = r4.borrow();
        let client = reqwest::blocking::Client::new();
        let mut builder = client
            .request(
                req.method.parse().map_err(|_| GsError::invalid_argument_type("method", "http method", &req.method))?,
                &req.url,
            )
            .timeout(req.timeout);
        for (k, v) in &req.headers {
            builder = builder.header(k, v);
        }
        if let Some(body) = &req.body {
            builder = builder.body(body.clone());
        }
        let response = builder
            .send()
            .map_err(|e| GsError::invalid_argument_type("request", "reachable url", &e.to_string()))?;
        Ok(response_methods(response))
    });

    module_of(vec![
        ("set_timeout", set_timeout),
        ("set_header", set_header),
        ("set_body", set_body),
        ("get_response", get_response),
    ])
}

fn response_methods(response: reqwest::blocking::Response) -> Value {
    let headers: HashMap<String, String> = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    let status = response.status().as_u16() as i64;
    let body = response.text().unwrap_or_default();

    module_of(vec![
        ("status", Value::Int(status)),
        ("get_header", host_fn("get_header", move |a| {
            want(1, a)?;
            let key = as_str(&a[0])?;
            Ok(str_val(headers.get(&key).cloned().unwrap_or_default()))
        })),
        ("get_body", host_fn("get_body", move |a| {
            want(0, a)?;
            Ok(Value::String(GsString::new(body.clone())))
        })),
    ])
}
