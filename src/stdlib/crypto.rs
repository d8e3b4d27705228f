// File: src/stdlib/crypto.rs
//
// Grounded on `stdlib/crypto.go`: hash-then-hex-encode digests. The
// original's `md5_file`/`sha1_file` variants are dropped along with the
// rest of the file-system surface `os` no longer exposes (see DESIGN.md).

use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::Sha256;

use crate::value::Value;

use super::{as_str, host_fn, module_of, str_val, want};

pub fn module() -> Value {
    module_of(vec![
        ("md5", host_fn("md5", |a| {
            want(1, a)?;
            let s = as_str(&a[0])?;
            let mut h = Md5::new();
            h.update(s.as_bytes());
            Ok(str_val(hex::encode(h.finalize())))
        })),
        ("sha1", host_fn("sha1", |a| {
            want(1, a)?;
            let s = as_str(&a[0])?;
            let mut h = Sha1::new();
            h.update(s.as_bytes());
            Ok(str_val(hex::encode(h.finalize())))
        })),
        ("sha256", host_fn("sha256", |a| {
            want(1, a)?;
            let s = as_str(&a[0])?;
            let mut h = Sha256::new();
            h.update(s.as_bytes());
            Ok(str_val(hex::encode(h.finalize())))
        })),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_matches_known_digest() {
        let Value::Map(m) = module() else { panic!() };
        let Value::HostFunction(md5) = m.borrow().get("md5").cloned().unwrap() else { panic!() };
        let r = (md5.func)(&[str_val("")]).unwrap();
        match r {
            Value::String(s) => assert_eq!(s.as_str(), "d41d8cd98f00b204e9800998ecf8427e"),
            _ => panic!("expected string"),
        }
    }
}
