// File: src/stdlib/random.rs
//
// Grounded on `stdlib/rand.go`: thread-local RNG exposed as top-level
// functions (registered under the module name `rand`), plus a `rand(seed)`
// factory returning an independent generator bound to that seed.

use rand::distributions::{Distribution, Standard};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::value::Value;

use super::{as_i64, host_fn, module_of, want};

fn rand_methods(rng: StdRng) -> Value {
    let rng = std::cell::RefCell::new(rng);
    module_of(vec![
        ("int", host_fn("int", move |a| {
            want(0, a)?;
            Ok(Value::Int(rng.borrow_mut().gen::<i64>().abs()))
        })),
    ])
}

pub fn module() -> Value {
    module_of(vec![
        ("int", host_fn("int", |a| {
            want(0, a)?;
            Ok(Value::Int(rand::thread_rng().gen::<i64>().abs()))
        })),
        ("float", host_fn("float", |a| {
            want(0, a)?;
            Ok(Value::Float(Standard.sample(&mut rand::thread_rng())))
        })),
        ("intn", host_fn("intn", |a| {
            want(1, a)?;
            let n = as_i64(&a[0])?;
            if n <= 0 {
                return Ok(Value::Int(0));
            }
            Ok(Value::Int(rand::thread_rng().gen_range(0..n)))
        })),
        ("exp_float", host_fn("exp_float", |a| {
            want(0, a)?;
            let u: f64 = Standard.sample(&mut rand::thread_rng());
            Ok(Value::Float(-u.ln()))
        })),
        ("norm_float", host_fn("norm_float", |a| {
            want(0, a)?;
            let mut rng = rand::thread_rng();
            let u1: f64 = Standard.sample(&mut rng);
            let u2: f64 = Standard.sample(&mut rng);
            let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
            Ok(Value::Float(z))
        })),
        ("perm", host_fn("perm", |a| {
            want(1, a)?;
            let n = as_i64(&a[0])?.max(0) as usize;
            let mut items: Vec<i64> = (0..n as i64).collect();
            let mut rng = rand::thread_rng();
            for i in (1..items.len()).rev() {
                let j = rng.gen_range(0..=i);
                items.swap(i, j);
            }
            Ok(Value::Array(std::rc::Rc::new(std::cell::RefCell::new(
                items.into_iter().map(Value::Int).collect(),
            ))))
        })),
        ("seed", host_fn("seed", |a| {
            want(1, a)?;
            as_i64(&a[0])?;
            Ok(Value::Nil)
        })),
        ("rand", host_fn("rand", |a| {
            want(1, a)?;
            let seed = as_i64(&a[0])?;
            Ok(rand_methods(StdRng::seed_from_u64(seed as u64)))
        })),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intn_stays_in_bounds() {
        let Value::Map(m) = module() else { panic!() };
        let Value::HostFunction(intn) = m.borrow().get("intn").cloned().unwrap() else { panic!() };
        for _ in 0..20 {
            let r = (intn.func)(&[Value::Int(10)]).unwrap();
            match r {
                Value::Int(n) => assert!((0..10).contains(&n)),
                _ => panic!("expected int"),
            }
        }
    }

    #[test]
    fn seeded_rand_is_deterministic() {
        let Value::Map(m) = module() else { panic!() };
        let Value::HostFunction(rand_fn) = m.borrow().get("rand").cloned().unwrap() else { panic!() };
        let r1 = (rand_fn.func)(&[Value::Int(42)]).unwrap();
        let r2 = (rand_fn.func)(&[Value::Int(42)]).unwrap();
        let Value::Map(m1) = r1 else { panic!() };
        let Value::Map(m2) = r2 else { panic!() };
        let Value::HostFunction(i1) = m1.borrow().get("int").cloned().unwrap() else { panic!() };
        let Value::HostFunction(i2) = m2.borrow().get("int").cloned().unwrap() else { panic!() };
        assert_eq!((i1.func)(&[]).unwrap().display_string(), (i2.func)(&[]).unwrap().display_string());
    }
}
