// End-to-end tests for the gslang compiler/VM pipeline. Cross-module
// scenarios only; per-module invariants already live beside their modules
// (compiler.rs/vm.rs/symbol.rs/bytecode.rs/value.rs unit tests, and each
// stdlib submodule's own tests).

use pretty_assertions::assert_eq;

use gslang::compiler;
use gslang::config::VmConfig;
use gslang::module::ModuleRegistry;
use gslang::serialize;
use gslang::value::Value;
use gslang::vm::Vm;

fn eval(src: &str) -> Value {
    let modules = ModuleRegistry::with_stdlib();
    let chunk = compiler::compile(src, &modules).expect("compiles");
    let mut vm = Vm::new(chunk, &modules, VmConfig::default());
    vm.run().expect("runs")
}

fn eval_err(src: &str) -> gslang::errors::GsError {
    let modules = ModuleRegistry::with_stdlib();
    let chunk = compiler::compile(src, &modules).expect("compiles");
    let mut vm = Vm::new(chunk, &modules, VmConfig::default());
    vm.run().expect_err("should fail")
}

#[test]
fn closure_counter_scenario() {
    let v = eval(
        r#"
        make_counter := func() {
            count := 0
            return func() {
                count += 1
                return count
            }
        }
        c := make_counter()
        a := c()
        b := c()
        d := c()
        return [a, b, d]
        "#,
    );
    match v {
        Value::Array(items) => {
            let items = items.borrow();
            assert_eq!(items.len(), 3);
            assert_eq!(items[0].display_string(), "1");
            assert_eq!(items[1].display_string(), "2");
            assert_eq!(items[2].display_string(), "3");
        }
        other => panic!("expected array, got {other:?}"),
    }
}

#[test]
fn two_closures_share_the_same_upvalue() {
    let v = eval(
        r#"
        make_pair := func() {
            n := 0
            inc := func() { n += 1; return n }
            get := func() { return n }
            return [inc, get]
        }
        pair := make_pair()
        inc := pair[0]
        get := pair[1]
        inc()
        inc()
        return get()
        "#,
    );
    assert_eq!(v.display_string(), "2");
}

#[test]
fn recursive_factorial() {
    let v = eval(
        r#"
        fact := func(n) {
            if n <= 1 {
                return 1
            }
            return n * fact(n - 1)
        }
        return fact(10)
        "#,
    );
    assert_eq!(v.display_string(), "3628800");
}

#[test]
fn variadic_call_splats_trailing_array() {
    let v = eval(
        r#"
        sum := func(...xs) {
            total := 0
            for x in xs {
                total += x
            }
            return total
        }
        rest := [2, 3, 4]
        return sum(1, ...rest)
        "#,
    );
    assert_eq!(v.display_string(), "10");
}

#[test]
fn for_in_respects_break_and_continue() {
    let v = eval(
        r#"
        total := 0
        for x in [1, 2, 3, 4, 5, 6] {
            if x % 2 == 0 {
                continue
            }
            if x > 4 {
                break
            }
            total += x
        }
        return total
        "#,
    );
    // odd values before the break: 1, 3 (5 triggers the break)
    assert_eq!(v.display_string(), "4");
}

#[test]
fn copy_is_independent_of_original() {
    let v = eval(
        r#"
        a := [1, 2, 3]
        b := copy(a)
        b[0] = 99
        return [a[0], b[0]]
        "#,
    );
    match v {
        Value::Array(items) => {
            let items = items.borrow();
            assert_eq!(items[0].display_string(), "1");
            assert_eq!(items[1].display_string(), "99");
        }
        other => panic!("expected array, got {other:?}"),
    }
}

#[test]
fn string_len_counts_bytes_not_codepoints() {
    let v = eval(r#"return len("héllo")"#);
    // 'é' is 2 bytes in UTF-8; byte length differs from the 5-codepoint count.
    assert_eq!(v.display_string(), "6");
}

#[test]
fn string_slice_bounds_are_byte_offsets_not_codepoints() {
    // 'h','e','l','l','o' are single-byte; 'é' is 2 bytes, so byte offset 3
    // lands inside it. [0:3] should take "he" plus the first byte of 'é' —
    // since that's not a char boundary, it's a runtime error, not a
    // 4-byte-wide "hél" (which a codepoint-indexed slice would return).
    let err = eval_err(r#"return "héllo"[0:3]"#);
    assert_eq!(err.kind, gslang::errors::ErrorKind::IndexOutOfBounds);

    // A boundary-respecting slice over the same string is byte-exact: "h"
    // is 1 byte, "é" is 2 bytes, so [0:3] over "héllo" ... [1:3] isolates
    // exactly the 2-byte 'é'.
    let v = eval(r#"return "héllo"[1:3]"#);
    assert_eq!(v.display_string(), "é");
    match v {
        Value::String(s) => assert_eq!(s.as_str().len(), 2),
        other => panic!("expected string, got {other:?}"),
    }
}

#[test]
fn string_over_the_configured_limit_is_a_runtime_error() {
    let modules = ModuleRegistry::with_stdlib();
    let chunk = compiler::compile(r#"return "abcdef""#, &modules).expect("compiles");
    let mut vm = Vm::new(chunk, &modules, VmConfig { max_string_len: 3, ..VmConfig::default() });
    let err = vm.run().expect_err("should fail");
    assert_eq!(err.kind, gslang::errors::ErrorKind::StringLimit);
}

#[test]
fn two_locals_in_one_nested_block_get_distinct_slots() {
    // `a` and `b` are both defined inside the same `if` block, nested
    // inside a function body (not at the function's own top-level frame
    // and not at module/global scope) — the one path where a block
    // scope's own definitions must still bump the index past its
    // enclosing function scope's count.
    let v = eval(
        r#"
        f := func(x) {
            if x > 0 {
                a := x + 1
                b := x + 2
                return a + b
            }
            return 0
        }
        return f(1)
        "#,
    );
    assert_eq!(v.display_string(), "3");
}

#[test]
fn for_in_key_and_value_get_distinct_slots_inside_a_function() {
    // If `k` and `v` collide to the same local slot, `v`'s store
    // overwrites `k`'s, so reading `k` back yields the value, not the
    // index (here: 2*10 + 2*20 + 2*30 = 120 instead of the correct
    // (0+10) + (1+20) + (2+30) = 63).
    let v = eval(
        r#"
        f := func(xs) {
            total := 0
            for k, v in xs {
                total += k + v
            }
            return total
        }
        return f([10, 20, 30])
        "#,
    );
    assert_eq!(v.display_string(), "63");
}

#[test]
fn index_and_selector_assignment_both_mutate_in_place() {
    let v = eval(
        r#"
        m := {count: 0}
        m.count = 5
        m.count += 1
        a := [0, 0, 0]
        a[1] = 7
        a[1] += 3
        return [m.count, a[1]]
        "#,
    );
    match v {
        Value::Array(items) => {
            let items = items.borrow();
            assert_eq!(items[0].display_string(), "6");
            assert_eq!(items[1].display_string(), "10");
        }
        other => panic!("expected array, got {other:?}"),
    }
}

#[test]
fn undefined_variable_is_a_compile_error() {
    let modules = ModuleRegistry::with_stdlib();
    let result = compiler::compile("return undefined_name", &modules);
    assert!(result.is_err());
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let err = eval_err("x := 1\nreturn x / 0");
    assert_eq!(err.kind, gslang::errors::ErrorKind::DivisionByZero);
}

#[test]
fn host_module_import_computes_expected_value() {
    let v = eval(r#"m := import("math"); return m.pow(2, 10)"#);
    assert_eq!(v.display_string(), "1024");
}

#[test]
fn source_module_import_is_resolved_and_cached() {
    let dir = std::env::temp_dir().join(format!("gslang_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("greet.gs"), "export func(name) { return \"hi \" + name }").unwrap();

    let modules = ModuleRegistry::empty().with_search_path(&dir);
    let chunk = compiler::compile(
        r#"
        greet := import("greet")
        return greet("world")
        "#,
        &modules,
    )
    .expect("compiles");
    let mut vm = Vm::new(chunk, &modules, VmConfig::default());
    let v = vm.run().expect("runs");
    assert_eq!(v.display_string(), "hi world");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn bytecode_serialization_roundtrips_and_still_runs() {
    let modules = ModuleRegistry::with_stdlib();
    let chunk = compiler::compile(
        r#"
        fact := func(n) {
            if n <= 1 { return 1 }
            return n * fact(n - 1)
        }
        return fact(6)
        "#,
        &modules,
    )
    .expect("compiles");
    let bytes = serialize::to_bytes(&chunk).expect("serializes");
    let restored = serialize::from_bytes(&bytes, &modules).expect("deserializes");
    let mut vm = Vm::new(restored, &modules, VmConfig::default());
    let v = vm.run().expect("runs");
    assert_eq!(v.display_string(), "720");
}

#[test]
fn ternary_and_short_circuit_operators() {
    let v = eval(
        r#"
        a := true && false
        b := false || true
        c := 1 > 0 ? "yes" : "no"
        return [a, b, c]
        "#,
    );
    match v {
        Value::Array(items) => {
            let items = items.borrow();
            assert_eq!(items[0].display_string(), "false");
            assert_eq!(items[1].display_string(), "true");
            assert_eq!(items[2].display_string(), "yes");
        }
        other => panic!("expected array, got {other:?}"),
    }
}
