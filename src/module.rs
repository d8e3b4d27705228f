// File: src/module.rs
//
// Module resolution for `import("name")`. Two kinds: host modules (fixed
// Rust-implemented libraries such as `math`/`os`/`json`) and source
// modules (`<name>.gs` files resolved against a search path, compiled and
// cached like the original Go implementation's `moduleCache`).

use std::path::PathBuf;

use crate::value::Value;

pub struct ModuleRegistry {
    host: std::collections::HashMap<String, Value>,
    search_paths: Vec<PathBuf>,
}

impl ModuleRegistry {
    /// An empty registry with no host modules and no source search path;
    /// useful for compiler unit tests that don't exercise imports.
    pub fn empty() -> Self {
        Self { host: std::collections::HashMap::new(), search_paths: Vec::new() }
    }

    pub fn with_stdlib() -> Self {
        let mut host = std::collections::HashMap::new();
        host.insert("math".to_string(), crate::stdlib::math::module());
        host.insert("os".to_string(), crate::stdlib::os::module());
        host.insert("text".to_string(), crate::stdlib::text::module());
        host.insert("time".to_string(), crate::stdlib::time::module());
        host.insert("regex".to_string(), crate::stdlib::regex_mod::module());
        host.insert("json".to_string(), crate::stdlib::json::module());
        host.insert("http".to_string(), crate::stdlib::http::module());
        host.insert("hex".to_string(), crate::stdlib::hex::module());
        host.insert("base64".to_string(), crate::stdlib::base64_mod::module());
        host.insert("crypto".to_string(), crate::stdlib::crypto::module());
        host.insert("rand".to_string(), crate::stdlib::random::module());
        host.insert("fmt".to_string(), crate::stdlib::fmt::module());
        Self { host, search_paths: vec![PathBuf::from(".")] }
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn is_host(&self, name: &str) -> bool {
        self.host.contains_key(name)
    }

    pub fn get_host(&self, name: &str) -> Option<Value> {
        self.host.get(name).cloned()
    }

    /// Read a `<name>.gs` source module from the search path. The first
    /// match wins, mirroring the original's ordered `ModulePaths` lookup.
    pub fn resolve_source(&self, name: &str) -> Option<String> {
        for base in &self.search_paths {
            let candidate = base.join(format!("{name}.gs"));
            if let Ok(src) = std::fs::read_to_string(&candidate) {
                return Some(src);
            }
        }
        None
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_stdlib()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdlib_registers_expected_host_modules() {
        let reg = ModuleRegistry::with_stdlib();
        for name in ["math", "os", "text", "time", "regex", "json", "http", "hex", "base64", "crypto", "rand", "fmt"] {
            assert!(reg.is_host(name), "missing host module {name}");
            assert!(reg.get_host(name).is_some());
        }
        assert!(!reg.is_host("not_a_module"));
    }

    #[test]
    fn unresolved_source_module_is_none() {
        let reg = ModuleRegistry::empty();
        assert!(reg.resolve_source("does_not_exist_anywhere").is_none());
    }
}
