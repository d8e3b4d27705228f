// File: src/symbol.rs
//
// Lexical symbol resolution: scopes, indices and free-variable capture.
// Ported near line-for-line from the original Go `symbol.go` with names
// translated to Rust idiom (`Symbol::define`, `define_builtin`, `resolve`,
// `fork`, `define_free`, `next_index`, `update_max_defs`).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
    Free,
}

#[derive(Debug, Clone)]
pub struct SymbolObject {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
    /// Set once the local has been assigned at least once; used by
    /// `resolve` to avoid turning a not-yet-initialized local into a free
    /// variable of an inner function before its own declaration runs.
    pub local_assigned: bool,
}

struct SymbolTableInner {
    parent: Option<Rc<RefCell<SymbolTableInner>>>,
    /// True if this table was forked for a block (`if`/`for` body) rather
    /// than a function; block scopes share their parent's local index
    /// space instead of starting a fresh one.
    block: bool,
    store: HashMap<String, SymbolObject>,
    num_definitions: usize,
    max_definitions: usize,
    free_symbols: Vec<SymbolObject>,
    builtin_symbols: Vec<SymbolObject>,
}

/// A lexical scope. Cloning a `SymbolTable` clones the handle, not the
/// scope: all clones observe the same underlying table.
#[derive(Clone)]
pub struct SymbolTable {
    inner: Rc<RefCell<SymbolTableInner>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SymbolTableInner {
                parent: None,
                block: false,
                store: HashMap::new(),
                num_definitions: 0,
                max_definitions: 0,
                free_symbols: Vec::new(),
                builtin_symbols: Vec::new(),
            })),
        }
    }

    /// Fork a child scope. `block = true` for `if`/`for`/bare `{}` bodies
    /// (shares the parent's local index space); `block = false` for
    /// function bodies (starts a fresh local index space at 0).
    pub fn fork(&self, block: bool) -> SymbolTable {
        SymbolTable {
            inner: Rc::new(RefCell::new(SymbolTableInner {
                parent: Some(self.inner.clone()),
                block,
                store: HashMap::new(),
                num_definitions: 0,
                max_definitions: 0,
                free_symbols: Vec::new(),
                builtin_symbols: Vec::new(),
            })),
        }
    }

    /// Nearest enclosing non-block scope; `skip_block = true` walks past
    /// the current table even if it's a function scope (used by `define`
    /// when defining at global scope from inside a block).
    fn parent_non_block(&self, skip_block: bool) -> Option<SymbolTable> {
        let inner = self.inner.borrow();
        let mut cur = inner.parent.clone()?;
        let mut skip = skip_block;
        loop {
            let is_block = cur.borrow().block;
            if is_block || skip {
                skip = false;
                let next = cur.borrow().parent.clone();
                match next {
                    Some(p) => cur = p,
                    None => return Some(SymbolTable { inner: cur }),
                }
            } else {
                return Some(SymbolTable { inner: cur });
            }
        }
    }

    fn is_global(&self) -> bool {
        self.inner.borrow().parent.is_none()
    }

    fn next_index(&self) -> usize {
        let inner = self.inner.borrow();
        if inner.block {
            if let Some(ref p) = inner.parent {
                return SymbolTable { inner: p.clone() }.next_index() + inner.num_definitions;
            }
        }
        inner.num_definitions
    }

    fn update_max_defs(&self, count: usize) {
        let mut inner = self.inner.borrow_mut();
        if count > inner.max_definitions {
            inner.max_definitions = count;
        }
        if inner.block {
            if let Some(p) = inner.parent.clone() {
                drop(inner);
                SymbolTable { inner: p }.update_max_defs(count);
            }
        }
    }

    pub fn max_definitions(&self) -> usize {
        self.inner.borrow().max_definitions
    }

    /// Define a new symbol in this scope. At global scope, definitions
    /// made from inside a block are forwarded to the root table so every
    /// global ends up indexed in one flat space regardless of nesting.
    pub fn define(&self, name: &str) -> SymbolObject {
        if self.is_global() {
            let scope = SymbolScope::Global;
            let index = self.next_index();
            let sym = SymbolObject { name: name.to_string(), scope, index, local_assigned: true };
            {
                let mut inner = self.inner.borrow_mut();
                inner.store.insert(name.to_string(), sym.clone());
                inner.num_definitions += 1;
            }
            self.update_max_defs(self.inner.borrow().num_definitions);
            return sym;
        }

        let block = self.inner.borrow().block;
        if block {
            if let Some(parent) = self.parent_non_block(false) {
                if parent.is_global() {
                    let sym = parent.define(name);
                    self.inner.borrow_mut().store.insert(name.to_string(), sym.clone());
                    return sym;
                }
            }
        }

        let scope = SymbolScope::Local;
        let index = self.next_index();
        let sym = SymbolObject { name: name.to_string(), scope, index, local_assigned: false };
        {
            let mut inner = self.inner.borrow_mut();
            inner.store.insert(name.to_string(), sym.clone());
            inner.num_definitions += 1;
        }
        self.update_max_defs(index + 1);
        sym
    }

    /// Mark a previously-defined local as assigned (first `:=`/`let`
    /// initializer has run). Needed so that `resolve` from an inner
    /// function captures it as a free variable instead of treating it as
    /// still-uninitialized.
    pub fn mark_assigned(&self, name: &str) {
        let mut inner = self.inner.borrow_mut();
        if let Some(sym) = inner.store.get_mut(name) {
            sym.local_assigned = true;
        }
    }

    /// Register a builtin at a fixed index; always recurses to the root
    /// table so builtins are visible from any nested scope.
    pub fn define_builtin(&self, index: usize, name: &str) {
        if let Some(parent) = self.parent_non_block(false) {
            return parent.define_builtin(index, name);
        }
        let sym = SymbolObject { name: name.to_string(), scope: SymbolScope::Builtin, index, local_assigned: true };
        let mut inner = self.inner.borrow_mut();
        inner.store.insert(name.to_string(), sym.clone());
        inner.builtin_symbols.push(sym);
    }

    /// Promote a symbol resolved in an enclosing function to a `Free`
    /// symbol of this function, recording it in `free_symbols` so the
    /// compiler can emit the matching `GetLocalPtr`/`GetFreePtr` capture.
    fn define_free(&self, original: SymbolObject) -> SymbolObject {
        let mut inner = self.inner.borrow_mut();
        let index = inner.free_symbols.len();
        inner.free_symbols.push(original.clone());
        let sym = SymbolObject { name: original.name, scope: SymbolScope::Free, index, local_assigned: true };
        inner.store.insert(sym.name.clone(), sym.clone());
        sym
    }

    pub fn free_symbols(&self) -> Vec<SymbolObject> {
        self.inner.borrow().free_symbols.clone()
    }

    /// Resolve a name, searching this scope then each enclosing scope.
    /// A local found through one or more function-scope boundaries (but
    /// not through a block boundary) is captured as a chain of `Free`
    /// symbols, one per crossed function scope.
    pub fn resolve(&self, name: &str) -> Option<SymbolObject> {
        self.resolve_depth(name, 0)
    }

    fn resolve_depth(&self, name: &str, depth: usize) -> Option<SymbolObject> {
        let found = self.inner.borrow().store.get(name).cloned();
        if let Some(sym) = found {
            if depth == 0 || sym.scope == SymbolScope::Global || sym.scope == SymbolScope::Builtin {
                return Some(sym);
            }
            let block = self.inner.borrow().block;
            if block {
                return Some(sym);
            }
            return Some(self.define_free(sym));
        }

        let parent = self.inner.borrow().parent.clone()?;
        let block = self.inner.borrow().block;
        let next_depth = if block { depth } else { depth + 1 };
        SymbolTable { inner: parent }.resolve_depth(name, next_depth)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_define_resolves_from_nested_function() {
        let global = SymbolTable::new();
        global.define("x");
        let func = global.fork(false);
        let sym = func.resolve("x").unwrap();
        assert_eq!(sym.scope, SymbolScope::Global);
    }

    #[test]
    fn local_across_function_boundary_becomes_free() {
        let global = SymbolTable::new();
        let outer = global.fork(false);
        outer.define("y");
        let inner = outer.fork(false);
        let sym = inner.resolve("y").unwrap();
        assert_eq!(sym.scope, SymbolScope::Free);
        assert_eq!(inner.free_symbols().len(), 1);
    }

    #[test]
    fn local_inside_block_is_not_free() {
        let global = SymbolTable::new();
        let func = global.fork(false);
        func.define("z");
        let block = func.fork(true);
        let sym = block.resolve("z").unwrap();
        assert_eq!(sym.scope, SymbolScope::Local);
    }

    #[test]
    fn block_scope_forwards_global_define_to_root() {
        let global = SymbolTable::new();
        let block = global.fork(true);
        let sym = block.define("g");
        assert_eq!(sym.scope, SymbolScope::Global);
        assert!(global.resolve("g").is_some());
    }

    #[test]
    fn builtin_define_recurses_to_root() {
        let global = SymbolTable::new();
        let block = global.fork(true);
        let func = block.fork(false);
        func.define_builtin(0, "len");
        let sym = global.resolve("len").unwrap();
        assert_eq!(sym.scope, SymbolScope::Builtin);
    }
}
