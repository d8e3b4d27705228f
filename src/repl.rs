// File: src/repl.rs
//
// Line-at-a-time REPL. Grounded on `examples/original_source/cmd/main.go`'s
// `RunREPL`: a persistent symbol table and globals vector carried across
// lines. Bare expressions are rewritten to `return (...)` so the VM's
// return value can be echoed, mirroring the original's `addPrints` rewrite
// without needing actual AST surgery.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::builtins::BUILTIN_NAMES;
use crate::compiler::Compiler;
use crate::config::{CompilerConfig, VmConfig};
use crate::module::ModuleRegistry;
use crate::parser::Parser;
use crate::symbol::SymbolTable;
use crate::value::Value;
use crate::vm::Vm;

const PROMPT: &str = ">> ";
const GLOBALS_SIZE: usize = 1024;

/// Drives an interactive session against stdin/stdout until EOF or Ctrl-D.
pub fn run() {
    let modules = ModuleRegistry::with_stdlib();
    let mut editor = DefaultEditor::new().expect("failed to initialize line editor");

    let root = SymbolTable::new();
    for (i, name) in BUILTIN_NAMES.iter().enumerate() {
        root.define_builtin(i, name);
    }

    let mut globals: Vec<Value> = vec![Value::Nil; GLOBALS_SIZE];

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                let (wrapped, echoes) = rewrite_line(&line);

                let compiler = Compiler::with_symtab(&modules, CompilerConfig::default(), root.clone());
                match Parser::parse_program(&wrapped) {
                    Ok(program) => match compiler.compile_program(&program) {
                        Ok(chunk) => {
                            let mut vm = Vm::with_globals(chunk, &modules, VmConfig::default(), std::mem::take(&mut globals));
                            match vm.run() {
                                Ok(v) => {
                                    if echoes && !matches!(v, Value::Nil) {
                                        println!("{}", v.display_string());
                                    }
                                    globals = vm.into_globals();
                                }
                                Err(e) => {
                                    println!("{e}");
                                    globals = vm.into_globals();
                                }
                            }
                        }
                        Err(errs) => {
                            for e in errs {
                                println!("{e}");
                            }
                        }
                    },
                    Err(e) => println!("{e}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }
}

/// A line is treated as a bare expression (and its value echoed) unless it
/// looks like a statement form. Keeps the REPL useful for quick
/// calculator-style use without requiring a trailing `return`.
fn rewrite_line(line: &str) -> (String, bool) {
    let trimmed = line.trim();
    let is_stmt = trimmed.ends_with('}')
        || trimmed.starts_with("for ")
        || trimmed.starts_with("if ")
        || trimmed.starts_with("func ")
        || trimmed.starts_with("return")
        || trimmed.starts_with("export ")
        || trimmed.starts_with("break")
        || trimmed.starts_with("continue")
        || trimmed.contains(":=")
        || (trimmed.contains('=') && !trimmed.contains("=="));
    if is_stmt {
        (trimmed.to_string(), false)
    } else {
        (format!("return ({trimmed})"), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_expression_is_wrapped_in_return() {
        let (rewritten, echoes) = rewrite_line("1 + 2");
        assert_eq!(rewritten, "return (1 + 2)");
        assert!(echoes);
    }

    #[test]
    fn assignment_is_left_alone() {
        let (rewritten, echoes) = rewrite_line("x := 1");
        assert_eq!(rewritten, "x := 1");
        assert!(!echoes);
    }
}
