// File: src/main.rs
//
// Entry point for the gslang CLI: `gslang [--resolve] [-o OUT] [FILE]`.
// No FILE starts the REPL; a `.gs` FILE is compiled and run; any other
// extension is loaded as previously-compiled bytecode and run; `-o`
// compiles only, writing the result instead of running it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser as ClapParser;
use tracing_subscriber::EnvFilter;

use gslang::config::VmConfig;
use gslang::module::ModuleRegistry;
use gslang::vm::Vm;
use gslang::{compiler, serialize};

#[derive(ClapParser)]
#[command(
    name = "gslang",
    about = "gslang: a small dynamically-typed scripting language",
    version = env!("CARGO_PKG_VERSION"),
    long_about = None
)]
struct Cli {
    /// Source or compiled-bytecode file; omit to start the REPL.
    file: Option<PathBuf>,

    /// Compile only; write bytecode to OUT (default: basename(FILE).out).
    #[arg(short = 'o', value_name = "OUT")]
    output: Option<PathBuf>,

    /// Resolve relative imports against the input file's directory.
    #[arg(long)]
    resolve: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).without_time().init();

    let cli = Cli::parse();

    let Some(file) = cli.file else {
        gslang::repl::run();
        return ExitCode::SUCCESS;
    };

    let data = match fs::read(&file) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error reading input file: {e}");
            return ExitCode::from(2);
        }
    };

    let mut modules = ModuleRegistry::with_stdlib();
    if cli.resolve {
        if let Some(dir) = file.parent() {
            modules = modules.with_search_path(dir);
        }
    }

    if let Some(out) = &cli.output {
        match compile_only(&data, &file, &modules, out) {
            Ok(path) => {
                println!("{}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::from(1)
            }
        }
    } else if file.extension().and_then(|e| e.to_str()) == Some("gs") {
        match compile_and_run(&data, &modules) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{e}");
                ExitCode::from(1)
            }
        }
    } else {
        match run_compiled(&data, &modules) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{e}");
                ExitCode::from(1)
            }
        }
    }
}

fn source_text(data: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(data).into_owned();
    if text.starts_with("#!") {
        text.replace_range(0..2, "//");
    }
    text
}

fn compile_only(data: &[u8], input: &Path, modules: &ModuleRegistry, out: &Path) -> Result<PathBuf, String> {
    let text = source_text(data);
    let chunk = compiler::compile(&text, modules).map_err(|errs| {
        errs.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n")
    })?;
    let bytes = serialize::to_bytes(&chunk).map_err(|e| e.to_string())?;
    let out_path = if out.as_os_str().is_empty() { default_output_path(input) } else { out.to_path_buf() };
    fs::write(&out_path, bytes).map_err(|e| e.to_string())?;
    Ok(out_path)
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("a");
    PathBuf::from(format!("{stem}.out"))
}

fn compile_and_run(data: &[u8], modules: &ModuleRegistry) -> Result<(), String> {
    let text = source_text(data);
    let chunk = compiler::compile(&text, modules).map_err(|errs| {
        errs.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n")
    })?;
    let mut vm = Vm::new(chunk, modules, VmConfig::default());
    vm.run().map_err(|e| e.to_string())?;
    Ok(())
}

fn run_compiled(data: &[u8], modules: &ModuleRegistry) -> Result<(), String> {
    let chunk = serialize::from_bytes(data, modules).map_err(|e| e.to_string())?;
    let mut vm = Vm::new(chunk, modules, VmConfig::default());
    vm.run().map_err(|e| e.to_string())?;
    Ok(())
}
