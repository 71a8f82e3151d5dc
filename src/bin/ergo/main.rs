//! The Ergo compiler driver: loads a program, type-checks it, and either dumps the typed AST as
//! JSON, emits generated C, or compiles-and-runs it via `$CC`.
mod cli;

use std::{env, fs, path::Path, process::Command};

use cli::*;
use ergo_lang::{codegen, error::Error, loader, typechecker};
use log::error;

fn main() {
    let args = Cli::init();

    simple_logger::init_with_level((&args.verbosity).into()).unwrap();

    let code = match &args.command {
        Some(Commands::Run(run_args)) => run(&run_args.file),
        None => {
            let file = args.file.expect("clap requires `file` when no subcommand is given");
            check_or_emit(&file, args.emit_c.as_deref())
        }
    };

    std::process::exit(code);
}

fn load_and_check(path: &Path) -> Result<Vec<ergo_lang::ast::Module<ergo_lang::ast::Type>>, Error> {
    let program = loader::load_program(path)?;
    let typed = typechecker::check_program(&program)?;
    Ok(typed)
}

/// Default mode: typecheck and dump the typed `Program` as JSON, unless `--emit-c` redirects the
/// output to generated C instead.
fn check_or_emit(path: &Path, emit_c: Option<&Path>) -> i32 {
    let typed = match load_and_check(path) {
        Ok(typed) => typed,
        Err(e) => {
            error!("{e}");
            return 1;
        }
    };

    match emit_c {
        Some(out) => {
            let source = codegen::generate(&typed);
            if let Err(e) = fs::write(out, source) {
                error!("{out}: {e}", out = out.display());
                return 1;
            }
        }
        None => match serde_json::to_string_pretty(&typed) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("failed to serialize program: {e}");
                return 1;
            }
        },
    }

    0
}

/// `ergo run <source.e>`: emits C to a temp file, invokes `$CC -O3 -std=c11`, runs the result and
/// passes its exit status through.
fn run(path: &Path) -> i32 {
    let typed = match load_and_check(path) {
        Ok(typed) => typed,
        Err(e) => {
            error!("{e}");
            return 1;
        }
    };

    let source = codegen::generate(&typed);

    let dir = env::temp_dir().join(format!("ergo-run-{}", std::process::id()));
    if let Err(e) = fs::create_dir_all(&dir) {
        error!("{}: {e}", dir.display());
        return 1;
    }
    let c_path = dir.join("out.c");
    if let Err(e) = fs::write(&c_path, source) {
        error!("{}: {e}", c_path.display());
        return 1;
    }

    let cc = env::var("CC").unwrap_or_else(|_| "cc".to_string());
    let exe_name = if cfg!(windows) { "run.exe" } else { "run" };
    let exe_path = Path::new(exe_name);

    let compile = Command::new(&cc)
        .args(["-O3", "-std=c11", "-o"])
        .arg(exe_path)
        .arg(&c_path)
        .status();

    let compile_status = match compile {
        Ok(status) => status,
        Err(e) => {
            error!("failed to invoke '{cc}': {e}");
            return 1;
        }
    };
    if !compile_status.success() {
        return compile_status.code().unwrap_or(1);
    }

    let run_status = Command::new(exe_path).status();
    match run_status {
        Ok(status) => status.code().unwrap_or(1),
        Err(e) => {
            error!("failed to run '{}': {e}", exe_path.display());
            1
        }
    }
}
