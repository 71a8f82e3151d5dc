use std::{
    env,
    error::Error,
    io,
    path::Path,
    process::{Command, Output},
    str,
};

const ERGO_PATH: &str = "./target/debug/ergo";
const OUTPUT_PATH: &str = "./output";

pub struct Expected<'a> {
    pub stdout: &'a str,
    pub stderr: &'a str,
}

impl<'a> Expected<'a> {
    fn assert_matches(self, output: &Output) -> Result<(), Box<dyn Error>> {
        assert_eq!(str::from_utf8(&output.stdout)?, self.stdout);
        assert_eq!(str::from_utf8(&output.stderr)?, self.stderr);
        Ok(())
    }
}

fn run_type_checker(src_path: &Path) -> Result<Output, io::Error> {
    Command::new(ERGO_PATH).arg(src_path).output()
}

fn emit_c(src_path: &Path, c_path: &Path) -> Result<Output, io::Error> {
    Command::new(ERGO_PATH)
        .arg(src_path)
        .arg("--emit-c")
        .arg(c_path)
        .output()
}

/// Compiles `src_path` via the `ergo` binary, compiles the generated C via `$CC`, runs the
/// result, and asserts its stdout/stderr match `expected`.
pub fn check_compilation(src_path: &Path, expected: Expected) -> Result<(), Box<dyn Error>> {
    let stem = src_path.file_stem().unwrap();
    std::fs::create_dir_all(OUTPUT_PATH)?;
    let c_path = Path::new(OUTPUT_PATH).join(stem).with_extension("c");
    let out_path = Path::new(OUTPUT_PATH).join(stem);

    let emit_output = emit_c(src_path, &c_path)?;
    let emit_stderr = std::str::from_utf8(&emit_output.stderr)?;
    assert!(emit_stderr.is_empty(), "{emit_stderr}");
    assert!(
        emit_output.status.success(),
        "ergo exited with status {:?}",
        emit_output.status.code()
    );

    let cc = env::var("CC").unwrap_or_else(|_| "cc".to_string());
    let compile_output = Command::new(&cc)
        .args(["-O3", "-std=c11", "-o"])
        .arg(&out_path)
        .arg(&c_path)
        .output()?;
    let compile_stderr = std::str::from_utf8(&compile_output.stderr)?;
    assert!(
        compile_output.status.success(),
        "{cc} exited with status {:?}: {compile_stderr}",
        compile_output.status.code()
    );

    let output = Command::new(&out_path).output()?;

    expected.assert_matches(&output)?;
    assert!(
        output.status.success(),
        "compiled program exited with status {:?}",
        output.status.code()
    );

    Ok(())
}

pub fn check_failing_type_checking(src_path: &Path) -> Result<(), Box<dyn Error>> {
    let type_check_output = run_type_checker(src_path)?;

    println!("{type_check_output:?}");
    assert!(
        !type_check_output.status.success(),
        "ergo should have rejected this program"
    );

    Ok(())
}
