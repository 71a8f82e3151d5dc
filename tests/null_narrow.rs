use std::{error::Error, path::Path};

use test_utils::{check_compilation, Expected};

const SRC_PATH: &str = "./fixtures/null_narrow.e";
const EXPECTED: Expected = Expected {
    stdout: "none\ngot: value\n",
    stderr: "",
};

#[test]
fn compile_and_run_null_narrow() -> Result<(), Box<dyn Error>> {
    check_compilation(Path::new(SRC_PATH), EXPECTED)
}
