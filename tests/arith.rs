use std::{error::Error, path::Path};

use test_utils::{check_compilation, Expected};

const SRC_PATH: &str = "./fixtures/arith.e";
const EXPECTED: Expected = Expected {
    stdout: "2+3=5\n",
    stderr: "",
};

#[test]
fn compile_and_run_arith() -> Result<(), Box<dyn Error>> {
    check_compilation(Path::new(SRC_PATH), EXPECTED)
}
