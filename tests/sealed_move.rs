use std::{error::Error, path::Path};

use test_utils::{check_compilation, Expected};

const SRC_PATH: &str = "./fixtures/sealed_move.e";
const EXPECTED: Expected = Expected {
    stdout: "true",
    stderr: "",
};

#[test]
fn compile_and_run_sealed_move() -> Result<(), Box<dyn Error>> {
    check_compilation(Path::new(SRC_PATH), EXPECTED)
}
