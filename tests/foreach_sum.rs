use std::{error::Error, path::Path};

use test_utils::{check_compilation, Expected};

const SRC_PATH: &str = "./fixtures/foreach_sum.e";
const EXPECTED: Expected = Expected {
    stdout: "10\n",
    stderr: "",
};

#[test]
fn compile_and_run_foreach_sum() -> Result<(), Box<dyn Error>> {
    check_compilation(Path::new(SRC_PATH), EXPECTED)
}
