use std::{error::Error, path::Path};

use test_utils::{check_compilation, Expected};

const SRC_PATH: &str = "./fixtures/match_classify.e";
const EXPECTED: Expected = Expected {
    stdout: "zero\none\nother\n",
    stderr: "",
};

#[test]
fn compile_and_run_match_classify() -> Result<(), Box<dyn Error>> {
    check_compilation(Path::new(SRC_PATH), EXPECTED)
}
