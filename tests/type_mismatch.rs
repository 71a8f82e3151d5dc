use std::{error::Error, path::Path};

use test_utils::check_failing_type_checking;

const SRC_PATH: &str = "./fixtures/type_mismatch.e";

#[test]
fn type_check_mismatch() -> Result<(), Box<dyn Error>> {
    check_failing_type_checking(Path::new(SRC_PATH))
}
