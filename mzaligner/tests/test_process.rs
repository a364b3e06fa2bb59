use std::{error::Error, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

#[test]
fn test_file_missing() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzaligner")?;

    cmd.arg("not_real.mzML").arg("-o").arg("-");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read not_real.mzML"));
    Ok(())
}

#[test]
fn test_no_inputs() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzaligner")?;
    cmd.arg("-o").arg("-");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("<INPUT_FILES>..."));
    Ok(())
}

#[test]
fn test_malformed_time_range() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzaligner")?;

    cmd.arg("not_real.mzML").args(["-o", "-", "-r", "a-5"]);
    cmd.assert().failure().stderr(predicate::str::contains(
        "Failed to parse time range start invalid float literal",
    ));

    let mut cmd = Command::cargo_bin("mzaligner")?;

    cmd.arg("not_real.mzML").args(["-o", "-", "-r", "5-b"]);
    cmd.assert().failure().stderr(predicate::str::contains(
        "Failed to parse time range end invalid float literal",
    ));

    Ok(())
}

#[test]
fn test_malformed_tolerance() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzaligner")?;

    cmd.arg("not_real.mzML").args(["--mz-tolerance", "10xyz"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unknown tolerance unit"));

    let mut cmd = Command::cargo_bin("mzaligner")?;

    cmd.arg("not_real.mzML").arg("--rt-tolerance=-0.5");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Tolerance cannot be negative"));

    Ok(())
}

#[test]
fn test_gap_penalty_must_be_positive() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzaligner")?;

    cmd.arg("not_real.mzML").args(["--gap-penalty", "0"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("is not a positive number"));
    Ok(())
}
