use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn bitlang() -> Command {
    let mut cmd = Command::cargo_bin("bitlang").unwrap();
    cmd.env("BITLANG_CONFIG", "/nonexistent/bitlang.toml");
    cmd
}

#[test]
fn translates_friendly_names_to_symbols() {
    bitlang()
        .args(["translate", "ON OFF RIGHT LEFT OUTPUT INPUT LOOP_START LOOP_END"])
        .assert()
        .success()
        .stdout("+-><.,[]\n");
}

#[test]
fn keep_comments_preserves_spacing() {
    bitlang()
        .args(["translate", "--keep-comments", "ON  # one"])
        .assert()
        .success()
        .stdout("+  # one\n");
}

#[test]
fn reads_stdin_when_no_code_given() {
    bitlang()
        .arg("translate")
        .write_stdin("RIGHT\nON\n")
        .assert()
        .success()
        .stdout(">+\n");
}

#[test]
fn expands_macros_from_file() {
    let mut tf = tempfile::NamedTempFile::new().unwrap();
    write!(tf, "DOUBLE=ON ON\nQUAD = DOUBLE DOUBLE\n").unwrap();
    bitlang()
        .arg("translate")
        .arg("--macros")
        .arg(tf.path())
        .arg("QUAD RIGHT")
        .assert()
        .success()
        .stdout("++++>\n");
}

#[test]
fn cyclic_macros_fail() {
    let mut tf = tempfile::NamedTempFile::new().unwrap();
    write!(tf, "PING=PONG\nPONG=PING\n").unwrap();
    bitlang()
        .arg("translate")
        .arg("--macros")
        .arg(tf.path())
        .arg("PING")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Macro error"));
}

#[test]
fn reserved_macro_name_in_file_fails() {
    let mut tf = tempfile::NamedTempFile::new().unwrap();
    write!(tf, "ON=OFF\n").unwrap();
    bitlang()
        .arg("translate")
        .arg("--macros")
        .arg(tf.path())
        .arg("ON")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid macro name 'ON'"));
}
