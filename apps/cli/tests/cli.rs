use assert_cmd::Command;
use predicates::prelude::*;

fn scopestack() -> Command {
    Command::cargo_bin("scopestack").unwrap()
}

#[test]
fn xor_prints_result() {
    scopestack()
        .args(["xor", "--quiet", "K", "H"])
        .assert()
        .success()
        .stdout("xored42: ab\n");
}

#[test]
fn xor_traces_promotion() {
    scopestack()
        .args(["xor", "hello", "world"])
        .assert()
        .success()
        .stdout(predicate::str::contains("STACK at main before call"))
        .stdout(predicate::str::contains("STACK at xor42 after promote"))
        .stdout(predicate::str::contains("---- #2 array[4] depth=1 owned=2"))
        .stdout(predicate::str::contains("---- #1 tree depth=0 owned=1"));
}

#[test]
fn xor_requires_two_strings() {
    scopestack()
        .args(["xor", "only-one"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("<B>"));
}

#[test]
fn dump_nested_frames() {
    scopestack()
        .args(["dump", "--depth", "3", "--allocations", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("depth=2 owned=1"))
        .stdout(predicate::str::ends_with("----\n"));
}

#[test]
fn dump_overfull_array_frame_fails() {
    scopestack()
        .args(["dump", "--kind", "array", "--capacity", "1", "--allocations", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("allocation 2"))
        .stderr(predicate::str::contains("capacity 1"));
}

#[test]
fn verbose_logs_frame_events() {
    scopestack()
        .args(["-v", "dump", "--depth", "1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("frame pushed"));
}

#[test]
fn dump_refuses_unallocatable_array_frame() {
    scopestack()
        .args(["dump", "--kind", "array", "--capacity", &usize::MAX.to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pushing frame 1"))
        .stderr(predicate::str::contains("overflows"));
}

#[test]
fn trace_logging_reports_frame_depth() {
    scopestack()
        .args(["-vv", "dump", "--depth", "2", "--allocations", "1"])
        .assert()
        .success()
        .stderr(predicate::str::is_match("allocation tracked.*depth=1").unwrap());
}
