use predicates::prelude::*;

use super::common::{COPY_SCRIPT, TestEnv};

#[cfg(unix)]
#[test]
fn clean_removes_built_files_and_directories() {
  let env = TestEnv::with_script(COPY_SCRIPT);
  env.write_file("in.txt", "hello");
  env.kiln_cmd().arg("build").assert().success();
  assert!(env.exists("out/copy.txt"));

  env
    .kiln_cmd()
    .arg("clean")
    .assert()
    .success()
    .stdout(predicate::str::contains("Clean complete"))
    .stdout(predicate::str::contains("Files removed: 1"));

  assert!(!env.exists("out/copy.txt"));
  assert!(!env.exists("out"));
  assert!(env.exists("in.txt"));
}

#[test]
fn clean_without_cache_warns() {
  let env = TestEnv::empty();

  env
    .kiln_cmd()
    .args(["clean", "--cache", "missing.json"])
    .assert()
    .success()
    .stderr(predicate::str::contains("nothing to clean"));
}
