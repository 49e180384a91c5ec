use predicates::prelude::*;

use super::common::TestEnv;

const TWO_STEP_SCRIPT: &str = r#"
local env = kiln.env{}
env:target("Command", "final.txt", {"middle.txt"}, { CMD = {"cp", "${_SOURCES}", "${_TARGET}"} })
env:target("Command", "middle.txt", {"in.txt"}, { CMD = {"cp", "${_SOURCES}", "${_TARGET}"} })
"#;

#[test]
fn plan_lists_targets_dependencies_first() {
  let env = TestEnv::with_script(TWO_STEP_SCRIPT);

  let output = env.kiln_cmd().arg("plan").assert().success().get_output().stdout.clone();
  let stdout = String::from_utf8(output).unwrap();

  let middle = stdout.find("middle.txt (Command)").unwrap();
  let last = stdout.find("final.txt (Command)").unwrap();
  assert!(middle < last, "unexpected order:\n{stdout}");
  assert!(!env.exists("middle.txt"));
}

#[test]
fn plan_json_output_is_valid() {
  let env = TestEnv::with_script(TWO_STEP_SCRIPT);

  let output = env
    .kiln_cmd()
    .args(["plan", "-o", "json"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let plans: serde_json::Value = serde_json::from_slice(&output).unwrap();
  let targets = plans[0]["targets"].as_array().unwrap();
  assert_eq!(targets.len(), 2);
  assert_eq!(targets[0]["target"], "middle.txt");
  assert_eq!(targets[1]["builder"], "Command");
}

#[test]
fn plan_reports_cycles() {
  let env = TestEnv::with_script(
    r#"
local env = kiln.env{}
env:target("Command", "a.txt", {"b.txt"}, { CMD = "true" })
env:target("Command", "b.txt", {"a.txt"}, { CMD = "true" })
"#,
  );

  env
    .kiln_cmd()
    .arg("plan")
    .assert()
    .failure()
    .stderr(predicate::str::contains("cycle"));
}

#[test]
fn plan_with_no_targets() {
  let env = TestEnv::with_script("kiln.env{}");

  env
    .kiln_cmd()
    .arg("plan")
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to build"));
}
