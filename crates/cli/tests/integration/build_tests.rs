use predicates::prelude::*;

use super::common::{COPY_SCRIPT, TestEnv};

#[cfg(unix)]
#[test]
fn build_runs_commands_and_reports_summary() {
  let env = TestEnv::with_script(COPY_SCRIPT);
  env.write_file("in.txt", "hello");

  env
    .kiln_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("CMD out/copy.txt"))
    .stdout(predicate::str::contains("Build complete"))
    .stdout(predicate::str::contains("Commands run: 1"));

  assert_eq!(env.read_file("out/copy.txt"), "hello");
  assert!(env.exists(".kiln-cache.json"));
}

#[cfg(unix)]
#[test]
fn second_build_is_up_to_date() {
  let env = TestEnv::with_script(COPY_SCRIPT);
  env.write_file("in.txt", "hello");

  env.kiln_cmd().arg("build").assert().success();

  env
    .kiln_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Commands run: 0"))
    .stdout(predicate::str::contains("CMD out/copy.txt").not());
}

#[cfg(unix)]
#[test]
fn changed_source_rebuilds() {
  let env = TestEnv::with_script(COPY_SCRIPT);
  env.write_file("in.txt", "hello");
  env.kiln_cmd().arg("build").assert().success();

  env.write_file("in.txt", "changed");
  env
    .kiln_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Commands run: 1"));

  assert_eq!(env.read_file("out/copy.txt"), "changed");
}

#[cfg(unix)]
#[test]
fn echo_command_prints_command_lines() {
  let env = TestEnv::with_script(COPY_SCRIPT);
  env.write_file("in.txt", "hello");

  env
    .kiln_cmd()
    .args(["build", "--echo", "command"])
    .assert()
    .success()
    .stdout(predicate::str::contains("cp in.txt out/copy.txt"));
}

#[cfg(unix)]
#[test]
fn echo_off_prints_nothing_per_target() {
  let env = TestEnv::with_script(COPY_SCRIPT);
  env.write_file("in.txt", "hello");

  env
    .kiln_cmd()
    .args(["build", "--echo", "off"])
    .assert()
    .success()
    .stdout(predicate::str::contains("CMD out/copy.txt").not());
}

#[test]
fn custom_script_path() {
  let env = TestEnv::empty();
  env.write_file("scripts/other.lua", "kiln.env{}");

  env
    .kiln_cmd()
    .args(["build", "-f", "scripts/other.lua"])
    .assert()
    .success()
    .stdout(predicate::str::contains("No pending targets"));
}

#[cfg(unix)]
#[test]
fn failing_command_exits_with_error() {
  let env = TestEnv::with_script(
    r#"
local env = kiln.env{}
env:target("Command", "never.txt", {}, { CMD = "exit 3" })
"#,
  );

  env
    .kiln_cmd()
    .arg("build")
    .assert()
    .failure()
    .code(1)
    .stderr(predicate::str::contains("Build failed"))
    .stderr(predicate::str::contains("never.txt"));
}

#[test]
fn unknown_builder_is_reported() {
  let env = TestEnv::with_script(
    r#"
local env = kiln.env{}
env:target("Nope", "x.o", {"x.c"})
"#,
  );

  env
    .kiln_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Nope"));
}

#[test]
fn lua_builder_writes_target() {
  let env = TestEnv::with_script(
    r#"
local env = kiln.env{ GREETING = "hi" }
env:add_builder("Write", function(target, sources, ctx)
  local f = assert(io.open(target, "w"))
  f:write(ctx.get("GREETING"))
  f:close()
end)
env:target("Write", "greeting.txt", {})
"#,
  );

  env
    .kiln_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Targets built: 1"));

  assert_eq!(env.read_file("greeting.txt"), "hi");
}
