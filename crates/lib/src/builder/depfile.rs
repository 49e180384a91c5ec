//! Makefile-style dependency files, as written by `cc -MMD -MF`.

use std::fs;
use std::io;
use std::path::Path;

/// Dependencies listed for `target` in the depfile at `path`.
///
/// Backslash-continued lines are joined before parsing. Rules for other
/// targets are ignored.
pub fn parse_makefile_deps(path: impl AsRef<Path>, target: &str) -> io::Result<Vec<String>> {
  let contents = fs::read_to_string(path)?;
  Ok(parse_deps(&contents, target))
}

fn parse_deps(contents: &str, target: &str) -> Vec<String> {
  let mut deps = Vec::new();
  let mut rule = String::new();

  for line in contents.lines() {
    let trimmed = line.trim_end();
    if let Some(continued) = trimmed.strip_suffix('\\') {
      rule.push(' ');
      rule.push_str(continued);
      continue;
    }
    rule.push(' ');
    rule.push_str(line);

    if let Some(split) = rule.rfind(": ") {
      let (rule_target, rule_deps) = (&rule[..split], &rule[split + 2..]);
      if rule_target.trim() == target {
        deps.extend(rule_deps.split_whitespace().map(str::to_string));
      }
    }
    rule.clear();
  }
  deps
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn joins_continuation_lines() {
    let mf = "build/main.o: src/main.c \\\n  src/util.h \\\n  src/config.h\n";
    assert_eq!(
      parse_deps(mf, "build/main.o"),
      vec!["src/main.c", "src/util.h", "src/config.h"]
    );
  }

  #[test]
  fn ignores_other_targets() {
    let mf = "other.o: other.c\nmain.o: main.c main.h\n";
    assert_eq!(parse_deps(mf, "main.o"), vec!["main.c", "main.h"]);
  }

  #[test]
  fn reads_from_disk() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("main.mf");
    std::fs::write(&path, "main.o: main.c\n").unwrap();
    assert_eq!(parse_makefile_deps(&path, "main.o").unwrap(), vec!["main.c"]);
  }

  #[test]
  fn missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    assert!(parse_makefile_deps(temp.path().join("none.mf"), "x").is_err());
  }
}
