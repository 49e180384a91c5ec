//! Reversing a build.

use std::cmp::Reverse;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{BuildCache, CacheError};

/// What a clean removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanSummary {
  pub files_removed: usize,
  pub directories_removed: usize,
}

/// Load the cache at `cache_file` and reverse the build it records.
pub fn clean(cache_file: impl Into<PathBuf>) -> Result<CleanSummary, CacheError> {
  BuildCache::load(cache_file).clean()
}

impl BuildCache {
  /// Remove every recorded target, then every recorded directory that is now
  /// empty, deepest first, then the cache file itself.
  ///
  /// A directory that still holds anything the build did not produce is
  /// left in place. Files or directories that are already gone are ignored.
  pub fn clean(&mut self) -> Result<CleanSummary, CacheError> {
    let mut summary = CleanSummary::default();

    for target in self.targets() {
      match fs::remove_file(target) {
        Ok(()) => {
          debug!(path = target, "removed");
          summary.files_removed += 1;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
          return Err(CacheError::Remove {
            path: PathBuf::from(target),
            source,
          });
        }
      }
    }

    let mut directories: Vec<&str> = self.directories().collect();
    directories.sort_by_key(|dir| Reverse(dir.len()));
    for dir in directories {
      let path = Path::new(dir);
      if is_empty_dir(path) && fs::remove_dir(path).is_ok() {
        debug!(path = dir, "removed directory");
        summary.directories_removed += 1;
      }
    }

    self.clear();
    match fs::remove_file(self.path()) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(source) => {
        return Err(CacheError::Remove {
          path: self.path().to_path_buf(),
          source,
        });
      }
    }

    info!(
      files = summary.files_removed,
      directories = summary.directories_removed,
      "clean complete"
    );
    Ok(summary)
  }
}

fn is_empty_dir(path: &Path) -> bool {
  match fs::read_dir(path) {
    Ok(mut entries) => entries.next().is_none(),
    Err(_) => false,
  }
}
