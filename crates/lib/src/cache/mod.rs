//! Incremental build cache.
//!
//! The cache is the staleness oracle: it records, per target, the checksum
//! the target had when it was built, the command that built it, and the
//! checksums of its dependencies. A target is rebuilt whenever any of these
//! no longer match.
//!
//! # File format
//!
//! ```json
//! {
//!   "version": "0.3.0",
//!   "targets": {
//!     "app": {
//!       "checksum": "…",
//!       "command": ["cc", "-o", "app", "main.o"],
//!       "deps": [{ "path": "main.o", "checksum": "…" }],
//!       "user_deps": [{ "path": "link.ld", "checksum": "…" }]
//!     }
//!   },
//!   "directories": { "build": true }
//! }
//! ```
//!
//! A missing file means an empty cache. A corrupt file is reported with a
//! warning and also treated as empty; the next successful write replaces it.

mod clean;
mod types;

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use crate::util::hash::hash_file;

pub use clean::{CleanSummary, clean};
pub use types::{
  CACHE_VERSION, CacheData, CacheError, CommandKey, DEFAULT_CACHE_FILE, DepRecord, DepsProvider, TargetRecord,
  UpToDateOptions,
};

/// Memoized file checksums for one build pass.
#[derive(Debug, Default)]
struct Checksums {
  memo: HashMap<String, String>,
}

impl Checksums {
  /// The memoized checksum, computing it on first use.
  fn lookup(&mut self, path: &str) -> String {
    match self.memo.get(path) {
      Some(sum) => sum.clone(),
      None => self.calculate(path),
    }
  }

  /// Hash `path` now, replacing any memoized value.
  ///
  /// An unreadable file yields the empty string, which never equals a real
  /// digest.
  fn calculate(&mut self, path: &str) -> String {
    let sum = match hash_file(Path::new(path)) {
      Ok(hash) => hash.0,
      Err(e) => {
        trace!(path, error = %e, "checksum unavailable");
        String::new()
      }
    };
    self.memo.insert(path.to_string(), sum.clone());
    sum
  }
}

/// The persistent build cache.
#[derive(Debug)]
pub struct BuildCache {
  path: PathBuf,
  data: CacheData,
  checksums: Checksums,
}

impl BuildCache {
  /// An empty cache that will be written to `path`.
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      data: CacheData::default(),
      checksums: Checksums::default(),
    }
  }

  /// Load the cache from `path`.
  ///
  /// Never fails: a missing file gives an empty cache, and an unreadable or
  /// corrupt file gives an empty cache plus a warning.
  pub fn load(path: impl Into<PathBuf>) -> Self {
    let mut cache = Self::new(path);

    let contents = match fs::read_to_string(&cache.path) {
      Ok(contents) => contents,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %cache.path.display(), "no cache file, starting empty");
        return cache;
      }
      Err(e) => {
        warn!(path = %cache.path.display(), error = %e, "could not read cache file, starting empty");
        return cache;
      }
    };

    match serde_json::from_str::<CacheData>(&contents) {
      Ok(mut data) => {
        data.version = CACHE_VERSION.to_string();
        debug!(path = %cache.path.display(), targets = data.targets.len(), "loaded cache");
        cache.data = data;
      }
      Err(e) => {
        warn!(path = %cache.path.display(), error = %e, "cache file is corrupt, starting empty");
      }
    }
    cache
  }

  /// Where this cache is written.
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Whether every one of `targets` is up to date.
  ///
  /// For each target: it exists on disk, the cache has an entry for it, its
  /// checksum and command match the entry, every path in `deps` is among the
  /// cached dependencies (or equals the cached list exactly under
  /// `strict_deps`), its user dependencies equal the cached ones, and every
  /// cached dependency still has its recorded checksum.
  pub fn is_up_to_date(
    &mut self,
    targets: &[String],
    command: &CommandKey,
    deps: &[String],
    user_deps: &dyn DepsProvider,
    options: UpToDateOptions,
  ) -> bool {
    targets
      .iter()
      .all(|target| self.target_is_up_to_date(target, command, deps, user_deps.user_deps_for(target), options))
  }

  fn target_is_up_to_date(
    &mut self,
    target: &str,
    command: &CommandKey,
    deps: &[String],
    user_deps: &[String],
    options: UpToDateOptions,
  ) -> bool {
    if !Path::new(target).exists() {
      debug!(output = %target, reason = "target missing", "stale");
      return false;
    }

    let Some(record) = self.data.targets.get(target) else {
      debug!(output = %target, reason = "not in cache", "stale");
      return false;
    };

    if record.checksum != self.checksums.lookup(target) {
      debug!(output = %target, reason = "target modified", "stale");
      return false;
    }

    if &record.command != command {
      debug!(output = %target, reason = "command changed", "stale");
      return false;
    }

    let deps_match = if options.strict_deps {
      record.deps.len() == deps.len() && record.deps.iter().zip(deps).all(|(cached, dep)| &cached.path == dep)
    } else {
      deps.iter().all(|dep| record.deps.iter().any(|cached| &cached.path == dep))
    };
    if !deps_match {
      debug!(output = %target, reason = "dependency set changed", "stale");
      return false;
    }

    let user_deps_match =
      record.user_deps.len() == user_deps.len() && record.user_deps.iter().zip(user_deps).all(|(c, d)| &c.path == d);
    if !user_deps_match {
      debug!(output = %target, reason = "user dependencies changed", "stale");
      return false;
    }

    for cached in record.deps.iter().chain(&record.user_deps) {
      if cached.checksum != self.checksums.lookup(&cached.path) {
        debug!(output = %target, dependency = %cached.path, reason = "dependency modified", "stale");
        return false;
      }
    }

    trace!(output = %target, "up to date");
    true
  }

  /// Record that `targets` were just built by `command` from `deps`.
  ///
  /// Target checksums are always recomputed; dependency checksums come from
  /// the per-pass memo.
  pub fn register_build(
    &mut self,
    targets: &[String],
    command: &CommandKey,
    deps: &[String],
    user_deps: &dyn DepsProvider,
  ) {
    for target in targets {
      let checksum = self.checksums.calculate(target);
      let dep_records = deps.iter().map(|dep| self.dep_record(dep)).collect();
      let user_dep_records = user_deps
        .user_deps_for(target)
        .iter()
        .map(|dep| self.dep_record(dep))
        .collect();
      debug!(output = %target, "registered build");
      self.data.targets.insert(
        target.clone(),
        TargetRecord {
          checksum,
          command: command.clone(),
          deps: dep_records,
          user_deps: user_dep_records,
        },
      );
    }
  }

  fn dep_record(&mut self, path: &str) -> DepRecord {
    DepRecord {
      path: path.to_string(),
      checksum: self.checksums.lookup(path),
    }
  }

  /// Create `path` and any missing parents, recording each directory that
  /// this call actually created.
  pub fn mkdir_all(&mut self, path: impl AsRef<Path>) -> io::Result<()> {
    let mut current = PathBuf::new();
    for component in path.as_ref().components() {
      current.push(component);
      if matches!(component, Component::Prefix(_) | Component::RootDir | Component::CurDir) {
        continue;
      }
      if current.is_dir() {
        continue;
      }
      match fs::create_dir(&current) {
        Ok(()) => {
          debug!(directory = %current.display(), "created directory");
          self
            .data
            .directories
            .insert(current.to_string_lossy().into_owned(), true);
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e),
      }
    }
    Ok(())
  }

  /// Names of every target with a cache entry.
  pub fn targets(&self) -> impl Iterator<Item = &str> {
    self.data.targets.keys().map(String::as_str)
  }

  /// Directories created on behalf of builders.
  pub fn directories(&self) -> impl Iterator<Item = &str> {
    self.data.directories.keys().map(String::as_str)
  }

  /// The cache entry for `target`.
  pub fn target(&self, target: &str) -> Option<&TargetRecord> {
    self.data.targets.get(target)
  }

  pub fn data(&self) -> &CacheData {
    &self.data
  }

  /// Forget memoized checksums.
  ///
  /// Must be called between independent build passes in one process, since
  /// files may have changed in between.
  pub fn clear_checksum_memo(&mut self) {
    self.checksums.memo.clear();
  }

  /// Drop every entry.
  pub fn clear(&mut self) {
    self.data = CacheData::default();
    self.clear_checksum_memo();
  }

  /// Persist the cache.
  ///
  /// Writes to a temporary file next to the destination and renames it into
  /// place, so an interrupted write leaves the previous file intact.
  pub fn write(&self) -> Result<(), CacheError> {
    let content = serde_json::to_string_pretty(&self.data).map_err(CacheError::Serialize)?;
    let write_err = |source| CacheError::Write {
      path: self.path.clone(),
      source,
    };

    let dir = match self.path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent,
      _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_err)?;

    let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
    temp.write_all(content.as_bytes()).map_err(write_err)?;
    temp.persist(&self.path).map_err(|e| write_err(e.error))?;

    debug!(path = %self.path.display(), targets = self.data.targets.len(), "wrote cache");
    Ok(())
  }
}
