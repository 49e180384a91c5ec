use std::path::PathBuf;

use anyhow::{Context, Result};

use kiln_lib::cache::{DEFAULT_CACHE_FILE, clean};

use crate::output::{print_stat, print_success, print_warning};

/// Remove every file and directory the cache records as built.
pub fn cmd_clean(cache: Option<PathBuf>) -> Result<()> {
  let cache_file = cache.unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FILE));

  if !cache_file.exists() {
    print_warning(&format!("No build cache at {}; nothing to clean", cache_file.display()));
    return Ok(());
  }

  let summary = clean(&cache_file).with_context(|| format!("Failed to clean using cache: {}", cache_file.display()))?;

  print_success("Clean complete!");
  print_stat("Files removed", &summary.files_removed.to_string());
  print_stat("Directories removed", &summary.directories_removed.to_string());

  Ok(())
}
