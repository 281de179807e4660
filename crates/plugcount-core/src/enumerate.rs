//! Plugin enumeration over a synced working tree.
//!
//! Each [`EnumerationRule`] describes one catalog layout. Counting walks only
//! the directories the rule names and applies its inclusion predicate, so
//! tooling directories, documentation and hidden entries never inflate the
//! count.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::PlugcountError;
use crate::types::{EnumerationRule, TrackedRepository};

/// Counts the plugins of a tracked repository's working copy.
pub fn count_repository(repo: &TrackedRepository) -> Result<u64, PlugcountError> {
    count_plugins(&repo.name, &repo.local_path, &repo.rule)
}

/// Counts plugin units under `root` according to `rule`.
///
/// `repository` is only used to label errors and log lines.
///
/// # Errors
///
/// Returns [`PlugcountError::Enumeration`] if `root` is not a directory, if
/// the layout the rule expects is absent, or if a directory cannot be read.
pub fn count_plugins(
    repository: &str,
    root: &Path,
    rule: &EnumerationRule,
) -> Result<u64, PlugcountError> {
    if !root.is_dir() {
        return Err(PlugcountError::enumeration(
            repository,
            format!("working copy not found: {}", root.display()),
        ));
    }

    let count = match rule {
        EnumerationRule::AuthorPackages {
            exclude,
            package_extension,
        } => count_author_packages(repository, root, exclude, package_extension)?,
        EnumerationRule::CategoryDirs { categories } => {
            count_category_dirs(repository, root, categories)?
        }
        EnumerationRule::ManifestFiles { pattern, max_depth } => {
            count_manifest_files(repository, root, pattern, *max_depth)?
        }
    };

    debug!(repository, count, rule = rule.kind(), "enumeration finished");
    Ok(count)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Non-hidden subdirectories of `dir`, sorted by name.
fn visible_subdirs(repository: &str, dir: &Path) -> Result<Vec<(String, PathBuf)>, PlugcountError> {
    let mut dirs = Vec::new();
    for (name, path, is_dir) in read_entries(repository, dir)? {
        if is_dir && !is_hidden(&name) {
            dirs.push((name, path));
        }
    }
    Ok(dirs)
}

fn read_entries(
    repository: &str,
    dir: &Path,
) -> Result<Vec<(String, PathBuf, bool)>, PlugcountError> {
    let read_err = |e: std::io::Error| {
        PlugcountError::enumeration(repository, format!("cannot read {}: {e}", dir.display()))
    };

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        // Follows symlinks, so a linked plugin directory still counts.
        let is_dir = path.is_dir();
        entries.push((entry.file_name().to_string_lossy().to_string(), path, is_dir));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

fn count_author_packages(
    repository: &str,
    root: &Path,
    exclude: &[String],
    package_extension: &str,
) -> Result<u64, PlugcountError> {
    let extension = package_extension.trim_start_matches('.');
    let mut total = 0;

    for (author, author_path) in visible_subdirs(repository, root)? {
        if exclude.iter().any(|e| e == &author) {
            continue;
        }

        for (plugin, plugin_path) in visible_subdirs(repository, &author_path)? {
            let mut subdirs = 0;
            let mut packages = 0;
            for (name, path, is_dir) in read_entries(repository, &plugin_path)? {
                if is_hidden(&name) {
                    continue;
                }
                if is_dir {
                    subdirs += 1;
                    debug!(repository, plugin = %format!("{author}/{plugin}/{name}"), "found plugin");
                } else if path.extension().and_then(|e| e.to_str()) == Some(extension) {
                    packages += 1;
                }
            }

            if subdirs > 0 {
                total += subdirs;
            } else if packages > 0 {
                debug!(repository, plugin = %format!("{author}/{plugin}"), packages, "found packaged plugin");
                total += 1;
            }
        }
    }

    Ok(total)
}

fn count_category_dirs(
    repository: &str,
    root: &Path,
    categories: &[String],
) -> Result<u64, PlugcountError> {
    let mut found_any = false;
    let mut total = 0;

    for category in categories {
        let category_path = root.join(category);
        if !category_path.is_dir() {
            continue;
        }
        found_any = true;

        for (name, _) in visible_subdirs(repository, &category_path)? {
            debug!(repository, plugin = %format!("{category}/{name}"), "found plugin");
            total += 1;
        }
    }

    if !found_any {
        return Err(PlugcountError::enumeration(
            repository,
            format!(
                "none of the category directories [{}] exist under {}",
                categories.join(", "),
                root.display()
            ),
        ));
    }

    Ok(total)
}

fn count_manifest_files(
    repository: &str,
    root: &Path,
    pattern: &str,
    max_depth: usize,
) -> Result<u64, PlugcountError> {
    let matcher = Regex::new(pattern).map_err(|e| {
        PlugcountError::enumeration(repository, format!("invalid manifest pattern: {e}"))
    })?;

    let mut total = 0;
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(&e.file_name().to_string_lossy()));

    for entry in walker {
        let entry = entry.map_err(|e| PlugcountError::enumeration(repository, e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if matcher.is_match(&name) {
            debug!(repository, manifest = %entry.path().display(), "found plugin manifest");
            total += 1;
        }
    }

    Ok(total)
}
