//! File selection and copying helpers shared by the pipeline and the release packager

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use globset::GlobBuilder;

use crate::types::{MarshalError, MarshalResult};

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Every file below `dir`, sorted. A missing directory yields nothing.
///
/// Symlinked directories are not descended into; symlinks to files are included.
pub fn walk_files(dir: &Path) -> MarshalResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }

    let mut queue = VecDeque::new();
    queue.push_back(dir.to_path_buf());
    while let Some(current_dir) = queue.pop_front() {
        for entry in std::fs::read_dir(&current_dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();
            if file_type.is_dir() {
                queue.push_back(path);
            } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Resolve glob patterns relative to `root` into files, keeping pattern order.
///
/// Matches of one pattern are sorted; a file matched by an earlier pattern is not
/// repeated. Patterns without glob characters name a file or a whole directory, and
/// missing ones are skipped.
pub fn collect_files(root: &Path, patterns: &[String]) -> MarshalResult<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for pattern in patterns {
        let mut matches = if pattern.contains(GLOB_META) {
            glob_matches(root, pattern)?
        } else {
            let path = root.join(pattern);
            if path.is_file() {
                vec![path]
            } else {
                walk_files(&path)?
            }
        };
        matches.sort();

        for path in matches {
            if seen.insert(path.clone()) {
                result.push(path);
            }
        }
    }
    Ok(result)
}

fn glob_matches(root: &Path, pattern: &str) -> MarshalResult<Vec<PathBuf>> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| MarshalError::Config(format!("Invalid glob '{}': {}", pattern, e)))?
        .compile_matcher();

    // Only walk below the literal part of the pattern
    let meta_at = pattern.find(GLOB_META).unwrap_or(pattern.len());
    let base = match pattern[..meta_at].rfind('/') {
        Some(slash) => root.join(&pattern[..slash]),
        None => root.to_path_buf(),
    };

    Ok(walk_files(&base)?
        .into_iter()
        .filter(|path| {
            let relative = path.strip_prefix(root).unwrap_or(path);
            matcher.is_match(relative)
        })
        .collect())
}

/// Copy a directory tree, returning the number of files copied
pub async fn copy_dir_all(src: &Path, dst: &Path) -> MarshalResult<usize> {
    let files = walk_files(src)?;
    copy_files_into(&files, src, dst).await
}

/// Copy files into `dst`, keeping their path relative to `base`.
///
/// Files outside `base` land directly in `dst` under their file name.
pub async fn copy_files_into(files: &[PathBuf], base: &Path, dst: &Path) -> MarshalResult<usize> {
    tokio::fs::create_dir_all(dst).await?;
    for file in files {
        let relative = match file.strip_prefix(base) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => PathBuf::from(file.file_name().unwrap_or_default()),
        };
        let target = dst.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(file, &target).await?;
    }
    Ok(files.len())
}

/// Concatenate files into `dest`, separated by newlines
pub async fn concat_files(files: &[PathBuf], dest: &Path) -> MarshalResult<()> {
    let mut bundle = String::new();
    for file in files {
        let content = tokio::fs::read_to_string(file).await?;
        bundle.push_str(&content);
        if !content.ends_with('\n') {
            bundle.push('\n');
        }
    }
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, bundle).await?;
    Ok(())
}

/// Remove a file or directory tree if it exists
pub async fn remove_path(path: &Path) -> MarshalResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await?,
        Ok(_) => tokio::fs::remove_file(path).await?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
