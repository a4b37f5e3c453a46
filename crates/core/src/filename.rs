// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rename-without-overwrite: `.NNNN` suffixes probed against the disk.

use std::path::{Path, PathBuf};

/// Insert a 4-digit suffix before the extension of `path`.
///
/// The suffix goes before the final extension, or before the final two when
/// the file ends in `.gz` (`tracking.hermes.gz` → `tracking.0000.hermes.gz`).
/// An existing numeric suffix is replaced, not stacked.
pub fn filename_with_suffix(path: &Path, iter: usize) -> PathBuf {
    let name = path.to_string_lossy();
    let (mut stem, mut ext) = split_extension(&name);
    if ext == ".gz" {
        let (inner_stem, inner_ext) = split_extension(stem);
        if !inner_ext.is_empty() {
            stem = inner_stem;
            ext = &name[inner_stem.len()..];
        }
    }
    let (numeric_stem, numeric_ext) = split_extension(stem);
    if numeric_ext.strip_prefix('.').is_some_and(|s| s.parse::<u32>().is_ok()) {
        stem = numeric_stem;
    }
    PathBuf::from(format!("{stem}.{iter:04}{ext}"))
}

/// Smallest-suffix path that does not exist on disk, with its suffix value.
pub fn filename_without_overwrite(path: &Path) -> std::io::Result<(PathBuf, usize)> {
    for iter in 0.. {
        let candidate = filename_with_suffix(path, iter);
        match std::fs::metadata(&candidate) {
            Ok(_) => continue,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok((candidate, iter));
            }
            Err(err) => return Err(err),
        }
    }
    unreachable!()
}

/// Split `name` at the final dot of its last path component. The dot stays
/// with the extension; a dotless (or leading-dot) file name has an empty
/// extension.
fn split_extension(name: &str) -> (&str, &str) {
    let base = name.rfind('/').map_or(0, |idx| idx + 1);
    match name[base..].rfind('.') {
        Some(idx) if idx > 0 => name.split_at(base + idx),
        _ => (name, ""),
    }
}

#[cfg(test)]
#[path = "filename_tests.rs"]
mod tests;
