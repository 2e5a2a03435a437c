use std::io;
use std::path::{Path, PathBuf};

/// Creates `path` and its ancestors if they don't already exist. Mirrors
/// `FileUtil::checkDirectory` from the reference implementation.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if path.as_os_str().is_empty() || path.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(path)
}

/// Like [`ensure_dir`], but for a file path: ensures the parent directory
/// exists. Mirrors `FileUtil::checkFileDirectory`.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

/// If `path` already exists, appends `_1`, `_2`, ... before the extension
/// until a free name is found. Mirrors `FileUtil::getUniqueFileName`, used
/// when writing per-run snapshots so repeated invocations never clobber each
/// other's output.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stem = path.file_stem().unwrap_or_default().to_string_lossy().into_owned();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let mut n = 1;
    loop {
        let name = match &ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unique_path_is_unchanged_when_free() {
        let path = PathBuf::from("/tmp/wfc-io-util-test-does-not-exist/solution.png");
        assert_eq!(unique_path(&path), path);
    }

    #[test]
    fn ensure_dir_is_a_noop_on_empty_path() {
        assert!(ensure_dir(Path::new("")).is_ok());
    }
}
