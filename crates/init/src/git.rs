use std::path::{Path, PathBuf};

/// Closest directory at or above `start` that contains a `.git` directory.
pub fn find_git_root(start: &Path) -> std::io::Result<Option<PathBuf>> {
    let start = if start.is_absolute() {
        start.to_path_buf()
    } else {
        std::env::current_dir()?.join(start)
    };
    Ok(start
        .ancestors()
        .find(|dir| dir.join(".git").is_dir())
        .map(Path::to_path_buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_enclosing_repository() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join(".git")).unwrap();
        let nested = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_git_root(&nested).unwrap().as_deref(), Some(tmp.path()));
        assert_eq!(find_git_root(tmp.path()).unwrap().as_deref(), Some(tmp.path()));
    }

    #[test]
    fn git_file_is_not_a_repository_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let inner = tmp.path().join("inner");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(inner.join(".git"), "gitdir: elsewhere").unwrap();
        // Only an ancestor outside the tempdir could match, never `inner`.
        assert_ne!(find_git_root(&inner).unwrap().as_deref(), Some(inner.as_path()));
    }
}
