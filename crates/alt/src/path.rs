use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Whether `dir` is listed in `PATH`.
pub fn in_path(dir: &Path) -> bool {
    in_path_value(dir, &std::env::var_os("PATH").unwrap_or_default())
}

/// Whether `dir` is listed in the given `PATH`-style value.
///
/// Entries are compared after expanding `~` and environment variables and
/// resolving `.`/`..` lexically. An empty entry means the current directory.
pub fn in_path_value(dir: &Path, path_value: &OsStr) -> bool {
    let home = platwrap_config::home_dir().ok();
    let wanted = normalize(&dir.to_string_lossy(), home.as_deref());
    std::env::split_paths(path_value)
        .any(|entry| normalize(&entry.to_string_lossy(), home.as_deref()) == wanted)
}

fn normalize(entry: &str, home: Option<&Path>) -> PathBuf {
    let entry = if entry.is_empty() { "." } else { entry };
    let entry = shellexpand::tilde_with_context(entry, || {
        home.map(|h| h.to_string_lossy().into_owned())
    });
    // Unset variables expand to nothing, as in a shell.
    let entry = shellexpand::env_with_context_no_errors(entry.as_ref(), |var| {
        Some(std::env::var(var).unwrap_or_default())
    });
    let path = clean(Path::new(entry.as_ref()));
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => clean(&cwd.join(path)),
        Err(_) => path,
    }
}

/// Lexical path cleanup without touching the filesystem.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use platwrap_test_utils::{env_guard, set_env_var};

    #[test]
    fn clean_resolves_dots() {
        assert_eq!(clean(Path::new("/a/./b//../c/")), PathBuf::from("/a/c"));
        assert_eq!(clean(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(clean(Path::new("../../a")), PathBuf::from("../../a"));
        assert_eq!(clean(Path::new("a/..")), PathBuf::from("."));
    }

    #[cfg(unix)]
    #[test]
    fn path_entries_are_normalised() {
        let _g = env_guard();
        let home = "/custom/home/directory";
        let _home = set_env_var("HOME", Some(home));
        let _custom = set_env_var("PLATWRAP_TEST_CUSTOM_DIR", Some("/custom/path"));
        let cwd = std::env::current_dir().unwrap();
        let cwd = cwd.to_string_lossy();

        let cases: &[(&str, String, bool)] = &[
            ("double-dot", format!("{cwd}/foo/../foo"), true),
            ("home-tilde", format!("{home}/foo/bar/."), true),
            ("home-variable", format!("{home}/.local/bin"), true),
            ("custom-variable", "/custom/path/foo".into(), true),
            ("custom-variable-prefixed", "/prefix/custom/path/foo".into(), true),
            ("relative", format!("{cwd}/foo"), true),
            ("this-dir-as-empty-entry", format!("{cwd}/foo/.."), true),
            ("not-listed", "/opt/elsewhere".into(), false),
        ];
        let path_value = OsStr::new(
            "/usr/bin:~/foo/bar:$HOME/.local/bin:$PLATWRAP_TEST_CUSTOM_DIR/foo/.:\
             /prefix/$PLATWRAP_TEST_CUSTOM_DIR//foo:./foo/bar/..::/usr/local/bin",
        );
        for (name, dir, expected) in cases {
            assert_eq!(
                in_path_value(Path::new(dir), path_value),
                *expected,
                "case {name}"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn home_is_not_matched_by_lookalike() {
        let _g = env_guard();
        let _home = set_env_var("HOME", Some("/custom/home"));
        assert!(!in_path_value(
            Path::new("/custom/home/.local/bin"),
            OsStr::new("/usr/bin:/usr/local/bin:/usr/.local/bin"),
        ));
    }
}
