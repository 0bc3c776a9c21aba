use std::env;
use std::path::{Path, PathBuf};

/// Find an executable on PATH, trying the Windows extensions where relevant.
///
/// Returns `None` when nothing matching exists; callers decide whether to
/// fall back to the bare name.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let candidates = if cfg!(windows) {
        vec![
            format!("{name}.exe"),
            format!("{name}.cmd"),
            format!("{name}.bat"),
            name.to_string(),
        ]
    } else {
        vec![name.to_string()]
    };

    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var).find_map(|dir| {
        candidates
            .iter()
            .map(|candidate| dir.join(candidate))
            .find(|full_path| full_path.is_file())
    })
}

/// Use `explicit` when given, otherwise look `name` up on PATH
pub fn resolve_tool(explicit: Option<&Path>, name: &str) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_executable(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_executable() {
        assert!(find_executable("definitely-not-a-real-tool-4f1c").is_none());
    }

    #[test]
    fn test_explicit_path_wins() {
        let explicit = PathBuf::from("/opt/android/platform-tools/adb");
        assert_eq!(
            resolve_tool(Some(&explicit), "adb"),
            Some(explicit.clone())
        );
    }
}
