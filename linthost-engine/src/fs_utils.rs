//! Path helpers shared by config discovery and the worker's cwd search

use std::path::{Component, Path, PathBuf};

/// Whether `file_path` lies inside `project_path` (or is it).
///
/// Purely lexical; neither path has to exist.
pub fn descends_from(file_path: &Path, project_path: &Path) -> bool {
    let file = normalize(file_path);
    let project = normalize(project_path);
    file.starts_with(&project)
}

/// Closest `file_name` in the directories above `root_file`, searching no
/// higher than `stop_directory`.
///
/// The search starts in the parent of `root_file`, so pass a path inside a
/// directory (see [`find_up_from_directory`]) to include that directory.
pub fn find_up(root_file: &Path, file_name: &str, stop_directory: Option<&Path>) -> Option<PathBuf> {
    if let Some(stop) = stop_directory {
        if !descends_from(root_file, stop) {
            return None;
        }
    }

    let stop = stop_directory.map(normalize);
    let mut current = normalize(root_file);
    while let Some(parent) = current.parent().map(Path::to_path_buf) {
        let target = parent.join(file_name);
        if target.exists() {
            return Some(target);
        }
        if stop.as_deref() == Some(parent.as_path()) {
            break;
        }
        current = parent;
    }

    None
}

/// Like [`find_up`], but `root_directory` itself is searched first
pub fn find_up_from_directory(
    root_directory: &Path,
    file_name: &str,
    stop_directory: Option<&Path>,
) -> Option<PathBuf> {
    find_up(&root_directory.join(file_name), file_name, stop_directory)
}

/// Lexically resolve `.` and `..` components
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_descends_from() {
        assert!(descends_from(Path::new("/p/src/a.js"), Path::new("/p")));
        assert!(descends_from(Path::new("/p"), Path::new("/p")));
        assert!(!descends_from(Path::new("/other/a.js"), Path::new("/p")));
        assert!(!descends_from(Path::new("/p/../q/a.js"), Path::new("/p")));
        assert!(!descends_from(Path::new("/pp/a.js"), Path::new("/p")));
    }

    #[test]
    fn test_find_up_respects_stop_directory() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        let nested = project.join("src/deep");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp.path().join("marker"), "").unwrap();
        fs::write(project.join("src/marker"), "").unwrap();

        let file = nested.join("a.js");
        assert_eq!(
            find_up(&file, "marker", Some(&project)),
            Some(project.join("src/marker"))
        );

        fs::remove_file(project.join("src/marker")).unwrap();
        assert_eq!(find_up(&file, "marker", Some(&project)), None);
        assert_eq!(find_up(&file, "marker", None), Some(temp.path().join("marker")));
    }

    #[test]
    fn test_find_up_outside_stop_directory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("marker"), "").unwrap();
        let elsewhere = temp.path().join("a.js");
        assert_eq!(
            find_up(&elsewhere, "marker", Some(&temp.path().join("project"))),
            None
        );
    }

    #[test]
    fn test_find_up_from_directory_checks_the_directory_itself() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("marker"), "").unwrap();
        assert_eq!(
            find_up_from_directory(temp.path(), "marker", Some(temp.path())),
            Some(temp.path().join("marker"))
        );
    }
}
