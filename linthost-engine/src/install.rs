//! Locating the engine installation a project uses

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::fs_utils::find_up_from_directory;
use crate::ENGINE_PACKAGE_NAME;

/// Version reported by the engine compiled into the worker
pub const BUNDLED_ENGINE_VERSION: &str = "8.57.0";

/// Oldest engine version the worker agrees to run
pub const MINIMUM_ENGINE_VERSION: &str = "8.0.0";

/// An engine package on disk, or the bundled one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInstallation {
    pub package_root: PathBuf,
    pub version: String,
    pub is_builtin: bool,
}

impl EngineInstallation {
    pub fn bundled() -> Self {
        Self {
            package_root: PathBuf::from(env!("CARGO_MANIFEST_DIR")),
            version: BUNDLED_ENGINE_VERSION.to_string(),
            is_builtin: true,
        }
    }
}

#[derive(Deserialize)]
struct PackageManifest {
    version: String,
}

/// Nearest `node_modules/linthost-engine` above `file_path`, falling back to
/// the bundled engine when the project has none installed
pub fn resolve_installation(file_path: &Path) -> EngineResult<EngineInstallation> {
    let start = file_path.parent().unwrap_or(file_path);
    let manifest_name = Path::new("node_modules")
        .join(ENGINE_PACKAGE_NAME)
        .join("package.json");

    let Some(manifest_path) =
        find_up_from_directory(start, &manifest_name.to_string_lossy(), None)
    else {
        debug!("No installed engine above {}, using bundled engine", file_path.display());
        return Ok(EngineInstallation::bundled());
    };

    let raw = std::fs::read_to_string(&manifest_path)
        .map_err(|e| EngineError::io(&manifest_path, e))?;
    let manifest: PackageManifest = serde_json::from_str(&raw).map_err(|e| {
        EngineError::Installation(format!("{}: {}", manifest_path.display(), e))
    })?;

    let package_root = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| manifest_path.clone());

    debug!(
        "Resolved engine {} at {}",
        manifest.version,
        package_root.display()
    );

    Ok(EngineInstallation {
        package_root,
        version: manifest.version,
        is_builtin: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_installed_engine_wins_over_bundled() {
        let temp = TempDir::new().unwrap();
        let package = temp.path().join("node_modules").join(ENGINE_PACKAGE_NAME);
        fs::create_dir_all(&package).unwrap();
        fs::write(package.join("package.json"), r#"{"name":"linthost-engine","version":"7.32.0"}"#)
            .unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();

        let installation = resolve_installation(&temp.path().join("src/a.js")).unwrap();
        assert_eq!(installation.version, "7.32.0");
        assert_eq!(installation.package_root, package);
        assert!(!installation.is_builtin);
    }

    #[test]
    fn test_falls_back_to_bundled() {
        let temp = TempDir::new().unwrap();
        let installation = resolve_installation(&temp.path().join("a.js")).unwrap();
        assert!(installation.is_builtin);
        assert_eq!(installation.version, BUNDLED_ENGINE_VERSION);
    }

    #[test]
    fn test_broken_manifest_is_an_error() {
        let temp = TempDir::new().unwrap();
        let package = temp.path().join("node_modules").join(ENGINE_PACKAGE_NAME);
        fs::create_dir_all(&package).unwrap();
        fs::write(package.join("package.json"), "{").unwrap();

        let error = resolve_installation(&temp.path().join("a.js")).unwrap_err();
        assert!(matches!(error, EngineError::Installation(_)));
    }
}
