//! Engine instances cached per working directory

use linthost_engine::fs_utils::{descends_from, find_up};
use linthost_engine::{
    resolve_installation, ConfigFlavor, Engine, EngineFactory, EngineInstallation, EngineOptions,
    FixPolicy, FLAT_CONFIG_FILE, IGNORE_FILE, MINIMUM_ENGINE_VERSION,
};
use linthost_ipc::{DispatcherVariant, LintConfig};
use parking_lot::Mutex;
use semver::Version;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use crate::error::{JobError, JobResult};

/// The engines built for one working directory
pub struct EngineCacheEntry {
    pub cwd: PathBuf,
    pub installation: EngineInstallation,
    /// Never applies fixes
    pub lint: Arc<dyn Engine>,
    /// Applies every fix except `rulesToDisableWhileFixing`
    pub fix: Arc<dyn Engine>,
}

impl EngineCacheEntry {
    pub fn version(&self) -> &str {
        &self.installation.version
    }

    pub fn is_incompatible(&self) -> bool {
        is_incompatible(&self.installation.version)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetEngineOptions<'a> {
    pub project_path: &'a Path,
    /// Skip the version gate so incompatible installs can still be inspected
    pub is_debug: bool,
}

type Slot = Arc<OnceCell<Arc<EngineCacheEntry>>>;

/// Maps files to working directories, and working directories to engines.
///
/// An entry is built at most once per directory even when several jobs for
/// it arrive together; the later ones wait for the first build. Entries live
/// until [`clear`](Self::clear).
pub struct EngineCache {
    factory: Arc<dyn EngineFactory>,
    flavor: ConfigFlavor,
    cwds: Mutex<HashMap<PathBuf, PathBuf>>,
    engines: Mutex<HashMap<PathBuf, Slot>>,
}

impl EngineCache {
    pub fn new(factory: Arc<dyn EngineFactory>, dispatcher: DispatcherVariant) -> Self {
        let flavor = if dispatcher.uses_flat_config() {
            ConfigFlavor::Flat
        } else {
            ConfigFlavor::Legacy
        };
        Self {
            factory,
            flavor,
            cwds: Mutex::new(HashMap::new()),
            engines: Mutex::new(HashMap::new()),
        }
    }

    pub fn flavor(&self) -> ConfigFlavor {
        self.flavor
    }

    pub async fn get_engine(
        &self,
        file_path: Option<&Path>,
        config: &LintConfig,
        options: GetEngineOptions<'_>,
    ) -> JobResult<Arc<EngineCacheEntry>> {
        let use_cache = config.advanced.use_cache;
        let cwd = self.cwd_for(file_path, options.project_path, use_cache);
        trace!("Working directory for {:?} is {}", file_path, cwd.display());

        let entry = if use_cache {
            let slot = self.slot(&cwd);
            let entry = slot
                .get_or_try_init(|| async { self.build(&cwd, file_path, config).map(Arc::new) })
                .await?;
            Arc::clone(entry)
        } else {
            Arc::new(self.build(&cwd, file_path, config)?)
        };

        if !options.is_debug && entry.is_incompatible() {
            return Err(JobError::IncompatibleVersion {
                version: entry.installation.version.clone(),
                minimum_version: MINIMUM_ENGINE_VERSION.to_string(),
            });
        }

        Ok(entry)
    }

    /// Forget every working directory and engine
    pub fn clear(&self) {
        self.cwds.lock().clear();
        self.engines.lock().clear();
        debug!("Cleared engine cache");
    }

    pub fn len(&self) -> usize {
        self.engines
            .lock()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cwd_for(&self, file_path: Option<&Path>, project_path: &Path, use_cache: bool) -> PathBuf {
        let Some(file_path) = file_path else {
            return project_path.to_path_buf();
        };
        if !use_cache {
            return find_cwd(Some(file_path), project_path);
        }
        self.cwds
            .lock()
            .entry(file_path.to_path_buf())
            .or_insert_with(|| find_cwd(Some(file_path), project_path))
            .clone()
    }

    fn slot(&self, cwd: &Path) -> Slot {
        Arc::clone(self.engines.lock().entry(cwd.to_path_buf()).or_default())
    }

    fn build(
        &self,
        cwd: &Path,
        file_path: Option<&Path>,
        config: &LintConfig,
    ) -> JobResult<EngineCacheEntry> {
        let installation = resolve_installation(file_path.unwrap_or(cwd))?;
        debug!(
            "Creating engine instances with cwd {} (engine {} at {})",
            cwd.display(),
            installation.version,
            installation.package_root.display()
        );

        let mut options = EngineOptions::new(cwd, self.flavor);
        options.ignore = !config.advanced.disable_ignore_file;
        options.override_config = config.engine_location.override_config_file.clone();

        let lint = self.factory.create(&installation, options.clone())?;
        options.fix = FixPolicy::Enabled {
            exclude: config.advanced.rules_to_disable_while_fixing.clone(),
        };
        let fix = self.factory.create(&installation, options)?;

        Ok(EngineCacheEntry {
            cwd: cwd.to_path_buf(),
            installation,
            lint,
            fix,
        })
    }
}

/// Directory an engine for `file_path` should run from.
///
/// Files outside the project run from their own directory. Inside it, the
/// nearest directory holding an ignore file or a flat config wins, searching
/// no higher than the project.
pub fn find_cwd(file_path: Option<&Path>, project_path: &Path) -> PathBuf {
    let Some(file_path) = file_path else {
        return project_path.to_path_buf();
    };

    if !descends_from(file_path, project_path) {
        return file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_path.to_path_buf());
    }

    // Both candidates sit on the same chain of ancestors; the longer is nearer
    [IGNORE_FILE, FLAT_CONFIG_FILE]
        .iter()
        .filter_map(|name| find_up(file_path, name, Some(project_path)))
        .filter_map(|found| found.parent().map(Path::to_path_buf))
        .max_by_key(|dir| dir.components().count())
        .unwrap_or_else(|| project_path.to_path_buf())
}

/// Whether `version` is older than the minimum the worker supports.
///
/// Versions that do not parse are treated as incompatible.
pub fn is_incompatible(version: &str) -> bool {
    match (parse_version(version), parse_version(MINIMUM_ENGINE_VERSION)) {
        (Some(version), Some(minimum)) => version < minimum,
        _ => true,
    }
}

fn parse_version(version: &str) -> Option<Version> {
    let version = version.trim().trim_start_matches('v');
    if let Ok(parsed) = Version::parse(version) {
        return Some(parsed);
    }
    // Accept `8` and `8.1` as shorthand
    let mut parts = version.split('.').map(|part| part.parse::<u64>().ok());
    let major = parts.next()??;
    let minor = parts.next().unwrap_or(Some(0))?;
    let patch = parts.next().unwrap_or(Some(0))?;
    parts.next().is_none().then(|| Version::new(major, minor, patch))
}
