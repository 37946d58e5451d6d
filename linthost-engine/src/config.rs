//! Config file discovery and rule settings
//!
//! Two config flavors are understood:
//!
//! - flat: the nearest `lint.config.json` above the file. It holds an object
//!   or an array of objects; each may restrict itself with `files` globs and
//!   exclude paths with `ignores`. An object with only `ignores` applies to
//!   every file.
//! - legacy: every `.lintrc.json` from the file's directory upward, stopping
//!   after the first one that declares `"root": true`. Nearer files override
//!   farther ones.

use glob::{MatchOptions, Pattern};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::fs_utils::{find_up, normalize};
use crate::{FLAT_CONFIG_FILE, LEGACY_CONFIG_FILE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigFlavor {
    Flat,
    Legacy,
}

impl ConfigFlavor {
    pub fn file_name(&self) -> &'static str {
        match self {
            ConfigFlavor::Flat => FLAT_CONFIG_FILE,
            ConfigFlavor::Legacy => LEGACY_CONFIG_FILE,
        }
    }
}

/// Severity and options configured for one rule
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSetting {
    /// 0 = off, 1 = warn, 2 = error
    pub level: u8,
    pub options: Vec<JsonValue>,
}

impl RuleSetting {
    pub fn is_enabled(&self) -> bool {
        self.level > 0
    }

    fn parse(rule_id: &str, value: &JsonValue, path: &Path) -> EngineResult<Self> {
        let (level, options) = match value {
            JsonValue::Array(items) => match items.split_first() {
                Some((level, options)) => (level, options.to_vec()),
                None => {
                    return Err(EngineError::invalid_config(
                        path,
                        format!("rule '{rule_id}' has an empty setting"),
                    ))
                }
            },
            other => (other, Vec::new()),
        };

        let level = match level {
            JsonValue::String(s) if s == "off" => 0,
            JsonValue::String(s) if s == "warn" => 1,
            JsonValue::String(s) if s == "error" => 2,
            JsonValue::Number(n) if n.as_u64().is_some_and(|n| n <= 2) => {
                n.as_u64().unwrap_or_default() as u8
            }
            other => {
                return Err(EngineError::invalid_config(
                    path,
                    format!("rule '{rule_id}' has invalid severity {other}"),
                ))
            }
        };

        Ok(Self { level, options })
    }
}

/// Everything the engine needs to know to lint one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedConfig {
    /// Config files that contributed, nearest first
    pub sources: Vec<PathBuf>,
    pub rules: BTreeMap<String, RuleSetting>,
    /// Declared globals; `false` marks a global switched off
    pub globals: BTreeMap<String, bool>,
    /// The file is excluded by the config's own ignore patterns
    pub ignored: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawConfig {
    root: bool,
    files: Vec<String>,
    ignores: Vec<String>,
    ignore_patterns: Vec<String>,
    rules: BTreeMap<String, JsonValue>,
    globals: BTreeMap<String, JsonValue>,
    env: BTreeMap<String, bool>,
}

impl RawConfig {
    fn apply_to(&self, resolved: &mut ResolvedConfig, path: &Path) -> EngineResult<()> {
        for (name, enabled) in &self.env {
            if *enabled {
                for global in env_globals(name) {
                    resolved.globals.insert((*global).to_string(), true);
                }
            }
        }
        for (name, value) in &self.globals {
            let enabled = !matches!(value, JsonValue::Bool(false))
                && value.as_str() != Some("off");
            resolved.globals.insert(name.clone(), enabled);
        }
        for (rule_id, value) in &self.rules {
            resolved
                .rules
                .insert(rule_id.clone(), RuleSetting::parse(rule_id, value, path)?);
        }
        Ok(())
    }
}

/// Resolve the config that applies to `file_path`.
///
/// `override_config` skips discovery and reads exactly that file.
pub fn load_config(
    flavor: ConfigFlavor,
    file_path: &Path,
    override_config: Option<&Path>,
) -> EngineResult<ResolvedConfig> {
    match (flavor, override_config) {
        (ConfigFlavor::Flat, Some(path)) => load_flat(path, file_path),
        (ConfigFlavor::Flat, None) => {
            let path = find_up(file_path, FLAT_CONFIG_FILE, None).ok_or_else(|| {
                EngineError::NoConfigFound {
                    file_path: file_path.to_path_buf(),
                }
            })?;
            load_flat(&path, file_path)
        }
        (ConfigFlavor::Legacy, Some(path)) => {
            let mut resolved = ResolvedConfig::default();
            let raw = read_raw(path)?;
            apply_legacy(&raw, path, file_path, &mut resolved)?;
            resolved.sources.push(path.to_path_buf());
            Ok(resolved)
        }
        (ConfigFlavor::Legacy, None) => load_legacy_cascade(file_path),
    }
}

fn read_json(path: &Path) -> EngineResult<JsonValue> {
    let raw = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
    serde_json::from_str(&raw).map_err(|e| EngineError::invalid_config(path, e.to_string()))
}

fn read_raw(path: &Path) -> EngineResult<RawConfig> {
    serde_json::from_value(read_json(path)?)
        .map_err(|e| EngineError::invalid_config(path, e.to_string()))
}

fn load_flat(config_path: &Path, file_path: &Path) -> EngineResult<ResolvedConfig> {
    let entries: Vec<RawConfig> = match read_json(config_path)? {
        JsonValue::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>(),
        other => serde_json::from_value(other).map(|entry| vec![entry]),
    }
    .map_err(|e| EngineError::invalid_config(config_path, e.to_string()))?;

    let base = config_path.parent().unwrap_or(Path::new("/"));
    let relative = relative_to(file_path, base);
    let mut resolved = ResolvedConfig {
        sources: vec![config_path.to_path_buf()],
        ..Default::default()
    };

    for entry in &entries {
        let ignores = compile_patterns(&entry.ignores, config_path)?;
        let excluded = relative
            .as_deref()
            .is_some_and(|rel| ignores.iter().any(|p| matches_relative(p, rel)));

        let is_global_ignore = entry.files.is_empty()
            && entry.rules.is_empty()
            && entry.globals.is_empty()
            && entry.env.is_empty()
            && !entry.ignores.is_empty();
        if is_global_ignore {
            resolved.ignored |= excluded;
            continue;
        }
        if excluded {
            continue;
        }

        if !entry.files.is_empty() {
            let files = compile_patterns(&entry.files, config_path)?;
            let applies = relative
                .as_deref()
                .is_some_and(|rel| files.iter().any(|p| matches_relative(p, rel)));
            if !applies {
                continue;
            }
        }

        entry.apply_to(&mut resolved, config_path)?;
    }

    debug!(
        "Loaded flat config {} for {}",
        config_path.display(),
        file_path.display()
    );
    Ok(resolved)
}

fn load_legacy_cascade(file_path: &Path) -> EngineResult<ResolvedConfig> {
    let mut chain = Vec::new();
    let mut cursor = file_path.to_path_buf();
    while let Some(path) = find_up(&cursor, LEGACY_CONFIG_FILE, None) {
        let raw = read_raw(&path)?;
        let is_root = raw.root;
        cursor = path.parent().unwrap_or(Path::new("/")).to_path_buf();
        chain.push((path, raw));
        if is_root {
            break;
        }
    }

    if chain.is_empty() {
        return Err(EngineError::NoConfigFound {
            file_path: file_path.to_path_buf(),
        });
    }

    let mut resolved = ResolvedConfig::default();
    for (path, raw) in chain.iter().rev() {
        apply_legacy(raw, path, file_path, &mut resolved)?;
    }
    resolved.sources = chain.into_iter().map(|(path, _)| path).collect();

    debug!(
        "Loaded {} legacy config file(s) for {}",
        resolved.sources.len(),
        file_path.display()
    );
    Ok(resolved)
}

fn apply_legacy(
    raw: &RawConfig,
    config_path: &Path,
    file_path: &Path,
    resolved: &mut ResolvedConfig,
) -> EngineResult<()> {
    let base = config_path.parent().unwrap_or(Path::new("/"));
    if let Some(relative) = relative_to(file_path, base) {
        let patterns = compile_patterns(&raw.ignore_patterns, config_path)?;
        if patterns.iter().any(|p| matches_relative(p, &relative)) {
            resolved.ignored = true;
        }
    }
    raw.apply_to(resolved, config_path)
}

/// `file_path` relative to `base` with `/` separators, if it lies inside it
pub(crate) fn relative_to(file_path: &Path, base: &Path) -> Option<String> {
    let file = normalize(file_path);
    let base = normalize(base);
    let relative = file.strip_prefix(&base).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Expand a gitignore-style pattern into glob patterns.
///
/// `dist/` and `dist` also match everything below `dist`; patterns without a
/// slash match at any depth.
pub(crate) fn expand_pattern(pattern: &str) -> Vec<String> {
    let anchored = pattern.starts_with('/');
    let trimmed = pattern.trim_start_matches('/');
    let base = trimmed.trim_end_matches('/');
    if base.is_empty() {
        return Vec::new();
    }

    let mut expanded = vec![base.to_string(), format!("{base}/**")];
    if !anchored && !base.contains('/') {
        expanded.push(format!("**/{base}"));
        expanded.push(format!("**/{base}/**"));
    }
    expanded
}

fn compile_patterns(patterns: &[String], config_path: &Path) -> EngineResult<Vec<Pattern>> {
    let mut compiled = Vec::new();
    for pattern in patterns {
        for glob in expand_pattern(pattern) {
            compiled.push(Pattern::new(&glob).map_err(|e| {
                EngineError::invalid_config(config_path, format!("bad pattern '{pattern}': {e}"))
            })?);
        }
    }
    Ok(compiled)
}

pub(crate) fn matches_relative(pattern: &Pattern, relative: &str) -> bool {
    pattern.matches_with(
        relative,
        MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        },
    )
}

/// Globals contributed by an `env` entry
fn env_globals(env: &str) -> &'static [&'static str] {
    match env {
        "browser" => &[
            "window", "document", "navigator", "location", "history", "console", "alert",
            "fetch", "localStorage", "sessionStorage", "setTimeout", "clearTimeout",
            "setInterval", "clearInterval", "requestAnimationFrame", "HTMLElement", "Event",
            "URL", "URLSearchParams",
        ],
        "node" => &[
            "require", "module", "exports", "process", "console", "Buffer", "__dirname",
            "__filename", "global", "setTimeout", "clearTimeout", "setInterval",
            "clearInterval", "setImmediate", "clearImmediate", "URL", "URLSearchParams",
        ],
        "jest" | "mocha" => &[
            "describe", "it", "test", "expect", "beforeEach", "afterEach", "beforeAll",
            "afterAll", "jest", "before", "after",
        ],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_rule_setting_forms() {
        let path = Path::new("/c.json");
        let off = RuleSetting::parse("semi", &serde_json::json!("off"), path).unwrap();
        assert!(!off.is_enabled());
        let warn = RuleSetting::parse("semi", &serde_json::json!(1), path).unwrap();
        assert_eq!(warn.level, 1);
        let with_options =
            RuleSetting::parse("semi", &serde_json::json!(["error", "never"]), path).unwrap();
        assert_eq!(with_options.level, 2);
        assert_eq!(with_options.options, vec![serde_json::json!("never")]);
        assert!(RuleSetting::parse("semi", &serde_json::json!("loud"), path).is_err());
        assert!(RuleSetting::parse("semi", &serde_json::json!(3), path).is_err());
    }

    #[test]
    fn test_flat_config_is_found_upward() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(
            temp.path().join(FLAT_CONFIG_FILE),
            r#"{"rules":{"semi":["error","never"]},"globals":{"jQuery":"readonly","$":"off"}}"#,
        )
        .unwrap();

        let config =
            load_config(ConfigFlavor::Flat, &temp.path().join("src/a.js"), None).unwrap();
        assert_eq!(config.rules["semi"].level, 2);
        assert_eq!(config.globals.get("jQuery"), Some(&true));
        assert_eq!(config.globals.get("$"), Some(&false));
        assert!(!config.ignored);
    }

    #[test]
    fn test_flat_config_files_and_ignores() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(FLAT_CONFIG_FILE),
            r#"[
                {"ignores": ["build/"]},
                {"rules": {"no-debugger": "error"}},
                {"files": ["test/**"], "rules": {"no-debugger": "off"}}
            ]"#,
        )
        .unwrap();

        let src = load_config(ConfigFlavor::Flat, &temp.path().join("src/a.js"), None).unwrap();
        assert!(src.rules["no-debugger"].is_enabled());

        let test = load_config(ConfigFlavor::Flat, &temp.path().join("test/a.js"), None).unwrap();
        assert!(!test.rules["no-debugger"].is_enabled());

        let build =
            load_config(ConfigFlavor::Flat, &temp.path().join("build/out.js"), None).unwrap();
        assert!(build.ignored);
    }

    #[test]
    fn test_legacy_cascade_stops_at_root() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        fs::create_dir_all(project.join("src")).unwrap();
        fs::write(
            temp.path().join(LEGACY_CONFIG_FILE),
            r#"{"rules":{"eqeqeq":"error"}}"#,
        )
        .unwrap();
        fs::write(
            project.join(LEGACY_CONFIG_FILE),
            r#"{"root":true,"rules":{"semi":"error","no-undef":"warn"},"env":{"node":true}}"#,
        )
        .unwrap();
        fs::write(
            project.join("src").join(LEGACY_CONFIG_FILE),
            r#"{"rules":{"no-undef":"off"},"ignorePatterns":["*.min.js"]}"#,
        )
        .unwrap();

        let config =
            load_config(ConfigFlavor::Legacy, &project.join("src/a.js"), None).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert!(!config.rules.contains_key("eqeqeq"));
        assert_eq!(config.rules["semi"].level, 2);
        assert_eq!(config.rules["no-undef"].level, 0);
        assert_eq!(config.globals.get("require"), Some(&true));

        let minified =
            load_config(ConfigFlavor::Legacy, &project.join("src/lib.min.js"), None).unwrap();
        assert!(minified.ignored);
    }

    #[test]
    fn test_missing_config() {
        let temp = TempDir::new().unwrap();
        let error =
            load_config(ConfigFlavor::Flat, &temp.path().join("a.js"), None).unwrap_err();
        assert!(error.is_no_config_found());
    }

    #[test]
    fn test_override_config_replaces_discovery() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(FLAT_CONFIG_FILE), r#"{"rules":{"semi":"error"}}"#).unwrap();
        let override_path = temp.path().join("custom.json");
        fs::write(&override_path, r#"{"rules":{"eqeqeq":"warn"}}"#).unwrap();

        let config = load_config(
            ConfigFlavor::Flat,
            &temp.path().join("a.js"),
            Some(&override_path),
        )
        .unwrap();
        assert_eq!(config.sources, vec![override_path]);
        assert!(config.rules.contains_key("eqeqeq"));
        assert!(!config.rules.contains_key("semi"));
    }

    #[test]
    fn test_expand_pattern() {
        assert_eq!(
            expand_pattern("dist/"),
            vec!["dist", "dist/**", "**/dist", "**/dist/**"]
        );
        assert_eq!(expand_pattern("/lib/gen"), vec!["lib/gen", "lib/gen/**"]);
        assert!(expand_pattern("/").is_empty());
    }
}
