//! `.lintignore` handling

use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::{expand_pattern, matches_relative, relative_to};
use crate::IGNORE_FILE;

struct IgnoreRule {
    patterns: Vec<Pattern>,
    negated: bool,
}

/// Ignore rules for one working directory.
///
/// Lines are gitignore-style globs relative to the directory; `#` starts a
/// comment and a leading `!` re-includes a path. The last matching line
/// wins. Anything under `node_modules` is always ignored.
pub struct IgnoreMatcher {
    cwd: PathBuf,
    rules: Vec<IgnoreRule>,
}

impl IgnoreMatcher {
    /// Read `<cwd>/.lintignore`; a missing file means no extra rules
    pub fn load(cwd: &Path) -> Self {
        let path = cwd.join(IGNORE_FILE);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                String::new()
            }
        };
        Self::from_lines(cwd, &contents)
    }

    pub fn from_lines(cwd: &Path, contents: &str) -> Self {
        let mut rules = vec![IgnoreRule {
            patterns: compile("node_modules"),
            negated: false,
        }];

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (negated, pattern) = match line.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, line),
            };
            let patterns = compile(pattern);
            if patterns.is_empty() {
                warn!("Skipping unusable ignore pattern '{}'", line);
                continue;
            }
            rules.push(IgnoreRule { patterns, negated });
        }

        Self {
            cwd: cwd.to_path_buf(),
            rules,
        }
    }

    /// Paths outside the working directory are never ignored
    pub fn is_ignored(&self, path: &Path) -> bool {
        let Some(relative) = relative_to(path, &self.cwd) else {
            return false;
        };

        let mut ignored = false;
        for rule in &self.rules {
            if rule.patterns.iter().any(|p| matches_relative(p, &relative)) {
                ignored = !rule.negated;
            }
        }
        ignored
    }
}

fn compile(pattern: &str) -> Vec<Pattern> {
    expand_pattern(pattern)
        .iter()
        .filter_map(|glob| Pattern::new(glob).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_patterns_and_negation() {
        let cwd = Path::new("/project");
        let matcher = IgnoreMatcher::from_lines(
            cwd,
            "# generated\ndist/\n*.min.js\n!keep.min.js\n\n/vendor\n",
        );

        assert!(matcher.is_ignored(&cwd.join("dist/bundle.js")));
        assert!(matcher.is_ignored(&cwd.join("src/app.min.js")));
        assert!(!matcher.is_ignored(&cwd.join("src/keep.min.js")));
        assert!(matcher.is_ignored(&cwd.join("vendor/lib.js")));
        assert!(!matcher.is_ignored(&cwd.join("src/vendor/lib.js")));
        assert!(!matcher.is_ignored(&cwd.join("src/app.js")));
    }

    #[test]
    fn test_node_modules_always_ignored() {
        let cwd = Path::new("/project");
        let matcher = IgnoreMatcher::from_lines(cwd, "");
        assert!(matcher.is_ignored(&cwd.join("node_modules/pkg/index.js")));
        assert!(matcher.is_ignored(&cwd.join("packages/a/node_modules/x.js")));
        assert!(!matcher.is_ignored(Path::new("/elsewhere/node_modules/x.js")));
    }

    #[test]
    fn test_load_reads_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(IGNORE_FILE), "ignored.js\n").unwrap();
        let matcher = IgnoreMatcher::load(temp.path());
        assert!(matcher.is_ignored(&temp.path().join("ignored.js")));
        assert!(!matcher.is_ignored(&temp.path().join("kept.js")));

        let empty = TempDir::new().unwrap();
        assert!(!IgnoreMatcher::load(empty.path()).is_ignored(&empty.path().join("ignored.js")));
    }
}
