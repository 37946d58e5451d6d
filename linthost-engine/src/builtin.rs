//! The engine compiled into the worker

use async_trait::async_trait;
use linthost_ipc::{FixEdit, RuleMeta};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::{load_config, ResolvedConfig};
use crate::engine::{Engine, EngineFactory, EngineOptions, LintMessage, LintResult};
use crate::error::{EngineError, EngineResult};
use crate::ignore::IgnoreMatcher;
use crate::install::EngineInstallation;
use crate::rules::{builtin_rules, Report, Rule, RuleContext};
use crate::source::{position_of, SourceCode};
use crate::MAX_FIX_PASSES;

const IGNORED_FILE_WARNING: &str =
    "File ignored because of a matching ignore pattern. Set advanced.disableIgnoreFile to override.";

pub struct BuiltinEngine {
    options: EngineOptions,
    ignore: Option<IgnoreMatcher>,
    rules: BTreeMap<&'static str, Box<dyn Rule>>,
}

impl BuiltinEngine {
    pub fn new(options: EngineOptions) -> Self {
        let ignore = options.ignore.then(|| IgnoreMatcher::load(&options.cwd));
        Self {
            options,
            ignore,
            rules: builtin_rules(),
        }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.options.cwd.join(path)
        }
    }

    fn config_for(&self, file_path: &Path) -> EngineResult<ResolvedConfig> {
        let override_config = self
            .options
            .override_config
            .as_ref()
            .map(|path| self.resolve_path(path));
        load_config(self.options.flavor, file_path, override_config.as_deref())
    }

    fn ignored(&self, file_path: &Path, config: Option<&ResolvedConfig>) -> bool {
        let Some(ignore) = &self.ignore else {
            return false;
        };
        ignore.is_ignored(file_path) || config.is_some_and(|c| c.ignored)
    }

    /// Run every enabled rule once over `text`
    fn verify(&self, text: &str, config: &ResolvedConfig) -> Vec<LintMessage> {
        let source = match SourceCode::parse(text) {
            Ok(source) => source,
            Err(error) => {
                let (line, column) = position_of(text, error.offset);
                return vec![LintMessage {
                    rule_id: None,
                    severity: 2,
                    message: format!("Parsing error: {error}"),
                    line,
                    column,
                    end_line: None,
                    end_column: None,
                    fix: None,
                    fatal: true,
                }];
            }
        };

        let mut messages = Vec::new();
        for (rule_id, setting) in &config.rules {
            if !setting.is_enabled() {
                continue;
            }
            let Some(rule) = self.rules.get(rule_id.as_str()) else {
                messages.push(LintMessage {
                    rule_id: Some(rule_id.clone()),
                    severity: setting.level,
                    message: format!("Definition for rule '{rule_id}' was not found."),
                    line: 1,
                    column: 1,
                    end_line: Some(1),
                    end_column: Some(2),
                    fix: None,
                    fatal: false,
                });
                continue;
            };

            let context = RuleContext {
                source: &source,
                options: &setting.options,
                globals: &config.globals,
            };
            for report in rule.check(&context) {
                messages.push(to_message(&source, rule_id, setting.level, report));
            }
        }

        messages.sort_by_key(|m| (m.line, m.column));
        messages
    }

    fn lint_source(&self, text: &str, file_path: &Path) -> EngineResult<LintResult> {
        let config = self.config_for(file_path)?;
        if self.ignored(file_path, Some(&config)) {
            return Ok(ignored_result(file_path));
        }

        let mut current = text.to_string();
        let mut messages = self.verify(&current, &config);
        let mut passes = 0;
        while self.options.fix.is_enabled() && passes < MAX_FIX_PASSES {
            let Some(fixed) = self.apply_fixes(&current, &messages) else {
                break;
            };
            current = fixed;
            passes += 1;
            messages = self.verify(&current, &config);
        }

        if passes > 0 {
            debug!("Applied fixes in {} pass(es) to {}", passes, file_path.display());
        }

        Ok(LintResult {
            file_path: file_path.to_path_buf(),
            messages,
            output: (current != text).then_some(current),
        })
    }

    /// Apply non-overlapping fixes in source order; `None` if nothing applied
    fn apply_fixes(&self, text: &str, messages: &[LintMessage]) -> Option<String> {
        let mut fixes: Vec<&FixEdit> = messages
            .iter()
            .filter(|m| self.options.fix.applies_to(m.rule_id.as_deref()))
            .filter_map(|m| m.fix.as_ref())
            .collect();
        if fixes.is_empty() {
            return None;
        }
        fixes.sort_by_key(|fix| (fix.range[0], fix.range[1]));

        let mut output = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut applied = 0;
        for fix in fixes {
            let [start, end] = fix.range;
            // Overlapping fixes wait for the next pass
            if start < cursor || end > text.len() || start > end {
                continue;
            }
            let (Some(before), true) = (text.get(cursor..start), text.is_char_boundary(end)) else {
                continue;
            };
            output.push_str(before);
            output.push_str(&fix.text);
            cursor = end;
            applied += 1;
        }
        output.push_str(text.get(cursor..).unwrap_or_default());

        trace!("Applied {} fix(es) in one pass", applied);
        (applied > 0 && output != text).then_some(output)
    }
}

fn to_message(source: &SourceCode, rule_id: &str, severity: u8, report: Report) -> LintMessage {
    let (line, column) = source.position(report.start);
    let (end_line, end_column) = source.position(report.end);
    LintMessage {
        rule_id: Some(rule_id.to_string()),
        severity,
        message: report.message,
        line,
        column,
        end_line: Some(end_line),
        end_column: Some(end_column),
        fix: report.fix,
        fatal: false,
    }
}

fn ignored_result(file_path: &Path) -> LintResult {
    LintResult {
        file_path: file_path.to_path_buf(),
        messages: vec![LintMessage {
            rule_id: None,
            severity: 1,
            message: IGNORED_FILE_WARNING.to_string(),
            line: 1,
            column: 1,
            end_line: None,
            end_column: None,
            fix: None,
            fatal: false,
        }],
        output: None,
    }
}

#[async_trait]
impl Engine for BuiltinEngine {
    fn cwd(&self) -> &Path {
        &self.options.cwd
    }

    async fn is_path_ignored(&self, path: &Path) -> EngineResult<bool> {
        let path = self.resolve_path(path);
        if self.ignore.is_none() {
            return Ok(false);
        }
        // A file without any config is not ignored; linting it reports that
        let config = match self.config_for(&path) {
            Ok(config) => Some(config),
            Err(e) if e.is_no_config_found() => None,
            Err(e) => return Err(e),
        };
        Ok(self.ignored(&path, config.as_ref()))
    }

    async fn lint_text(&self, text: &str, file_path: &Path) -> EngineResult<Vec<LintResult>> {
        let file_path = self.resolve_path(file_path);
        Ok(vec![self.lint_source(text, &file_path)?])
    }

    async fn lint_file(&self, file_path: &Path) -> EngineResult<Vec<LintResult>> {
        let file_path = self.resolve_path(file_path);
        let text = tokio::fs::read_to_string(&file_path)
            .await
            .map_err(|e| EngineError::io(&file_path, e))?;
        Ok(vec![self.lint_source(&text, &file_path)?])
    }

    fn rules_meta_for_results(&self, results: &[LintResult]) -> BTreeMap<String, RuleMeta> {
        results
            .iter()
            .flat_map(|result| &result.messages)
            .filter_map(|message| message.rule_id.as_deref())
            .filter_map(|id| self.rules.get(id).map(|rule| (id.to_string(), rule.meta())))
            .collect()
    }

    async fn output_fixes(&self, results: &[LintResult]) -> EngineResult<()> {
        for result in results {
            if let Some(output) = &result.output {
                tokio::fs::write(&result.file_path, output)
                    .await
                    .map_err(|e| EngineError::io(&result.file_path, e))?;
                debug!("Wrote fixes to {}", result.file_path.display());
            }
        }
        Ok(())
    }
}

/// Builds [`BuiltinEngine`]s whatever the installation says
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinEngineFactory;

impl EngineFactory for BuiltinEngineFactory {
    fn create(
        &self,
        installation: &EngineInstallation,
        options: EngineOptions,
    ) -> EngineResult<Arc<dyn Engine>> {
        debug!(
            "Creating engine {} for {} (fix: {})",
            installation.version,
            options.cwd.display(),
            options.fix.is_enabled()
        );
        Ok(Arc::new(BuiltinEngine::new(options)))
    }
}
