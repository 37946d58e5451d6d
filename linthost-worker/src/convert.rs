//! Engine results to editor diagnostics

use linthost_engine::{LintMessage, LintResult};
use linthost_ipc::{AdvancedConfig, Diagnostic, Location, RuleMeta, Severity};
use std::collections::BTreeMap;
use std::path::Path;

/// Zero-based range for a message.
///
/// Parse errors carry a single position, so their range runs from the start
/// of the offending line to that position.
pub fn location(file: &Path, message: &LintMessage) -> Location {
    let line = message.line.saturating_sub(1);
    let column = message.column.saturating_sub(1);

    let position = if message.fatal {
        [[line, 0], [line, column]]
    } else {
        let end_line = message.end_line.map_or(line, |l| l.saturating_sub(1));
        let end_column = message.end_column.map_or(column, |c| c.saturating_sub(1));
        [[line, column], [end_line, end_column]]
    };

    Location {
        file: file.to_path_buf(),
        position,
    }
}

/// Convert every message, dropping the ones suppressed while typing
pub fn convert_results(
    results: &[LintResult],
    rules: &BTreeMap<String, RuleMeta>,
    advanced: &AdvancedConfig,
    is_modified: bool,
) -> Vec<Diagnostic> {
    let mut output = Vec::new();

    for result in results {
        for message in &result.messages {
            if is_modified && suppressed_while_typing(message, advanced) {
                continue;
            }

            let id_tag = match (&message.rule_id, advanced.show_rule_id_in_message) {
                (_, false) => String::new(),
                (_, true) if message.fatal => " (Fatal)".to_string(),
                (Some(rule_id), true) => format!(" ({rule_id})"),
                (None, true) => String::new(),
            };

            let url = message
                .rule_id
                .as_ref()
                .and_then(|id| rules.get(id))
                .and_then(|meta| meta.docs.as_ref())
                .and_then(|docs| docs.url.clone());

            output.push(Diagnostic {
                severity: Severity::from_level(message.severity),
                location: location(&result.file_path, message),
                fix: message.fix.clone(),
                excerpt: format!("{}{}", message.message, id_tag),
                url,
            });
        }
    }

    output
}

fn suppressed_while_typing(message: &LintMessage, advanced: &AdvancedConfig) -> bool {
    if advanced.ignore_fixable_rules_while_typing && message.fix.is_some() {
        return true;
    }
    message.rule_id.as_ref().is_some_and(|id| {
        advanced
            .rules_to_disable_while_typing
            .iter()
            .any(|disabled| disabled == id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use linthost_ipc::{FixEdit, RuleDocs};
    use std::path::PathBuf;

    fn message(rule_id: Option<&str>, severity: u8, fix: bool) -> LintMessage {
        LintMessage {
            rule_id: rule_id.map(str::to_string),
            severity,
            message: "Extra semicolon.".to_string(),
            line: 1,
            column: 4,
            end_line: Some(1),
            end_column: Some(5),
            fix: fix.then(|| FixEdit {
                range: [3, 4],
                text: String::new(),
            }),
            fatal: false,
        }
    }

    fn result(messages: Vec<LintMessage>) -> Vec<LintResult> {
        vec![LintResult {
            file_path: PathBuf::from("/p/a.js"),
            messages,
            output: None,
        }]
    }

    fn rules() -> BTreeMap<String, RuleMeta> {
        BTreeMap::from([(
            "semi".to_string(),
            RuleMeta {
                rule_type: Some("layout".to_string()),
                docs: Some(RuleDocs {
                    description: None,
                    url: Some("https://eslint.org/docs/latest/rules/semi".to_string()),
                }),
                fixable: Some("code".to_string()),
            },
        )])
    }

    #[test]
    fn test_positions_severity_and_excerpt() {
        let diagnostics = convert_results(
            &result(vec![message(Some("semi"), 2, true)]),
            &rules(),
            &AdvancedConfig::default(),
            false,
        );
        let diagnostic = &diagnostics[0];
        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(diagnostic.location.position, [[0, 3], [0, 4]]);
        assert_eq!(diagnostic.excerpt, "Extra semicolon. (semi)");
        assert_eq!(
            diagnostic.url.as_deref(),
            Some("https://eslint.org/docs/latest/rules/semi")
        );
        assert!(diagnostic.fix.is_some());
    }

    #[test]
    fn test_fatal_messages_span_from_line_start() {
        let fatal = LintMessage {
            rule_id: None,
            severity: 2,
            message: "Parsing error: Unterminated string constant".to_string(),
            line: 2,
            column: 9,
            end_line: None,
            end_column: None,
            fix: None,
            fatal: true,
        };
        let diagnostics = convert_results(
            &result(vec![fatal]),
            &BTreeMap::new(),
            &AdvancedConfig::default(),
            false,
        );
        assert_eq!(diagnostics[0].location.position, [[1, 0], [1, 8]]);
        assert_eq!(
            diagnostics[0].excerpt,
            "Parsing error: Unterminated string constant (Fatal)"
        );
        assert!(diagnostics[0].url.is_none());
    }

    #[test]
    fn test_rule_id_can_be_hidden() {
        let advanced = AdvancedConfig {
            show_rule_id_in_message: false,
            ..Default::default()
        };
        let diagnostics = convert_results(
            &result(vec![message(Some("semi"), 0, false)]),
            &rules(),
            &advanced,
            false,
        );
        assert_eq!(diagnostics[0].excerpt, "Extra semicolon.");
        assert_eq!(diagnostics[0].severity, Severity::Info);
    }

    #[test]
    fn test_typing_filters_apply_only_to_modified_text() {
        let advanced = AdvancedConfig {
            ignore_fixable_rules_while_typing: true,
            rules_to_disable_while_typing: vec!["no-undef".to_string()],
            ..Default::default()
        };
        let results = result(vec![
            message(Some("semi"), 2, true),
            message(Some("no-undef"), 2, false),
            message(Some("eqeqeq"), 1, false),
        ]);

        let typing = convert_results(&results, &rules(), &advanced, true);
        assert_eq!(typing.len(), 1);
        assert_eq!(typing[0].severity, Severity::Warning);

        let saved = convert_results(&results, &rules(), &advanced, false);
        assert_eq!(saved.len(), 3);
    }
}
