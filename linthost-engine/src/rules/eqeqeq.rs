use linthost_ipc::RuleMeta;

use super::{docs, Report, Rule, RuleContext};
use crate::source::{SourceCode, TokenKind};

/// Require `===` and `!==`.
///
/// Options: `"always"` (default) or `"smart"`, which allows loose comparison
/// against `null`, between two literals and of a `typeof` result. Both modes
/// accept `{"null": "ignore"}`.
pub struct Eqeqeq;

impl Rule for Eqeqeq {
    fn id(&self) -> &'static str {
        "eqeqeq"
    }

    fn meta(&self) -> RuleMeta {
        RuleMeta {
            rule_type: Some("suggestion".to_string()),
            docs: docs("Require the use of `===` and `!==`", self.id()),
            fixable: Some("code".to_string()),
        }
    }

    fn check(&self, context: &RuleContext<'_>) -> Vec<Report> {
        let source = context.source;
        let smart = context.string_option() == Some("smart");
        let ignore_null = context
            .options
            .iter()
            .any(|option| option.get("null").and_then(|v| v.as_str()) == Some("ignore"));

        let mut reports = Vec::new();
        for (i, token) in source.tokens.iter().enumerate() {
            let strict = match token.value.as_str() {
                "==" if token.kind == TokenKind::Punctuator => "===",
                "!=" if token.kind == TokenKind::Punctuator => "!==",
                _ => continue,
            };

            let against_null = source.prev(i).is_some_and(|t| t.is_keyword("null"))
                || source.next(i).is_some_and(|t| t.is_keyword("null"));
            if against_null && (smart || ignore_null) {
                continue;
            }

            let safe = is_typeof_comparison(source, i) || is_same_type_literals(source, i);
            if smart && safe {
                continue;
            }

            let report = Report::new(
                format!("Expected '{strict}' and instead saw '{}'.", token.value),
                token.start,
                token.end,
            );
            reports.push(if safe {
                report.with_fix(token.start, token.end, strict)
            } else {
                report
            });
        }
        reports
    }
}

/// `typeof x == "string"` or the mirrored form
fn is_typeof_comparison(source: &SourceCode, index: usize) -> bool {
    let left_typeof = index >= 2
        && source.prev(index).is_some_and(|t| t.kind == TokenKind::Identifier)
        && source.token(index - 2).is_some_and(|t| t.is_keyword("typeof"));
    let right_typeof = source.next(index).is_some_and(|t| t.is_keyword("typeof"));
    let left_string = source.prev(index).is_some_and(|t| t.kind == TokenKind::String);
    let right_string = source.token(index + 1).is_some_and(|t| t.kind == TokenKind::String);

    (left_typeof && right_string) || (right_typeof && left_string)
}

fn is_same_type_literals(source: &SourceCode, index: usize) -> bool {
    match (source.prev(index), source.next(index)) {
        (Some(left), Some(right)) => {
            left.is_literal()
                && right.is_literal()
                && left.kind == right.kind
                && left.kind != TokenKind::Keyword
        }
        _ => false,
    }
}
