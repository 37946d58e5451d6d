use linthost_ipc::RuleMeta;

use super::{docs, Report, Rule, RuleContext};
use crate::source::{SourceCode, Token, TokenKind};

/// Require (`"always"`, the default) or disallow (`"never"`) semicolons
/// at the end of statements.
///
/// Works on tokens: a statement ends where automatic semicolon insertion
/// would end it, which is a line break before a token that cannot continue
/// the expression, a closing `}` or the end of the file.
pub struct Semi;

impl Rule for Semi {
    fn id(&self) -> &'static str {
        "semi"
    }

    fn meta(&self) -> RuleMeta {
        RuleMeta {
            rule_type: Some("layout".to_string()),
            docs: docs("Require or disallow semicolons instead of ASI", self.id()),
            fixable: Some("code".to_string()),
        }
    }

    fn check(&self, context: &RuleContext<'_>) -> Vec<Report> {
        match context.string_option() {
            Some("never") => check_never(context.source),
            _ => check_always(context.source),
        }
    }
}

fn check_always(source: &SourceCode) -> Vec<Report> {
    let mut reports = Vec::new();
    for (i, token) in source.tokens.iter().enumerate() {
        if !source.enclosing(i).holds_statements() || !can_end_statement(source, i, token) {
            continue;
        }

        let ends_here = match source.next(i) {
            None => true,
            Some(next) if next.is_punct("}") => true,
            Some(next) => next.newline_before && !continues_expression(next),
        };
        if ends_here {
            reports.push(
                Report::new("Missing semicolon.", token.end, token.end)
                    .with_fix(token.end, token.end, ";"),
            );
        }
    }
    reports
}

fn check_never(source: &SourceCode) -> Vec<Report> {
    let mut reports = Vec::new();
    for (i, token) in source.tokens.iter().enumerate() {
        if !token.is_punct(";") || !source.enclosing(i).holds_statements() {
            continue;
        }

        let removable = match source.next(i) {
            None => true,
            Some(next) if next.is_punct("}") => true,
            Some(next) => next.newline_before && !starts_continuation(next),
        };
        if removable {
            reports.push(
                Report::new("Extra semicolon.", token.start, token.end)
                    .with_fix(token.start, token.end, ""),
            );
        }
    }
    reports
}

fn can_end_statement(source: &SourceCode, index: usize, token: &Token) -> bool {
    match token.kind {
        TokenKind::Identifier
        | TokenKind::Number
        | TokenKind::String
        | TokenKind::Template
        | TokenKind::RegExp => {
            // `label:` and the name in `function f` or `class K` do not end anything
            !source.next(index).is_some_and(|next| next.is_punct(":"))
                && !source.prev(index).is_some_and(|prev| {
                    prev.is_keyword("function")
                        || prev.is_keyword("class")
                        || prev.is_keyword("extends")
                })
        }
        TokenKind::Keyword => matches!(
            token.value.as_str(),
            "this" | "null" | "true" | "false" | "super" | "break" | "continue" | "return"
                | "debugger"
        ),
        TokenKind::Punctuator => match token.value.as_str() {
            ")" => !source.is_header_close(index),
            "]" | "++" | "--" => true,
            _ => false,
        },
    }
}

/// Tokens that keep the previous line's expression going
fn continues_expression(next: &Token) -> bool {
    match next.kind {
        TokenKind::Punctuator => !matches!(
            next.value.as_str(),
            "{" | "}" | ";" | "++" | "--" | "!" | "~" | "@" | "#"
        ),
        TokenKind::Keyword => matches!(next.value.as_str(), "in" | "instanceof"),
        TokenKind::Template => true,
        _ => false,
    }
}

/// A line starting with one of these would join the previous statement if
/// its semicolon were removed
fn starts_continuation(next: &Token) -> bool {
    matches!(next.kind, TokenKind::Template | TokenKind::RegExp)
        || (next.kind == TokenKind::Punctuator
            && matches!(next.value.as_str(), "(" | "[" | "+" | "-" | "/" | "++" | "--"))
}
