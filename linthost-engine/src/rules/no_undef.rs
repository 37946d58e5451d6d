use linthost_ipc::RuleMeta;
use std::collections::HashSet;

use super::{docs, Report, Rule, RuleContext};
use crate::source::{Enclosing, SourceCode, Token, TokenKind};

/// Disallow references to names that are never declared.
///
/// Declarations are collected for the whole file regardless of scope, so a
/// name declared anywhere counts as declared everywhere. `{"typeof": true}`
/// also reports names used only as `typeof name`.
pub struct NoUndef;

/// Globals every ECMAScript environment provides
const BUILTIN_GLOBALS: &[&str] = &[
    "AggregateError", "Array", "ArrayBuffer", "Atomics", "BigInt", "BigInt64Array",
    "BigUint64Array", "Boolean", "DataView", "Date", "Error", "EvalError",
    "FinalizationRegistry", "Float32Array", "Float64Array", "Function", "Infinity",
    "Int16Array", "Int32Array", "Int8Array", "Intl", "JSON", "Map", "Math", "NaN", "Number",
    "Object", "Promise", "Proxy", "RangeError", "ReferenceError", "Reflect", "RegExp", "Set",
    "SharedArrayBuffer", "String", "Symbol", "SyntaxError", "TypeError", "URIError",
    "Uint16Array", "Uint32Array", "Uint8Array", "Uint8ClampedArray", "WeakMap", "WeakRef",
    "WeakSet", "arguments", "decodeURI", "decodeURIComponent", "encodeURI",
    "encodeURIComponent", "escape", "eval", "globalThis", "isFinite", "isNaN", "parseFloat",
    "parseInt", "undefined", "unescape",
];

/// Contextual keywords the tokenizer reads as identifiers
const CONTEXTUAL: &[&str] = &["as", "async", "from", "get", "meta", "of", "set", "target"];

impl Rule for NoUndef {
    fn id(&self) -> &'static str {
        "no-undef"
    }

    fn meta(&self) -> RuleMeta {
        RuleMeta {
            rule_type: Some("problem".to_string()),
            docs: docs(
                "Disallow the use of undeclared variables unless mentioned in `/*global */` comments",
                self.id(),
            ),
            fixable: None,
        }
    }

    fn check(&self, context: &RuleContext<'_>) -> Vec<Report> {
        let source = context.source;
        let check_typeof = context.flag("typeof").unwrap_or(false);
        let declared = collect_declarations(source);
        let comment_globals = collect_comment_globals(source);

        let mut reports = Vec::new();
        for (i, token) in source.tokens.iter().enumerate() {
            if token.kind != TokenKind::Identifier || !is_reference(source, i) {
                continue;
            }
            let name = token.value.as_str();
            if declared.contains(name)
                || comment_globals.contains(name)
                || BUILTIN_GLOBALS.contains(&name)
                || CONTEXTUAL.contains(&name)
                || context.globals.get(name).copied().unwrap_or(false)
            {
                continue;
            }
            if !check_typeof && source.prev(i).is_some_and(|t| t.is_keyword("typeof")) {
                continue;
            }
            reports.push(Report::new(
                format!("'{name}' is not defined."),
                token.start,
                token.end,
            ));
        }
        reports
    }
}

fn is_reference(source: &SourceCode, index: usize) -> bool {
    let prev = source.prev(index);
    let next = source.next(index);

    if prev.is_some_and(|t| t.is_punct(".") || t.is_punct("?.") || t.is_punct("#")) {
        return false;
    }
    if prev.is_some_and(|t| t.is_keyword("break") || t.is_keyword("continue")) {
        return false;
    }
    // `import { name as alias }`
    if next.is_some_and(|t| t.kind == TokenKind::Identifier && t.value == "as") {
        return false;
    }

    let enclosing = source.enclosing(index);
    let key_position = prev.map_or(true, |t| {
        t.is_punct("{")
            || t.is_punct(",")
            || t.is_punct(";")
            || t.is_punct("}")
            || t.is_keyword("static")
            || (t.kind == TokenKind::Identifier
                && matches!(t.value.as_str(), "get" | "set" | "async"))
    });
    let next_is = |value: &str| next.is_some_and(|t| t.is_punct(value));

    match enclosing {
        Enclosing::ClassBody if key_position => false,
        Enclosing::Object if key_position && (next_is(":") || next_is("(")) => false,
        // `label:` at the start of a statement
        e if e.holds_statements() && key_position && next_is(":") => false,
        _ => true,
    }
}

fn collect_declarations(source: &SourceCode) -> HashSet<String> {
    let tokens = &source.tokens;
    let mut declared = HashSet::new();

    for (i, token) in tokens.iter().enumerate() {
        match (token.kind, token.value.as_str()) {
            (TokenKind::Keyword, "var" | "let" | "const") => {
                collect_variable_declaration(tokens, i, &mut declared);
            }
            (TokenKind::Keyword, "function" | "class") => {
                let name = match tokens.get(i + 1) {
                    Some(t) if t.is_punct("*") => tokens.get(i + 2),
                    other => other,
                };
                if let Some(name) = name.filter(|t| t.kind == TokenKind::Identifier) {
                    declared.insert(name.value.clone());
                }
            }
            (TokenKind::Keyword, "import") => collect_import(tokens, i, &mut declared),
            (TokenKind::Punctuator, "(") => {
                let prev = source.prev(i);
                let control = prev.is_some_and(|t| {
                    t.kind == TokenKind::Keyword
                        && matches!(
                            t.value.as_str(),
                            "if" | "for" | "while" | "switch" | "with" | "await"
                        )
                });
                let is_params = prev.is_some_and(|t| t.is_keyword("catch"))
                    || matching_close(tokens, i).is_some_and(|close| {
                        (source.is_header_close(close) && !control)
                            || tokens.get(close + 1).is_some_and(|t| t.is_punct("=>"))
                    });
                if is_params {
                    if let Some(close) = matching_close(tokens, i) {
                        collect_pattern(tokens, i, close, &mut declared);
                    }
                }
            }
            (TokenKind::Identifier, _) => {
                // `x => ...`
                if tokens.get(i + 1).is_some_and(|t| t.is_punct("=>")) {
                    declared.insert(token.value.clone());
                }
            }
            _ => {}
        }
    }

    declared
}

/// Index of the bracket closing the one opened at `open`
fn matching_close(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        if token.kind != TokenKind::Punctuator {
            continue;
        }
        match token.value.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Names bound by a parameter list or destructuring pattern in `(open, close)`
fn collect_pattern(tokens: &[Token], open: usize, close: usize, declared: &mut HashSet<String>) {
    for i in open + 1..close {
        let token = &tokens[i];
        if token.kind != TokenKind::Identifier {
            continue;
        }
        let prev_binds = tokens[i - 1].kind == TokenKind::Punctuator
            && matches!(tokens[i - 1].value.as_str(), "(" | "," | "{" | "[" | "..." | ":");
        let next_ends = tokens.get(i + 1).is_some_and(|t| {
            t.kind == TokenKind::Punctuator
                && matches!(t.value.as_str(), "," | ")" | "}" | "]" | "=")
        });
        if prev_binds && next_ends {
            declared.insert(token.value.clone());
        }
    }
}

fn collect_variable_declaration(tokens: &[Token], keyword: usize, declared: &mut HashSet<String>) {
    let mut depth = 0isize;
    let mut in_initializer = false;
    let mut i = keyword + 1;

    while let Some(token) = tokens.get(i) {
        if depth == 0 && i > keyword + 1 && token.newline_before && !in_initializer {
            let prev = &tokens[i - 1];
            if !prev.is_punct(",") {
                break;
            }
        }

        if token.kind == TokenKind::Punctuator {
            match token.value.as_str() {
                "(" | "[" | "{" => {
                    let binding_position = depth == 0
                        && !in_initializer
                        && (i == keyword + 1 || tokens[i - 1].is_punct(","));
                    if binding_position && token.value != "(" {
                        if let Some(close) = matching_close(tokens, i) {
                            collect_pattern(tokens, i, close, declared);
                            i = close + 1;
                            continue;
                        }
                    }
                    depth += 1;
                }
                ")" | "]" | "}" => {
                    depth -= 1;
                    if depth < 0 {
                        break;
                    }
                }
                ";" if depth == 0 => break,
                "=" if depth == 0 => in_initializer = true,
                "," if depth == 0 => in_initializer = false,
                _ => {}
            }
        } else if depth == 0 && !in_initializer {
            let binding_position = i == keyword + 1 || tokens[i - 1].is_punct(",");
            if token.kind == TokenKind::Identifier && binding_position {
                declared.insert(token.value.clone());
            } else if token.is_keyword("in")
                || (token.kind == TokenKind::Identifier && token.value == "of")
            {
                break;
            }
        } else if depth == 0
            && in_initializer
            && token.newline_before
            && ends_value(&tokens[i - 1])
            && !matches!(token.kind, TokenKind::Punctuator)
        {
            break;
        }
        i += 1;
    }
}

fn ends_value(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::Identifier
            | TokenKind::Number
            | TokenKind::String
            | TokenKind::Template
            | TokenKind::RegExp
    ) || token.is_punct(")")
        || token.is_punct("]")
        || token.is_punct("}")
}

fn collect_import(tokens: &[Token], keyword: usize, declared: &mut HashSet<String>) {
    // `import(...)` and `import.meta` bind nothing
    if tokens
        .get(keyword + 1)
        .is_some_and(|t| t.is_punct("(") || t.is_punct("."))
    {
        return;
    }

    for i in keyword + 1..tokens.len() {
        let token = &tokens[i];
        if token.kind == TokenKind::String || token.is_punct(";") {
            break;
        }
        if token.kind != TokenKind::Identifier {
            continue;
        }
        if token.value == "from" {
            break;
        }
        let renamed = tokens
            .get(i + 1)
            .is_some_and(|t| t.kind == TokenKind::Identifier && t.value == "as");
        if token.value != "as" && !renamed {
            declared.insert(token.value.clone());
        }
    }
}

/// Names from `/* global a, b: writable */` comments
fn collect_comment_globals(source: &SourceCode) -> HashSet<String> {
    let mut names = HashSet::new();
    for comment in source.comments.iter().filter(|c| c.block) {
        let body = comment.value.trim();
        let Some(list) = body
            .strip_prefix("globals ")
            .or_else(|| body.strip_prefix("global "))
        else {
            continue;
        };
        for entry in list.split(',') {
            let mut parts = entry.splitn(2, ':');
            let name = parts.next().unwrap_or_default().trim();
            let value = parts.next().map(str::trim).unwrap_or("readonly");
            if !name.is_empty() && value != "off" {
                names.insert(name.to_string());
            }
        }
    }
    names
}
