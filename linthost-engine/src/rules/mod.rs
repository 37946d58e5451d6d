//! Bundled rules

use linthost_ipc::{FixEdit, RuleDocs, RuleMeta};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::source::SourceCode;

mod eqeqeq;
mod no_debugger;
mod no_undef;
mod semi;

pub use eqeqeq::Eqeqeq;
pub use no_debugger::NoDebugger;
pub use no_undef::NoUndef;
pub use semi::Semi;

/// A problem found by a rule, as byte offsets into the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub message: String,
    pub start: usize,
    pub end: usize,
    pub fix: Option<FixEdit>,
}

impl Report {
    pub fn new(message: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            message: message.into(),
            start,
            end,
            fix: None,
        }
    }

    pub fn with_fix(mut self, start: usize, end: usize, text: impl Into<String>) -> Self {
        self.fix = Some(FixEdit {
            range: [start, end],
            text: text.into(),
        });
        self
    }
}

/// What a rule sees besides the source
pub struct RuleContext<'a> {
    pub source: &'a SourceCode,
    /// Options following the severity in the rule setting
    pub options: &'a [JsonValue],
    /// Globals from config, env and `/* global */` comments
    pub globals: &'a BTreeMap<String, bool>,
}

impl RuleContext<'_> {
    /// First option as a string, e.g. `"never"` in `["error", "never"]`
    pub fn string_option(&self) -> Option<&str> {
        self.options.first().and_then(JsonValue::as_str)
    }

    /// Boolean field of the first option object
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.options
            .iter()
            .find_map(|option| option.get(name))
            .and_then(JsonValue::as_bool)
    }
}

pub trait Rule: Send + Sync {
    fn id(&self) -> &'static str;

    fn meta(&self) -> RuleMeta;

    fn check(&self, context: &RuleContext<'_>) -> Vec<Report>;
}

pub(crate) fn docs(description: &str, id: &str) -> Option<RuleDocs> {
    Some(RuleDocs {
        description: Some(description.to_string()),
        url: Some(format!("https://eslint.org/docs/latest/rules/{id}")),
    })
}

/// Every rule the bundled engine knows, by id
pub fn builtin_rules() -> BTreeMap<&'static str, Box<dyn Rule>> {
    let rules: Vec<Box<dyn Rule>> = vec![
        Box::new(NoUndef),
        Box::new(Semi),
        Box::new(NoDebugger),
        Box::new(Eqeqeq),
    ];
    rules.into_iter().map(|rule| (rule.id(), rule)).collect()
}
