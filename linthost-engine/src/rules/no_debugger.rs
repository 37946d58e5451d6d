use linthost_ipc::RuleMeta;

use super::{docs, Report, Rule, RuleContext};

pub struct NoDebugger;

impl Rule for NoDebugger {
    fn id(&self) -> &'static str {
        "no-debugger"
    }

    fn meta(&self) -> RuleMeta {
        RuleMeta {
            rule_type: Some("problem".to_string()),
            docs: docs("Disallow the use of `debugger`", self.id()),
            fixable: None,
        }
    }

    fn check(&self, context: &RuleContext<'_>) -> Vec<Report> {
        let source = context.source;
        source
            .tokens
            .iter()
            .enumerate()
            .filter(|(_, token)| token.is_keyword("debugger"))
            .map(|(i, token)| {
                let end = match source.next(i) {
                    Some(next) if next.is_punct(";") => next.end,
                    _ => token.end,
                };
                Report::new("Unexpected 'debugger' statement.", token.start, end)
            })
            .collect()
    }
}
