//! Settings forwarded to workers with each job

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use linthost_ipc::LintConfig;

impl Validatable for LintConfig {
    fn validate(&self) -> ConfigResult<()> {
        let advanced = &self.advanced;
        for rule in advanced
            .rules_to_disable_while_typing
            .iter()
            .chain(&advanced.rules_to_disable_while_fixing)
        {
            validate_required_string(rule, "rule name", self.domain_name())?;
        }

        if let Some(path) = &self.engine_location.override_config_file {
            if path.file_name().is_none() {
                return Err(self.validation_error(format!(
                    "override_config_file {} does not name a file",
                    path.display()
                )));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "lint"
    }
}
