//! Template resolution: intent in, shell command out
//!
//! Resolution is pure. It reads the immutable [`ConfigStore`], never runs
//! anything, and yields byte-identical output for identical input, so
//! dry-run and execute modes share one code path.

use std::collections::BTreeMap;
use tracing::debug;

use crate::config::ConfigStore;
use crate::intent::Intent;
use crate::normalizer::ParameterNormalizer;

/// Per-command resolution failures, recoverable at the call site
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("command not recognized: {category}/{operation}")]
    UnknownOperation { category: String, operation: String },
    #[error("missing parameter '{name}'")]
    MissingParameter { name: String },
}

pub struct TemplateResolver<'a> {
    config: &'a ConfigStore,
    normalizer: ParameterNormalizer<'a>,
}

impl<'a> TemplateResolver<'a> {
    pub fn new(config: &'a ConfigStore) -> Self {
        Self {
            config,
            normalizer: ParameterNormalizer::new(config),
        }
    }

    pub fn resolve_intent(&self, intent: &Intent) -> Result<String, ResolveError> {
        self.resolve(&intent.category, &intent.operation, &intent.parameters)
    }

    /// Build the command for `(category, operation)` from raw slot values.
    ///
    /// Every placeholder must be present; values are normalized, then quoted
    /// for their position in the template. Parameters the template does not
    /// use are ignored.
    pub fn resolve(
        &self,
        category: &str,
        operation: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<String, ResolveError> {
        let template = self
            .config
            .template_for(category, operation)
            .ok_or_else(|| ResolveError::UnknownOperation {
                category: category.to_string(),
                operation: operation.to_string(),
            })?;

        let mut values = BTreeMap::new();
        for name in template.placeholders() {
            let raw = parameters
                .get(name)
                .ok_or_else(|| ResolveError::MissingParameter {
                    name: name.to_string(),
                })?;
            values.insert(name.to_string(), self.normalizer.normalize_parameter(name, raw));
        }

        for name in parameters.keys().filter(|n| !values.contains_key(*n)) {
            debug!(category, operation, parameter = %name, "ignoring unused parameter");
        }

        let command = template
            .substitute(self.config.shell(), &values)
            .map_err(|name| ResolveError::MissingParameter { name })?;

        debug!(category, operation, command = %command, "resolved");
        Ok(command)
    }
}
