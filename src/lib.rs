//! whispera_core - deterministic core for Whispera voice commands
//!
//! A fine-tuned model turns speech into an intent; everything after that
//! is table-driven and lives here.
//!
//! Modules:
//! - intent: Intent records and model-output parsing
//! - shell: Target shell dialects and value quoting
//! - template: Command templates and phrasing patterns
//! - config: Validated configuration store (templates, patterns, samples, aliases)
//! - settings: Optional settings document and config directory lookup
//! - normalizer: Alias-based parameter canonicalization
//! - resolver: Intent to shell command resolution
//! - dataset: Training corpus generation and balancing
//! - alias_scan: Alias table regeneration from installed apps
//! - executor: Running resolved commands
//! - logging: Tracing subscriber setup

pub mod intent;
pub mod shell;
pub mod template;
pub mod config;
pub mod settings;
pub mod normalizer;
pub mod resolver;
pub mod dataset;
pub mod alias_scan;
pub mod executor;
pub mod logging;

// Re-export key types for convenience
pub use intent::{Intent, IntentError, OperationKey};

pub use shell::{QuoteContext, Shell};

pub use template::{CommandTemplate, Segment};

pub use config::{
    ConfigError, ConfigSources, ConfigStore, ConfigSummary, Inconsistency,
    LiteralExample, Operation, ParameterSpec, PatternDocument, SampleDocument,
};

pub use settings::{resolve_config_dir, Settings, ShellSetting};

pub use normalizer::ParameterNormalizer;

pub use resolver::{ResolveError, TemplateResolver};

pub use dataset::{Dataset, DatasetGenerator, GenerateError, GeneratorSettings, TrainingExample};

pub use alias_scan::AliasScanner;

pub use executor::{run_command, RunOpts, RunResult};
