//! Configuration store for whispera_core
//!
//! Templates, phrasing patterns and sample pools are three independently
//! edited documents that together describe one schema. They are loaded
//! together into a single validated [`ConfigStore`]; every cross-document
//! check runs here, once, so lookups on the hot path never re-validate.
//!
//! Documents live in one directory and may be YAML or JSON:
//! `templates`, `patterns`, `samples`, and the optional `aliases`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::intent::{Intent, OperationKey};
use crate::shell::Shell;
use crate::template::{pattern_placeholders, CommandTemplate};

/// `category -> operation -> command template`
pub type TemplateTable = BTreeMap<String, BTreeMap<String, String>>;

/// `kind -> raw name -> canonical value`
pub type AliasTable = BTreeMap<String, BTreeMap<String, String>>;

/// The `patterns` document
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PatternDocument {
    /// `category -> operation -> phrasing patterns`
    #[serde(default)]
    pub operations: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    /// Hand-written examples (typos, casual phrasing) added verbatim
    #[serde(default)]
    pub literals: Vec<LiteralExample>,
}

/// A fixed training pair authored directly in the patterns document
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LiteralExample {
    pub text: String,
    pub intent: Intent,
}

/// The `samples` document
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SampleDocument {
    /// Named pools of raw sample values
    #[serde(default)]
    pub pools: BTreeMap<String, Vec<String>>,
    /// Per-placeholder declarations
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSpec>,
}

/// How a placeholder is fed during generation and normalized at resolution
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ParameterSpec {
    /// Sample pool used by the generator (defaults to a pool named like the placeholder)
    pub pool: Option<String>,
    /// Alias kind consulted by the normalizer
    pub kind: Option<String>,
    /// Integer clamp applied after alias lookup
    pub range: Option<ValueRange>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValueRange {
    pub min: i64,
    pub max: i64,
}

/// Raw documents, before validation
#[derive(Clone, Debug, Default)]
pub struct ConfigSources {
    pub templates: TemplateTable,
    pub patterns: PatternDocument,
    pub samples: SampleDocument,
    pub aliases: AliasTable,
}

impl ConfigSources {
    /// Read all documents from `dir`. The alias document is optional.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let required = |name: &'static str| {
            find_document(dir, name).ok_or_else(|| ConfigError::MissingDocument {
                name,
                dir: dir.to_path_buf(),
            })
        };

        let templates = read_document(&required("templates")?)?;
        let patterns = read_document(&required("patterns")?)?;
        let samples = read_document(&required("samples")?)?;
        let aliases = match find_document(dir, "aliases") {
            Some(path) => read_document(&path)?,
            None => AliasTable::new(),
        };

        Ok(Self {
            templates,
            patterns,
            samples,
            aliases,
        })
    }
}

/// One configured operation
#[derive(Clone, Debug)]
pub struct Operation {
    pub key: OperationKey,
    pub template: CommandTemplate,
    pub patterns: Vec<String>,
}

/// Validated, immutable configuration
#[derive(Clone, Debug)]
pub struct ConfigStore {
    shell: Shell,
    operations: BTreeMap<OperationKey, Operation>,
    pools: BTreeMap<String, Vec<String>>,
    parameters: BTreeMap<String, ParameterSpec>,
    aliases: AliasTable,
    literals: Vec<LiteralExample>,
}

/// Counts reported by `whispera_cli check`
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ConfigSummary {
    pub categories: usize,
    pub operations: usize,
    pub patterns: usize,
    pub pools: usize,
    pub literals: usize,
    pub alias_kinds: usize,
    pub aliases: usize,
}

impl ConfigStore {
    /// Validate `sources` and build the store.
    ///
    /// Templates are parsed for `shell`, which fixes the quoting context of
    /// every placeholder.
    pub fn load(sources: ConfigSources, shell: Shell) -> Result<Self, ConfigError> {
        let ConfigSources {
            templates,
            patterns,
            samples,
            aliases,
        } = sources;

        let template_keys = flatten_keys(&templates)?;
        let pattern_keys = flatten_keys(&patterns.operations)?;

        let mut operations = BTreeMap::new();
        for key in template_keys.union(&pattern_keys) {
            let source = templates
                .get(&key.category)
                .and_then(|ops| ops.get(&key.operation))
                .ok_or_else(|| ConfigError::inconsistency(key, Inconsistency::MissingTemplate))?;
            let op_patterns = patterns
                .operations
                .get(&key.category)
                .and_then(|ops| ops.get(&key.operation))
                .filter(|p| !p.is_empty())
                .ok_or_else(|| ConfigError::inconsistency(key, Inconsistency::MissingPatterns))?;

            let template = CommandTemplate::parse(source, shell);
            let expected: BTreeSet<String> =
                template.placeholders().into_iter().map(String::from).collect();

            for pattern in op_patterns {
                let found: BTreeSet<String> = pattern_placeholders(pattern).into_iter().collect();
                check_placeholder_sets(key, pattern, &expected, &found)?;
            }

            for name in &expected {
                check_pool(key, name, &samples)?;
            }

            debug!(
                operation = %key,
                template = %source,
                patterns = op_patterns.len(),
                "validated operation"
            );
            operations.insert(
                key.clone(),
                Operation {
                    key: key.clone(),
                    template,
                    patterns: op_patterns.clone(),
                },
            );
        }

        for literal in &patterns.literals {
            let key = literal.intent.key();
            let op = operations.get(&key).ok_or_else(|| {
                ConfigError::inconsistency(
                    &key,
                    Inconsistency::OrphanLiteral {
                        text: literal.text.clone(),
                    },
                )
            })?;
            let expected: BTreeSet<String> =
                op.template.placeholders().into_iter().map(String::from).collect();
            let found: BTreeSet<String> = literal.intent.parameters.keys().cloned().collect();
            check_placeholder_sets(&key, &literal.text, &expected, &found)?;
        }

        let aliases = normalize_alias_keys(aliases);

        let store = Self {
            shell,
            operations,
            pools: samples.pools,
            parameters: samples.parameters,
            aliases,
            literals: patterns.literals,
        };

        let summary = store.summary();
        info!(
            operations = summary.operations,
            patterns = summary.patterns,
            pools = summary.pools,
            aliases = summary.aliases,
            "configuration loaded"
        );

        Ok(store)
    }

    /// Read and validate every document in `dir`
    pub fn load_dir(dir: impl AsRef<Path>, shell: Shell) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        info!(dir = %dir.display(), "loading configuration");
        Self::load(ConfigSources::from_dir(dir)?, shell)
    }

    pub fn shell(&self) -> Shell {
        self.shell
    }

    pub fn operation(&self, category: &str, operation: &str) -> Option<&Operation> {
        self.operations.get(&OperationKey::new(category, operation))
    }

    /// All operations in key order
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }

    pub fn template_for(&self, category: &str, operation: &str) -> Option<&CommandTemplate> {
        self.operation(category, operation).map(|op| &op.template)
    }

    pub fn patterns_for(&self, category: &str, operation: &str) -> Option<&[String]> {
        self.operation(category, operation).map(|op| op.patterns.as_slice())
    }

    pub fn samples_for(&self, pool: &str) -> Option<&[String]> {
        self.pools.get(pool).map(Vec::as_slice)
    }

    /// Exact lookup; `raw_name` must already be an alias key (see [`alias_key`])
    pub fn alias(&self, kind: &str, raw_name: &str) -> Option<&str> {
        self.aliases
            .get(kind)
            .and_then(|names| names.get(raw_name))
            .map(String::as_str)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.get(name)
    }

    /// Pool the generator draws `name` from: declared, or the same-named pool
    pub fn pool_name_for<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        pool_name_for(name, &self.parameters, &self.pools)
    }

    pub fn literals(&self) -> &[LiteralExample] {
        &self.literals
    }

    pub fn summary(&self) -> ConfigSummary {
        let categories: BTreeSet<&str> = self
            .operations
            .keys()
            .map(|k| k.category.as_str())
            .collect();
        ConfigSummary {
            categories: categories.len(),
            operations: self.operations.len(),
            patterns: self.operations.values().map(|op| op.patterns.len()).sum(),
            pools: self.pools.len(),
            literals: self.literals.len(),
            alias_kinds: self.aliases.len(),
            aliases: self.aliases.values().map(BTreeMap::len).sum(),
        }
    }
}

/// Key form used for alias lookups: trimmed and lowercased
pub fn alias_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn normalize_alias_keys(aliases: AliasTable) -> AliasTable {
    aliases
        .into_iter()
        .map(|(kind, names)| {
            let names = names
                .into_iter()
                .map(|(raw, canonical)| (alias_key(&raw), canonical))
                .collect();
            (kind, names)
        })
        .collect()
}

fn flatten_keys<T>(
    table: &BTreeMap<String, BTreeMap<String, T>>,
) -> Result<BTreeSet<OperationKey>, ConfigError> {
    let mut keys = BTreeSet::new();
    for (category, ops) in table {
        for operation in ops.keys() {
            let key = OperationKey::new(category.clone(), operation.clone());
            for name in [category, operation] {
                if !is_identifier(name) {
                    return Err(ConfigError::inconsistency(
                        &key,
                        Inconsistency::InvalidName { name: name.clone() },
                    ));
                }
            }
            keys.insert(key);
        }
    }
    Ok(keys)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('a'..='z'))
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn check_placeholder_sets(
    key: &OperationKey,
    pattern: &str,
    expected: &BTreeSet<String>,
    found: &BTreeSet<String>,
) -> Result<(), ConfigError> {
    if expected == found {
        return Ok(());
    }
    Err(ConfigError::inconsistency(
        key,
        Inconsistency::PlaceholderMismatch {
            pattern: pattern.to_string(),
            missing: expected.difference(found).cloned().collect(),
            unexpected: found.difference(expected).cloned().collect(),
        },
    ))
}

fn pool_name_for<'a>(
    name: &'a str,
    parameters: &'a BTreeMap<String, ParameterSpec>,
    pools: &BTreeMap<String, Vec<String>>,
) -> Option<&'a str> {
    match parameters.get(name).and_then(|p| p.pool.as_deref()) {
        Some(pool) => Some(pool),
        None if pools.contains_key(name) => Some(name),
        None => None,
    }
}

/// A placeholder whose pool is declared (or implied by name) must have values.
/// Placeholders with no pool at all only fail at generation time.
fn check_pool(key: &OperationKey, name: &str, samples: &SampleDocument) -> Result<(), ConfigError> {
    let Some(pool) = pool_name_for(name, &samples.parameters, &samples.pools) else {
        return Ok(());
    };
    match samples.pools.get(pool) {
        None => Err(ConfigError::inconsistency(
            key,
            Inconsistency::UnknownPool {
                parameter: name.to_string(),
                pool: pool.to_string(),
            },
        )),
        Some(values) if values.is_empty() => Err(ConfigError::inconsistency(
            key,
            Inconsistency::EmptyPool {
                parameter: name.to_string(),
                pool: pool.to_string(),
            },
        )),
        Some(_) => Ok(()),
    }
}

/// Find `<name>.yaml`, `<name>.yml` or `<name>.json` in `dir`
pub(crate) fn find_document(dir: &Path, name: &str) -> Option<PathBuf> {
    ["yaml", "yml", "json"]
        .iter()
        .map(|ext| dir.join(format!("{}.{}", name, ext)))
        .find(|path| path.is_file())
}

pub(crate) fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed = if path.extension().map(|e| e == "json").unwrap_or(false) {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Configuration errors. All are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("no '{name}' document (.yaml, .yml or .json) in {}", dir.display())]
    MissingDocument { name: &'static str, dir: PathBuf },
    #[error("configuration inconsistency at {key}: {problem}")]
    Inconsistency {
        key: OperationKey,
        problem: Inconsistency,
    },
}

impl ConfigError {
    fn inconsistency(key: &OperationKey, problem: Inconsistency) -> Self {
        ConfigError::Inconsistency {
            key: key.clone(),
            problem,
        }
    }
}

/// What is wrong with an operation's configuration
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Inconsistency {
    #[error("patterns are declared but no template exists")]
    MissingTemplate,
    #[error("a template exists but no patterns are declared")]
    MissingPatterns,
    #[error("'{pattern}' does not match the template's placeholders (missing {missing:?}, unexpected {unexpected:?})")]
    PlaceholderMismatch {
        pattern: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    #[error("parameter '{parameter}' uses pool '{pool}', which does not exist")]
    UnknownPool { parameter: String, pool: String },
    #[error("parameter '{parameter}' uses pool '{pool}', which is empty")]
    EmptyPool { parameter: String, pool: String },
    #[error("'{name}' is not a lowercase identifier")]
    InvalidName { name: String },
    #[error("literal example '{text}' targets an unknown operation")]
    OrphanLiteral { text: String },
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn table<T: Clone>(entries: &[(&str, &str, T)]) -> BTreeMap<String, BTreeMap<String, T>> {
        let mut out: BTreeMap<String, BTreeMap<String, T>> = BTreeMap::new();
        for (category, operation, value) in entries {
            out.entry(category.to_string())
                .or_default()
                .insert(operation.to_string(), value.clone());
        }
        out
    }

    /// Small configuration shared by the module tests across the crate
    pub(crate) fn sample_sources() -> ConfigSources {
        let templates = table(&[
            ("apps", "open", r#"open -a "{app}""#.to_string()),
            ("git", "commit", r#"git commit -m "{message}""#.to_string()),
            ("git", "status", "git status".to_string()),
            ("volume", "set", "osascript -e 'set volume output volume {level}'".to_string()),
        ]);
        let operations = table(&[
            ("apps", "open", vec!["open {app}".to_string(), "launch {app}".to_string()]),
            ("git", "commit", vec!["commit with message {message}".to_string()]),
            ("git", "status", vec!["git status".to_string(), "what changed".to_string()]),
            ("volume", "set", vec!["set volume to {level}".to_string()]),
        ]);

        let mut pools = BTreeMap::new();
        pools.insert(
            "apps".to_string(),
            vec!["chrome".to_string(), "safari".to_string(), "slack".to_string()],
        );
        pools.insert("message".to_string(), vec!["fix bug".to_string(), "wip".to_string()]);
        pools.insert(
            "levels".to_string(),
            vec!["25".to_string(), "50".to_string(), "half".to_string()],
        );

        let mut parameters = BTreeMap::new();
        parameters.insert(
            "app".to_string(),
            ParameterSpec {
                pool: Some("apps".into()),
                kind: Some("apps".into()),
                range: None,
            },
        );
        parameters.insert(
            "level".to_string(),
            ParameterSpec {
                pool: Some("levels".into()),
                kind: Some("levels".into()),
                range: Some(ValueRange { min: 0, max: 100 }),
            },
        );

        let mut aliases = AliasTable::new();
        aliases
            .entry("apps".to_string())
            .or_default()
            .insert("Chrome".to_string(), "Google Chrome".to_string());
        aliases
            .entry("levels".to_string())
            .or_default()
            .insert("half".to_string(), "50".to_string());

        ConfigSources {
            templates,
            patterns: PatternDocument {
                operations,
                literals: vec![LiteralExample {
                    text: "oepn chrome".into(),
                    intent: Intent::new("apps", "open").with_param("app", "chrome"),
                }],
            },
            samples: SampleDocument { pools, parameters },
            aliases,
        }
    }

    fn expect_inconsistency(sources: ConfigSources) -> (OperationKey, Inconsistency) {
        match ConfigStore::load(sources, Shell::Posix) {
            Err(ConfigError::Inconsistency { key, problem }) => (key, problem),
            other => panic!("expected inconsistency, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_load_valid_config() {
        let store = ConfigStore::load(sample_sources(), Shell::Posix).unwrap();
        let summary = store.summary();
        assert_eq!(summary.categories, 3);
        assert_eq!(summary.operations, 4);
        assert_eq!(summary.patterns, 6);
        assert_eq!(summary.literals, 1);
        assert_eq!(store.template_for("apps", "open").unwrap().source(), r#"open -a "{app}""#);
        assert_eq!(store.patterns_for("git", "status").unwrap().len(), 2);
        assert!(store.template_for("apps", "close").is_none());
        assert!(store.samples_for("nope").is_none());
    }

    #[test]
    fn test_alias_keys_are_normalized() {
        let store = ConfigStore::load(sample_sources(), Shell::Posix).unwrap();
        assert_eq!(store.alias("apps", "chrome"), Some("Google Chrome"));
        assert_eq!(store.alias("apps", "Chrome"), None);
        assert_eq!(store.alias("packages", "chrome"), None);
    }

    #[test]
    fn test_missing_template() {
        let mut sources = sample_sources();
        sources.templates.get_mut("git").unwrap().remove("status");
        let (key, problem) = expect_inconsistency(sources);
        assert_eq!(key, OperationKey::new("git", "status"));
        assert_eq!(problem, Inconsistency::MissingTemplate);
    }

    #[test]
    fn test_missing_pattern_set() {
        let mut sources = sample_sources();
        sources.patterns.operations.get_mut("git").unwrap().remove("commit");
        let (key, problem) = expect_inconsistency(sources);
        assert_eq!(key, OperationKey::new("git", "commit"));
        assert_eq!(problem, Inconsistency::MissingPatterns);
    }

    #[test]
    fn test_empty_pattern_list_is_missing() {
        let mut sources = sample_sources();
        sources.patterns.operations.get_mut("git").unwrap().insert("status".into(), vec![]);
        let (_, problem) = expect_inconsistency(sources);
        assert_eq!(problem, Inconsistency::MissingPatterns);
    }

    #[test]
    fn test_placeholder_mismatch_both_directions() {
        let mut sources = sample_sources();
        sources
            .patterns
            .operations
            .get_mut("apps")
            .unwrap()
            .insert("open".into(), vec!["open {application}".into()]);
        let (key, problem) = expect_inconsistency(sources);
        assert_eq!(key, OperationKey::new("apps", "open"));
        assert_eq!(
            problem,
            Inconsistency::PlaceholderMismatch {
                pattern: "open {application}".into(),
                missing: vec!["app".into()],
                unexpected: vec!["application".into()],
            }
        );
    }

    #[test]
    fn test_pattern_missing_one_placeholder() {
        let mut sources = sample_sources();
        sources
            .patterns
            .operations
            .get_mut("apps")
            .unwrap()
            .insert("open".into(), vec!["open {app}".into(), "open it".into()]);
        let (_, problem) = expect_inconsistency(sources);
        assert!(matches!(
            problem,
            Inconsistency::PlaceholderMismatch { pattern, .. } if pattern == "open it"
        ));
    }

    #[test]
    fn test_empty_pool_rejected() {
        let mut sources = sample_sources();
        sources.samples.pools.insert("apps".into(), vec![]);
        let (key, problem) = expect_inconsistency(sources);
        assert_eq!(key, OperationKey::new("apps", "open"));
        assert_eq!(
            problem,
            Inconsistency::EmptyPool {
                parameter: "app".into(),
                pool: "apps".into()
            }
        );
    }

    #[test]
    fn test_unknown_pool_rejected() {
        let mut sources = sample_sources();
        sources.samples.pools.remove("levels");
        let (_, problem) = expect_inconsistency(sources);
        assert!(matches!(problem, Inconsistency::UnknownPool { pool, .. } if pool == "levels"));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut sources = sample_sources();
        let ops = sources.templates.remove("git").unwrap();
        sources.templates.insert("Git".into(), ops);
        let (_, problem) = expect_inconsistency(sources);
        assert_eq!(problem, Inconsistency::InvalidName { name: "Git".into() });
    }

    #[test]
    fn test_orphan_literal_rejected() {
        let mut sources = sample_sources();
        sources.patterns.literals.push(LiteralExample {
            text: "plz mute".into(),
            intent: Intent::new("volume", "mute"),
        });
        let (key, problem) = expect_inconsistency(sources);
        assert_eq!(key, OperationKey::new("volume", "mute"));
        assert!(matches!(problem, Inconsistency::OrphanLiteral { .. }));
    }

    #[test]
    fn test_literal_parameters_must_match_template() {
        let mut sources = sample_sources();
        sources.patterns.literals.push(LiteralExample {
            text: "open".into(),
            intent: Intent::new("apps", "open"),
        });
        let (_, problem) = expect_inconsistency(sources);
        assert!(matches!(problem, Inconsistency::PlaceholderMismatch { .. }));
    }

    #[test]
    fn test_pool_name_resolution() {
        let store = ConfigStore::load(sample_sources(), Shell::Posix).unwrap();
        assert_eq!(store.pool_name_for("app"), Some("apps"));
        assert_eq!(store.pool_name_for("message"), Some("message"));
        assert_eq!(store.pool_name_for("branch"), None);
    }

    #[test]
    fn test_load_dir_mixed_formats() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("templates.yaml"), "git:\n  status: git status\n").unwrap();
        fs::write(
            dir.path().join("patterns.json"),
            r#"{"operations": {"git": {"status": ["git status"]}}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("samples.yml"), "pools: {}\n").unwrap();

        let store = ConfigStore::load_dir(dir.path(), Shell::Posix).unwrap();
        assert_eq!(store.summary().operations, 1);
        assert_eq!(store.summary().aliases, 0);
    }

    #[test]
    fn test_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigStore::load_dir(dir.path(), Shell::Posix).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDocument { name: "templates", .. }));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("templates.yaml"), "git: [unclosed\n").unwrap();
        fs::write(dir.path().join("patterns.yaml"), "operations: {}\n").unwrap();
        fs::write(dir.path().join("samples.yaml"), "pools: {}\n").unwrap();
        let err = ConfigStore::load_dir(dir.path(), Shell::Posix).unwrap_err();
        assert!(err.to_string().contains("templates.yaml"));
    }
}
