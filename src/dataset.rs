//! Training corpus generation
//!
//! Expands every operation's phrasing patterns against its sample pools,
//! balances the per-operation counts, shuffles, and writes chat-format
//! JSONL for the fine-tuning job. Targets always carry the raw sample
//! value; aliases are never consulted here.
//!
//! Runs are reproducible: each operation draws from its own random stream
//! derived from the configured seed and the operation key, so the result
//! does not depend on iteration order.

use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{ConfigStore, Operation};
use crate::intent::{Intent, OperationKey};
use crate::template::{pattern_placeholders, render_pattern};

/// Knobs for one generation run
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Seed for sampling, balancing and shuffling
    pub seed: u64,
    /// Most examples one pattern may yield; larger cross-products are sampled
    pub max_per_pattern: usize,
    /// Operations with fewer examples are up-sampled to this count
    pub min_per_operation: usize,
    /// Largest allowed ratio between any two operations' counts; `None` disables down-sampling
    pub max_imbalance: Option<f64>,
    /// Share of the shuffled corpus written to `valid.jsonl`
    pub validation_fraction: f64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            max_per_pattern: 50,
            min_per_operation: 20,
            max_imbalance: Some(4.0),
            validation_fraction: 0.1,
        }
    }
}

impl GeneratorSettings {
    fn validate(&self) -> Result<(), GenerateError> {
        if self.max_per_pattern == 0 {
            return Err(GenerateError::InvalidSettings(
                "max_per_pattern must be at least 1".into(),
            ));
        }
        if let Some(ratio) = self.max_imbalance {
            if !(ratio >= 1.0) {
                return Err(GenerateError::InvalidSettings(format!(
                    "max_imbalance must be >= 1.0, got {}",
                    ratio
                )));
            }
        }
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return Err(GenerateError::InvalidSettings(format!(
                "validation_fraction must be in [0, 1), got {}",
                self.validation_fraction
            )));
        }
        Ok(())
    }
}

/// One (text, intent) training pair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrainingExample {
    pub text: String,
    pub intent: Intent,
}

/// Chat-format record, one per JSONL line
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRecord {
    pub messages: Vec<ChatMessage>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl TrainingExample {
    pub fn to_record(&self) -> ChatRecord {
        ChatRecord {
            messages: vec![
                ChatMessage {
                    role: "user".into(),
                    content: self.text.clone(),
                },
                ChatMessage {
                    role: "assistant".into(),
                    content: self.intent.to_json(),
                },
            ],
        }
    }
}

/// Per-operation counts before and after balancing
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct OperationCounts {
    pub generated: usize,
    pub balanced: usize,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct GenerationReport {
    pub operations: BTreeMap<String, OperationCounts>,
    pub total: usize,
}

/// Shuffled, balanced examples plus the report describing them
#[derive(Clone, Debug)]
pub struct Dataset {
    pub examples: Vec<TrainingExample>,
    pub report: GenerationReport,
}

/// Paths written by [`Dataset::write_corpus`]
#[derive(Clone, Debug)]
pub struct CorpusFiles {
    pub train: PathBuf,
    pub train_count: usize,
    pub valid: PathBuf,
    pub valid_count: usize,
}

impl Dataset {
    /// Split into (train, valid); the validation share is taken from the end
    pub fn split(&self, validation_fraction: f64) -> (&[TrainingExample], &[TrainingExample]) {
        let valid_len = ((self.examples.len() as f64) * validation_fraction).round() as usize;
        let split_at = self.examples.len() - valid_len.min(self.examples.len());
        self.examples.split_at(split_at)
    }

    /// Write `train.jsonl` and `valid.jsonl` into `dir`
    pub fn write_corpus(
        &self,
        dir: impl AsRef<Path>,
        validation_fraction: f64,
    ) -> Result<CorpusFiles, GenerateError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| GenerateError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let (train, valid) = self.split(validation_fraction);
        let train_path = dir.join("train.jsonl");
        let valid_path = dir.join("valid.jsonl");
        write_jsonl(&train_path, train)?;
        write_jsonl(&valid_path, valid)?;

        info!(train = train.len(), valid = valid.len(), dir = %dir.display(), "corpus written");
        Ok(CorpusFiles {
            train: train_path,
            train_count: train.len(),
            valid: valid_path,
            valid_count: valid.len(),
        })
    }
}

fn write_jsonl(path: &Path, examples: &[TrainingExample]) -> Result<(), GenerateError> {
    let io_err = |source| GenerateError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    for example in examples {
        let line = serde_json::to_string(&example.to_record())
            .map_err(|e| GenerateError::Io {
                path: path.to_path_buf(),
                source: e.into(),
            })?;
        writeln!(writer, "{}", line).map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}

pub struct DatasetGenerator<'a> {
    config: &'a ConfigStore,
    settings: GeneratorSettings,
}

impl<'a> DatasetGenerator<'a> {
    pub fn new(config: &'a ConfigStore, settings: GeneratorSettings) -> Self {
        Self { config, settings }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Expand, balance and shuffle the whole configuration
    pub fn generate(&self) -> Result<Dataset, GenerateError> {
        self.settings.validate()?;

        let mut buckets: BTreeMap<OperationKey, Vec<TrainingExample>> = BTreeMap::new();
        for op in self.config.operations() {
            let examples = self.expand_operation(op)?;
            debug!(operation = %op.key, examples = examples.len(), "expanded patterns");
            buckets.insert(op.key.clone(), examples);
        }

        for literal in self.config.literals() {
            if let Some(bucket) = buckets.get_mut(&literal.intent.key()) {
                bucket.push(TrainingExample {
                    text: literal.text.clone(),
                    intent: literal.intent.clone(),
                });
            }
        }

        let mut report = GenerationReport::default();
        for (key, examples) in &buckets {
            report.operations.insert(
                key.to_string(),
                OperationCounts {
                    generated: examples.len(),
                    balanced: 0,
                },
            );
        }

        self.balance(&mut buckets);

        for (key, examples) in &buckets {
            if let Some(counts) = report.operations.get_mut(&key.to_string()) {
                counts.balanced = examples.len();
            }
        }

        let mut examples: Vec<TrainingExample> = buckets.into_values().flatten().collect();
        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        examples.shuffle(&mut rng);

        report.total = examples.len();
        info!(
            operations = report.operations.len(),
            examples = report.total,
            seed = self.settings.seed,
            "dataset generated"
        );

        Ok(Dataset { examples, report })
    }

    fn expand_operation(&self, op: &Operation) -> Result<Vec<TrainingExample>, GenerateError> {
        let mut rng = StdRng::seed_from_u64(stream_seed(self.settings.seed, &op.key));
        let mut examples = Vec::new();

        for pattern in &op.patterns {
            let names = pattern_placeholders(pattern);
            let mut pools: Vec<&[String]> = Vec::with_capacity(names.len());
            for name in &names {
                let pool = self
                    .config
                    .pool_name_for(name)
                    .and_then(|pool| self.config.samples_for(pool))
                    .filter(|values| !values.is_empty())
                    .ok_or_else(|| GenerateError::MissingSamplePool {
                        key: op.key.clone(),
                        parameter: name.clone(),
                    })?;
                pools.push(pool);
            }

            let sizes: Vec<usize> = pools.iter().map(|p| p.len()).collect();
            for combo in combinations(&sizes, self.settings.max_per_pattern, &mut rng) {
                let parameters: BTreeMap<String, String> = names
                    .iter()
                    .zip(combo.iter().zip(&pools))
                    .map(|(name, (&i, pool))| (name.clone(), pool[i].clone()))
                    .collect();
                examples.push(TrainingExample {
                    text: render_pattern(pattern, &parameters),
                    intent: Intent {
                        category: op.key.category.clone(),
                        operation: op.key.operation.clone(),
                        parameters,
                    },
                });
            }
        }

        Ok(examples)
    }

    /// Raise every operation to the floor by cycling its own examples, then
    /// cap every operation at `max_imbalance` times the smallest count.
    fn balance(&self, buckets: &mut BTreeMap<OperationKey, Vec<TrainingExample>>) {
        let floor = self.settings.min_per_operation;
        for (key, examples) in buckets.iter_mut() {
            let distinct = examples.len();
            if distinct == 0 || distinct >= floor {
                continue;
            }
            // Each phrasing is repeated once before any is repeated twice.
            for i in 0..(floor - distinct) {
                let copy = examples[i % distinct].clone();
                examples.push(copy);
            }
            debug!(operation = %key, from = distinct, to = floor, "up-sampled");
        }

        let Some(ratio) = self.settings.max_imbalance else {
            return;
        };
        let Some(smallest) = buckets.values().map(Vec::len).filter(|&n| n > 0).min() else {
            return;
        };
        let ceiling = ((smallest as f64) * ratio).floor() as usize;

        for (key, examples) in buckets.iter_mut() {
            if examples.len() <= ceiling {
                continue;
            }
            let mut rng = StdRng::seed_from_u64(stream_seed(!self.settings.seed, key));
            let mut keep = index::sample(&mut rng, examples.len(), ceiling).into_vec();
            keep.sort_unstable();
            debug!(operation = %key, from = examples.len(), to = ceiling, "down-sampled");
            *examples = keep.into_iter().map(|i| examples[i].clone()).collect();
        }
    }
}

/// Index tuples into pools of the given sizes.
///
/// The full cross-product (in odometer order) when it fits in `cap`;
/// otherwise `cap` distinct tuples sampled with `rng`, in index order.
fn combinations(sizes: &[usize], cap: usize, rng: &mut StdRng) -> Vec<Vec<usize>> {
    let total = sizes.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n));

    match total {
        Some(total) if total <= cap => (0..total).map(|i| decode(i, sizes)).collect(),
        Some(total) => {
            let mut picked = index::sample(rng, total, cap).into_vec();
            picked.sort_unstable();
            picked.into_iter().map(|i| decode(i, sizes)).collect()
        }
        // Cross-product too large to index; draw each slot independently.
        None => {
            let mut seen = BTreeSet::new();
            for _ in 0..cap {
                let combo: Vec<usize> = sizes.iter().map(|&n| rng.gen_range(0..n)).collect();
                seen.insert(combo);
            }
            seen.into_iter().collect()
        }
    }
}

/// Mixed-radix decode; the first slot is the most significant
fn decode(mut index: usize, sizes: &[usize]) -> Vec<usize> {
    let mut digits = vec![0; sizes.len()];
    for (slot, &size) in sizes.iter().enumerate().rev() {
        digits[slot] = index % size;
        index /= size;
    }
    digits
}

/// Seed for an operation's private stream: FNV-1a of the key mixed with `seed`
fn stream_seed(seed: u64, key: &OperationKey) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let bytes = key
        .category
        .bytes()
        .chain(std::iter::once(b'/'))
        .chain(key.operation.bytes());
    for byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash ^ seed
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("{key}: placeholder '{parameter}' has no sample pool")]
    MissingSamplePool { key: OperationKey, parameter: String },
    #[error("invalid generator settings: {0}")]
    InvalidSettings(String),
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
