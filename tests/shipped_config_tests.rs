// whispera_core/tests/shipped_config_tests.rs
// The configuration in config/ must load, resolve and generate cleanly

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use whispera_core::template::pattern_placeholders;
use whispera_core::{
    ConfigStore, DatasetGenerator, GeneratorSettings, Intent, Shell, TemplateResolver,
};

fn shipped_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config")
}

fn shipped() -> ConfigStore {
    ConfigStore::load_dir(shipped_dir(), Shell::Posix).expect("shipped config must load")
}

#[test]
fn every_pattern_names_exactly_the_template_placeholders() {
    let store = shipped();
    for op in store.operations() {
        let expected: BTreeSet<String> = op
            .template
            .placeholders()
            .into_iter()
            .map(String::from)
            .collect();
        for pattern in &op.patterns {
            let found: BTreeSet<String> = pattern_placeholders(pattern).into_iter().collect();
            assert_eq!(found, expected, "{}: {}", op.key, pattern);
        }
    }
}

#[test]
fn every_placeholder_has_samples() {
    let store = shipped();
    for op in store.operations() {
        for name in op.template.placeholders() {
            let pool = store
                .pool_name_for(name)
                .unwrap_or_else(|| panic!("{}: no pool for {}", op.key, name));
            assert!(!store.samples_for(pool).unwrap_or_default().is_empty());
        }
    }
}

#[test]
fn resolves_core_commands() {
    let store = shipped();
    let resolver = TemplateResolver::new(&store);

    let cases = [
        (Intent::new("apps", "open").with_param("app", "chrome"), r#"open -a "Google Chrome""#),
        (Intent::new("apps", "open").with_param("app", "Chrome "), r#"open -a "Google Chrome""#),
        (Intent::new("apps", "open").with_param("app", "Xcode"), r#"open -a "Xcode""#),
        (
            Intent::new("git", "commit").with_param("message", "fix bug"),
            r#"git commit -m "fix bug""#,
        ),
        (Intent::new("git", "status"), "git status"),
        (
            Intent::new("volume", "set").with_param("level", "half"),
            "osascript -e 'set volume output volume 50'",
        ),
        (
            Intent::new("volume", "set").with_param("level", "150"),
            "osascript -e 'set volume output volume 100'",
        ),
        (Intent::new("folders", "open").with_param("folder", "downloads"), "open ~/Downloads"),
        (
            Intent::new("web", "open").with_param("url", "hacker news"),
            "open https://news.ycombinator.com",
        ),
        (
            Intent::new("git", "checkout").with_param("branch", "feature/login"),
            "git checkout feature/login",
        ),
        (
            Intent::new("docker", "stop").with_param("container", "my app"),
            r#"docker stop "my app""#,
        ),
    ];

    for (intent, expected) in cases {
        assert_eq!(resolver.resolve_intent(&intent).unwrap(), expected, "{:?}", intent);
    }
}

#[test]
fn generated_corpus_is_balanced_and_resolvable() {
    let store = shipped();
    let settings = GeneratorSettings::default();
    let dataset = DatasetGenerator::new(&store, settings.clone())
        .generate()
        .unwrap();
    let resolver = TemplateResolver::new(&store);

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for example in &dataset.examples {
        *counts.entry(example.intent.key().to_string()).or_default() += 1;
        resolver
            .resolve_intent(&example.intent)
            .unwrap_or_else(|e| panic!("{:?}: {}", example, e));
    }

    assert_eq!(counts.len(), store.operations().count());
    let smallest = *counts.values().min().unwrap();
    let largest = *counts.values().max().unwrap();
    assert!(smallest >= settings.min_per_operation);
    assert!(largest as f64 <= smallest as f64 * settings.max_imbalance.unwrap());
    assert_eq!(dataset.report.total, dataset.examples.len());
}

#[test]
fn generation_is_reproducible() {
    let store = shipped();
    let first = DatasetGenerator::new(&store, GeneratorSettings::default())
        .generate()
        .unwrap();
    let second = DatasetGenerator::new(&store, GeneratorSettings::default())
        .generate()
        .unwrap();
    assert_eq!(first.examples, second.examples);
}
