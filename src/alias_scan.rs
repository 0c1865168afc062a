//! Alias table regeneration
//!
//! Scans application directories for `.app` bundles and derives the spoken
//! keys a user is likely to say ("visual studio code", "visualstudiocode",
//! "vscode"). The result is merged into the existing alias document so
//! manual edits survive a rescan. Only alias data changes; templates and
//! patterns are never touched, so new apps need no retraining.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{alias_key, find_document, read_document, AliasTable, ConfigError};

/// Well-known nicknames, keyed by bundle name
const NICKNAMES: &[(&str, &[&str])] = &[
    ("Visual Studio Code", &["vscode", "vs code", "code"]),
    ("Google Chrome", &["chrome"]),
    ("Firefox", &["ff"]),
    ("Terminal", &["term"]),
    ("iTerm", &["iterm2"]),
    ("Sublime Text", &["sublime", "subl"]),
    ("Adobe Photoshop", &["photoshop", "ps"]),
    ("Adobe Illustrator", &["illustrator", "ai"]),
    ("Adobe Premiere Pro", &["premiere"]),
    ("Final Cut Pro", &["finalcut", "fcp"]),
    ("Logic Pro", &["logic"]),
    ("IntelliJ IDEA", &["intellij", "idea"]),
    ("Microsoft Teams", &["teams"]),
    ("Microsoft Word", &["word"]),
    ("Microsoft Excel", &["excel"]),
    ("Microsoft PowerPoint", &["powerpoint", "ppt"]),
    ("Microsoft Outlook", &["outlook"]),
    ("zoom.us", &["zoom"]),
    ("Music", &["apple music"]),
    ("TV", &["apple tv"]),
    ("System Preferences", &["settings", "preferences", "system settings"]),
    ("System Settings", &["settings", "preferences", "system preferences"]),
    ("Activity Monitor", &["activity", "task manager"]),
    ("Calculator", &["calc"]),
    ("Calendar", &["cal"]),
    ("Mail", &["email"]),
    ("Messages", &["imessage"]),
    ("QuickTime Player", &["quicktime"]),
    ("Brave Browser", &["brave"]),
    ("1Password", &["onepassword"]),
];

/// Folder shortcuts added when the `folders` kind lacks them
const DEFAULT_FOLDERS: &[(&str, &str)] = &[
    ("downloads", "~/Downloads"),
    ("documents", "~/Documents"),
    ("desktop", "~/Desktop"),
    ("home", "~"),
    ("applications", "/Applications"),
    ("pictures", "~/Pictures"),
    ("photos", "~/Pictures"),
    ("movies", "~/Movies"),
    ("videos", "~/Movies"),
    ("music", "~/Music"),
    ("developer", "~/Developer"),
    ("dev", "~/Developer"),
    ("projects", "~/Developer"),
    ("library", "~/Library"),
    ("trash", "~/.Trash"),
];

/// Website shortcuts added when the `urls` kind lacks them
const DEFAULT_URLS: &[(&str, &str)] = &[
    ("google", "https://google.com"),
    ("github", "https://github.com"),
    ("youtube", "https://youtube.com"),
    ("twitter", "https://twitter.com"),
    ("x", "https://x.com"),
    ("reddit", "https://reddit.com"),
    ("linkedin", "https://linkedin.com"),
    ("facebook", "https://facebook.com"),
    ("instagram", "https://instagram.com"),
    ("amazon", "https://amazon.com"),
    ("netflix", "https://netflix.com"),
    ("spotify", "https://open.spotify.com"),
    ("hacker news", "https://news.ycombinator.com"),
    ("hackernews", "https://news.ycombinator.com"),
    ("hn", "https://news.ycombinator.com"),
    ("stack overflow", "https://stackoverflow.com"),
    ("stackoverflow", "https://stackoverflow.com"),
    ("so", "https://stackoverflow.com"),
    ("gmail", "https://mail.google.com"),
    ("drive", "https://drive.google.com"),
    ("docs", "https://docs.google.com"),
    ("sheets", "https://sheets.google.com"),
    ("notion", "https://notion.so"),
    ("figma", "https://figma.com"),
    ("vercel", "https://vercel.com"),
    ("netlify", "https://netlify.com"),
    ("aws", "https://console.aws.amazon.com"),
    ("azure", "https://portal.azure.com"),
    ("gcp", "https://console.cloud.google.com"),
    ("heroku", "https://dashboard.heroku.com"),
    ("digitalocean", "https://cloud.digitalocean.com"),
    ("cloudflare", "https://dash.cloudflare.com"),
    ("npm", "https://npmjs.com"),
    ("pypi", "https://pypi.org"),
    ("crates", "https://crates.io"),
    ("docker hub", "https://hub.docker.com"),
];

/// How strongly a spoken key belongs to a bundle. A key derived from the
/// bundle's own name beats one inherited through a prefix match, so
/// "Google Chrome Canary" never takes `chrome` from "Google Chrome".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum KeyRank {
    Prefix,
    Exact,
}

#[derive(Debug, thiserror::Error)]
pub enum AliasScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize alias table: {0}")]
    Serialize(String),
}

/// Scanner over a set of application directories and the home directory
pub struct AliasScanner {
    app_dirs: Vec<PathBuf>,
    home: Option<PathBuf>,
}

impl AliasScanner {
    pub fn new(app_dirs: Vec<PathBuf>) -> Self {
        Self {
            app_dirs,
            home: dirs::home_dir(),
        }
    }

    /// Scan `home` for folder shortcuts instead of the user's home directory
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// The standard macOS application locations
    pub fn default_dirs() -> Vec<PathBuf> {
        let mut dirs = vec![PathBuf::from("/Applications")];
        if let Some(home) = dirs::home_dir() {
            dirs.push(home.join("Applications"));
        }
        dirs.push(PathBuf::from("/System/Applications"));
        dirs.push(PathBuf::from("/System/Applications/Utilities"));
        dirs
    }

    /// `spoken key -> bundle name` for every `.app` found.
    ///
    /// When two bundles claim a key, the exact claim wins; between equal
    /// claims the first directory scanned wins.
    pub fn scan_apps(&self) -> BTreeMap<String, String> {
        let mut apps: BTreeMap<String, (KeyRank, String)> = BTreeMap::new();
        for dir in &self.app_dirs {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "skipping application directory");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let file_name = entry.file_name();
                let Some(app_name) = file_name.to_str().and_then(|n| n.strip_suffix(".app")) else {
                    continue;
                };
                for (key, rank) in ranked_app_keys(app_name) {
                    match apps.get(&key) {
                        Some((held, _)) if *held >= rank => {}
                        _ => {
                            apps.insert(key, (rank, app_name.to_string()));
                        }
                    }
                }
            }
        }
        apps.into_iter().map(|(key, (_, app))| (key, app)).collect()
    }

    /// `name -> ~/Name` for every visible folder in the home directory
    pub fn scan_home_folders(&self) -> BTreeMap<String, String> {
        let mut folders = BTreeMap::new();
        let Some(home) = &self.home else {
            return folders;
        };
        let entries = match fs::read_dir(home) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %home.display(), error = %e, "skipping home directory");
                return folders;
            }
        };
        for entry in entries.flatten() {
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            folders.insert(alias_key(name), format!("~/{}", name));
        }
        folders
    }

    /// Merge a fresh scan into `existing`. Entries already present win, so
    /// hand edits are kept; other kinds pass through untouched.
    pub fn regenerate(&self, existing: AliasTable) -> AliasTable {
        let mut table = existing;
        let scanned = self.scan_apps();
        info!(entries = scanned.len(), "scanned applications");

        merge_missing(table.entry("apps".to_string()).or_default(), scanned);
        let folders = table.entry("folders".to_string()).or_default();
        merge_missing(
            folders,
            DEFAULT_FOLDERS.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        );
        merge_missing(folders, self.scan_home_folders());
        merge_missing(
            table.entry("urls".to_string()).or_default(),
            DEFAULT_URLS.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        );
        table
    }

    /// Regenerate the alias document in `config_dir` in place.
    ///
    /// Writes `aliases.yaml` unless an existing JSON document is found.
    pub fn regenerate_in(
        &self,
        config_dir: &Path,
    ) -> Result<(PathBuf, AliasTable), AliasScanError> {
        let (path, existing) = existing_table(config_dir)?;
        let table = self.regenerate(existing);
        write_aliases(&path, &table)?;
        Ok((path, table))
    }
}

/// The alias document in `config_dir` and its contents, or the default
/// `aliases.yaml` path and an empty table when there is none
pub fn existing_table(config_dir: &Path) -> Result<(PathBuf, AliasTable), ConfigError> {
    match find_document(config_dir, "aliases") {
        Some(path) => {
            let table = read_document(&path)?;
            Ok((path, table))
        }
        None => Ok((config_dir.join("aliases.yaml"), AliasTable::new())),
    }
}

/// Keys derived from a bundle name: lowercase, lowercase without spaces,
/// and any known nicknames. Nicknames also carry over to versioned or
/// variant bundles whose name starts with a known bundle name
/// ("Adobe Photoshop 2024" gets `photoshop`).
pub fn app_keys(app_name: &str) -> Vec<String> {
    ranked_app_keys(app_name).into_iter().map(|(key, _)| key).collect()
}

fn ranked_app_keys(app_name: &str) -> Vec<(String, KeyRank)> {
    let lower = alias_key(app_name);
    let compact: String = lower.chars().filter(|c| !c.is_whitespace()).collect();

    let mut keys = vec![(lower.clone(), KeyRank::Exact)];
    let mut push = |key: String, rank: KeyRank| {
        if !keys.iter().any(|(k, _)| *k == key) {
            keys.push((key, rank));
        }
    };
    push(compact, KeyRank::Exact);

    for (bundle, nicknames) in NICKNAMES {
        let bundle = bundle.to_lowercase();
        let rank = if lower == bundle {
            KeyRank::Exact
        } else if lower.starts_with(&format!("{} ", bundle)) {
            KeyRank::Prefix
        } else {
            continue;
        };
        for nickname in nicknames.iter() {
            push(nickname.to_string(), rank);
        }
    }
    keys
}

fn merge_missing(
    target: &mut BTreeMap<String, String>,
    entries: impl IntoIterator<Item = (String, String)>,
) {
    for (key, value) in entries {
        target.entry(key).or_insert(value);
    }
}

pub fn write_aliases(path: &Path, table: &AliasTable) -> Result<(), AliasScanError> {
    let content = if path.extension().map(|e| e == "json").unwrap_or(false) {
        serde_json::to_string_pretty(table).map_err(|e| AliasScanError::Serialize(e.to_string()))?
    } else {
        serde_yaml::to_string(table).map_err(|e| AliasScanError::Serialize(e.to_string()))?
    };

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!(dir = %parent.display(), error = %e, "could not create alias directory");
        }
    }

    fs::write(path, content).map_err(|source| AliasScanError::Write {
        path: path.to_path_buf(),
        source,
    })
}
