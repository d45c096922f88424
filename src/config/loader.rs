use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::schema::{Config, Snippet, SnippetNode};
use crate::error::EngineError;
use crate::store::SnippetStore;

/// File-backed snippet store with hot-reload notifications
pub struct ConfigManager {
    config_path: PathBuf,
    _watcher: Option<RecommendedWatcher>,
}

impl ConfigManager {
    /// Open (or create) the config file and start watching it
    ///
    /// The receiver yields `()` whenever the file changes on disk.
    pub fn new(config_path: Option<PathBuf>) -> Result<(Self, mpsc::Receiver<()>)> {
        let config_path = match config_path {
            Some(path) => path,
            None => Self::get_config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        if config_path.exists() {
            Self::write_back_ids(&config_path)?;
        } else {
            Self::save_config(&config_path, &default_config())?;
        }

        let (tx, rx) = mpsc::channel(1);
        let watcher = Self::setup_watcher(&config_path, tx)?;

        Ok((
            Self {
                config_path,
                _watcher: Some(watcher),
            },
            rx,
        ))
    }

    /// A manager over an existing file, without a watcher
    #[cfg(test)]
    pub fn open(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            _watcher: None,
        }
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("qsnip").join("snippets.yaml"))
    }

    /// Load configuration from a file
    pub fn load_config(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Give snippets without an id a fresh one and persist them
    ///
    /// Skipped when some entries failed to parse, since saving the parsed
    /// config would drop them from the file.
    fn write_back_ids(path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if assign_missing_ids(&mut config.snippets) == 0 {
            return Ok(());
        }

        let raw: serde_yaml::Value = serde_yaml::from_str(&content)?;
        let written = count_raw_entries(raw.get("snippets"));
        let parsed = count_nodes(&config.snippets);
        if written != parsed {
            log::warn!(
                "{} of {} snippet entries could not be parsed; not writing ids back to {}",
                written - parsed,
                written,
                path.display()
            );
            return Ok(());
        }

        Self::save_config(path, &config)
    }

    /// Save configuration to a file
    pub fn save_config(path: &Path, config: &Config) -> Result<()> {
        let content = serde_yaml::to_string(config).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        log::info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Current settings from disk
    pub fn settings(&self) -> Result<super::Settings> {
        Ok(Self::load_config(&self.config_path)?.settings)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Set up file watcher for hot-reload
    ///
    /// Bursts of change events collapse into one pending notification.
    fn setup_watcher(config_path: &Path, tx: mpsc::Sender<()>) -> Result<RecommendedWatcher> {
        let path = config_path.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                let Ok(event) = res else {
                    return;
                };
                let relevant = event.kind.is_modify() || event.kind.is_create();
                if relevant && event.paths.iter().any(|p| p.file_name() == path.file_name()) {
                    log::debug!("Config file changed");
                    let _ = tx.try_send(());
                }
            },
            NotifyConfig::default(),
        )?;

        // Watch the parent directory so editors that replace the file are seen
        if let Some(parent) = config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        log::info!("Watching config file for changes: {}", config_path.display());
        Ok(watcher)
    }

    /// Flatten snippets from the hierarchy, skipping disabled snippets and folders
    pub fn flatten_snippets(nodes: &[SnippetNode]) -> Vec<Snippet> {
        let mut result = Vec::new();
        Self::flatten_recursive(nodes, &mut result);
        result
    }

    fn flatten_recursive(nodes: &[SnippetNode], result: &mut Vec<Snippet>) {
        for node in nodes {
            match node {
                SnippetNode::Snippet(s) => {
                    if s.enabled {
                        result.push(s.clone());
                    }
                }
                SnippetNode::Folder(f) => {
                    if f.enabled {
                        Self::flatten_recursive(&f.items, result);
                    }
                }
            }
        }
    }
}

impl SnippetStore for ConfigManager {
    fn list_enabled_snippets(&self) -> Result<Vec<Snippet>, EngineError> {
        let config = Self::load_config(&self.config_path)
            .map_err(|e| EngineError::Store(format!("{e:#}")))?;
        Ok(Self::flatten_snippets(&config.snippets))
    }
}

/// Give every snippet without an id a fresh one; returns how many were added
fn assign_missing_ids(nodes: &mut [SnippetNode]) -> usize {
    let mut added = 0;
    for node in nodes {
        match node {
            SnippetNode::Snippet(s) if s.id.is_none() => {
                s.id = Some(Uuid::new_v4());
                added += 1;
            }
            SnippetNode::Snippet(_) => {}
            SnippetNode::Folder(f) => added += assign_missing_ids(&mut f.items),
        }
    }
    added
}

/// Entries in a raw `snippets`/`items` sequence, folders included
fn count_raw_entries(nodes: Option<&serde_yaml::Value>) -> usize {
    nodes
        .and_then(serde_yaml::Value::as_sequence)
        .map_or(0, |seq| {
            seq.iter()
                .map(|entry| 1 + count_raw_entries(entry.get("items")))
                .sum()
        })
}

fn count_nodes(nodes: &[SnippetNode]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            SnippetNode::Snippet(_) => 1,
            SnippetNode::Folder(f) => 1 + count_nodes(&f.items),
        })
        .sum()
}

fn default_config() -> Config {
    Config {
        snippets: vec![SnippetNode::Snippet(
            Snippet::new("/welcome", "Welcome to QSnip").with_label("Welcome"),
        )],
        ..Config::default()
    }
}
