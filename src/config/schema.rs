use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Top-level layout of `snippets.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, deserialize_with = "lenient_nodes")]
    pub snippets: Vec<SnippetNode>,
}

/// Global service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Start with expansion active (false starts paused)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Delay in milliseconds between synthetic keystrokes
    #[serde(default = "default_keystroke_delay")]
    pub keystroke_delay_ms: u64,

    /// Path to ydotool socket (optional, uses default if not specified)
    #[serde(default)]
    pub ydotool_socket: Option<String>,

    /// Keyboard layout (qwerty, azerty, qwertz)
    #[serde(default = "default_layout")]
    pub layout: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            keystroke_delay_ms: default_keystroke_delay(),
            ydotool_socket: None,
            layout: default_layout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_keystroke_delay() -> u64 {
    12
}

fn default_layout() -> String {
    "qwerty".to_string()
}

/// Parse a node list entry by entry, dropping (and logging) the ones that
/// do not fit the schema so one bad snippet cannot take the whole file down
fn lenient_nodes<'de, D>(deserializer: D) -> Result<Vec<SnippetNode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_yaml::Value>>::deserialize(deserializer)?.unwrap_or_default();

    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| match serde_yaml::from_value::<SnippetNode>(value) {
            Ok(node) => Some(node),
            Err(e) => {
                log::warn!("Skipping snippet entry #{}: {}", i + 1, e);
                None
            }
        })
        .collect())
}

/// A node in the snippet hierarchy (either a snippet or a folder)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnippetNode {
    Folder(Folder),
    Snippet(Snippet),
}

/// A folder containing snippets or other folders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub folder: String,

    #[serde(default, deserialize_with = "lenient_nodes")]
    pub items: Vec<SnippetNode>,

    /// A disabled folder disables everything under it
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// How the resolved text reaches the focused application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PasteStyle {
    /// Put the text on the clipboard and send the paste shortcut
    #[default]
    #[serde(alias = "clipboard")]
    Clipboard,
    /// Type the text one key at a time
    #[serde(alias = "keystroke", alias = "typing")]
    Keystroke,
}

/// A single text expansion snippet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snippet {
    /// Stable identifier; generated on first load when missing
    #[serde(default)]
    pub id: Option<Uuid>,

    /// The text the user types
    pub trigger: String,

    /// Body to substitute; may hold `{placeholder}` tokens and `{/trigger}` references
    #[serde(alias = "replace", alias = "template")]
    pub snippet: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub paste_style: PasteStyle,

    /// Press Enter once the text is out
    #[serde(default)]
    pub return_press: bool,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Snippet {
    /// Create a new enabled snippet with default output behaviour
    pub fn new(trigger: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            trigger: trigger.into(),
            snippet: snippet.into(),
            enabled: true,
            paste_style: PasteStyle::default(),
            return_press: false,
            label: None,
            tags: Vec::new(),
        }
    }

    /// Builder method to set label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[cfg(test)]
    pub fn with_paste_style(mut self, style: PasteStyle) -> Self {
        self.paste_style = style;
        self
    }

    /// Builder method to press Enter after expansion
    #[cfg(test)]
    pub fn with_return_press(mut self) -> Self {
        self.return_press = true;
        self
    }

    #[cfg(test)]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
