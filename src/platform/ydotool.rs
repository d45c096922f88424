use anyhow::Context;
use arboard::Clipboard;
use std::process::{Command, Stdio};
use std::sync::{Mutex, PoisonError};
use std::thread::sleep;
use std::time::Duration;

use super::SyntheticKey;
use crate::error::{EngineError, Result};

/// Synthetic input through ydotool, clipboard through arboard
pub struct YdotoolOutput {
    /// Delay between keystrokes in milliseconds
    keystroke_delay: u64,
    /// Optional custom socket path for ydotoold
    socket_path: Option<String>,
    /// Kept open so the clipboard owner outlives each paste
    clipboard: Mutex<Option<Clipboard>>,
}

impl YdotoolOutput {
    pub fn new(keystroke_delay: u64, socket_path: Option<String>) -> Self {
        Self {
            keystroke_delay,
            socket_path,
            clipboard: Mutex::new(None),
        }
    }

    /// Check if ydotool is available
    pub async fn check_availability() -> anyhow::Result<()> {
        let output = tokio::process::Command::new("which")
            .arg("ydotool")
            .output()
            .await
            .context("Failed to check for ydotool")?;

        if !output.status.success() {
            anyhow::bail!(
                "ydotool not found. Please install it with: sudo apt install ydotool\n\
                 Then enable the daemon: sudo systemctl enable --now ydotool"
            );
        }

        // ydotool 0.1.x has no daemon; newer versions need ydotoold running
        let ydotoold_exists = tokio::process::Command::new("which")
            .arg("ydotoold")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false);

        if ydotoold_exists {
            let output = tokio::process::Command::new("pgrep")
                .arg("ydotoold")
                .output()
                .await?;

            if !output.status.success() {
                anyhow::bail!(
                    "ydotoold daemon is not running. Start it with:\n\
                     sudo systemctl start ydotool\n\
                     Or run: sudo ydotoold &"
                );
            }
        }

        Ok(())
    }

    pub fn send_key(&self, key: SyntheticKey) -> Result<()> {
        match key {
            SyntheticKey::Char(ch) => {
                let delay = self.keystroke_delay.to_string();
                let text = ch.to_string();
                self.run_ydotool(&["type", "--key-delay", &delay, "--", &text])?;
            }
            other => self.run_ydotool(&["key", &key_name(other)])?,
        }

        if self.keystroke_delay > 0 {
            sleep(Duration::from_millis(self.keystroke_delay));
        }
        Ok(())
    }

    pub fn send_chord(&self, modifier: SyntheticKey, key: SyntheticKey) -> Result<()> {
        let combo = format!("{}+{}", key_name(modifier), key_name(key));
        self.run_ydotool(&["key", &combo])
    }

    pub fn set_clipboard(&self, text: &str) -> Result<()> {
        let mut slot = self.clipboard.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(Clipboard::new().map_err(|e| EngineError::Clipboard(e.to_string()))?);
        }

        if let Some(clipboard) = slot.as_mut() {
            if let Err(e) = clipboard.set_text(text) {
                // Drop the handle so the next paste reconnects
                *slot = None;
                return Err(EngineError::Clipboard(e.to_string()));
            }
        }
        Ok(())
    }

    fn run_ydotool(&self, args: &[&str]) -> Result<()> {
        let mut cmd = Command::new("ydotool");
        cmd.args(args);

        if let Some(socket) = &self.socket_path {
            cmd.env("YDOTOOL_SOCKET", socket);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let output = cmd
            .output()
            .map_err(|e| EngineError::Output(format!("failed to run ydotool: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Output(format!("ydotool failed: {}", stderr.trim())));
        }

        Ok(())
    }
}

/// Key names in the form ydotool's `key` command accepts
fn key_name(key: SyntheticKey) -> String {
    match key {
        SyntheticKey::Backspace => "BackSpace".to_string(),
        SyntheticKey::Delete => "Delete".to_string(),
        SyntheticKey::Enter => "Return".to_string(),
        SyntheticKey::Control => "ctrl".to_string(),
        SyntheticKey::Meta => "super".to_string(),
        SyntheticKey::Char(ch) => ch.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires ydotool to be installed
    async fn test_check_availability() {
        YdotoolOutput::check_availability().await.unwrap();
    }

    #[test]
    fn test_output_creation() {
        let output = YdotoolOutput::new(12, None);
        assert_eq!(output.keystroke_delay, 12);
        assert!(output.socket_path.is_none());

        let output = YdotoolOutput::new(20, Some("/tmp/ydotool.sock".to_string()));
        assert_eq!(output.socket_path, Some("/tmp/ydotool.sock".to_string()));
    }

    #[test]
    fn test_key_names() {
        assert_eq!(key_name(SyntheticKey::Backspace), "BackSpace");
        assert_eq!(key_name(SyntheticKey::Enter), "Return");
        assert_eq!(key_name(SyntheticKey::Control), "ctrl");
        assert_eq!(key_name(SyntheticKey::Char('v')), "v");
    }
}
