// Agent token persistence
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use crate::error::{FleetError, Result};

/// Local file holding the agent's bearer token.
///
/// Plain text by default; a `.json` path is read and written as `{"token": "..."}`.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_json(&self) -> bool {
        self.path.extension().is_some_and(|ext| ext == "json")
    }

    /// `Ok(None)` when no token has been saved yet
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        let trimmed = raw.trim();

        let token = if trimmed.starts_with('{') {
            let value: Value = serde_json::from_str(trimmed)
                .map_err(|e| FleetError::Token(format!("{} is not valid JSON: {}", self.path.display(), e)))?;
            value
                .get("token")
                .and_then(Value::as_str)
                .map(|t| t.trim().to_string())
                .ok_or_else(|| FleetError::Token(format!("{} has no \"token\" field", self.path.display())))?
        } else {
            trimmed.to_string()
        };

        Ok(if token.is_empty() { None } else { Some(token) })
    }

    pub fn load_required(&self) -> Result<String> {
        self.load()?.ok_or_else(|| {
            FleetError::Token(format!(
                "no agent token at {}; run the register command first",
                self.path.display()
            ))
        })
    }

    pub fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = if self.is_json() {
            serde_json::json!({ "token": token }).to_string()
        } else {
            format!("{}\n", token)
        };
        fs::write(&self.path, content)?;
        info!("💾 Saved agent token to {}", self.path.display());
        Ok(())
    }
}
