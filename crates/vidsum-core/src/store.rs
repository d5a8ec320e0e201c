use std::path::{Path, PathBuf};

use tokio::fs;

use crate::{error::HistoryError, types::HistoryItem};

/// Local persisted history: one serialized JSON array at a fixed path.
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location under the platform data directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidsum")
            .join("history.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file reads as an empty history.
    pub async fn load(&self) -> Result<Vec<HistoryItem>, HistoryError> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes atomically via write-to-temp-then-rename.
    pub async fn save(&self, items: &[HistoryItem]) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(items)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
