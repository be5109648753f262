// 🗄️ Extract Store - timestamped extracts in one output directory
// Each processed run is saved as `YYYYMMDD_HHMMSS_<suffix>.<ext>`; readers
// always get the most recently modified file.

use crate::config::PortfolioConfig;
use crate::writer::ExtractFormat;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::info;

pub struct ExtractStore {
    dir: PathBuf,
    file_suffix: String,
}

impl ExtractStore {
    pub fn new(dir: impl Into<PathBuf>, file_suffix: impl Into<String>) -> Self {
        ExtractStore {
            dir: dir.into(),
            file_suffix: file_suffix.into(),
        }
    }

    pub fn from_config(config: &PortfolioConfig) -> Self {
        Self::new(&config.output_dir, &config.file_suffix)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name_for(&self, at: DateTime<Local>, format: ExtractFormat) -> String {
        format!(
            "{}_{}.{}",
            at.format("%Y%m%d_%H%M%S"),
            self.file_suffix,
            format.extension()
        )
    }

    /// Save an encoded extract stamped with the current local time
    pub fn save(&self, bytes: &[u8], format: ExtractFormat) -> Result<PathBuf> {
        self.save_at(bytes, format, Local::now())
    }

    pub fn save_at(&self, bytes: &[u8], format: ExtractFormat, at: DateTime<Local>) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory: {}", self.dir.display()))?;

        let path = self.dir.join(self.file_name_for(at, format));
        fs::write(&path, bytes).with_context(|| format!("Failed to write extract: {}", path.display()))?;

        info!(path = %path.display(), bytes = bytes.len(), "extract saved");
        Ok(path)
    }

    /// Most recently modified file in the directory, if any
    ///
    /// A directory that does not exist yet simply has no extracts.
    pub fn latest(&self) -> Result<Option<PathBuf>> {
        if !self.dir.exists() {
            return Ok(None);
        }

        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list output directory: {}", self.dir.display()))?;

        let mut latest: Option<(SystemTime, PathBuf)> = None;
        for entry in entries {
            let entry = entry.context("Failed to read output directory entry")?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified()?;
            if latest.as_ref().map_or(true, |(best, _)| modified > *best) {
                latest = Some((modified, entry.path()));
            }
        }

        Ok(latest.map(|(_, path)| path))
    }
}
