use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::DynamicImage;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Explore-mode snapshot collaborator. Called from the blocking pool.
pub trait SnapshotSink: Send + Sync + 'static {
    fn save(&self, image: &DynamicImage, label: &str, timestamp: DateTime<Utc>) -> Result<PathBuf>;
}

/// Writes `<label>_<YYYYmmdd_HHMMSS_mmm>.jpg` files into one directory.
pub struct DiskSnapshotStore {
    dir: PathBuf,
}

impl DiskSnapshotStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create capture directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

pub fn snapshot_file_name(label: &str, timestamp: DateTime<Utc>) -> String {
    let safe_label: String = label
        .trim()
        .chars()
        .map(|c| match c {
            ' ' => '_',
            c if c.is_alphanumeric() || c == '-' || c == '_' => c,
            _ => '-',
        })
        .collect();
    format!("{}_{}.jpg", safe_label, timestamp.format("%Y%m%d_%H%M%S_%3f"))
}

impl SnapshotSink for DiskSnapshotStore {
    fn save(&self, image: &DynamicImage, label: &str, timestamp: DateTime<Utc>) -> Result<PathBuf> {
        let path = self.dir.join(snapshot_file_name(label, timestamp));
        // JPEG has no alpha channel.
        image
            .to_rgb8()
            .save(&path)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        Ok(path)
    }
}
