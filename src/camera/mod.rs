use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use image::DynamicImage;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// One captured image.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    pub captured_at: DateTime<Utc>,
}

/// Camera collaborator. Frames may arrive at any rate; `Ok(None)` means the
/// source has nothing right now, which is not an error.
pub trait FrameSource: Send + 'static {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Replays the image files of a directory in name order, one per call.
pub struct DirectoryCamera {
    files: Vec<PathBuf>,
    cursor: usize,
    looping: bool,
}

impl DirectoryCamera {
    pub fn open(dir: &Path, looping: bool) -> Result<Self> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("failed to read frame directory {}", dir.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if path.is_file() && is_image {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            bail!("no image frames found in {}", dir.display());
        }

        Ok(Self {
            files,
            cursor: 0,
            looping,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for DirectoryCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.cursor >= self.files.len() {
            if !self.looping {
                return Ok(None);
            }
            self.cursor = 0;
        }

        let path = &self.files[self.cursor];
        self.cursor += 1;

        let image = image::open(path)
            .with_context(|| format!("failed to decode frame {}", path.display()))?;
        Ok(Some(Frame {
            image,
            captured_at: Utc::now(),
        }))
    }
}
