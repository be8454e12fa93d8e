use anyhow::{anyhow, bail, Context, Result};
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use std::{
    io::{Cursor, Write},
    process::{Command, Stdio},
};

use crate::models::Classification;
use crate::settings::ClassifierSettings;

// Set to true to dump raw classifier output
const ENABLE_LOGS: bool = false;

use crate::log_debug;

/// Species recognition model. Implementations may block; callers run them on
/// the blocking pool.
///
/// `Ok(None)` means the model produced no prediction for the image.
pub trait Classifier: Send + Sync + 'static {
    fn classify(&self, image: &DynamicImage) -> Result<Option<Classification>>;
}

#[derive(Debug, Deserialize)]
struct Prediction {
    label: String,
    score: f64,
}

/// Parse image-classification pipeline output (`[{"label": .., "score": ..}, ..]`)
/// and return the highest scoring prediction.
pub fn parse_predictions(raw: &str) -> Result<Option<Classification>> {
    let predictions: Vec<Prediction> =
        serde_json::from_str(raw.trim()).context("classifier output is not a prediction list")?;

    let top = predictions
        .into_iter()
        .filter(|p| p.score.is_finite() && !p.label.trim().is_empty())
        .max_by(|a, b| a.score.total_cmp(&b.score));

    Ok(top.map(|p| Classification::new(p.label.trim(), p.score.clamp(0.0, 1.0) as f32)))
}

/// Runs an external program per frame: the frame is piped to its stdin as
/// PNG and the prediction list is read back from stdout.
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
}

impl CommandClassifier {
    pub fn new(settings: &ClassifierSettings) -> Self {
        Self {
            program: settings.program.clone(),
            args: settings.args.clone(),
        }
    }
}

impl Classifier for CommandClassifier {
    fn classify(&self, image: &DynamicImage) -> Result<Option<Classification>> {
        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .context("failed to encode frame as PNG")?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn classifier '{}'", self.program))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("classifier stdin unavailable"))?;
            stdin
                .write_all(png.get_ref())
                .context("failed to send frame to classifier")?;
        }

        let output = child
            .wait_with_output()
            .context("classifier did not exit cleanly")?;

        if !output.status.success() {
            bail!(
                "classifier exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        log_debug!("classifier output: {}", stdout.trim());
        parse_predictions(&stdout)
    }
}
