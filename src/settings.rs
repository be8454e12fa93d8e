use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::error::ConfigError;

/// How long a label must stay on top before it counts as a sighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DwellWindow {
    Frames(u32),
    Seconds(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectionSettings {
    pub confidence_threshold: f32,
    pub dwell: DwellWindow,
    pub cooldown_secs: f64,
    /// Case-insensitive substrings; a label containing any of them is not a bird.
    pub rejected_labels: Vec<String>,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            dwell: DwellWindow::Frames(3),
            cooldown_secs: 5.0,
            rejected_labels: vec!["looney".into()],
        }
    }
}

impl DetectionSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.confidence_threshold));
        }
        match self.dwell {
            DwellWindow::Frames(0) => return Err(ConfigError::EmptyDwell),
            DwellWindow::Frames(_) => {}
            DwellWindow::Seconds(secs) => {
                check_seconds("dwell.seconds", secs)?;
                if secs == 0.0 {
                    return Err(ConfigError::EmptyDwell);
                }
            }
        }
        check_seconds("cooldownSecs", self.cooldown_secs)?;
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        clamp_seconds(self.cooldown_secs)
    }
}

/// Seconds must be non-negative and fit in a `Duration`.
fn check_seconds(field: &'static str, value: f64) -> Result<(), ConfigError> {
    match Duration::try_from_secs_f64(value) {
        Ok(_) => Ok(()),
        Err(_) => Err(ConfigError::InvalidSeconds { field, value }),
    }
}

/// Non-panicking conversion for values that skipped validation: negative or
/// NaN becomes zero, anything too large saturates.
pub(crate) fn clamp_seconds(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArcadeSettings {
    pub default_duration_secs: u64,
}

impl Default for ArcadeSettings {
    fn default() -> Self {
        Self {
            default_duration_secs: 60,
        }
    }
}

/// Which confirmed sightings produce a snapshot in Explore mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PersistPolicy {
    /// Only the first sighting of each species in a session.
    NovelOnly,
    /// Every sighting that survives debouncing.
    #[default]
    EverySighting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExploreSettings {
    pub persist_policy: PersistPolicy,
    pub capture_dir: PathBuf,
}

impl Default for ExploreSettings {
    fn default() -> Self {
        Self {
            persist_policy: PersistPolicy::default(),
            capture_dir: PathBuf::from("captured_birds"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraSettings {
    pub frame_dir: PathBuf,
    pub frame_interval_ms: u64,
    pub looping: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            frame_dir: PathBuf::from("frames"),
            frame_interval_ms: 33,
            looping: true,
        }
    }
}

impl CameraSettings {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassifierSettings {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            program: "bainoculars-classify".into(),
            args: Vec::new(),
            timeout_ms: 2_000,
        }
    }
}

impl ClassifierSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChimeSettings {
    pub enabled: bool,
}

impl Default for ChimeSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub detection: DetectionSettings,
    pub arcade: ArcadeSettings,
    pub explore: ExploreSettings,
    pub camera: CameraSettings,
    pub classifier: ClassifierSettings,
    pub chime: ChimeSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unreadable settings at {} ({err}); using defaults",
                    path.display()
                );
                Settings::default()
            })
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn snapshot(&self) -> Settings {
        self.read().clone()
    }

    pub fn chime(&self) -> ChimeSettings {
        self.read().chime.clone()
    }

    pub fn update_chime(&self, settings: ChimeSettings) -> Result<()> {
        let mut guard = self.write();
        guard.chime = settings;
        self.persist(&guard)
    }

    fn read(&self) -> RwLockReadGuard<'_, Settings> {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Settings> {
        self.data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Settings::default().detection.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"detection": {"dwell": {"seconds": 1.5}}, "explore": {"persistPolicy": "novelOnly"}}"#,
        )
        .expect("write");

        let store = SettingsStore::new(path).expect("store");
        let settings = store.snapshot();
        assert_eq!(settings.detection.dwell, DwellWindow::Seconds(1.5));
        assert_eq!(settings.detection.confidence_threshold, 0.5);
        assert_eq!(settings.explore.persist_policy, PersistPolicy::NovelOnly);
        assert_eq!(settings.arcade.default_duration_secs, 60);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").expect("write");

        let store = SettingsStore::new(path).expect("store");
        assert_eq!(store.snapshot(), Settings::default());
    }

    #[test]
    fn chime_update_is_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.json");

        let store = SettingsStore::new(path.clone()).expect("store");
        store
            .update_chime(ChimeSettings { enabled: false })
            .expect("update");

        let reloaded = SettingsStore::new(path).expect("reload");
        assert!(!reloaded.chime().enabled);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let settings = DetectionSettings {
            confidence_threshold: 1.5,
            ..DetectionSettings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(ConfigError::ThresholdOutOfRange(1.5))
        );
    }

    #[test]
    fn rejects_empty_dwell() {
        let frames = DetectionSettings {
            dwell: DwellWindow::Frames(0),
            ..DetectionSettings::default()
        };
        assert_eq!(frames.validate(), Err(ConfigError::EmptyDwell));

        let seconds = DetectionSettings {
            dwell: DwellWindow::Seconds(0.0),
            ..DetectionSettings::default()
        };
        assert_eq!(seconds.validate(), Err(ConfigError::EmptyDwell));
    }

    #[test]
    fn rejects_negative_cooldown() {
        let settings = DetectionSettings {
            cooldown_secs: -1.0,
            ..DetectionSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidSeconds { field: "cooldownSecs", .. })
        ));
    }

    #[test]
    fn rejects_seconds_too_large_for_a_duration() {
        let cooldown = DetectionSettings {
            cooldown_secs: 1e30,
            ..DetectionSettings::default()
        };
        assert!(matches!(
            cooldown.validate(),
            Err(ConfigError::InvalidSeconds { field: "cooldownSecs", .. })
        ));

        let dwell = DetectionSettings {
            dwell: DwellWindow::Seconds(1e30),
            ..DetectionSettings::default()
        };
        assert!(matches!(
            dwell.validate(),
            Err(ConfigError::InvalidSeconds { field: "dwell.seconds", .. })
        ));

        let infinite = DetectionSettings {
            cooldown_secs: f64::INFINITY,
            ..DetectionSettings::default()
        };
        assert!(infinite.validate().is_err());
    }

    #[test]
    fn clamped_seconds_never_panic() {
        assert_eq!(clamp_seconds(-3.0), Duration::ZERO);
        assert_eq!(clamp_seconds(f64::NAN), Duration::ZERO);
        assert_eq!(clamp_seconds(1e30), Duration::MAX);
        assert_eq!(clamp_seconds(1.5), Duration::from_millis(1_500));
    }
}
