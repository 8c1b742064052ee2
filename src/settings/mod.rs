use crate::{
    countdown::COUNTDOWN_SECONDS,
    momentum::DEFAULT_MOMENTUM_THRESHOLD,
    ramp::{GestureRequest, RampCurve},
};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// One frame at ~60 Hz.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ScrollSettings {
    pub start_speed: f64,
    pub end_speed: f64,
    pub step_count: u32,
    pub curve: RampCurve,
    pub use_countdown: bool,
    pub countdown_seconds: u32,
    pub tick_interval_ms: u64,
    pub momentum_enabled: bool,
    pub momentum_threshold: f64,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            start_speed: 1.0,
            end_speed: 80.0,
            step_count: 80,
            curve: RampCurve::Linear,
            use_countdown: true,
            countdown_seconds: COUNTDOWN_SECONDS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            momentum_enabled: true,
            momentum_threshold: DEFAULT_MOMENTUM_THRESHOLD,
        }
    }
}

impl ScrollSettings {
    pub fn to_request(&self) -> GestureRequest {
        GestureRequest::new(self.start_speed, self.end_speed, self.step_count)
            .with_curve(self.curve)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Read(std::io::Error),
    #[error("failed to write settings file: {0}")]
    Write(std::io::Error),
    #[error("failed to parse settings JSON: {0}")]
    Parse(serde_json::Error),
    #[error("cannot resolve app config directory")]
    AppData,
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new() -> Result<Self, SettingsError> {
        let proj_dirs =
            ProjectDirs::from("com", "glidescroll", "core").ok_or(SettingsError::AppData)?;
        let path = proj_dirs.config_dir().join("settings.json");
        Ok(Self { path })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ScrollSettings, SettingsError> {
        if !self.path.exists() {
            return Ok(ScrollSettings::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(SettingsError::Read)?;
        serde_json::from_str(&raw).map_err(SettingsError::Parse)
    }

    pub fn save(&self, settings: &ScrollSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(SettingsError::Write)?;
        }
        let raw = serde_json::to_string_pretty(settings).map_err(SettingsError::Parse)?;
        fs::write(&self.path, raw).map_err(SettingsError::Write)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_settings_path() -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be valid")
            .as_nanos();
        std::env::temp_dir().join(format!("glidescroll-settings-{ts}.json"))
    }

    #[test]
    fn load_returns_default_if_missing() {
        let store = SettingsStore::from_path(temp_settings_path());
        let loaded = store.load().expect("load should succeed");
        assert_eq!(loaded, ScrollSettings::default());
        assert_eq!(loaded.tick_interval_ms, 16);
        assert_eq!(loaded.countdown_seconds, 3);
    }

    #[test]
    fn save_then_load_keeps_gesture_shape() {
        let path = temp_settings_path();
        let store = SettingsStore::from_path(path.clone());
        let settings = ScrollSettings {
            start_speed: -4.0,
            end_speed: -60.0,
            step_count: 24,
            curve: RampCurve::EaseInOut,
            use_countdown: false,
            momentum_enabled: false,
            ..ScrollSettings::default()
        };

        store.save(&settings).expect("save should succeed");
        let loaded = store.load().expect("load should succeed");

        assert_eq!(loaded, settings);
        assert_eq!(
            loaded.to_request(),
            GestureRequest::new(-4.0, -60.0, 24).with_curve(RampCurve::EaseInOut)
        );
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let path = temp_settings_path();
        std::fs::write(&path, r#"{ "stepCount": 12, "curve": "easeOut" }"#)
            .expect("fixture should be written");
        let loaded = SettingsStore::from_path(&path)
            .load()
            .expect("load should succeed");
        assert_eq!(loaded.step_count, 12);
        assert_eq!(loaded.curve, RampCurve::EaseOut);
        assert_eq!(loaded.end_speed, 80.0);
        assert!(loaded.momentum_enabled);
        let _ = std::fs::remove_file(path);
    }
}
