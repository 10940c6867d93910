//! Editor settings.
//!
//! Settings live in a JSON file; every field is optional and falls back to
//! the defaults below, so an empty `{}` is a valid config.
//!
//! Default location:
//!   Linux:    `$XDG_CONFIG_HOME/epigimp/epigimp.json` (`~/.config/...`)
//!   Windows:  `%APPDATA%\epigimp\epigimp.json`
//!   macOS:    `~/Library/Application Support/epigimp/epigimp.json`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::ops::stroke::BrushSettings;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Size of the initial "Background" layer and of new empty layers.
    pub document_width: u32,
    pub document_height: u32,
    /// Capacity of each layer's undo and redo stacks.
    pub undo_capacity: usize,
    /// Capacity of the observational history log.
    pub history_log_capacity: usize,
    /// Minimum interval between two "preview changed" ticks.
    pub preview_interval_ms: u64,
    /// Hit radius (document pixels) of the interactive transform handles.
    pub handle_hit_radius: f32,
    pub brush: BrushSettings,
    /// JPEG quality 1..=100.
    pub export_quality: u8,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            document_width: 1024,
            document_height: 768,
            undo_capacity: 30,
            history_log_capacity: 50,
            preview_interval_ms: 200,
            handle_hit_radius: 8.0,
            brush: BrushSettings::default(),
            export_quality: 92,
        }
    }
}

impl EditorConfig {
    pub fn from_json_str(src: &str) -> EngineResult<Self> {
        let cfg: EditorConfig =
            serde_json::from_str(src).map_err(|e| EngineError::config(e.to_string()))?;
        Ok(cfg.sanitized())
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let src = std::fs::read_to_string(path)?;
        Self::from_json_str(&src)
    }

    /// Load from [`default_path`](Self::default_path), or defaults when the
    /// file is missing or unreadable.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else { return Self::default() };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("ignoring config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| EngineError::config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Per-OS config file path.
    pub fn default_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").ok()?;
            return Some(PathBuf::from(appdata).join("epigimp").join("epigimp.json"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("epigimp")
                    .join("epigimp.json"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let base = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(base.join("epigimp").join("epigimp.json"))
        }
    }

    /// Pull out-of-range values back to something the engine can use.
    pub fn sanitized(mut self) -> Self {
        self.document_width = self.document_width.max(1);
        self.document_height = self.document_height.max(1);
        self.undo_capacity = self.undo_capacity.max(1);
        self.history_log_capacity = self.history_log_capacity.max(1);
        self.handle_hit_radius = self.handle_hit_radius.max(1.0);
        self.export_quality = self.export_quality.clamp(1, 100);
        self.brush = self.brush.clamped();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let cfg = EditorConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, EditorConfig::default());
        assert_eq!(cfg.undo_capacity, 30);
        assert_eq!(cfg.history_log_capacity, 50);
        assert_eq!(cfg.preview_interval_ms, 200);
    }

    #[test]
    fn partial_config_overrides_and_sanitizes() {
        let cfg = EditorConfig::from_json_str(
            r#"{ "document_width": 0, "export_quality": 250, "brush": { "size": 4.0, "color": [255, 0, 0], "hardness": 3.0 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.document_width, 1);
        assert_eq!(cfg.export_quality, 100);
        assert_eq!(cfg.brush.size, 4.0);
        assert_eq!(cfg.brush.color, [255, 0, 0]);
        assert_eq!(cfg.brush.hardness, 1.0);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = EditorConfig::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
