//! Persistent settings and the last-used caption color.

use std::path::PathBuf;

use crate::caption::Rgb;

/// Filename handed to the save collaborator on export.
pub const DEFAULT_EXPORT_FILENAME: &str = "meme.png";

/// Remembers the color the next caption starts with.
pub trait PreferenceStore {
    /// Last color chosen by the user, or white.
    fn last_color(&self) -> Rgb;

    fn set_last_color(&mut self, color: Rgb);
}

/// Preferences that live only as long as the process.
#[derive(Clone, Debug, Default)]
pub struct MemoryPreferences {
    color: Option<Rgb>,
}

impl PreferenceStore for MemoryPreferences {
    fn last_color(&self) -> Rgb {
        self.color.unwrap_or_default()
    }

    fn set_last_color(&mut self, color: Rgb) {
        self.color = Some(color);
    }
}

/// Application settings that persist across sessions.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Color given to newly created captions
    pub last_color: Rgb,
    /// File name offered when downloading the composited image
    pub export_filename: String,
    /// Directory searched for caption font files before system fonts
    pub font_dir: Option<PathBuf>,
    /// Backing file; `None` keeps everything in memory.
    path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_color: Rgb::WHITE,
            export_filename: DEFAULT_EXPORT_FILENAME.to_string(),
            font_dir: None,
            path: None,
        }
    }
}

impl Settings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/captionfe/captionfe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\CaptionFE\captionfe_settings.cfg
    /// On macOS:   ~/Library/Application Support/CaptionFE/captionfe_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?
                .join("captionfe");
            return Some(config_dir.join("captionfe_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("CaptionFE").join("captionfe_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("CaptionFE")
                    .join("captionfe_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("captionfe_settings.cfg")))
        }
    }

    /// Load settings from the platform location (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(path),
            None => Self::default(),
        }
    }

    /// Load settings from `path`; later saves go back to the same file.
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut s = match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        };
        s.path = Some(path);
        s
    }

    fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "last_color" => {
                    if let Some(c) = Rgb::from_hex(val) {
                        s.last_color = c;
                    }
                }
                "export_filename" => {
                    if !val.is_empty() {
                        s.export_filename = val.to_string();
                    }
                }
                "font_dir" => {
                    s.font_dir = (!val.is_empty()).then(|| PathBuf::from(val));
                }
                _ => {}
            }
        }
        s
    }

    fn to_config(&self) -> String {
        let font_dir = self
            .font_dir
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        format!(
            "last_color={}\n\
             export_filename={}\n\
             font_dir={}\n",
            self.last_color.to_hex(),
            self.export_filename,
            font_dir,
        )
    }

    /// Save settings to disk. Failures are logged, never fatal.
    pub fn save(&self) {
        let Some(path) = &self.path else { return };
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Err(e) = std::fs::write(path, self.to_config()) {
            log_warn!("Could not write settings to {}: {}", path.display(), e);
        }
    }
}

impl PreferenceStore for Settings {
    fn last_color(&self) -> Rgb {
        self.last_color
    }

    fn set_last_color(&mut self, color: Rgb) {
        self.last_color = color;
        self.save();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load_from(dir.path().join("missing.cfg"));
        assert_eq!(s.last_color(), Rgb::WHITE);
        assert_eq!(s.export_filename, DEFAULT_EXPORT_FILENAME);
        assert!(s.font_dir.is_none());
    }

    #[test]
    fn color_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("captionfe_settings.cfg");

        let mut s = Settings::load_from(&path);
        s.set_last_color(Rgb::new(255, 0, 0));

        let reloaded = Settings::load_from(&path);
        assert_eq!(reloaded.last_color(), Rgb::new(255, 0, 0));
    }

    #[test]
    fn corrupt_lines_are_ignored() {
        let s = Settings::parse(
            "garbage\nlast_color=not-a-color\nexport_filename=out.png\nfont_dir=/tmp/fonts\nunknown=1\n",
        );
        assert_eq!(s.last_color, Rgb::WHITE);
        assert_eq!(s.export_filename, "out.png");
        assert_eq!(s.font_dir, Some(PathBuf::from("/tmp/fonts")));
    }

    #[test]
    fn config_text_round_trips() {
        let s = Settings {
            last_color: Rgb::new(1, 2, 3),
            export_filename: "caption.png".to_string(),
            font_dir: None,
            path: None,
        };
        let back = Settings::parse(&s.to_config());
        assert_eq!(back.last_color, s.last_color);
        assert_eq!(back.export_filename, s.export_filename);
        assert_eq!(back.font_dir, None);
    }

    #[test]
    fn memory_preferences_default_to_white() {
        let mut p = MemoryPreferences::default();
        assert_eq!(p.last_color(), Rgb::WHITE);
        p.set_last_color(Rgb::new(0, 0, 255));
        assert_eq!(p.last_color(), Rgb::new(0, 0, 255));
    }
}
