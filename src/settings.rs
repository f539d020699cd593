use image::Rgba;
use std::path::{Path, PathBuf};

use crate::compositor::OverlayStyle;
use crate::error::Result;
use crate::scene::Scene;

/// Allowed range for new-document width.
pub const CANVAS_WIDTH_RANGE: (u32, u32) = (100, 1600);
/// Allowed range for new-document height.
pub const CANVAS_HEIGHT_RANGE: (u32, u32) = (100, 1000);

/// User preferences, persisted as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub background: Rgba<u8>,
    pub highlight: Rgba<u8>,
    pub crop_outline: Rgba<u8>,
    pub zoom_step: f64,
    pub object_x: i32,
    pub object_y: i32,
    pub brush_size: u32,
    pub font_family: String,
    pub font_size: f32,
    /// Directory scanned for `.ttf` / `.otf` files. Empty means none.
    pub font_dir: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            canvas_width: 1200,
            canvas_height: 800,
            background: Rgba([255, 255, 255, 255]),
            highlight: Rgba([255, 0, 0, 255]),
            crop_outline: Rgba([255, 0, 0, 255]),
            zoom_step: 1.1,
            object_x: 50,
            object_y: 50,
            brush_size: 3,
            font_family: "sans".to_string(),
            font_size: 12.0,
            font_dir: String::new(),
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/canvasfe/canvasfe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\CanvasFE\canvasfe_settings.cfg
    /// On macOS:   ~/Library/Application Support/CanvasFE/canvasfe_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("CanvasFE").join("canvasfe_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("CanvasFE")
                    .join("canvasfe_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("canvasfe").join("canvasfe_settings.cfg"))
        }
    }

    /// Serialize a colour as "r,g,b,a"
    fn color_to_str(c: Rgba<u8>) -> String {
        format!("{},{},{},{}", c[0], c[1], c[2], c[3])
    }

    /// Parse a colour from "r,g,b,a"
    fn str_to_color(s: &str) -> Option<Rgba<u8>> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 4 {
            let r = parts[0].trim().parse::<u8>().ok()?;
            let g = parts[1].trim().parse::<u8>().ok()?;
            let b = parts[2].trim().parse::<u8>().ok()?;
            let a = parts[3].trim().parse::<u8>().ok()?;
            Some(Rgba([r, g, b, a]))
        } else {
            None
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "canvas_width={}\n\
             canvas_height={}\n\
             background={}\n\
             highlight={}\n\
             crop_outline={}\n\
             zoom_step={}\n\
             object_x={}\n\
             object_y={}\n\
             brush_size={}\n\
             font_family={}\n\
             font_size={}\n\
             font_dir={}\n",
            self.canvas_width,
            self.canvas_height,
            Self::color_to_str(self.background),
            Self::color_to_str(self.highlight),
            Self::color_to_str(self.crop_outline),
            self.zoom_step,
            self.object_x,
            self.object_y,
            self.brush_size,
            self.font_family,
            self.font_size,
            self.font_dir,
        )
    }

    /// Parse `key=value` lines. Unknown keys are ignored and malformed values
    /// keep their defaults.
    pub fn parse(content: &str) -> Self {
        let d = Self::default();
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "canvas_width" => s.canvas_width = val.parse().unwrap_or(d.canvas_width),
                "canvas_height" => s.canvas_height = val.parse().unwrap_or(d.canvas_height),
                "background" => {
                    if let Some(c) = Self::str_to_color(val) { s.background = c; }
                }
                "highlight" => {
                    if let Some(c) = Self::str_to_color(val) { s.highlight = c; }
                }
                "crop_outline" => {
                    if let Some(c) = Self::str_to_color(val) { s.crop_outline = c; }
                }
                "zoom_step" => {
                    s.zoom_step = val
                        .parse::<f64>()
                        .ok()
                        .filter(|z| z.is_finite() && *z > 1.0)
                        .unwrap_or(d.zoom_step);
                }
                "object_x" => s.object_x = val.parse().unwrap_or(d.object_x),
                "object_y" => s.object_y = val.parse().unwrap_or(d.object_y),
                "brush_size" => s.brush_size = val.parse().unwrap_or(d.brush_size),
                "font_family" => s.font_family = val.to_string(),
                "font_size" => s.font_size = val.parse().unwrap_or(d.font_size),
                "font_dir" => s.font_dir = val.to_string(),
                _ => {}
            }
        }
        s
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        match Self::settings_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    /// Clamp a requested new-document size to the supported ranges.
    pub fn clamp_canvas_size(width: u32, height: u32) -> (u32, u32) {
        (
            width.clamp(CANVAS_WIDTH_RANGE.0, CANVAS_WIDTH_RANGE.1),
            height.clamp(CANVAS_HEIGHT_RANGE.0, CANVAS_HEIGHT_RANGE.1),
        )
    }

    pub fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            highlight: self.highlight,
            crop_outline: self.crop_outline,
            ..OverlayStyle::default()
        }
    }

    /// Blank scene using the default (clamped) size and these preferences.
    pub fn new_scene(&self) -> Scene {
        let (w, h) = Self::clamp_canvas_size(self.canvas_width, self.canvas_height);
        let mut scene = Scene::new(w, h, self.background);
        self.apply_to(&mut scene);
        scene
    }

    pub fn apply_to(&self, scene: &mut Scene) {
        scene.zoom_step = self.zoom_step;
        scene.default_position = (self.object_x, self.object_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.cfg");
        let mut s = EditorSettings::default();
        s.canvas_width = 640;
        s.background = Rgba([1, 2, 3, 4]);
        s.zoom_step = 1.25;
        s.font_dir = "/tmp/fonts".into();
        s.save_to(&path).unwrap();
        assert_eq!(EditorSettings::load_from(&path), s);
    }

    #[test]
    fn malformed_values_fall_back() {
        let s = EditorSettings::parse(
            "canvas_width=wide\nbackground=1,2,3\nzoom_step=0.5\nunknown=1\nno equals sign\nbrush_size= 7 \n",
        );
        let d = EditorSettings::default();
        assert_eq!(s.canvas_width, d.canvas_width);
        assert_eq!(s.background, d.background);
        assert_eq!(s.zoom_step, d.zoom_step);
        assert_eq!(s.brush_size, 7);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = EditorSettings::load_from(&dir.path().join("nope.cfg"));
        assert_eq!(s, EditorSettings::default());
    }

    #[test]
    fn canvas_size_is_clamped() {
        assert_eq!(EditorSettings::clamp_canvas_size(50, 5000), (100, 1000));
        assert_eq!(EditorSettings::clamp_canvas_size(800, 600), (800, 600));
        let scene = EditorSettings::default().new_scene();
        assert_eq!(scene.canvas.buffer.dimensions(), (1200, 800));
        assert_eq!(scene.default_position, (50, 50));
    }
}
