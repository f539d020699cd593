use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::canvas::PixelBuffer;
use crate::compositor::Compositor;
use crate::error::Result;
use crate::io;
use crate::log_info;
use crate::settings::EditorSettings;
use crate::tools::Editor;

/// Single open document.
pub struct Project {
    pub id: Uuid,
    pub editor: Editor,
    /// `None` for unsaved/untitled documents.
    pub path: Option<PathBuf>,

    /// Display name (derived from path or "Untitled-X")
    pub name: String,

    /// Editor revision at the last save or load.
    saved_revision: u64,
}

impl Project {
    pub fn new_untitled(untitled_counter: usize, settings: &EditorSettings, compositor: Compositor) -> Self {
        let mut editor = Editor::new(settings.new_scene(), compositor);
        editor.brush_size = settings.brush_size;
        editor.font = crate::scene::FontSpec::new(settings.font_family.clone(), settings.font_size);
        Self {
            id: Uuid::new_v4(),
            saved_revision: editor.revision(),
            editor,
            path: None,
            name: format!("Untitled-{}", untitled_counter),
        }
    }

    /// Open a saved document. Nothing is created if the file fails to load.
    pub fn open(path: &Path, settings: &EditorSettings, compositor: Compositor) -> Result<Self> {
        let mut project = Self::new_untitled(0, settings, compositor);
        project.load(path)?;
        Ok(project)
    }

    pub fn is_dirty(&self) -> bool {
        self.editor.revision() != self.saved_revision
    }

    pub fn mark_clean(&mut self) {
        self.saved_revision = self.editor.revision();
    }

    /// Replace the scene with the document at `path`.
    ///
    /// The file is fully decoded before anything is swapped in, so a bad
    /// file leaves the current scene untouched.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let background = self.editor.scene.canvas.background;
        let mut scene = io::load_document(path, background)?;
        scene.zoom_step = self.editor.scene.zoom_step;
        scene.default_position = self.editor.scene.default_position;
        self.editor.replace_scene(scene);
        self.path = Some(path.to_path_buf());
        self.update_name_from_path();
        self.mark_clean();
        log_info!("Opened {}", path.display());
        Ok(())
    }

    /// Save to the current path. Untitled documents have nowhere to go yet
    /// and report `Ok(false)`.
    pub fn save(&mut self) -> Result<bool> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        io::save_document(&self.editor.scene, &path)?;
        self.mark_clean();
        Ok(true)
    }

    pub fn save_as(&mut self, path: &Path) -> Result<()> {
        io::save_document(&self.editor.scene, path)?;
        self.path = Some(path.to_path_buf());
        self.update_name_from_path();
        self.mark_clean();
        Ok(())
    }

    /// Write the current canvas buffer as PNG. Does not change the dirty state.
    pub fn export_png(&self, path: &Path) -> Result<()> {
        io::export_png(&self.editor.scene.snapshot(), path)
    }

    /// Import an image file as a new object fitted to the canvas.
    pub fn place_file(&mut self, path: &Path) -> Result<()> {
        let image: PixelBuffer = io::import_image(path)?;
        self.editor.run(|scene| Ok(scene.place_image(image)))?;
        Ok(())
    }

    pub fn update_name_from_path(&mut self) {
        if let Some(ref path) = self.path {
            self.name = path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string());
        }
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty() {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{rgb, Channels};
    use crate::geometry::PointF;
    use crate::scene::{Element, Pen};

    fn small_settings() -> EditorSettings {
        EditorSettings { canvas_width: 200, canvas_height: 150, ..EditorSettings::default() }
    }

    #[test]
    fn untitled_naming_and_dirty_flag() {
        let mut p = Project::new_untitled(3, &small_settings(), Compositor::default());
        assert_eq!(p.name, "Untitled-3");
        assert!(!p.is_dirty());
        assert_eq!(p.display_title(), "Untitled-3");
        p.editor
            .run(|s| Ok(s.add_object(PixelBuffer::filled(10, 10, Channels::Rgb, rgb(0, 0, 0)))))
            .unwrap();
        assert!(p.is_dirty());
        assert_eq!(p.display_title(), "Untitled-3*");
        assert!(!p.save().unwrap());
        assert!(p.is_dirty());
    }

    #[test]
    fn save_as_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.canvas");
        let mut p = Project::new_untitled(1, &small_settings(), Compositor::default());
        p.editor
            .run(|s| {
                s.add_element(Element::Stroke {
                    pen: Pen::new(rgb(0, 0, 255), 4),
                    path: vec![PointF::new(1.0, 1.0), PointF::new(50.0, 50.0)],
                });
                Ok(s.add_object(PixelBuffer::filled(20, 10, Channels::Rgb, rgb(9, 9, 9))))
            })
            .unwrap();
        p.save_as(&path).unwrap();
        assert!(!p.is_dirty());
        assert_eq!(p.name, "doc.canvas");

        let q = Project::open(&path, &small_settings(), Compositor::default()).unwrap();
        assert_ne!(q.id, p.id);
        assert!(!q.is_dirty());
        assert_eq!(q.editor.scene.elements().len(), 1);
        assert_eq!(q.editor.scene.objects().len(), 1);
        assert_eq!(q.editor.scene.canvas.buffer, p.editor.scene.canvas.buffer);
    }

    #[test]
    fn failed_load_keeps_scene_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.canvas");
        std::fs::write(&bad, b"not a document").unwrap();
        let mut p = Project::new_untitled(2, &small_settings(), Compositor::default());
        p.editor
            .run(|s| Ok(s.add_object(PixelBuffer::filled(10, 10, Channels::Rgb, rgb(0, 0, 0)))))
            .unwrap();
        assert!(p.load(&bad).is_err());
        assert_eq!(p.name, "Untitled-2");
        assert_eq!(p.editor.scene.objects().len(), 1);
        assert!(p.is_dirty());
    }

    #[test]
    fn place_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("in.png");
        let out = dir.path().join("out.png");
        io::export_png(&PixelBuffer::filled(400, 100, Channels::Rgb, rgb(200, 0, 0)), &img).unwrap();

        let mut p = Project::new_untitled(1, &small_settings(), Compositor::default());
        p.place_file(&img).unwrap();
        let obj = &p.editor.scene.objects()[0];
        assert_eq!(obj.pixmap.dimensions(), (200, 50));
        p.export_png(&out).unwrap();
        let back = io::import_image(&out).unwrap();
        assert_eq!(back.dimensions(), (200, 150));
        assert_eq!(back.get_pixel(100, 75), rgb(200, 0, 0));
    }
}
