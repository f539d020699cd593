// ============================================================================
// CanvasFE CLI: headless document processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   canvasfe --new 800x600 --place photo.png -o out.png
//   canvasfe --new 1200x800 --place "shots/*.jpg" --merge side -o merged.canvas
//   canvasfe -i board.canvas --color-mode gray --gamma 1.4 -o board.png
//   canvasfe -i board.canvas --zoom 2 --log run.log -v -o big.png
//
// Colour operations apply to every placed image, or to every object of the
// loaded document when nothing is placed. The output extension picks the
// format: `.canvas` saves a document, anything else exports PNG.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::compositor::Compositor;
use crate::error::Result;
use crate::ops::color::{BitwiseOp, ColorMode};
use crate::ops::merge::MergeOrientation;
use crate::ops::text::FontBook;
use crate::project::Project;
use crate::scene::ObjectId;
use crate::settings::EditorSettings;
use crate::{log_err, log_info, log_warn};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// CanvasFE headless document processor.
#[derive(Parser, Debug)]
#[command(
    name = "canvasfe",
    about = "CanvasFE headless document processor",
    long_about = "Build or load a CanvasFE document, place images, apply colour\n\
                  operations and write the result as PNG or .canvas without a GUI.\n\n\
                  Example:\n  \
                  canvasfe --new 800x600 --place photo.png --color-mode gray -o out.png"
)]
pub struct CliArgs {
    /// Document to load (.canvas).
    #[arg(short, long, value_name = "DOC.canvas", conflicts_with = "new")]
    pub input: Option<PathBuf>,

    /// Start from a blank canvas of the given size, e.g. 800x600.
    /// Sizes are clamped to 100..=1600 by 100..=1000.
    #[arg(long, value_name = "WxH")]
    pub new: Option<String>,

    /// Image file(s) to place as objects. Glob patterns accepted.
    #[arg(long, num_args = 1.., value_name = "IMG")]
    pub place: Vec<String>,

    /// Colour mode: RGB, HSV, GRAY, CIE, HLS, YCrCb.
    #[arg(long, value_name = "MODE")]
    pub color_mode: Option<String>,

    /// Gamma correction factor (> 0).
    #[arg(long, value_name = "G")]
    pub gamma: Option<f64>,

    /// Invert colours.
    #[arg(long)]
    pub negative: bool,

    /// Combine with the grayscale image: and, or, xor.
    #[arg(long, value_name = "OP")]
    pub bitwise: Option<String>,

    /// Merge the target objects into one: side, stacked.
    #[arg(long, value_name = "ORIENTATION")]
    pub merge: Option<String>,

    /// Zoom factor applied before writing.
    #[arg(long, value_name = "N")]
    pub zoom: Option<f64>,

    /// Output file (.png or .canvas).
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Session log location (default: the platform data directory).
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Print per-step information.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parsed colour/merge operations, validated before any file is touched.
#[derive(Debug, Default, PartialEq)]
struct Operations {
    color_mode: Option<ColorMode>,
    gamma: Option<f64>,
    negative: bool,
    bitwise: Option<BitwiseOp>,
    merge: Option<MergeOrientation>,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the CLI and return an OS exit code.
/// `0` = success, `1` = any surfaced error.
pub fn run(args: CliArgs) -> ExitCode {
    match &args.log {
        Some(path) => crate::logger::init_at(path),
        None => crate::logger::init(),
    }

    let start = Instant::now();
    match run_inner(&args, EditorSettings::load()) {
        Ok(()) => {
            if args.verbose {
                println!(
                    "  → {} ({:.0}ms)",
                    args.output.display(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            log_err!("CLI run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_inner(args: &CliArgs, mut settings: EditorSettings) -> std::result::Result<(), String> {
    let ops = parse_operations(args)?;

    if let Some(size) = &args.new {
        let (w, h) = parse_size(size)?;
        settings.canvas_width = w;
        settings.canvas_height = h;
    }
    let compositor = Compositor::new(load_fonts(&settings), settings.overlay_style());

    // -- Step 1: Document ------------------------------------------------
    let mut project = match &args.input {
        Some(path) => Project::open(path, &settings, compositor)
            .map_err(|e| format!("could not load '{}': {}", path.display(), e))?,
        None => Project::new_untitled(1, &settings, compositor),
    };
    if args.verbose {
        let c = &project.editor.scene.canvas;
        println!("[{}] {}x{} canvas", project.name, c.width(), c.height());
    }

    // -- Step 2: Place images -------------------------------------------
    let before = project.editor.scene.objects().len();
    let images = resolve_inputs(&args.place);
    if !args.place.is_empty() && images.is_empty() {
        return Err("no image files matched the --place pattern(s)".to_string());
    }
    for path in &images {
        project
            .place_file(path)
            .map_err(|e| format!("could not place '{}': {}", path.display(), e))?;
        if args.verbose {
            println!("  placed {}", path.display());
        }
    }
    let targets: Vec<ObjectId> = {
        let objects = project.editor.scene.objects();
        let placed = &objects[before..];
        let chosen = if placed.is_empty() { objects } else { placed };
        chosen.iter().map(|o| o.id).collect()
    };

    // -- Step 3: Colour operations --------------------------------------
    for &id in &targets {
        apply_operations(&mut project, id, &ops).map_err(|e| e.to_string())?;
    }

    // -- Step 4: Merge ----------------------------------------------------
    if let Some(orientation) = ops.merge {
        let merged = project
            .editor
            .run(|scene| scene.merge(&targets, orientation))
            .map_err(|e| format!("merge failed: {}", e))?;
        if let (Some(id), true) = (merged, args.verbose) {
            println!("  merged {} objects into #{}", targets.len(), id.0);
        }
    }

    // -- Step 5: Zoom -----------------------------------------------------
    if let Some(factor) = args.zoom {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(format!("--zoom must be a positive number, got {}", factor));
        }
        project
            .editor
            .run(|scene| {
                scene.zoom_by(factor);
                Ok(())
            })
            .map_err(|e| e.to_string())?;
    }

    // -- Step 6: Write ----------------------------------------------------
    project.editor.scene.deselect();
    project.editor.refresh();
    write_output(&mut project, &args.output).map_err(|e| format!("save failed: {}", e))
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_operations(args: &CliArgs) -> std::result::Result<Operations, String> {
    let color_mode = args
        .color_mode
        .as_deref()
        .map(|m| m.parse::<ColorMode>().map_err(|e| e.to_string()))
        .transpose()?;
    let bitwise = args.bitwise.as_deref().map(str::parse::<BitwiseOp>).transpose()?;
    let merge = args.merge.as_deref().map(str::parse::<MergeOrientation>).transpose()?;
    if let Some(g) = args.gamma {
        if !(g.is_finite() && g > 0.0) {
            return Err(format!("--gamma must be a positive number, got {}", g));
        }
    }
    Ok(Operations { color_mode, gamma: args.gamma, negative: args.negative, bitwise, merge })
}

/// Parse `WxH` (also accepts `X` and `×`).
fn parse_size(size: &str) -> std::result::Result<(u32, u32), String> {
    let err = || format!("invalid size '{}' (expected WxH, e.g. 800x600)", size);
    let (w, h) = size
        .split_once(['x', 'X', '×'])
        .ok_or_else(err)?;
    let w = w.trim().parse::<u32>().map_err(|_| err())?;
    let h = h.trim().parse::<u32>().map_err(|_| err())?;
    let (cw, ch) = EditorSettings::clamp_canvas_size(w, h);
    if (cw, ch) != (w, h) {
        log_warn!("Canvas size {}x{} clamped to {}x{}", w, h, cw, ch);
    }
    Ok((cw, ch))
}

fn load_fonts(settings: &EditorSettings) -> FontBook {
    if settings.font_dir.is_empty() {
        return FontBook::new();
    }
    FontBook::load_dir(Path::new(&settings.font_dir)).unwrap_or_else(|e| {
        log_warn!("Font directory {} unusable: {}", settings.font_dir, e);
        FontBook::new()
    })
}

/// Colour mode first (it rebuilds from the base), then the destructive filters.
fn apply_operations(project: &mut Project, id: ObjectId, ops: &Operations) -> Result<()> {
    let editor = &mut project.editor;
    editor.scene.select(id)?;
    if let Some(mode) = ops.color_mode {
        editor.run(|s| s.set_color_mode(mode))?;
    }
    if let Some(g) = ops.gamma {
        editor.run(|s| s.apply_gamma(g))?;
    }
    if let Some(op) = ops.bitwise {
        editor.run(|s| s.apply_bitwise(op))?;
    }
    if ops.negative {
        editor.run(|s| s.apply_negative())?;
    }
    Ok(())
}

fn write_output(project: &mut Project, output: &Path) -> Result<()> {
    let is_doc = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("canvas"))
        .unwrap_or(false);
    if is_doc {
        project.save_as(output)
    } else {
        project.export_png(output)
    }
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                    log_info!("Pattern '{}' matched no files", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{rgb, Channels, PixelBuffer};
    use crate::io;

    fn args(list: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("canvasfe").chain(list.iter().copied())).unwrap()
    }

    #[test]
    fn size_parsing() {
        assert_eq!(parse_size("800x600").unwrap(), (800, 600));
        assert_eq!(parse_size("5000X20").unwrap(), (1600, 100));
        assert!(parse_size("800").is_err());
        assert!(parse_size("ax600").is_err());
    }

    #[test]
    fn operations_are_validated_up_front() {
        let a = args(&["--color-mode", "lab", "--bitwise", "XOR", "--merge", "stacked", "-o", "x.png"]);
        let ops = parse_operations(&a).unwrap();
        assert_eq!(ops.color_mode, Some(ColorMode::Cie));
        assert_eq!(ops.bitwise, Some(BitwiseOp::Xor));
        assert_eq!(ops.merge, Some(MergeOrientation::Stacked));

        assert!(parse_operations(&args(&["--color-mode", "cmyk", "-o", "x.png"])).is_err());
        assert!(parse_operations(&args(&["--bitwise", "nand", "-o", "x.png"])).is_err());
        assert!(parse_operations(&args(&["--gamma", "0", "-o", "x.png"])).is_err());
    }

    #[test]
    fn input_and_new_conflict() {
        let r = CliArgs::try_parse_from(["canvasfe", "-i", "a.canvas", "--new", "10x10", "-o", "b.png"]);
        assert!(r.is_err());
        assert!(CliArgs::try_parse_from(["canvasfe", "--new", "10x10"]).is_err());
    }

    #[test]
    fn glob_resolution_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png", "c.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let literal = dir.path().join("a.png").to_string_lossy().into_owned();
        let pattern = dir.path().join("*.png").to_string_lossy().into_owned();
        let found = resolve_inputs(&[literal, pattern]);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.extension().unwrap() == "png"));
    }

    #[test]
    fn end_to_end_place_merge_save() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        io::export_png(&PixelBuffer::filled(100, 50, Channels::Rgb, rgb(255, 0, 0)), &a).unwrap();
        io::export_png(&PixelBuffer::filled(100, 50, Channels::Rgb, rgb(0, 255, 0)), &b).unwrap();
        let out = dir.path().join("out.canvas");

        let a_s = a.to_string_lossy().into_owned();
        let b_s = b.to_string_lossy().into_owned();
        let out_s = out.to_string_lossy().into_owned();
        let cli = args(&[
            "--new", "400x300", "--place", &a_s, &b_s, "--negative", "--merge", "side", "-o", &out_s,
        ]);
        run_inner(&cli, EditorSettings::default()).unwrap();

        let scene = io::load_document(&out, rgb(255, 255, 255)).unwrap();
        assert_eq!(scene.canvas.buffer.dimensions(), (400, 300));
        assert_eq!(scene.objects().len(), 3);
        // Both placed images fill the 400-wide canvas at 400x200, so the merge is 800x200.
        let merged = &scene.objects()[2];
        assert_eq!(merged.pixmap.dimensions(), (800, 200));
        assert_eq!(merged.pixmap.get_pixel(10, 10), rgb(0, 255, 255));
        assert_eq!(merged.pixmap.get_pixel(790, 10), rgb(255, 0, 255));
    }

    #[test]
    fn unknown_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.canvas").to_string_lossy().into_owned();
        let out = dir.path().join("o.png").to_string_lossy().into_owned();
        assert!(run_inner(&args(&["-i", &missing, "-o", &out]), EditorSettings::default()).is_err());
    }
}
