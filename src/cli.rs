// ============================================================================
// epigimp CLI: headless batch editing via command-line arguments
// ============================================================================
//
// Examples:
//   epigimp -i photo.png --op grayscale --op rotate=cw -o result.png
//   epigimp -i photo.jpg -o out.bmp                     (format from the output extension)
//   epigimp -i "*.jpg" --op select=10,10,200,120 --op sepia=80 --output-dir processed/
//   epigimp -i shot.png --script edits.json --format webp
//   epigimp -i scan.png --op select=0,0,64,64 --op crop --save-back
//
// Everything runs synchronously through the same `Editor` the library
// exposes; `--op` is shorthand for the JSON commands `--script` accepts.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::command::{self, EditorCommand};
use crate::config::EditorConfig;
use crate::editor::Editor;
use crate::io::ExportFormat;
use crate::ops::filters::FilterKind;
use crate::ops::transform::{self, FlipAxis, RotateDirection};
use crate::selection::Point;

// ============================================================================
// Arguments
// ============================================================================

/// epigimp headless image editor.
///
/// Apply filters, transforms and selections to image files without a UI.
#[derive(Parser, Debug)]
#[command(
    name = "epigimp",
    about = "epigimp headless layered image editor",
    long_about = "Apply filters, transforms and selections to image files and convert\n\
                  between formats. Reads PNG, JPEG, WEBP, GIF (first frame) and BMP;\n\
                  writes PNG, JPEG, BMP and GIF (WEBP when the encoder is available,\n\
                  PNG otherwise).\n\n\
                  Operations (--op, applied in order):\n  \
                  invert | grayscale | sepia[=AMOUNT] | threshold[=T] | emboss\n  \
                  brightness-contrast=B,C | pixelate[=N]\n  \
                  rotate=cw|ccw|180 | flip=h|v | resize=WxH | crop\n  \
                  select=X,Y,W,H | lasso=X1,Y1;X2,Y2;... | deselect | undo | redo\n\n\
                  Example:\n  \
                  epigimp -i photo.png --op select=0,0,100,100 --op invert -o out.png"
)]
pub struct CliArgs {
    /// Images to edit: paths or glob patterns such as "shots/*.png".
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Operation to apply; repeat for a pipeline. See the list above.
    #[arg(long = "op", value_name = "OP")]
    pub ops: Vec<String>,

    /// JSON file holding an array of editor commands, run after any --op.
    #[arg(short, long, value_name = "SCRIPT.json")]
    pub script: Option<PathBuf>,

    /// Settings file. Defaults to the per-user epigimp.json when present.
    #[arg(short, long, value_name = "CONFIG.json")]
    pub config: Option<PathBuf>,

    /// Destination file; single input only.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Destination directory; each result keeps its input's stem.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// png, jpeg, webp, bmp or gif. Without it the --output extension
    /// decides, then png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100). Defaults to the configured export quality (92).
    #[arg(short, long, value_name = "1-100")]
    pub quality: Option<u8>,

    /// Write the edited image back over its input file in the input's own
    /// format instead of exporting.
    #[arg(long)]
    pub save_back: bool,

    /// Debug-level logging and per-file timing.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Everything resolved from the arguments before any file is touched.
struct Job {
    inputs: Vec<PathBuf>,
    commands: Vec<EditorCommand>,
    format: ExportFormat,
    config: EditorConfig,
}

// ============================================================================
// Entry point
// ============================================================================

/// Process every input; `ExitCode::FAILURE` when setup or any file failed.
pub fn run(args: CliArgs) -> ExitCode {
    let job = match prepare(&args) {
        Ok(job) => job,
        Err(msg) => {
            tracing::error!("{}", msg);
            eprintln!("error: {}", msg);
            return ExitCode::FAILURE;
        }
    };

    let chatty = args.verbose || job.inputs.len() > 1;
    let mut failures = 0usize;

    for (n, input) in job.inputs.iter().enumerate() {
        if chatty {
            println!("[{}/{}] {}", n + 1, job.inputs.len(), input.display());
        }
        let started = Instant::now();

        let outcome = destination(input, &args, job.format)
            .ok_or_else(|| format!("cannot derive an output path for '{}'", input.display()))
            .and_then(|dest| edit_file(input, &dest, &job, args.save_back).map(|()| dest));

        match outcome {
            Ok(dest) if chatty => {
                println!("  → {} ({:.0}ms)", dest.display(), started.elapsed().as_secs_f64() * 1000.0);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("{}: {}", input.display(), e);
                eprintln!("  error: {}", e);
                failures += 1;
            }
        }
    }

    if failures == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn prepare(args: &CliArgs) -> Result<Job, String> {
    let mut config = match &args.config {
        Some(path) => EditorConfig::load(path)
            .map_err(|e| format!("could not load config '{}': {}", path.display(), e))?,
        None => EditorConfig::load_or_default(),
    };
    if let Some(q) = args.quality {
        config.export_quality = q.clamp(1, 100);
    }

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        return Err("no input files matched the given pattern(s)".to_string());
    }
    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        return Err(format!(
            "{} inputs but --output names a single file; use --output-dir for batches",
            inputs.len()
        ));
    }

    let format = parse_format(args.format.as_deref(), args.output.as_deref())?;

    let mut commands = args
        .ops
        .iter()
        .map(|op| parse_op(op).map_err(|e| format!("--op '{}': {}", op, e)))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(path) = &args.script {
        let src = std::fs::read_to_string(path)
            .map_err(|e| format!("could not read script '{}': {}", path.display(), e))?;
        commands.extend(EditorCommand::parse_script(&src).map_err(|e| e.to_string())?);
    }

    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("could not create output directory '{}': {}", dir.display(), e))?;
    }

    Ok(Job { inputs, commands, format, config })
}

/// Load one file, replay the commands, write the result.
fn edit_file(input: &Path, dest: &Path, job: &Job, save_back: bool) -> Result<(), String> {
    let mut editor = Editor::open(job.config.clone(), input).map_err(|e| format!("load failed: {}", e))?;

    let changed = command::run_script(&mut editor, &job.commands).map_err(|e| format!("edit failed: {}", e))?;
    tracing::info!("{}: {} of {} command(s) changed the image", input.display(), changed, job.commands.len());

    let bytes = if save_back {
        let id = editor.active_layer_id().ok_or_else(|| "document has no layers".to_string())?;
        // Encode fully before touching the input file.
        let mut bytes = Vec::new();
        let written = editor.save_back(id, &mut bytes).map_err(|e| format!("save failed: {}", e))?;
        if !written {
            return Err("active layer is not backed by a file".to_string());
        }
        bytes
    } else {
        let (bytes, used) = editor
            .export(job.format, None)
            .map_err(|e| format!("encode failed: {}", e))?;
        if used != job.format {
            eprintln!("  note: {} export unavailable, wrote PNG instead", job.format.mime());
        }
        bytes
    };
    std::fs::write(dest, bytes).map_err(|e| format!("save failed: {}", e))
}

// ============================================================================
// Paths and formats
// ============================================================================

/// Literal paths first-come, globs expanded in order, duplicates dropped.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let literal = PathBuf::from(pattern);
        if literal.exists() {
            push_unique(&mut found, literal);
            continue;
        }
        let Ok(paths) = glob::glob(pattern) else {
            tracing::warn!("invalid glob '{}'", pattern);
            eprintln!("warning: invalid glob '{}'", pattern);
            continue;
        };
        let before = found.len();
        for path in paths.flatten() {
            push_unique(&mut found, path);
        }
        if found.len() == before {
            eprintln!("warning: '{}' matched no files", pattern);
        }
    }
    found
}

fn push_unique(list: &mut Vec<PathBuf>, path: PathBuf) {
    if !list.contains(&path) {
        list.push(path);
    }
}

/// `--format` wins, then the output extension, then PNG.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> Result<ExportFormat, String> {
    match format_arg {
        Some(f) => f.parse::<ExportFormat>().map_err(|e| e.to_string()),
        None => Ok(output.and_then(ExportFormat::from_path).unwrap_or_default()),
    }
}

fn destination(input: &Path, args: &CliArgs, format: ExportFormat) -> Option<PathBuf> {
    if args.save_back {
        return Some(input.to_path_buf());
    }
    build_output_path(input, args.output.as_deref(), args.output_dir.as_deref(), format)
}

/// `--output` as given; else `<output-dir>/<stem>.<ext>`; else next to the
/// input, suffixed `_out` when that would overwrite it.
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: ExportFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }
    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let file_name = |suffix: &str| format!("{stem}{suffix}.{}", format.extension());

    if let Some(dir) = output_dir {
        return Some(dir.join(file_name("")));
    }
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let beside = parent.join(file_name(""));
    Some(if beside == input { parent.join(file_name("_out")) } else { beside })
}

// ============================================================================
// --op mini-language
// ============================================================================

/// Parse one `--op` argument (`name` or `name=args`) into a command.
pub fn parse_op(op: &str) -> Result<EditorCommand, String> {
    let (name, arg) = match op.split_once('=') {
        Some((n, a)) => (n.trim(), Some(a.trim())),
        None => (op.trim(), None),
    };
    match name.to_lowercase().as_str() {
        "invert" => filter(FilterKind::Invert),
        "grayscale" | "greyscale" => filter(FilterKind::Grayscale),
        "emboss" => filter(FilterKind::Emboss),
        "sepia" => filter(FilterKind::Sepia { amount: number_or(arg, 60.0)? }),
        "threshold" => filter(FilterKind::Threshold { threshold: number_or(arg, 128)? }),
        "pixelate" => filter(FilterKind::Pixelate { block_size: number_or(arg, 8)? }),
        "brightness-contrast" | "bc" => {
            let [brightness, contrast] = numbers::<f32, 2>(required(arg)?)?;
            filter(FilterKind::BrightnessContrast { brightness, contrast })
        }
        "rotate" => {
            let direction = match required(arg)?.to_lowercase().as_str() {
                "cw" | "90" => RotateDirection::Cw,
                "ccw" | "-90" | "270" => RotateDirection::Ccw,
                "180" | "flip" => RotateDirection::Flip180,
                other => return Err(format!("unknown rotation '{}'", other)),
            };
            Ok(EditorCommand::Rotate { direction })
        }
        "flip" => {
            let axis = match required(arg)?.to_lowercase().as_str() {
                "h" | "horizontal" => FlipAxis::Horizontal,
                "v" | "vertical" => FlipAxis::Vertical,
                other => return Err(format!("unknown flip axis '{}'", other)),
            };
            Ok(EditorCommand::Flip { axis })
        }
        "resize" => {
            let (w, h) = transform::parse_size(required(arg)?).ok_or("expected WIDTHxHEIGHT")?;
            Ok(EditorCommand::Resize { width: w as i64, height: h as i64 })
        }
        "crop" => Ok(EditorCommand::CropToSelection),
        "select" => {
            let [x, y, width, height] = numbers::<f32, 4>(required(arg)?)?;
            Ok(EditorCommand::SelectRect { x, y, width, height })
        }
        "lasso" => {
            let points = required(arg)?
                .split(';')
                .filter(|s| !s.trim().is_empty())
                .map(|pair| numbers::<f32, 2>(pair).map(|[x, y]| Point::new(x, y)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(EditorCommand::SelectPolygon { points })
        }
        "deselect" => Ok(EditorCommand::ClearSelection),
        "undo" => Ok(EditorCommand::Undo),
        "redo" => Ok(EditorCommand::Redo),
        other => Err(format!("unknown operation '{}'", other)),
    }
}

fn filter(kind: FilterKind) -> Result<EditorCommand, String> {
    Ok(EditorCommand::ApplyFilter { kind })
}

fn required(arg: Option<&str>) -> Result<&str, String> {
    arg.filter(|a| !a.is_empty()).ok_or_else(|| "missing argument".to_string())
}

fn number_or<T: std::str::FromStr>(arg: Option<&str>, default: T) -> Result<T, String> {
    match arg {
        None | Some("") => Ok(default),
        Some(a) => a.parse().map_err(|_| format!("'{}' is not a number", a)),
    }
}

fn numbers<T: std::str::FromStr + Copy + Default, const N: usize>(s: &str) -> Result<[T; N], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("expected {} comma-separated numbers, got '{}'", N, s));
    }
    let mut out = [T::default(); N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part.parse().map_err(|_| format!("'{}' is not a number", part))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filters_with_defaults() {
        assert_eq!(parse_op("invert").unwrap(), EditorCommand::ApplyFilter { kind: FilterKind::Invert });
        assert_eq!(
            parse_op("sepia").unwrap(),
            EditorCommand::ApplyFilter { kind: FilterKind::Sepia { amount: 60.0 } }
        );
        assert_eq!(
            parse_op("threshold=200").unwrap(),
            EditorCommand::ApplyFilter { kind: FilterKind::Threshold { threshold: 200 } }
        );
        assert_eq!(
            parse_op("brightness-contrast=10, -20").unwrap(),
            EditorCommand::ApplyFilter {
                kind: FilterKind::BrightnessContrast { brightness: 10.0, contrast: -20.0 }
            }
        );
    }

    #[test]
    fn parses_geometry() {
        assert_eq!(parse_op("rotate=180").unwrap(), EditorCommand::Rotate { direction: RotateDirection::Flip180 });
        assert_eq!(parse_op("flip=v").unwrap(), EditorCommand::Flip { axis: FlipAxis::Vertical });
        assert_eq!(parse_op("resize=640x480").unwrap(), EditorCommand::Resize { width: 640, height: 480 });
        assert_eq!(
            parse_op("select=1,2,3,4").unwrap(),
            EditorCommand::SelectRect { x: 1.0, y: 2.0, width: 3.0, height: 4.0 }
        );
        assert_eq!(
            parse_op("lasso=0,0;10,0;5,8").unwrap(),
            EditorCommand::SelectPolygon {
                points: vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(5.0, 8.0)]
            }
        );
    }

    #[test]
    fn rejects_malformed_ops() {
        assert!(parse_op("rotate").is_err());
        assert!(parse_op("rotate=45").is_err());
        assert!(parse_op("select=1,2,3").is_err());
        assert!(parse_op("pixelate=big").is_err());
        assert!(parse_op("sharpen").is_err());
    }

    #[test]
    fn format_resolution() {
        assert_eq!(parse_format(Some("jpg"), None).unwrap(), ExportFormat::Jpeg);
        assert_eq!(parse_format(None, Some(Path::new("a/b.bmp"))).unwrap(), ExportFormat::Bmp);
        assert_eq!(parse_format(None, None).unwrap(), ExportFormat::Png);
        assert!(parse_format(Some("tiff"), None).is_err());
    }

    #[test]
    fn output_path_avoids_clobbering_input() {
        let out = build_output_path(Path::new("dir/a.png"), None, None, ExportFormat::Png).unwrap();
        assert_eq!(out, PathBuf::from("dir/a_out.png"));
        let out = build_output_path(Path::new("dir/a.png"), None, Some(Path::new("o")), ExportFormat::Webp).unwrap();
        assert_eq!(out, PathBuf::from("o/a.webp"));
    }

    #[test]
    fn clap_accepts_repeated_ops() {
        let args = CliArgs::try_parse_from([
            "epigimp", "-i", "a.png", "--op", "invert", "--op", "rotate=cw", "-q", "80",
        ])
        .unwrap();
        assert_eq!(args.ops, vec!["invert", "rotate=cw"]);
        assert_eq!(args.quality, Some(80));
    }
}
