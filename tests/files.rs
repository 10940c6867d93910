use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use epigimp::canvas::RasterBuffer;
use epigimp::cli::{self, CliArgs};
use epigimp::config::EditorConfig;
use epigimp::editor::Editor;
use epigimp::io::{self, ExportFormat};
use epigimp::ops::filters::FilterKind;
use image::Rgba;

/// Fresh scratch directory under the system temp dir.
fn scratch() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("epigimp-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn checker(w: u32, h: u32) -> RasterBuffer {
    let mut buf = RasterBuffer::try_new(w, h).unwrap();
    for y in 0..h {
        for x in 0..w {
            let v = if (x + y) % 2 == 0 { 250 } else { 5 };
            buf.set_pixel(x, y, Rgba([v, v, v, 255]));
        }
    }
    buf
}

fn write_png(path: &PathBuf, buf: &RasterBuffer) {
    std::fs::write(path, io::encode(buf, ExportFormat::Png, 92).unwrap()).unwrap();
}

fn read(path: &PathBuf) -> RasterBuffer {
    io::decode_image(&std::fs::read(path).unwrap()).unwrap().0
}

fn succeeded(code: ExitCode) -> bool {
    code == ExitCode::SUCCESS
}

#[test]
fn opened_layer_saves_back_in_its_own_format() {
    let dir = scratch();
    let path = dir.join("photo.bmp");
    std::fs::write(&path, io::encode_bmp(&checker(6, 4))).unwrap();

    let mut ed = Editor::open(EditorConfig::default(), &path).unwrap();
    let layer = ed.document().active_layer().unwrap();
    assert_eq!(layer.name, "photo.bmp");
    assert_eq!(layer.source.as_ref().unwrap().mime, "image/bmp");
    assert_eq!(ed.display().dimensions(), (6, 4));

    ed.apply_filter(&FilterKind::Invert).unwrap();
    let id = ed.active_layer_id().unwrap();
    let mut sink = Vec::new();
    assert!(ed.save_back(id, &mut sink).unwrap());
    assert_eq!(&sink[0..2], b"BM");
    let (back, _) = io::decode_image(&sink).unwrap();
    assert_eq!(back.pixel(0, 0).unwrap().0, [5, 5, 5, 255]);

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn layers_from_memory_are_not_save_back_targets() {
    let mut ed = Editor::new(EditorConfig::default()).unwrap();
    let png = io::encode(&checker(3, 3), ExportFormat::Png, 92).unwrap();
    let id = ed.add_layer_from_bytes("pasted.png", &png).unwrap();
    let mut sink = Vec::new();
    assert!(!ed.save_back(id, &mut sink).unwrap());
    assert!(sink.is_empty());
    assert!(ed.add_layer_from_bytes("junk", b"nope").is_err());
}

#[test]
fn export_falls_back_to_png() {
    let mut ed = Editor::new(EditorConfig {
        document_width: 5,
        document_height: 5,
        ..EditorConfig::default()
    })
    .unwrap();
    ed.add_layer_from_buffer("c", checker(5, 5));
    let (bytes, used) = ed.export(ExportFormat::Avif, None).unwrap();
    assert_eq!(used, ExportFormat::Png);
    assert_eq!(io::decode_image(&bytes).unwrap().0, checker(5, 5));

    let (jpeg, used) = ed.export(ExportFormat::Jpeg, Some(70)).unwrap();
    assert_eq!(used, ExportFormat::Jpeg);
    assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
}

#[test]
fn cli_runs_an_op_pipeline() {
    let dir = scratch();
    let input = dir.join("in.png");
    let output = dir.join("out.bmp");
    write_png(&input, &checker(20, 10));

    let args = CliArgs::try_parse_from([
        "epigimp",
        "-i",
        input.to_str().unwrap(),
        "--op",
        "rotate=cw",
        "--op",
        "select=0,0,10,10",
        "--op",
        "crop",
        "-o",
        output.to_str().unwrap(),
    ])
    .unwrap();
    assert!(succeeded(cli::run(args)));

    let result = read(&output);
    assert_eq!(result.dimensions(), (10, 10));
    assert_eq!(&std::fs::read(&output).unwrap()[0..2], b"BM");

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn cli_runs_json_scripts_and_batches() {
    let dir = scratch();
    write_png(&dir.join("a.png"), &checker(4, 4));
    write_png(&dir.join("b.png"), &checker(4, 4));
    let script = dir.join("edit.json");
    std::fs::write(
        &script,
        r#"[{"op": "apply_filter", "kind": {"filter": "invert"}},
            {"op": "flip", "axis": "vertical"}]"#,
    )
    .unwrap();
    let out_dir = dir.join("out");
    let pattern = dir.join("*.png");

    let args = CliArgs::try_parse_from([
        "epigimp",
        "-i",
        pattern.to_str().unwrap(),
        "--script",
        script.to_str().unwrap(),
        "--output-dir",
        out_dir.to_str().unwrap(),
        "-f",
        "png",
    ])
    .unwrap();
    assert!(succeeded(cli::run(args)));

    for name in ["a.png", "b.png"] {
        let result = read(&out_dir.join(name));
        // (0, 3) was dark; inverted and flipped onto the top row
        assert_eq!(result.pixel(0, 0).unwrap().0, [250, 250, 250, 255]);
    }

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn cli_save_back_overwrites_the_input() {
    let dir = scratch();
    let input = dir.join("scan.png");
    write_png(&input, &checker(8, 8));

    let args = CliArgs::try_parse_from([
        "epigimp",
        "-i",
        input.to_str().unwrap(),
        "--op",
        "threshold=128",
        "--op",
        "resize=4x2",
        "--save-back",
    ])
    .unwrap();
    assert!(succeeded(cli::run(args)));
    assert_eq!(read(&input).dimensions(), (4, 2));

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn cli_rejects_bad_ops_and_missing_inputs() {
    let dir = scratch();
    let input = dir.join("x.png");
    write_png(&input, &checker(2, 2));

    let bad_op = CliArgs::try_parse_from(["epigimp", "-i", input.to_str().unwrap(), "--op", "melt"]).unwrap();
    assert!(!succeeded(cli::run(bad_op)));

    let missing = dir.join("nothing-*.png");
    let none = CliArgs::try_parse_from(["epigimp", "-i", missing.to_str().unwrap()]).unwrap();
    assert!(!succeeded(cli::run(none)));

    std::fs::remove_dir_all(dir).ok();
}
