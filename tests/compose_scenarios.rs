//! End-to-end compositing scenarios
//!
//! Exercises background painting, filter presets and export through the
//! public API only.

mod common;

use common::{cutout_500, png_bytes};
use image::Rgba;
use imgly_bgstudio::{
    compose, render, BackgroundSpec, EditorSession, ExportOptions, FilterParam, FilterState,
    OutputFormat, Rgb, SourceImage,
};

fn cutout_source() -> SourceImage {
    SourceImage::decode(&png_bytes(&cutout_500())).expect("cut-out should decode")
}

#[test]
fn test_white_background_shows_through_transparent_border() {
    let source = cutout_source();
    let surface = compose(
        &source,
        &FilterState::IDENTITY,
        &BackgroundSpec::Solid { color: Rgb::WHITE },
    );

    assert_eq!(surface.dimensions(), (500, 500));
    for (x, y) in [(0, 0), (499, 0), (0, 499), (499, 499), (250, 10), (10, 250)] {
        assert_eq!(surface.get_pixel(x, y), &Rgba([255, 255, 255, 255]), "pixel {x},{y}");
    }
}

#[test]
fn test_opaque_source_covers_background() {
    let source = cutout_source();
    for background in [
        BackgroundSpec::Solid { color: Rgb::BLACK },
        BackgroundSpec::Gradient {
            from: Rgb(0x66, 0x7e, 0xea),
            to: Rgb(0x76, 0x4b, 0xa2),
        },
        BackgroundSpec::Transparent,
    ] {
        let surface = compose(&source, &FilterState::IDENTITY, &background);
        assert_eq!(surface.get_pixel(250, 250), &Rgba([200, 30, 30, 255]), "{background}");
    }
}

#[test]
fn test_transparent_background_keeps_alpha() {
    let source = cutout_source();
    let surface = compose(&source, &FilterState::IDENTITY, &BackgroundSpec::Transparent);
    assert_eq!(surface.get_pixel(0, 0)[3], 0);
    assert_eq!(surface.get_pixel(250, 250)[3], 255);
}

#[test]
fn test_gradient_varies_along_diagonal() {
    let source = cutout_source();
    let surface = compose(
        &source,
        &FilterState::IDENTITY,
        &BackgroundSpec::Gradient {
            from: Rgb::BLACK,
            to: Rgb::WHITE,
        },
    );
    let start = surface.get_pixel(0, 0);
    let end = surface.get_pixel(499, 499);
    assert!(start[0] < 5, "top-left should be close to the first stop");
    assert!(end[0] > 250, "bottom-right should be close to the second stop");
    assert_eq!(start[3], 255);
}

#[test]
fn test_render_is_deterministic() {
    let source = cutout_source();
    let filters = FilterState::preset("dramatic").expect("preset exists");
    let background = BackgroundSpec::Custom {
        color: Rgb(12, 34, 56),
    };
    let options = ExportOptions::new(OutputFormat::Png);

    let first = render(&source, &filters, &background, &options).unwrap();
    let second = render(&source, &filters, &background, &options).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.dimensions(), (500, 500));
}

#[test]
fn test_original_preset_restores_identity_after_any_other() {
    let source = cutout_source();
    let baseline = EditorSession::new(source.clone()).preview();

    for preset in imgly_bgstudio::PRESETS {
        let mut session = EditorSession::new(source.clone());
        session.apply_preset(preset.name).unwrap();
        session.set_filter(FilterParam::Blur, 3.0);
        session.apply_preset("Original").unwrap();

        assert_eq!(session.filters(), &FilterState::IDENTITY, "after {}", preset.name);
        assert_eq!(session.preview(), baseline, "after {}", preset.name);
    }
}

#[test]
fn test_grayscale_removes_colour_from_subject() {
    let mut session = EditorSession::new(cutout_source());
    session.set_filter(FilterParam::Grayscale, 100.0);
    let preview = session.preview();
    let px = preview.get_pixel(250, 250);
    assert_eq!(px[0], px[1]);
    assert_eq!(px[1], px[2]);
}

#[test]
fn test_jpeg_export_flattens_transparency() {
    let mut session = EditorSession::new(cutout_source());
    session.set_export_options(ExportOptions::new(OutputFormat::Jpeg).with_jpeg_quality(100));
    let output = session.render().unwrap();

    let decoded = image::load_from_memory(output.bytes()).unwrap().to_rgb8();
    let corner = decoded.get_pixel(0, 0);
    assert!(corner.0.iter().all(|&c| c > 245), "corner was {:?}", corner);
}

#[test]
fn test_output_round_trips_as_png() {
    let mut session = EditorSession::new(cutout_source());
    session.set_background(BackgroundSpec::Solid { color: Rgb::WHITE });
    let output = session.render().unwrap();

    let decoded = image::load_from_memory(output.bytes()).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    assert_eq!(decoded.get_pixel(250, 250), &Rgba([200, 30, 30, 255]));
}
