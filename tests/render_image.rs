mod support;

use std::fs;

use photo_translator_rust::ErrorKind;
use photo_translator_rust::geometry::{Polygon, TextRegion};
use photo_translator_rust::render::{FontResource, ImageRenderer, RenderStyle};

fn renderer() -> ImageRenderer {
    ImageRenderer::new(FontResource::estimated(), RenderStyle::default())
}

#[test]
fn no_regions_copies_the_file_unchanged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = support::write_png(dir.path(), "poster.png", 40, 30, [12, 34, 56]);

    let output = renderer().render_image(&image, &[], None).expect("output");

    assert_eq!(output, dir.path().join("poster_output.png"));
    assert_eq!(
        fs::read(&output).expect("output bytes"),
        fs::read(&image).expect("input bytes")
    );
}

#[test]
fn missing_image_is_an_input_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = renderer()
        .render_image(&dir.path().join("absent.png"), &[], None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    assert!(!dir.path().join("absent_output.png").exists());
}

#[test]
fn undecodable_image_is_an_input_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.png");
    fs::write(&path, b"not an image").expect("write");
    let err = renderer().render_image(&path, &[], None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[test]
fn regions_are_erased_and_size_is_kept() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = support::write_png(dir.path(), "sign.png", 120, 80, [200, 0, 0]);
    let regions = vec![TextRegion::new(
        0,
        "BONJOUR",
        Polygon::rect(10, 10, 90, 40),
    )];

    let output = renderer()
        .render_image(&image, &regions, None)
        .expect("output");

    let rendered = image::open(&output).expect("decode output").to_rgb8();
    assert_eq!(rendered.dimensions(), (120, 80));
    // Inside the region, away from the centered text.
    assert_eq!(rendered.get_pixel(12, 12).0, [255, 255, 255]);
    assert_eq!(rendered.get_pixel(97, 47).0, [255, 255, 255]);
    // Outside the region.
    assert_eq!(rendered.get_pixel(5, 5).0, [200, 0, 0]);
    assert_eq!(rendered.get_pixel(110, 70).0, [200, 0, 0]);
}

#[test]
fn explicit_output_path_and_jpeg_encoding() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = support::write_png(dir.path(), "menu.png", 64, 48, [0, 0, 0]);
    let target = dir.path().join("translated.jpg");
    let regions = vec![TextRegion::new(0, "SOUP", Polygon::rect(4, 4, 56, 20))];

    let output = renderer()
        .render_image(&image, &regions, Some(&target))
        .expect("output");

    assert_eq!(output, target);
    let rendered = image::open(&output).expect("decode jpeg");
    assert_eq!((rendered.width(), rendered.height()), (64, 48));
}

#[test]
fn no_regions_onto_the_source_path_keeps_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = support::write_png(dir.path(), "a.png", 16, 16, [90, 60, 30]);
    let before = fs::read(&image).expect("input bytes");

    let output = renderer()
        .render_image(&image, &[], Some(&image))
        .expect("output");

    assert_eq!(output, image);
    assert_eq!(fs::read(&image).expect("bytes after"), before);

    // Same file reached through a different spelling of the path.
    let dotted = dir.path().join(".").join("a.png");
    renderer()
        .render_image(&image, &[], Some(&dotted))
        .expect("output");
    assert_eq!(fs::read(&image).expect("bytes after"), before);
}
