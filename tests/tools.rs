mod support;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};

use photo_translator_rust::PipelineError;
use photo_translator_rust::geometry::{Polygon, TextRegion};
use photo_translator_rust::ocr::{RecognizeFuture, TextRecognizer};
use photo_translator_rust::pipeline::PhotoTranslator;
use photo_translator_rust::render::{FontResource, ImageRenderer, RenderStyle};
use photo_translator_rust::tools::{TranslateImageArgs, Toolbox, tool_list};
use photo_translator_rust::translate::{
    TextTranslator, TranslateFuture, TranslationPair, TranslationRequest,
};

struct StaticRecognizer(Vec<TextRegion>);

impl TextRecognizer for StaticRecognizer {
    fn recognize<'a>(&'a self, _image_path: &'a Path) -> RecognizeFuture<'a> {
        let regions = self.0.clone();
        Box::pin(async move { Ok(regions) })
    }
}

#[derive(Default)]
struct ShoutingTranslator {
    calls: AtomicUsize,
}

impl TextTranslator for ShoutingTranslator {
    fn translate<'a>(&'a self, request: &'a TranslationRequest) -> TranslateFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = if request.to_language == "xx" {
            Err(PipelineError::Backend(
                "translate request failed (400 Bad Request): 400036: invalid target".to_string(),
            ))
        } else {
            Ok(request
                .lines
                .iter()
                .map(|line| TranslationPair {
                    id: line.id,
                    original: line.text.clone(),
                    translated: line.text.to_uppercase(),
                })
                .collect())
        };
        Box::pin(async move { result })
    }
}

fn toolbox(regions: Vec<TextRegion>) -> Toolbox<StaticRecognizer, ShoutingTranslator> {
    Toolbox::new(PhotoTranslator::new(
        StaticRecognizer(regions),
        ShoutingTranslator::default(),
        ImageRenderer::new(FontResource::estimated(), RenderStyle::default()),
    ))
}

#[test]
fn lists_the_four_tools() {
    let list = tool_list();
    let names: Vec<_> = list["tools"]
        .as_array()
        .expect("tools")
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    assert_eq!(names, vec!["ocr", "translate", "edit_photo", "translate_image"]);
    assert_eq!(list["tools"][2]["inputSchema"]["required"], json!(["imagePath", "textLines"]));
}

#[tokio::test]
async fn image_without_text_reports_an_ocr_failure() {
    let toolbox = toolbox(Vec::new());
    let response = toolbox
        .translate_image(TranslateImageArgs {
            image_path: "blank.png".to_string(),
            to_language: "fr".to_string(),
            from_language: None,
        })
        .await;

    insta::assert_json_snapshot!(response, @r#"
    {
      "status": "error",
      "stage": "ocr",
      "kind": "input",
      "error": "input error: no text detected in image",
      "message": "text recognition failed"
    }
    "#);
    assert_eq!(toolbox.pipeline().translator().calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn translation_failure_stops_before_rendering() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = support::write_png(dir.path(), "menu.png", 80, 40, [10, 10, 10]);
    let toolbox = toolbox(vec![TextRegion::new(0, "soup", Polygon::rect(5, 5, 60, 20))]);

    let result = toolbox
        .call(
            "translate_image",
            json!({"imagePath": image.display().to_string(), "to_language": "xx"}),
        )
        .await;

    assert_eq!(result["status"], "error");
    assert_eq!(result["stage"], "translate");
    assert_eq!(result["kind"], "backend");
    assert_eq!(result["message"], "translation failed");
    assert!(!dir.path().join("menu_output.png").exists());
}

#[tokio::test]
async fn translate_image_returns_texts_and_output_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = support::write_png(dir.path(), "menu.png", 120, 80, [10, 10, 10]);
    let toolbox = toolbox(vec![
        TextRegion::new(0, "soup", Polygon::rect(5, 5, 100, 30)),
        TextRegion::new(1, "bread", Polygon::rect(5, 45, 100, 30)),
    ]);

    let result = toolbox
        .call(
            "translate_image",
            json!({"imagePath": image.display().to_string()}),
        )
        .await;

    let expected_path = dir.path().join("menu_output.png").display().to_string();
    assert_eq!(result["status"], "success");
    assert_eq!(result["original_texts"], json!(["soup", "bread"]));
    assert_eq!(result["translations"], json!(["SOUP", "BREAD"]));
    assert_eq!(result["output_path"], Value::String(expected_path.clone()));
    assert_eq!(
        result["output_message"],
        Value::String(format!("edited image saved to: {}", expected_path))
    );
    assert!(Path::new(&expected_path).exists());
}

#[tokio::test]
async fn translate_tool_returns_pairs() {
    let toolbox = toolbox(Vec::new());
    let result = toolbox
        .call("translate", json!({"texts": ["hello", "world"], "to_language": "de"}))
        .await;

    assert_eq!(result["status"], "success");
    assert_eq!(
        result["translations"],
        json!([
            {"original": "hello", "translated": "HELLO"},
            {"original": "world", "translated": "WORLD"}
        ])
    );
}

#[tokio::test]
async fn ocr_tool_serialises_polygons() {
    let toolbox = toolbox(vec![TextRegion::new(0, "EXIT", Polygon::rect(1, 2, 3, 4))]);
    let result = toolbox.call("ocr", json!({"imagePath": "door.png"})).await;

    assert_eq!(result["status"], "success");
    assert_eq!(
        result["results"],
        json!([{
            "text": "EXIT",
            "boundingPolygon": [
                {"x": 1, "y": 2}, {"x": 4, "y": 2}, {"x": 4, "y": 6}, {"x": 1, "y": 6}
            ]
        }])
    );
}

#[tokio::test]
async fn edit_photo_renders_to_the_requested_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = support::write_png(dir.path(), "card.png", 60, 40, [0, 0, 0]);
    let target = dir.path().join("edited.png");
    let toolbox = toolbox(Vec::new());

    let result = toolbox
        .call(
            "edit_photo",
            json!({
                "imagePath": image.display().to_string(),
                "outputPath": target.display().to_string(),
                "textLines": [{
                    "text": "HI",
                    "boundingPolygon": [
                        {"x": 2, "y": 2}, {"x": 58, "y": 2}, {"x": 58, "y": 38}, {"x": 2, "y": 38}
                    ]
                }]
            }),
        )
        .await;

    assert_eq!(result["status"], "success");
    assert_eq!(result["output_path"], Value::String(target.display().to_string()));
    let rendered = image::open(&target).expect("decode").to_rgb8();
    assert_eq!(rendered.get_pixel(3, 3).0, [255, 255, 255]);
    assert_eq!(rendered.get_pixel(0, 0).0, [0, 0, 0]);
}

#[tokio::test]
async fn bad_polygon_is_rejected_as_invalid_arguments() {
    let toolbox = toolbox(Vec::new());
    let result = toolbox
        .call(
            "edit_photo",
            json!({
                "imagePath": "card.png",
                "textLines": [{"text": "HI", "boundingPolygon": [{"x": 0, "y": 0}]}]
            }),
        )
        .await;

    assert_eq!(result["status"], "error");
    assert_eq!(result["kind"], "input");
    assert_eq!(result.get("stage"), None);
    assert!(
        result["error"]
            .as_str()
            .expect("error text")
            .contains("exactly 4 points")
    );
}

#[tokio::test]
async fn unknown_tool_is_an_input_error() {
    let result = toolbox(Vec::new()).call("resize", json!({})).await;
    assert_eq!(result["status"], "error");
    assert_eq!(result["kind"], "input");
    assert_eq!(result["error"], "unknown tool: resize");
}

#[tokio::test]
async fn edit_photo_without_lines_onto_itself_keeps_the_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = support::write_png(dir.path(), "card.png", 20, 20, [1, 2, 3]);
    let before = std::fs::read(&image).expect("bytes");
    let path = image.display().to_string();

    let result = toolbox(Vec::new())
        .call(
            "edit_photo",
            json!({"imagePath": path, "outputPath": path, "textLines": []}),
        )
        .await;

    assert_eq!(result["status"], "success");
    assert_eq!(std::fs::read(&image).expect("bytes"), before);
}
