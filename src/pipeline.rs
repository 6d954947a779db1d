use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{PipelineError, Stage, StageError};
use crate::geometry::TextRegion;
use crate::ocr::TextRecognizer;
use crate::render::ImageRenderer;
use crate::translate::{TextLine, TextTranslator, TranslationPair, TranslationRequest};

pub const NO_TEXT_DETECTED: &str = "no text detected in image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoTranslation {
    pub original_texts: Vec<String>,
    pub translations: Vec<String>,
    pub output_path: PathBuf,
}

/// OCR, translation and re-rendering chained into one operation. Each stage
/// starts only after the previous one succeeded.
pub struct PhotoTranslator<R, T> {
    recognizer: R,
    translator: T,
    renderer: ImageRenderer,
}

impl<R, T> PhotoTranslator<R, T>
where
    R: TextRecognizer,
    T: TextTranslator,
{
    pub fn new(recognizer: R, translator: T, renderer: ImageRenderer) -> Self {
        Self {
            recognizer,
            translator,
            renderer,
        }
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    pub fn translator(&self) -> &T {
        &self.translator
    }

    pub fn renderer(&self) -> &ImageRenderer {
        &self.renderer
    }

    pub async fn recognize(&self, image_path: &Path) -> Result<Vec<TextRegion>, StageError> {
        self.recognizer
            .recognize(image_path)
            .await
            .map_err(|err| StageError::new(Stage::Ocr, err))
    }

    pub async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<Vec<TranslationPair>, StageError> {
        self.translator
            .translate(request)
            .await
            .map_err(|err| StageError::new(Stage::Translate, err))
    }

    pub fn render(
        &self,
        image_path: &Path,
        regions: &[TextRegion],
        output_path: Option<&Path>,
    ) -> Result<PathBuf, StageError> {
        self.renderer
            .render_image(image_path, regions, output_path)
            .map_err(|err| StageError::new(Stage::Render, err))
    }

    pub async fn translate_image(
        &self,
        image_path: &Path,
        to_language: &str,
        from_language: Option<&str>,
    ) -> Result<PhotoTranslation, StageError> {
        info!("translating image {} to {}", image_path.display(), to_language);
        let regions = self.recognize(image_path).await?;
        if regions.is_empty() {
            return Err(StageError::new(
                Stage::Ocr,
                PipelineError::Input(NO_TEXT_DETECTED.to_string()),
            ));
        }

        let request = TranslationRequest {
            lines: regions
                .iter()
                .map(|region| TextLine {
                    id: region.id,
                    text: region.text.clone(),
                })
                .collect(),
            to_language: to_language.to_string(),
            from_language: None,
        }
        .with_from_language(from_language.map(|lang| lang.to_string()));
        let pairs = self.translate(&request).await?;

        let replacements = realign(&regions, &pairs)
            .map_err(|err| StageError::new(Stage::Translate, err))?;
        let output_path = self.render(image_path, &replacements, None)?;

        Ok(PhotoTranslation {
            original_texts: regions.into_iter().map(|region| region.text).collect(),
            translations: replacements
                .into_iter()
                .map(|region| region.text)
                .collect(),
            output_path,
        })
    }
}

/// Replacement regions: each original polygon with the translation carrying
/// the same id.
fn realign(
    regions: &[TextRegion],
    pairs: &[TranslationPair],
) -> Result<Vec<TextRegion>, PipelineError> {
    let by_id: HashMap<usize, &TranslationPair> =
        pairs.iter().map(|pair| (pair.id, pair)).collect();
    regions
        .iter()
        .map(|region| {
            by_id
                .get(&region.id)
                .map(|pair| region.with_text(pair.translated.clone()))
                .ok_or_else(|| {
                    PipelineError::Backend(format!(
                        "no translation returned for line {} ('{}')",
                        region.id, region.text
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::geometry::Polygon;
    use crate::ocr::RecognizeFuture;
    use crate::render::{FontResource, RenderStyle};
    use crate::translate::TranslateFuture;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Recognized {
        Regions(Vec<TextRegion>),
        Fail,
    }

    struct FakeRecognizer {
        result: Recognized,
    }

    impl TextRecognizer for FakeRecognizer {
        fn recognize<'a>(&'a self, _image_path: &'a Path) -> RecognizeFuture<'a> {
            let result = match &self.result {
                Recognized::Regions(regions) => Ok(regions.clone()),
                Recognized::Fail => Err(PipelineError::Configuration(
                    "OCR subscription key is not configured".to_string(),
                )),
            };
            Box::pin(async move { result })
        }
    }

    /// Uppercases every line; optionally returns pairs in reverse order.
    #[derive(Default)]
    struct FakeTranslator {
        calls: AtomicUsize,
        reverse: bool,
        seen: Mutex<Vec<TranslationRequest>>,
    }

    impl TextTranslator for FakeTranslator {
        fn translate<'a>(&'a self, request: &'a TranslationRequest) -> TranslateFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().expect("lock").push(request.clone());
            let mut pairs: Vec<_> = request
                .lines
                .iter()
                .map(|line| TranslationPair {
                    id: line.id,
                    original: line.text.clone(),
                    translated: line.text.to_uppercase(),
                })
                .collect();
            if self.reverse {
                pairs.reverse();
            }
            Box::pin(async move { Ok(pairs) })
        }
    }

    fn renderer() -> ImageRenderer {
        ImageRenderer::new(FontResource::estimated(), RenderStyle::default())
    }

    fn write_image(dir: &Path) -> PathBuf {
        let path = dir.join("menu.png");
        image::RgbImage::from_pixel(120, 80, image::Rgb([30, 30, 30]))
            .save(&path)
            .expect("write image");
        path
    }

    #[tokio::test]
    async fn ocr_failure_short_circuits() {
        let pipeline = PhotoTranslator::new(
            FakeRecognizer {
                result: Recognized::Fail,
            },
            FakeTranslator::default(),
            renderer(),
        );
        let err = pipeline
            .translate_image(Path::new("missing.png"), "fr", None)
            .await
            .unwrap_err();
        assert_eq!(err.stage, Stage::Ocr);
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(pipeline.translator().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_recognition_is_an_error() {
        let pipeline = PhotoTranslator::new(
            FakeRecognizer {
                result: Recognized::Regions(Vec::new()),
            },
            FakeTranslator::default(),
            renderer(),
        );
        let err = pipeline
            .translate_image(Path::new("blank.png"), "fr", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert!(err.error.to_string().contains(NO_TEXT_DETECTED));
        assert_eq!(pipeline.translator().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn translations_are_paired_by_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let image_path = write_image(dir.path());
        let regions = vec![
            TextRegion::new(0, "hello", Polygon::rect(10, 10, 90, 20)),
            TextRegion::new(1, "world", Polygon::rect(10, 40, 90, 20)),
        ];
        let pipeline = PhotoTranslator::new(
            FakeRecognizer {
                result: Recognized::Regions(regions),
            },
            FakeTranslator {
                reverse: true,
                ..FakeTranslator::default()
            },
            renderer(),
        );

        let outcome = pipeline
            .translate_image(&image_path, "fr", Some("en"))
            .await
            .expect("translated");

        assert_eq!(outcome.original_texts, vec!["hello", "world"]);
        assert_eq!(outcome.translations, vec!["HELLO", "WORLD"]);
        assert_eq!(outcome.output_path, dir.path().join("menu_output.png"));
        assert!(outcome.output_path.exists());

        let seen = pipeline.translator().seen.lock().expect("lock");
        assert_eq!(seen[0].from_language.as_deref(), Some("en"));
        assert_eq!(seen[0].lines.len(), 2);
    }

    #[test]
    fn realign_reports_missing_translation() {
        let regions = vec![TextRegion::new(4, "hello", Polygon::rect(0, 0, 10, 10))];
        let err = realign(&regions, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(err.to_string().contains("line 4"));
    }
}
