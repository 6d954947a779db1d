use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;
use tracing::warn;

use crate::error::{ErrorKind, Stage, StageError};
use crate::geometry::TextRegion;
use crate::ocr::{AzureOcr, TextRecognizer};
use crate::pipeline::PhotoTranslator;
use crate::render::ImageRenderer;
use crate::settings::Settings;
use crate::translate::{AzureTranslator, TextTranslator, TranslationPair, TranslationRequest};

pub const DEFAULT_TO_LANGUAGE: &str = "en";

/// Result of a tool call. Failures are ordinary values; nothing escapes a
/// tool as a panic or an `Err`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResponse<T> {
    Success(T),
    Error(ToolFailure),
}

impl<T> ToolResponse<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolResponse::Success(_))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToolFailure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub kind: ErrorKind,
    pub error: String,
    pub message: String,
}

impl From<StageError> for ToolFailure {
    fn from(err: StageError) -> Self {
        Self {
            stage: Some(err.stage),
            kind: err.kind(),
            error: err.error.to_string(),
            message: err.stage.failure_message().to_string(),
        }
    }
}

impl ToolFailure {
    fn invalid_input(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: None,
            kind: ErrorKind::Input,
            error: error.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OcrPayload {
    pub results: Vec<TextRegion>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TranslatePayload {
    pub translations: Vec<TranslationPair>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct EditPhotoPayload {
    pub output_path: String,
    pub output_message: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TranslateImagePayload {
    pub original_texts: Vec<String>,
    pub translations: Vec<String>,
    pub output_path: String,
    pub output_message: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrArgs {
    #[serde(rename = "imagePath", alias = "image_path")]
    pub image_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateArgs {
    pub texts: Vec<String>,
    #[serde(default = "default_to_language")]
    pub to_language: String,
    #[serde(default)]
    pub from_language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditPhotoArgs {
    #[serde(rename = "imagePath", alias = "image_path")]
    pub image_path: String,
    #[serde(rename = "textLines", alias = "text_lines")]
    pub text_lines: Vec<TextRegion>,
    #[serde(default, rename = "outputPath", alias = "output_path")]
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateImageArgs {
    #[serde(rename = "imagePath", alias = "image_path")]
    pub image_path: String,
    #[serde(default = "default_to_language")]
    pub to_language: String,
    #[serde(default)]
    pub from_language: Option<String>,
}

fn default_to_language() -> String {
    DEFAULT_TO_LANGUAGE.to_string()
}

/// The four photo tools over one configured pipeline.
pub struct Toolbox<R = AzureOcr, T = AzureTranslator> {
    pipeline: PhotoTranslator<R, T>,
}

impl Toolbox {
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(PhotoTranslator::new(
            AzureOcr::from_settings(settings),
            AzureTranslator::from_settings(settings),
            ImageRenderer::from_settings(&settings.render),
        ))
    }
}

impl<R, T> Toolbox<R, T>
where
    R: TextRecognizer,
    T: TextTranslator,
{
    pub fn new(pipeline: PhotoTranslator<R, T>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &PhotoTranslator<R, T> {
        &self.pipeline
    }

    pub async fn ocr(&self, args: OcrArgs) -> ToolResponse<OcrPayload> {
        match self.pipeline.recognize(Path::new(&args.image_path)).await {
            Ok(results) => ToolResponse::Success(OcrPayload {
                message: format!("recognized {} lines of text", results.len()),
                results,
            }),
            Err(err) => failure(err),
        }
    }

    pub async fn translate(&self, args: TranslateArgs) -> ToolResponse<TranslatePayload> {
        let request = TranslationRequest::from_texts(args.texts, args.to_language)
            .with_from_language(args.from_language);
        match self.pipeline.translate(&request).await {
            Ok(translations) => ToolResponse::Success(TranslatePayload {
                message: format!("translated {} lines", translations.len()),
                translations,
            }),
            Err(err) => failure(err),
        }
    }

    pub fn edit_photo(&self, args: EditPhotoArgs) -> ToolResponse<EditPhotoPayload> {
        let mut regions = args.text_lines;
        for (id, region) in regions.iter_mut().enumerate() {
            region.id = id;
        }
        let output_path = args.output_path.as_deref().map(Path::new);
        match self
            .pipeline
            .render(Path::new(&args.image_path), &regions, output_path)
        {
            Ok(path) => {
                let output_path = path.display().to_string();
                ToolResponse::Success(EditPhotoPayload {
                    output_message: format!("edited image saved to: {}", output_path),
                    output_path,
                    message: format!("redrew {} text lines", regions.len()),
                })
            }
            Err(err) => failure(err),
        }
    }

    pub async fn translate_image(
        &self,
        args: TranslateImageArgs,
    ) -> ToolResponse<TranslateImagePayload> {
        let outcome = self
            .pipeline
            .translate_image(
                Path::new(&args.image_path),
                &args.to_language,
                args.from_language.as_deref(),
            )
            .await;
        match outcome {
            Ok(outcome) => {
                let output_path = outcome.output_path.display().to_string();
                ToolResponse::Success(TranslateImagePayload {
                    original_texts: outcome.original_texts,
                    translations: outcome.translations,
                    output_message: format!("edited image saved to: {}", output_path),
                    output_path,
                    message: "image translation complete".to_string(),
                })
            }
            Err(err) => failure(err),
        }
    }

    /// Dispatches a tool call by name with JSON arguments.
    pub async fn call(&self, name: &str, arguments: Value) -> Value {
        match name {
            "ocr" => match parse_args::<OcrArgs>(name, arguments) {
                Ok(args) => to_json(self.ocr(args).await),
                Err(failure) => to_json(ToolResponse::<()>::Error(failure)),
            },
            "translate" => match parse_args::<TranslateArgs>(name, arguments) {
                Ok(args) => to_json(self.translate(args).await),
                Err(failure) => to_json(ToolResponse::<()>::Error(failure)),
            },
            "edit_photo" => match parse_args::<EditPhotoArgs>(name, arguments) {
                Ok(args) => to_json(self.edit_photo(args)),
                Err(failure) => to_json(ToolResponse::<()>::Error(failure)),
            },
            "translate_image" => match parse_args::<TranslateImageArgs>(name, arguments) {
                Ok(args) => to_json(self.translate_image(args).await),
                Err(failure) => to_json(ToolResponse::<()>::Error(failure)),
            },
            _ => to_json(ToolResponse::<()>::Error(ToolFailure::invalid_input(
                format!("unknown tool: {}", name),
                "tool not found",
            ))),
        }
    }
}

fn failure<T>(err: StageError) -> ToolResponse<T> {
    warn!("{}", err);
    ToolResponse::Error(err.into())
}

fn parse_args<A: DeserializeOwned>(name: &str, arguments: Value) -> Result<A, ToolFailure> {
    serde_json::from_value(arguments).map_err(|err| {
        ToolFailure::invalid_input(
            format!("invalid arguments: {}", err),
            format!("invalid arguments for tool {}", name),
        )
    })
}

fn to_json<T: Serialize>(response: ToolResponse<T>) -> Value {
    serde_json::to_value(&response).unwrap_or_else(|err| {
        json!({
            "status": "error",
            "kind": ErrorKind::Render,
            "error": err.to_string(),
            "message": "failed to serialise tool result"
        })
    })
}

pub fn tool_list() -> Value {
    json!({
        "tools": [
            {
                "name": "ocr",
                "description": "Recognize text lines and their bounding polygons in an image.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "imagePath": image_path_schema()
                    },
                    "required": ["imagePath"]
                }
            },
            {
                "name": "translate",
                "description": "Translate a batch of texts into the target language.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "texts": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Texts to translate, in order."
                        },
                        "to_language": to_language_schema(),
                        "from_language": from_language_schema()
                    },
                    "required": ["texts"]
                }
            },
            {
                "name": "edit_photo",
                "description": "Erase text regions of an image and draw replacement text in them.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "imagePath": image_path_schema(),
                        "textLines": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "text": { "type": "string" },
                                    "boundingPolygon": {
                                        "type": "array",
                                        "minItems": 4,
                                        "maxItems": 4,
                                        "items": {
                                            "type": "object",
                                            "properties": {
                                                "x": { "type": "integer" },
                                                "y": { "type": "integer" }
                                            },
                                            "required": ["x", "y"]
                                        },
                                        "description": "Top-left, top-right, bottom-right, bottom-left."
                                    }
                                },
                                "required": ["text", "boundingPolygon"]
                            }
                        },
                        "outputPath": {
                            "type": "string",
                            "description": "Where to save the result (default: <name>_output.<ext>)."
                        }
                    },
                    "required": ["imagePath", "textLines"]
                }
            },
            {
                "name": "translate_image",
                "description": "Recognize, translate and redraw the text of an image.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "imagePath": image_path_schema(),
                        "to_language": to_language_schema(),
                        "from_language": from_language_schema()
                    },
                    "required": ["imagePath"]
                }
            }
        ]
    })
}

fn image_path_schema() -> Value {
    json!({ "type": "string", "description": "Path of the image file." })
}

fn to_language_schema() -> Value {
    json!({ "type": "string", "description": "Target language code (default: en)." })
}

fn from_language_schema() -> Value {
    json!({ "type": "string", "description": "Source language code; detected when omitted." })
}
