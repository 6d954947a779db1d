pub mod error;
pub mod geometry;
pub mod logging;
pub mod ocr;
pub mod pipeline;
pub mod render;
pub mod retry;
pub mod settings;
pub mod tools;
pub mod translate;

pub use error::{ErrorKind, PipelineError, Stage, StageError};
pub use geometry::{Point, Polygon, TextRegion};
pub use ocr::{AzureOcr, TextRecognizer};
pub use pipeline::{NO_TEXT_DETECTED, PhotoTranslation, PhotoTranslator};
pub use render::{ImageRenderer, RenderStyle};
pub use retry::{PollPolicy, RetryPolicy};
pub use settings::{Settings, load_settings};
pub use tools::{ToolResponse, Toolbox, tool_list};
pub use translate::{AzureTranslator, TextTranslator, TranslationPair, TranslationRequest};
