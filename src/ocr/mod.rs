mod azure;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use crate::error::PipelineError;
use crate::geometry::TextRegion;

pub use azure::{AzureOcr, ReadOperation, parse_read_operation};

pub type RecognizeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<TextRegion>, PipelineError>> + Send + 'a>>;

/// Line-level text recognition. Lines come back in reading order with ids
/// `0..n`.
pub trait TextRecognizer: Send + Sync {
    fn recognize<'a>(&'a self, image_path: &'a Path) -> RecognizeFuture<'a>;
}
