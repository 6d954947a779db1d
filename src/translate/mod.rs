mod azure;

use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

use crate::error::PipelineError;

pub use azure::AzureTranslator;

/// A line to translate; `id` comes back on the matching [`TranslationPair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub id: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub lines: Vec<TextLine>,
    pub to_language: String,
    pub from_language: Option<String>,
}

impl TranslationRequest {
    /// Lines numbered by position.
    pub fn from_texts<I, S>(texts: I, to_language: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines = texts
            .into_iter()
            .enumerate()
            .map(|(id, text)| TextLine {
                id,
                text: text.into(),
            })
            .collect();
        Self {
            lines,
            to_language: to_language.into(),
            from_language: None,
        }
    }

    pub fn with_from_language(mut self, from_language: Option<String>) -> Self {
        self.from_language = from_language.filter(|lang| !lang.trim().is_empty());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationPair {
    #[serde(skip)]
    pub id: usize,
    pub original: String,
    pub translated: String,
}

pub type TranslateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<TranslationPair>, PipelineError>> + Send + 'a>>;

/// Batch translation. A successful result holds exactly one pair per request
/// line, in request order.
pub trait TextTranslator: Send + Sync {
    fn translate<'a>(&'a self, request: &'a TranslationRequest) -> TranslateFuture<'a>;
}
