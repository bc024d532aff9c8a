//! Seams to OCR and translation backends.

use std::collections::HashMap;
use std::sync::Arc;

use screenlens_capture::Bitmap;
use screenlens_ipc::{OcrProvider, RecognitionResult, TranslationProviderType};

use crate::error::RecognitionError;
use crate::translator::TranslationError;

/// Recognizes text in a cropped bitmap. Called off the engine loop.
pub trait TextRecognizer: Send + Sync {
    fn recognize(
        &self,
        bitmap: &Bitmap,
        provider: OcrProvider,
        lang: &str,
    ) -> Result<RecognitionResult, RecognitionError>;
}

/// Translates recognized text. Called off the engine loop.
pub trait Translator: Send + Sync {
    /// Provider this backend serves.
    fn provider_type(&self) -> TranslationProviderType;

    fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, TranslationError>;
}

/// Translators keyed by the provider they serve.
#[derive(Clone, Default)]
pub struct TranslatorRegistry {
    translators: HashMap<TranslationProviderType, Arc<dyn Translator>>,
}

impl TranslatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend, replacing any previous one for its provider.
    pub fn register(&mut self, translator: Arc<dyn Translator>) {
        self.translators
            .insert(translator.provider_type(), translator);
    }

    pub fn get(
        &self,
        provider: TranslationProviderType,
    ) -> Result<Arc<dyn Translator>, TranslationError> {
        self.translators
            .get(&provider)
            .cloned()
            .ok_or(TranslationError::Unavailable(provider))
    }
}

impl FromIterator<Arc<dyn Translator>> for TranslatorRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Translator>>>(iter: I) -> Self {
        let mut registry = Self::new();
        for translator in iter {
            registry.register(translator);
        }
        registry
    }
}
