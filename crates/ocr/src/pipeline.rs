use chrono::Utc;
use smartcalc_core::{Calculation, PreprocessConfig};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::preprocess;
use crate::recognizer::{OcrBackend, OcrError};
use crate::source::{AcquiredImage, SourceError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] crate::preprocess::PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("OCR task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Orchestrates: preprocess → OCR → normalize → evaluate.
///
/// Preprocessing and recognition run on the blocking pool, so dropping the
/// returned future (e.g. on Ctrl-C) does not wait for the OCR engine.
pub struct CalculatorPipeline<R: OcrBackend> {
    recognizer: Arc<R>,
    preprocess: PreprocessConfig,
}

impl<R: OcrBackend + 'static> CalculatorPipeline<R> {
    pub fn new(recognizer: R) -> Self {
        Self { recognizer: Arc::new(recognizer), preprocess: PreprocessConfig::default() }
    }

    pub fn with_preprocess(mut self, preprocess: PreprocessConfig) -> Self {
        self.preprocess = preprocess;
        self
    }

    /// Process a file on disk.
    pub async fn process_file(&self, path: &Path) -> Result<Calculation, PipelineError> {
        let image = AcquiredImage::read(path).await?;
        self.process_image(image).await
    }

    /// Process raw bytes (from a camera frame or a file read).
    pub async fn process_bytes(&self, data: Vec<u8>) -> Result<Calculation, PipelineError> {
        self.process_image(AcquiredImage::from_bytes(data)).await
    }

    pub async fn process_image(&self, image: AcquiredImage) -> Result<Calculation, PipelineError> {
        let AcquiredImage { path, bytes, digest, acquired_at } = image;

        let recognizer = Arc::clone(&self.recognizer);
        let max_dimension = self.preprocess.max_dimension;
        let recognized = tokio::task::spawn_blocking(move || -> Result<String, PipelineError> {
            let png = preprocess::prepare_for_ocr(&bytes, max_dimension)?;
            Ok(recognizer.recognize(&png)?)
        })
        .await??;
        tracing::debug!(digest = %digest, "Recognized text: {recognized:?}");

        let mut calculation = Calculation::from_text(recognized, acquired_at).with_digest(digest);
        if let Some(path) = path {
            calculation = calculation.with_source(path);
        }
        log_calculation(&calculation);
        Ok(calculation)
    }
}

/// Run raw text through the normalizer and evaluator, skipping the image
/// stages. Needs no OCR backend.
pub fn calculate_text(raw: &str) -> Calculation {
    let calculation = Calculation::from_text(raw, Utc::now());
    log_calculation(&calculation);
    calculation
}

fn log_calculation(c: &Calculation) {
    tracing::debug!("Normalized expression: {:?}", c.expression);
    tracing::info!("Calculation '{}' = {}", c.expression, c.result);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
