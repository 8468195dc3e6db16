//! Extraction stage: recognize one enhanced image and persist the OCR document.
//!
//! Blocks are split by confidence into `printed` (≥ threshold) and
//! `handwritten` (< threshold). Blocks the service returned without a
//! confidence are scored with [`PipelineConfig::missing_confidence`].

use super::vision::{Recognition, TextRecognizer, Vertex};
use crate::config::PipelineConfig;
use crate::error::{PageError, ServiceError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// One block as written to the OCR document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrBlock {
    pub text: String,
    /// Rounded to three decimals.
    pub confidence: f32,
    pub bounding_poly: Vec<Vertex>,
}

/// The structured document persisted by the extraction stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrDocument {
    #[serde(default)]
    pub full_text: String,
    #[serde(default)]
    pub full_text_blocks: Vec<OcrBlock>,
    #[serde(default)]
    pub printed_blocks: Vec<OcrBlock>,
    #[serde(default)]
    pub handwritten_blocks: Vec<OcrBlock>,
}

impl OcrDocument {
    /// Partition a recognition result by `threshold`.
    pub fn from_recognition(
        recognition: Recognition,
        threshold: f32,
        missing_confidence: f32,
    ) -> Self {
        let mut doc = OcrDocument {
            full_text: recognition.full_text,
            ..Default::default()
        };

        for block in recognition.blocks {
            let confidence = block.confidence.unwrap_or(missing_confidence);
            let entry = OcrBlock {
                text: block.text,
                confidence: round3(confidence),
                bounding_poly: block.bounding_poly,
            };
            if confidence >= threshold {
                doc.printed_blocks.push(entry.clone());
            } else {
                doc.handwritten_blocks.push(entry.clone());
            }
            doc.full_text_blocks.push(entry);
        }
        doc
    }
}

fn round3(v: f32) -> f32 {
    (v * 1000.0).round() / 1000.0
}

/// Read `image`, recognize it and write the OCR document to `output`.
///
/// Every failure (unreadable image, remote error, timeout, malformed
/// response, write error) is an [`PageError::ExtractionFailed`].
pub async fn run_extraction(
    recognizer: &dyn TextRecognizer,
    page: usize,
    image: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<OcrDocument, PageError> {
    let fail = |detail: String| PageError::ExtractionFailed { page, detail };

    let bytes = tokio::fs::read(image)
        .await
        .map_err(|e| fail(format!("{}: {}", image.display(), e)))?;

    let secs = config.api_timeout_secs;
    let recognition =
        match tokio::time::timeout(Duration::from_secs(secs), recognizer.recognize(&bytes)).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout { secs }),
        }
        .map_err(|e| fail(e.to_string()))?;

    let doc = OcrDocument::from_recognition(
        recognition,
        config.confidence_threshold,
        config.missing_confidence,
    );
    debug!(
        "Slide {}: {} blocks ({} printed, {} handwritten)",
        page,
        doc.full_text_blocks.len(),
        doc.printed_blocks.len(),
        doc.handwritten_blocks.len()
    );

    let json = serde_json::to_string_pretty(&doc).map_err(|e| fail(e.to_string()))?;
    tokio::fs::write(output, json)
        .await
        .map_err(|e| fail(format!("{}: {}", output.display(), e)))?;

    Ok(doc)
}
