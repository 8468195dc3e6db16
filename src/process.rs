//! Top-level entry points.
//!
//! These build the production collaborators from a [`PipelineConfig`] and
//! run one document. Use [`crate::orchestrator::SlidePipeline`] directly to
//! inject your own services.

use crate::config::PipelineConfig;
use crate::error::SlideError;
use crate::orchestrator::{Collaborators, SlidePipeline};
use crate::output::PipelineRun;
use crate::pipeline::input::SourceFormat;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Process a PDF, PPT or PPTX file into per-slide records in `work_dir`.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(PipelineRun)` even if some slides failed (check
/// `run.stats.failed_pages`). After return `work_dir` holds one
/// `*_reorder.json` per successful slide and nothing else the run created.
///
/// # Errors
/// Returns `Err(SlideError)` only for fatal errors:
/// - Source missing, unreadable or in an unsupported format
/// - Presentation conversion failed
/// - The PDF could not be rasterised
/// - No recognition key or LLM provider configured
///
/// # Example
/// ```rust,no_run
/// use slidescribe::{process_document, PipelineConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = PipelineConfig::default();
///     let run = process_document("lecture.pptx", "output", &config).await?;
///     for record in run.records() {
///         println!("{}: {}", record.slide_number, record.title);
///     }
///     Ok(())
/// }
/// ```
pub async fn process_document(
    source: impl AsRef<Path>,
    work_dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineRun, SlideError> {
    process_document_with_cancel(source, work_dir, config, CancellationToken::new()).await
}

/// [`process_document`] that stops early when `cancel` is triggered.
pub async fn process_document_with_cancel(
    source: impl AsRef<Path>,
    work_dir: impl AsRef<Path>,
    config: &PipelineConfig,
    cancel: CancellationToken,
) -> Result<PipelineRun, SlideError> {
    let services = Collaborators::from_config(config)?;
    SlidePipeline::new(config.clone(), services)
        .process_document_with_cancel(source.as_ref(), work_dir.as_ref(), cancel)
        .await
}

/// Synchronous wrapper around [`process_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_document_sync(
    source: impl AsRef<Path>,
    work_dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineRun, SlideError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SlideError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_document(source, work_dir, config))
}

/// Process an in-memory document.
///
/// `bytes` are written to a managed temporary directory as
/// `document.<ext>`, so page files and records are named `document-NN…`.
/// The temporary copy is deleted when this returns.
pub async fn process_bytes(
    bytes: &[u8],
    format: SourceFormat,
    work_dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineRun, SlideError> {
    let tmp = tempfile::TempDir::new()
        .map_err(|e| SlideError::Internal(format!("tempdir: {e}")))?;
    let path = tmp.path().join(format!("document.{}", format.extension()));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| SlideError::Internal(format!("tempfile write: {e}")))?;
    info!("Processing {} in-memory bytes as {:?}", bytes.len(), format);

    // `tmp` is dropped (and the copy deleted) after the run returns.
    process_document(&path, work_dir, config).await
}
