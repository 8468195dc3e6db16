//! Error types for the slidescribe library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`SlideError`] — **Fatal**: the run cannot proceed at all (missing
//!   source, corrupt PDF, failed PPT→PDF conversion, cancellation).
//!   Returned as `Err(SlideError)` from the top-level `process*` functions
//!   and never accompanied by partial slide results.
//!
//! * [`PageError`] — **Page-local**: one stage failed for one slide. The
//!   remaining stages of that slide are skipped, the error is stored inside
//!   [`crate::output::SlideResult`], and every other slide carries on.
//!
//! * [`ServiceError`] — a remote collaborator (recognition or generative
//!   service) failed. Stage adapters wrap it into the matching [`PageError`].
//!   [`EnhanceError`] plays the same role for the local image enhancer.

use crate::output::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the slidescribe library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::SlideResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum SlideError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source file was not found at the given path.
    #[error("Source file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file extension is neither PDF nor a presentation format.
    #[error("Unsupported source format '{extension}' for '{path}' (expected .pdf, .ppt or .pptx)")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The file claims to be a PDF but does not start with `%PDF`.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Rasterization errors ─────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' could not be rasterized: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Conversion errors ────────────────────────────────────────────────
    /// PPT/PPTX → PDF conversion failed.
    #[error("Presentation conversion failed for '{path}': {detail}")]
    ConversionFailed { path: PathBuf, detail: String },

    // ── Service errors ───────────────────────────────────────────────────
    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The working directory could not be created or written.
    #[error("Working directory '{path}' is unavailable: {source}")]
    WorkDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Control flow ─────────────────────────────────────────────────────
    /// The run was cancelled (caller token or document deadline).
    ///
    /// Temporary artifacts have already been reclaimed when this is returned.
    #[error("Run cancelled after {completed}/{total} slides finished")]
    Cancelled { completed: usize, total: usize },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A page-local error: one stage failed for one slide.
///
/// Stored alongside [`crate::output::SlideResult`]. The run continues with
/// the remaining slides.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The page image could not be read, decoded or upscaled.
    #[error("Slide {page}: enhancement failed: {detail}")]
    EnhancementFailed { page: usize, detail: String },

    /// Text recognition failed (remote error, timeout, malformed response).
    #[error("Slide {page}: text extraction failed: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    /// The extracted document carried no usable text.
    #[error("Slide {page}: no text content to clean")]
    EmptyContent { page: usize },

    /// The generated response lacked the title or body marker.
    #[error("Slide {page}: could not parse reordered text: {detail}")]
    ReorderParseFailed { page: usize, detail: String },

    /// The generative-language call failed or timed out.
    #[error("Slide {page}: reorder call failed: {detail}")]
    ReorderCallFailed { page: usize, detail: String },

    /// The run was cancelled while this slide was at `stage`.
    #[error("Slide {page}: cancelled before {stage}")]
    Cancelled { page: usize, stage: Stage },
}

impl PageError {
    /// The stage whose failure produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            PageError::EnhancementFailed { .. } => Stage::Enhance,
            PageError::ExtractionFailed { .. } => Stage::Extraction,
            PageError::EmptyContent { .. } => Stage::Clean,
            PageError::ReorderParseFailed { .. } | PageError::ReorderCallFailed { .. } => {
                Stage::Reorder
            }
            PageError::Cancelled { stage, .. } => *stage,
        }
    }

    /// 1-based slide number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::EnhancementFailed { page, .. }
            | PageError::ExtractionFailed { page, .. }
            | PageError::EmptyContent { page }
            | PageError::ReorderParseFailed { page, .. }
            | PageError::ReorderCallFailed { page, .. }
            | PageError::Cancelled { page, .. } => *page,
        }
    }
}

/// Failure while upscaling one page image.
#[derive(Debug, Error)]
pub enum EnhanceError {
    /// The input image could not be opened or decoded.
    #[error("could not decode '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The upscaled image could not be encoded or written.
    #[error("could not write '{path}': {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The blocking task running the resize did not complete.
    #[error("enhance task failed: {0}")]
    Task(String),
}

/// Failure reported by a remote collaborator.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// The call did not complete within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Non-2xx HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be decoded into the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The service answered with an application-level error.
    #[error("service error: {0}")]
    Api(String),
}
