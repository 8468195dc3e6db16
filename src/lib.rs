//! # slidescribe
//!
//! Turn lecture slide decks into titled, readable per-slide records.
//!
//! ## Why this crate?
//!
//! OCR on slides returns text in layout order: headings, bullet fragments,
//! diagram labels and handwritten notes all interleaved. This crate runs
//! every slide through recognition, strips the noise and asks an LLM to
//! reorder what is left into one coherent, titled passage that is ready for
//! indexing.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / PPT / PPTX
//!  │
//!  ├─ 1. Input    validate path, detect format
//!  ├─ 2. Convert  PPT/PPTX → PDF via LibreOffice
//!  ├─ 3. Render   rasterise pages via pdfium (spawn_blocking)
//!  │
//!  │   per slide, up to `concurrency` at once:
//!  ├─ 4. Enhance  Lanczos upscale
//!  ├─ 5. Extract  Cloud Vision DOCUMENT_TEXT_DETECTION
//!  ├─ 6. Clean    character allow-list, whitespace collapse
//!  ├─ 7. Reorder  LLM → `제목:` / `본문:` → record JSON
//!  │
//!  └─ 8. Cleanup  every intermediate file is deleted
//! ```
//!
//! A slide that fails a stage stops there; the rest of the document carries
//! on. Only `<page>_reorder.json` files remain in the working directory.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slidescribe::{process_document, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Vision key from GOOGLE_VISION_API_KEY, LLM auto-detected (GEMINI_API_KEY, …)
//!     let config = PipelineConfig::default();
//!     let run = process_document("week3.pdf", "output", &config).await?;
//!     for slide in &run.slides {
//!         match &slide.failed_stage {
//!             None => println!("{}: {}", slide.slide_number, slide.title.as_deref().unwrap_or("")),
//!             Some(stage) => eprintln!("{}: failed at {}", slide.slide_number, stage),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slidescribe` binary (clap, indicatif, tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifacts;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod timing;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifacts::{ArtifactKind, ArtifactTracker, StageArtifact};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{EnhanceError, PageError, ServiceError, SlideError};
pub use orchestrator::{Collaborators, SlidePipeline};
pub use output::{Page, PipelineRun, RunStats, SlideRecord, SlideResult, Stage};
pub use pipeline::input::SourceFormat;
pub use process::{
    process_bytes, process_document, process_document_sync, process_document_with_cancel,
};
pub use progress::{NoopProgressCallback, ProgressCallback, SlideProgressCallback};
pub use timing::StageTiming;
pub use tokio_util::sync::CancellationToken;
