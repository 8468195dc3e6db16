//! Per-document orchestration: one stage chain per page, run concurrently.
//!
//! ## Page state machine
//!
//! ```text
//! Rasterized ─▶ Enhanced ─▶ Extracted ─▶ Sanitized ─▶ Reordered
//!      │            │           │            │
//!      └────────────┴───────────┴────────────┴──▶ Failed(stage)
//! ```
//!
//! Transitions only move forward and a chain never retries. A failed stage
//! ends that page's chain; other pages carry on. Chains share nothing but
//! the [`ArtifactTracker`] and [`StageTiming`], both internally
//! synchronised, and every page writes to files named after its own index.
//!
//! ## Cleanup
//!
//! Temporaries are written to a run-private scratch directory inside the
//! working directory; only records are written to the working directory
//! itself, so files the caller already had there are never touched. Every
//! artifact is registered before it is written and a
//! [`crate::artifacts::CleanupGuard`] reclaims temporaries on every exit
//! path: success, fatal error, cancellation, or the caller dropping the
//! future. The scratch directory is removed after the guard has run.

use crate::artifacts::{ArtifactKind, ArtifactTracker, PagePaths, StageArtifact};
use crate::config::PipelineConfig;
use crate::error::{PageError, SlideError};
use crate::output::{Page, PipelineRun, RunStats, SlideResult, Stage};
use crate::pipeline::convert::{converted_pdf_path, DocumentConverter, SofficeConverter};
use crate::pipeline::enhance::{ImageEnhancer, LanczosEnhancer};
use crate::pipeline::extract::run_extraction;
use crate::pipeline::input::resolve_source;
use crate::pipeline::llm::{resolve_provider, LlmGenerator};
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer};
use crate::pipeline::reorder::{run_reorder, TextGenerator};
use crate::pipeline::sanitize::run_sanitize;
use crate::pipeline::vision::{TextRecognizer, VisionClient};
use crate::timing::StageTiming;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The external services a run depends on.
///
/// Every field is a trait object so tests (or embedding applications) can
/// substitute their own implementation for any of them.
#[derive(Clone)]
pub struct Collaborators {
    pub rasterizer: Arc<dyn Rasterizer>,
    pub converter: Arc<dyn DocumentConverter>,
    pub enhancer: Arc<dyn ImageEnhancer>,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub generator: Arc<dyn TextGenerator>,
}

impl Collaborators {
    /// Build the production services described by `config`.
    ///
    /// The Vision key comes from `config.vision_api_key`, falling back to
    /// `GOOGLE_VISION_API_KEY`. The LLM provider follows
    /// [`resolve_provider`].
    pub fn from_config(config: &PipelineConfig) -> Result<Self, SlideError> {
        let vision_key = config
            .vision_api_key
            .clone()
            .or_else(|| std::env::var("GOOGLE_VISION_API_KEY").ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SlideError::ProviderNotConfigured {
                provider: "vision".to_string(),
                hint: "Set GOOGLE_VISION_API_KEY or pass --vision-key.".to_string(),
            })?;

        let provider = resolve_provider(config)?;

        Ok(Self {
            rasterizer: Arc::new(PdfiumRasterizer::new(
                config.pdfium_lib_path.clone(),
                config.max_rendered_pixels,
            )),
            converter: Arc::new(SofficeConverter::new(config.soffice_path.clone())),
            enhancer: Arc::new(LanczosEnhancer),
            recognizer: Arc::new(VisionClient::new(vision_key, config.vision_endpoint.clone())),
            generator: Arc::new(LlmGenerator::new(provider, config)),
        })
    }
}

/// Caller cancellation plus the optional document deadline.
#[derive(Debug, Clone)]
struct RunSignal {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunSignal {
    fn new(token: CancellationToken, timeout_secs: Option<u64>) -> Self {
        Self {
            token,
            deadline: timeout_secs.map(|s| Instant::now() + Duration::from_secs(s)),
        }
    }

    fn never() -> Self {
        Self::new(CancellationToken::new(), None)
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {
                        debug!("Document deadline reached");
                    }
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Run `fut` unless the signal fires first.
    async fn race<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        if self.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

/// Shared state handed to every page chain of one run.
struct RunContext<'a> {
    tracker: &'a ArtifactTracker,
    timing: &'a StageTiming,
    signal: &'a RunSignal,
    record_dir: &'a Path,
    total: usize,
}

/// Drives documents through the slide pipeline.
pub struct SlidePipeline {
    config: PipelineConfig,
    services: Collaborators,
}

impl SlidePipeline {
    pub fn new(config: PipelineConfig, services: Collaborators) -> Self {
        Self { config, services }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one document into per-slide records inside `work_dir`.
    ///
    /// Returns `Ok` even when some slides failed; inspect
    /// [`SlideResult::failed_stage`]. Only fatal errors (bad input,
    /// conversion, rasterisation) are returned as `Err`, never with partial
    /// results.
    pub async fn process_document(
        &self,
        source: &Path,
        work_dir: &Path,
    ) -> Result<PipelineRun, SlideError> {
        self.process_document_with_cancel(source, work_dir, CancellationToken::new())
            .await
    }

    /// Like [`Self::process_document`], stopping early when `cancel` fires
    /// or `document_timeout_secs` elapses.
    ///
    /// On cancellation no further page chains start, in-flight remote calls
    /// are abandoned, every temporary is deleted and
    /// [`SlideError::Cancelled`] is returned. Records of slides that had
    /// already finished stay on disk.
    pub async fn process_document_with_cancel(
        &self,
        source: &Path,
        work_dir: &Path,
        cancel: CancellationToken,
    ) -> Result<PipelineRun, SlideError> {
        let started = std::time::Instant::now();
        let signal = RunSignal::new(cancel, self.config.document_timeout_secs);

        let source = resolve_source(source)?;
        tokio::fs::create_dir_all(work_dir)
            .await
            .map_err(|e| SlideError::WorkDirUnavailable {
                path: work_dir.to_path_buf(),
                source: e,
            })?;
        info!(
            "Processing {} ({:?}) into {}",
            source.path.display(),
            source.format,
            work_dir.display()
        );

        let scratch = tempfile::Builder::new()
            .prefix(".slidescribe-")
            .tempdir_in(work_dir)
            .map_err(|e| SlideError::WorkDirUnavailable {
                path: work_dir.to_path_buf(),
                source: e,
            })?;
        debug!("Scratch directory: {}", scratch.path().display());

        let tracker = ArtifactTracker::new();
        let guard = tracker.guard();
        let cancelled = |completed, total| SlideError::Cancelled { completed, total };
        if signal.is_cancelled() {
            return Err(cancelled(0, 0));
        }

        // ── Step 1: Convert presentations ───────────────────────────────────
        let pdf_path = if source.format.needs_conversion() {
            tracker.register(StageArtifact::new(
                ArtifactKind::ConvertedPdf,
                0,
                converted_pdf_path(&source, scratch.path()),
            ));
            let pdf = signal
                .race(self.services.converter.convert(&source, scratch.path()))
                .await
                .ok_or_else(|| cancelled(0, 0))??;
            if pdf != source.path {
                tracker.register(StageArtifact::new(ArtifactKind::ConvertedPdf, 0, &pdf));
            }
            pdf
        } else {
            source.path.clone()
        };

        // ── Step 2: Rasterise ───────────────────────────────────────────────
        // Not raced: the rasterizer owns its files until it returns.
        let render_start = std::time::Instant::now();
        let pages = self
            .services
            .rasterizer
            .rasterize(&pdf_path, scratch.path(), &source.stem(), self.config.dpi)
            .await?;
        for page in &pages {
            tracker.register(StageArtifact::new(
                ArtifactKind::RawImage,
                page.index,
                &page.raw_image_path,
            ));
        }
        let total = pages.len();
        info!("Rasterised {} pages in {:?}", total, render_start.elapsed());

        if signal.is_cancelled() {
            return Err(cancelled(0, total));
        }

        // ── Step 3: Page chains ─────────────────────────────────────────────
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_start(total);
        }

        let timing = StageTiming::new();
        let ctx = RunContext {
            tracker: &tracker,
            timing: &timing,
            signal: &signal,
            record_dir: work_dir,
            total,
        };

        let mut slides: Vec<SlideResult> = stream::iter(pages.iter())
            .map(|page| self.run_chain(page, &ctx))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;
        slides.sort_by_key(|s| s.slide_number);

        // ── Step 4: Reclaim and summarise ───────────────────────────────────
        let interrupted = slides
            .iter()
            .any(|s| matches!(s.error, Some(PageError::Cancelled { .. })));
        let report = guard.finish();
        debug!(
            "Cleanup: {} deleted, {} never created, {} failed",
            report.deleted, report.missing, report.failed
        );
        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!("Could not remove {}: {}", scratch_path.display(), e);
        }

        if interrupted {
            let completed = slides
                .iter()
                .filter(|s| !matches!(s.error, Some(PageError::Cancelled { .. })))
                .count();
            warn!("Run cancelled after {}/{} slides", completed, total);
            return Err(cancelled(completed, total));
        }

        let reordered = slides.iter().filter(|s| s.is_reordered()).count();
        let stats = RunStats {
            total_pages: total,
            reordered_pages: reordered,
            failed_pages: total - reordered,
            total_duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Done: {}/{} slides reordered, {} failed, {}ms",
            stats.reordered_pages, stats.total_pages, stats.failed_pages, stats.total_duration_ms
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_complete(total, reordered);
        }

        Ok(PipelineRun {
            slides,
            timing_summary: timing.summary(),
            stats,
        })
    }

    /// Run the stage chain for a single already-rasterized page.
    ///
    /// Temporaries are written next to the page image and the record into
    /// `record_dir`. `total` is the page count of the document, used in
    /// logs and progress events. Artifacts are registered with `tracker`
    /// and successful stages timed into `timing`; reclaiming is left to the
    /// caller. This is the unit a caller wraps when it wants retry
    /// semantics: calling it again for the same page with the same tracker
    /// re-registers its paths.
    pub async fn process_page(
        &self,
        page: &Page,
        total: usize,
        record_dir: &Path,
        tracker: &ArtifactTracker,
        timing: &StageTiming,
    ) -> SlideResult {
        let signal = RunSignal::never();
        let ctx = RunContext {
            tracker,
            timing,
            signal: &signal,
            record_dir,
            total,
        };
        self.run_chain(page, &ctx).await
    }

    async fn run_chain(&self, page: &Page, ctx: &RunContext<'_>) -> SlideResult {
        let mut slide = SlideResult::rasterized(page);
        let n = page.index;

        if ctx.signal.is_cancelled() {
            slide.fail(PageError::Cancelled {
                page: n,
                stage: Stage::Enhance,
            });
            return slide;
        }

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_slide_start(n, ctx.total);
        }
        debug!("Slide {}/{}: starting", n, ctx.total);

        match self.chain(page, ctx, &mut slide).await {
            Ok(()) => {
                let title = slide.title.as_deref().unwrap_or_default();
                info!("Slide {}/{}: '{}'", n, ctx.total, title);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_slide_complete(n, ctx.total, title);
                }
            }
            Err(err) => {
                let stage = err.stage();
                if matches!(err, PageError::Cancelled { .. }) {
                    debug!("Slide {}: cancelled at {}", n, stage);
                } else {
                    warn!("Slide {}: {} stage failed: {}", n, stage, err);
                }
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_slide_error(n, ctx.total, stage, &err.to_string());
                }
                slide.fail(err);
            }
        }
        slide
    }

    /// Enhance → extract → sanitize → reorder, filling `slide` as each
    /// stage succeeds.
    async fn chain(
        &self,
        page: &Page,
        ctx: &RunContext<'_>,
        slide: &mut SlideResult,
    ) -> Result<(), PageError> {
        let n = page.index;
        let scale = self.config.scale_factor;
        let paths = PagePaths::for_page(page, scale, ctx.record_dir);

        self.run_stage(
            ctx,
            Stage::Enhance,
            StageArtifact::new(ArtifactKind::EnhancedImage, n, &paths.enhanced_image),
            async {
                self.services
                    .enhancer
                    .enhance(&page.raw_image_path, &paths.enhanced_image, scale)
                    .await
                    .map_err(|e| PageError::EnhancementFailed {
                        page: n,
                        detail: e.to_string(),
                    })
            },
        )
        .await?;
        slide.enhanced_image = Some(paths.enhanced_image.clone());

        self.run_stage(
            ctx,
            Stage::Extraction,
            StageArtifact::new(ArtifactKind::OcrDocument, n, &paths.ocr_document),
            run_extraction(
                self.services.recognizer.as_ref(),
                n,
                &paths.enhanced_image,
                &paths.ocr_document,
                &self.config,
            ),
        )
        .await?;
        slide.ocr_document = Some(paths.ocr_document.clone());

        self.run_stage(
            ctx,
            Stage::Clean,
            StageArtifact::new(ArtifactKind::SanitizedText, n, &paths.sanitized_text),
            run_sanitize(n, &paths.ocr_document, &paths.sanitized_text),
        )
        .await?;
        slide.sanitized_text = Some(paths.sanitized_text.clone());

        // A record left by an earlier run is the caller's file; a failed
        // attempt only reclaims a record it may have started itself.
        let record_existed = tokio::fs::try_exists(&paths.record).await.unwrap_or(true);
        let record = self
            .run_stage(
                ctx,
                Stage::Reorder,
                StageArtifact::new(ArtifactKind::ReorderedRecord, n, &paths.record),
                run_reorder(
                    self.services.generator.as_ref(),
                    n,
                    &paths.sanitized_text,
                    &paths.record,
                    self.config.api_timeout_secs,
                ),
            )
            .await
            .inspect_err(|_| {
                if !record_existed {
                    ctx.tracker.demote(&paths.record);
                }
            })?;
        slide.record = Some(paths.record.clone());
        slide.title = Some(record.title);
        slide.text = Some(record.text);
        Ok(())
    }

    /// Register `artifact`, run `work` against the cancellation signal and
    /// time it if it succeeds.
    async fn run_stage<T>(
        &self,
        ctx: &RunContext<'_>,
        stage: Stage,
        artifact: StageArtifact,
        work: impl Future<Output = Result<T, PageError>>,
    ) -> Result<T, PageError> {
        let page = artifact.page_index;
        let cancelled = PageError::Cancelled { page, stage };
        if ctx.signal.is_cancelled() {
            return Err(cancelled);
        }

        ctx.tracker.register(artifact);
        let start = Instant::now();
        let outcome = ctx.signal.race(work).await.unwrap_or(Err(cancelled))?;

        let elapsed = start.elapsed();
        ctx.timing.record(stage, elapsed);
        debug!("Slide {}: {} took {:?}", page, stage, elapsed);
        Ok(outcome)
    }
}
