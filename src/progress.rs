//! Progress-callback trait for per-slide pipeline events.
//!
//! Inject an [`Arc<dyn SlideProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as slides move through their stage chains. Callers can forward
//! them to a channel, a WebSocket or a terminal progress bar without the
//! library knowing how the host application communicates.
//!
//! # Example
//!
//! ```rust
//! use slidescribe::{SlideProgressCallback, PipelineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl SlideProgressCallback for CountingCallback {
//!     fn on_slide_complete(&self, slide: usize, total: usize, title: &str) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Slide {}/{}: {}", slide, total, title);
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::Stage;
use std::sync::Arc;

/// Called by the pipeline as it processes each slide.
///
/// Slide chains run concurrently, so every method may be called from
/// several tasks at once. All methods default to no-ops.
pub trait SlideProgressCallback: Send + Sync {
    /// Called once after rasterisation, before any slide chain starts.
    fn on_run_start(&self, total_slides: usize) {
        let _ = total_slides;
    }

    /// Called when a slide's chain begins.
    fn on_slide_start(&self, slide: usize, total_slides: usize) {
        let _ = (slide, total_slides);
    }

    /// Called when a slide reaches the final stage.
    fn on_slide_complete(&self, slide: usize, total_slides: usize, title: &str) {
        let _ = (slide, total_slides, title);
    }

    /// Called when a slide's chain stops at `stage`.
    fn on_slide_error(&self, slide: usize, total_slides: usize, stage: Stage, error: &str) {
        let _ = (slide, total_slides, stage, error);
    }

    /// Called once after every slide has reached a terminal state.
    fn on_run_complete(&self, total_slides: usize, reordered: usize) {
        let _ = (total_slides, reordered);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SlideProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn SlideProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        failed_stages: Mutex<Vec<Stage>>,
        reordered: AtomicUsize,
    }

    impl SlideProgressCallback for TrackingCallback {
        fn on_slide_start(&self, _slide: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_slide_complete(&self, _slide: usize, _total: usize, _title: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_slide_error(&self, _slide: usize, _total: usize, stage: Stage, _error: &str) {
            self.failed_stages.lock().unwrap().push(stage);
        }

        fn on_run_complete(&self, _total: usize, reordered: usize) {
            self.reordered.store(reordered, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_slide_start(1, 3);
        cb.on_slide_complete(1, 3, "제목");
        cb.on_slide_error(2, 3, Stage::Extraction, "HTTP 503");
        cb.on_run_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_slide_start(1, 2);
        tracker.on_slide_complete(1, 2, "Intro");
        tracker.on_slide_start(2, 2);
        tracker.on_slide_error(2, 2, Stage::Reorder, "no title marker");
        tracker.on_run_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.failed_stages.lock().unwrap(), vec![Stage::Reorder]);
        assert_eq!(tracker.reordered.load(Ordering::SeqCst), 1);
    }
}
