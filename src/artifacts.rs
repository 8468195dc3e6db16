//! Artifact lifecycle: track every file a run creates, reclaim the temporaries.
//!
//! Every stage output is registered as a typed [`StageArtifact`] *before*
//! the file is written, so a stage that dies half-way through writing still
//! leaves a tracked path behind. At the end of the run (or when the
//! [`CleanupGuard`] is dropped on an early exit) every non-persistent path
//! is deleted. Only [`ArtifactKind::ReorderedRecord`] files survive.

use crate::output::Page;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// File-name suffix of a persisted slide record.
pub const RECORD_SUFFIX: &str = "_reorder.json";

/// What a tracked file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// PDF produced from a PPT/PPTX source.
    ConvertedPdf,
    RawImage,
    EnhancedImage,
    OcrDocument,
    SanitizedText,
    /// The one file per slide that outlives the run.
    ReorderedRecord,
}

impl ArtifactKind {
    pub fn is_persistent(self) -> bool {
        matches!(self, ArtifactKind::ReorderedRecord)
    }
}

/// A named output of one stage for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageArtifact {
    pub kind: ArtifactKind,
    /// 1-based page; `0` for document-level artifacts.
    pub page_index: usize,
    pub path: PathBuf,
    pub persistent: bool,
}

impl StageArtifact {
    pub fn new(kind: ArtifactKind, page_index: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            page_index,
            path: path.into(),
            persistent: kind.is_persistent(),
        }
    }
}

/// Output paths for every stage of one page, derived from its raw image.
///
/// Temporaries sit next to the raw image; the record goes to `record_dir`.
/// Names carry the page stem (`deck-03`), so concurrent chains never write
/// to the same file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePaths {
    pub enhanced_image: PathBuf,
    pub ocr_document: PathBuf,
    pub sanitized_text: PathBuf,
    pub record: PathBuf,
}

impl PagePaths {
    pub fn for_page(page: &Page, scale_factor: f32, record_dir: &Path) -> Self {
        let raw = &page.raw_image_path;
        let dir = raw.parent().unwrap_or_else(|| Path::new("."));
        let stem = raw
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("page-{:02}", page.index));

        Self {
            enhanced_image: crate::pipeline::enhance::enhanced_path(raw, scale_factor),
            ocr_document: dir.join(format!("{stem}_ocr_result.json")),
            sanitized_text: dir.join(format!("{stem}_cleaned.txt")),
            record: record_dir.join(format!("{stem}{RECORD_SUFFIX}")),
        }
    }
}

/// What one reclaim pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    pub deleted: usize,
    /// Paths that were registered but never created (or already gone).
    pub missing: usize,
    pub failed: usize,
}

/// Owns the creation-to-deletion contract for one run.
#[derive(Debug, Default)]
pub struct ArtifactTracker {
    inner: Mutex<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    artifacts: Vec<StageArtifact>,
}

impl ArtifactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `artifact`.
    ///
    /// Registering a path that is already tracked replaces its entry, so a
    /// record demoted by a failed attempt is persistent again once a later
    /// attempt registers it.
    pub fn register(&self, artifact: StageArtifact) {
        let mut state = self.lock();
        match state.artifacts.iter_mut().find(|a| a.path == artifact.path) {
            Some(existing) => *existing = artifact,
            None => {
                debug!(
                    "Tracking {:?} for page {}: {}",
                    artifact.kind,
                    artifact.page_index,
                    artifact.path.display()
                );
                state.artifacts.push(artifact);
            }
        }
    }

    /// Mark a registered path as temporary so the next reclaim deletes it.
    ///
    /// Used when the stage that owns a persistent path fails after
    /// registering it: whatever it left behind is not a finished record.
    pub fn demote(&self, path: &Path) {
        let mut state = self.lock();
        if let Some(a) = state.artifacts.iter_mut().find(|a| a.path == path) {
            a.persistent = false;
        }
    }

    /// Snapshot of everything registered so far.
    pub fn artifacts(&self) -> Vec<StageArtifact> {
        self.lock().artifacts.clone()
    }

    /// Persistent artifacts registered so far.
    pub fn persistent(&self) -> Vec<StageArtifact> {
        self.lock()
            .artifacts
            .iter()
            .filter(|a| a.persistent)
            .cloned()
            .collect()
    }

    /// Delete every non-persistent path.
    ///
    /// Each temporary is removed from the tracker as it is attempted, so
    /// calling this again only touches paths registered since. Missing files
    /// count as success; other I/O failures are logged, never returned.
    pub fn reclaim(&self) -> ReclaimReport {
        let temporaries: Vec<StageArtifact> = {
            let mut state = self.lock();
            let (keep, temps): (Vec<_>, Vec<_>) =
                state.artifacts.drain(..).partition(|a| a.persistent);
            state.artifacts = keep;
            temps
        };

        let mut report = ReclaimReport::default();
        for artifact in &temporaries {
            match std::fs::remove_file(&artifact.path) {
                Ok(()) => report.deleted += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => report.missing += 1,
                Err(e) => {
                    warn!(
                        "Could not delete {:?} for page {} ({}): {}",
                        artifact.kind,
                        artifact.page_index,
                        artifact.path.display(),
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        debug!(
            "Reclaimed temporaries: {} deleted, {} missing, {} failed",
            report.deleted, report.missing, report.failed
        );
        report
    }

    /// Reclaim on drop unless [`CleanupGuard::finish`] ran first.
    pub fn guard(&self) -> CleanupGuard<'_> {
        CleanupGuard {
            tracker: self,
            armed: true,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Runs [`ArtifactTracker::reclaim`] when dropped.
///
/// Covers early returns, panics and a caller dropping the run future.
pub struct CleanupGuard<'a> {
    tracker: &'a ArtifactTracker,
    armed: bool,
}

impl CleanupGuard<'_> {
    /// Reclaim now and disarm the drop hook.
    pub fn finish(mut self) -> ReclaimReport {
        self.armed = false;
        self.tracker.reclaim()
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.tracker.reclaim();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let p = dir.path().join(name);
        std::fs::write(&p, b"x").unwrap();
        p
    }

    #[test]
    fn only_records_are_persistent() {
        for kind in [
            ArtifactKind::ConvertedPdf,
            ArtifactKind::RawImage,
            ArtifactKind::EnhancedImage,
            ArtifactKind::OcrDocument,
            ArtifactKind::SanitizedText,
        ] {
            assert!(!StageArtifact::new(kind, 1, "x").persistent, "{kind:?}");
        }
        assert!(StageArtifact::new(ArtifactKind::ReorderedRecord, 1, "x").persistent);
    }

    #[test]
    fn reclaim_keeps_persistent_and_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let raw = touch(&dir, "deck-01.png");
        let record = touch(&dir, "deck-01_reorder.json");
        let never_written = dir.path().join("deck-01_cleaned.txt");

        let tracker = ArtifactTracker::new();
        tracker.register(StageArtifact::new(ArtifactKind::RawImage, 1, &raw));
        tracker.register(StageArtifact::new(ArtifactKind::SanitizedText, 1, &never_written));
        tracker.register(StageArtifact::new(ArtifactKind::ReorderedRecord, 1, &record));

        let report = tracker.reclaim();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.missing, 1);
        assert_eq!(report.failed, 0);
        assert!(!raw.exists());
        assert!(record.exists());
        assert_eq!(tracker.persistent().len(), 1);

        // Second pass has nothing left to do.
        assert_eq!(tracker.reclaim(), ReclaimReport::default());
    }

    #[test]
    fn duplicate_registration_is_counted_once() {
        let dir = TempDir::new().unwrap();
        let raw = touch(&dir, "deck-01.png");
        let tracker = ArtifactTracker::new();
        tracker.register(StageArtifact::new(ArtifactKind::RawImage, 1, &raw));
        tracker.register(StageArtifact::new(ArtifactKind::RawImage, 1, &raw));
        assert_eq!(tracker.artifacts().len(), 1);
        assert_eq!(tracker.reclaim().deleted, 1);
    }

    #[test]
    fn demoted_record_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let half_written = touch(&dir, "deck-04_reorder.json");
        let tracker = ArtifactTracker::new();
        tracker.register(StageArtifact::new(
            ArtifactKind::ReorderedRecord,
            4,
            &half_written,
        ));
        tracker.demote(&half_written);
        assert!(tracker.persistent().is_empty());
        assert_eq!(tracker.reclaim().deleted, 1);
        assert!(!half_written.exists());
    }

    #[test]
    fn re_registering_a_demoted_record_restores_it() {
        let dir = TempDir::new().unwrap();
        let record = touch(&dir, "deck-01_reorder.json");
        let tracker = ArtifactTracker::new();
        let artifact = StageArtifact::new(ArtifactKind::ReorderedRecord, 1, &record);

        tracker.register(artifact.clone());
        tracker.demote(&record);
        tracker.register(artifact);

        assert_eq!(tracker.artifacts().len(), 1);
        assert_eq!(tracker.persistent().len(), 1);
        assert_eq!(tracker.reclaim(), ReclaimReport::default());
        assert!(record.exists());
    }

    #[test]
    fn guard_reclaims_on_drop() {
        let dir = TempDir::new().unwrap();
        let ocr = touch(&dir, "deck-02_ocr_result.json");
        let tracker = ArtifactTracker::new();
        {
            let _guard = tracker.guard();
            tracker.register(StageArtifact::new(ArtifactKind::OcrDocument, 2, &ocr));
        }
        assert!(!ocr.exists());
    }

    #[test]
    fn page_paths_are_distinct_per_page() {
        let p1 = Page {
            index: 1,
            raw_image_path: PathBuf::from("/work/deck-01.png"),
        };
        let p2 = Page {
            index: 2,
            raw_image_path: PathBuf::from("/work/deck-02.png"),
        };
        let out = Path::new("/out");
        let a = PagePaths::for_page(&p1, 1.5, out);
        let b = PagePaths::for_page(&p2, 1.5, out);
        assert_eq!(a.ocr_document, PathBuf::from("/work/deck-01_ocr_result.json"));
        assert_eq!(a.sanitized_text, PathBuf::from("/work/deck-01_cleaned.txt"));
        assert_eq!(a.record, PathBuf::from("/out/deck-01_reorder.json"));
        assert_ne!(a.enhanced_image, b.enhanced_image);
        assert_ne!(a.record, b.record);
    }
}
