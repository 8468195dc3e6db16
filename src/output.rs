//! Result types produced by a pipeline run.
//!
//! A [`PipelineRun`] is created per document and handed to the caller; no
//! state survives it at this layer. The persisted counterpart of a successful
//! slide is its [`SlideRecord`] JSON file in the working directory.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// One transformation step applied to a page, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Upscale the rasterized page image.
    Enhance,
    /// Remote text recognition on the enhanced image.
    Extraction,
    /// Strip noise characters and normalise whitespace.
    Clean,
    /// Remote generative reorder into a titled record.
    Reorder,
}

impl Stage {
    /// All page stages in execution order.
    pub const ALL: [Stage; 4] = [Stage::Enhance, Stage::Extraction, Stage::Clean, Stage::Reorder];

    /// Stable name used in logs and the timing summary.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Enhance => "enhance",
            Stage::Extraction => "extraction",
            Stage::Clean => "clean",
            Stage::Reorder => "reorder",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rasterized page of the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based position in the document; defines canonical ordering.
    pub index: usize,
    /// PNG produced by the rasterizer.
    pub raw_image_path: PathBuf,
}

/// The persisted output of the reorder stage for one slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideRecord {
    pub slide_number: usize,
    pub title: String,
    pub text: String,
}

/// Outcome of one slide's stage chain.
///
/// Stage fields are filled in chain order and stay `None` from the first
/// failed stage onward.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlideResult {
    /// 1-based slide number (same as [`Page::index`]).
    pub slide_number: usize,

    pub raw_image: Option<PathBuf>,
    pub enhanced_image: Option<PathBuf>,
    pub ocr_document: Option<PathBuf>,
    pub sanitized_text: Option<PathBuf>,
    /// The persistent record file; `Some` only when the slide reached `Reordered`.
    pub record: Option<PathBuf>,

    pub title: Option<String>,
    pub text: Option<String>,

    /// Stage that failed, if any.
    pub failed_stage: Option<Stage>,
    /// Error for the failed stage, if any.
    pub error: Option<PageError>,
}

impl SlideResult {
    /// A fresh result for a page that has only been rasterized.
    pub fn rasterized(page: &Page) -> Self {
        Self {
            slide_number: page.index,
            raw_image: Some(page.raw_image_path.clone()),
            ..Default::default()
        }
    }

    /// Did every stage succeed?
    pub fn is_reordered(&self) -> bool {
        self.failed_stage.is_none() && self.record.is_some()
    }

    /// Artifact path recorded for `stage`, if that stage succeeded.
    pub fn artifact(&self, stage: Stage) -> Option<&PathBuf> {
        match stage {
            Stage::Enhance => self.enhanced_image.as_ref(),
            Stage::Extraction => self.ocr_document.as_ref(),
            Stage::Clean => self.sanitized_text.as_ref(),
            Stage::Reorder => self.record.as_ref(),
        }
    }

    /// Mark `err` as this slide's terminal failure.
    pub(crate) fn fail(&mut self, err: PageError) {
        self.failed_stage = Some(err.stage());
        self.error = Some(err);
    }
}

/// Aggregate counters for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub total_pages: usize,
    pub reordered_pages: usize,
    pub failed_pages: usize,
    pub total_duration_ms: u64,
}

/// Everything a caller receives from one document run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Per-slide outcomes sorted by `slide_number` ascending.
    pub slides: Vec<SlideResult>,
    /// Average seconds per successful invocation, keyed by stage name.
    pub timing_summary: BTreeMap<String, f64>,
    pub stats: RunStats,
}

impl PipelineRun {
    /// Records of every slide that reached the final stage, in slide order.
    pub fn records(&self) -> Vec<SlideRecord> {
        self.slides
            .iter()
            .filter(|s| s.is_reordered())
            .filter_map(|s| {
                Some(SlideRecord {
                    slide_number: s.slide_number,
                    title: s.title.clone()?,
                    text: s.text.clone()?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_are_stable() {
        let names: Vec<&str> = Stage::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, ["enhance", "extraction", "clean", "reorder"]);
        assert_eq!(
            serde_json::to_string(&Stage::Extraction).unwrap(),
            "\"extraction\""
        );
    }

    #[test]
    fn fail_sets_stage_from_error() {
        let page = Page {
            index: 2,
            raw_image_path: PathBuf::from("deck-02.png"),
        };
        let mut slide = SlideResult::rasterized(&page);
        slide.fail(PageError::EmptyContent { page: 2 });
        assert_eq!(slide.failed_stage, Some(Stage::Clean));
        assert!(!slide.is_reordered());
        assert!(slide.artifact(Stage::Enhance).is_none());
    }

    #[test]
    fn record_serialises_with_snake_case_keys() {
        let rec = SlideRecord {
            slide_number: 1,
            title: "운영체제".into(),
            text: "본문".into(),
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["slide_number"], 1);
        assert_eq!(json["title"], "운영체제");
    }
}
