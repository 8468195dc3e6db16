//! Configuration types for the slide pipeline.
//!
//! All run behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config across concurrent page chains and to log the
//! exact settings of a run.

use crate::error::SlideError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default confidence split between printed and handwritten blocks.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.75;

/// Default Cloud Vision endpoint.
pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Configuration for one document run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use slidescribe::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .dpi(200)
///     .concurrency(4)
///     .scale_factor(1.5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Rasterisation DPI. Range: 72–400. Default: 300.
    ///
    /// Slides are mostly large type, but handwritten notes and footnotes
    /// need the extra density for the recognition service.
    pub dpi: u32,

    /// Maximum rendered width or height in pixels. Default: 4000.
    ///
    /// Caps oversized pages independently of DPI so pdfium never allocates
    /// a poster-sized bitmap.
    pub max_rendered_pixels: u32,

    /// Upscale factor applied before recognition. Must be > 1.0. Default: 1.5.
    pub scale_factor: f32,

    /// Blocks with confidence ≥ this are `printed`, the rest `handwritten`.
    /// Default: 0.75.
    pub confidence_threshold: f32,

    /// Confidence assumed when the recognition service omits one. Default: 0.0.
    ///
    /// With the default, such blocks land in the handwritten bucket.
    pub missing_confidence: f32,

    /// Number of slide chains run at once. Default: 4.
    ///
    /// Each chain is network-bound (recognition + generation). `1` gives the
    /// strictly sequential baseline.
    pub concurrency: usize,

    /// Per remote call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Optional deadline for the whole document, in seconds.
    pub document_timeout_secs: Option<u64>,

    /// LLM model identifier, e.g. "gemini-2.5-flash".
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the reorder call. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens generated per slide. Default: 4096.
    pub max_tokens: usize,

    /// Cloud Vision API key.
    pub vision_api_key: Option<String>,

    /// Cloud Vision `images:annotate` endpoint.
    pub vision_endpoint: String,

    /// LibreOffice binary used for PPT/PPTX → PDF. Default: "soffice".
    pub soffice_path: PathBuf,

    /// Explicit pdfium shared library. Falls back to `PDFIUM_LIB_PATH`,
    /// then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Optional per-slide progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 4000,
            scale_factor: 1.5,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            missing_confidence: 0.0,
            concurrency: 4,
            api_timeout_secs: 60,
            document_timeout_secs: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 4096,
            vision_api_key: None,
            vision_endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            soffice_path: PathBuf::from("soffice"),
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("scale_factor", &self.scale_factor)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("missing_confidence", &self.missing_confidence)
            .field("concurrency", &self.concurrency)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("document_timeout_secs", &self.document_timeout_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("vision_api_key", &self.vision_api_key.as_ref().map(|_| "<redacted>"))
            .field("vision_endpoint", &self.vision_endpoint)
            .field("soffice_path", &self.soffice_path)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Upscale factor as an integer percentage (`1.5` → `150`).
    pub fn scale_percent(&self) -> u32 {
        (self.scale_factor * 100.0).round() as u32
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn scale_factor(mut self, factor: f32) -> Self {
        self.config.scale_factor = factor;
        self
    }

    pub fn confidence_threshold(mut self, t: f32) -> Self {
        self.config.confidence_threshold = t;
        self
    }

    pub fn missing_confidence(mut self, c: f32) -> Self {
        self.config.missing_confidence = c;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn document_timeout_secs(mut self, secs: u64) -> Self {
        self.config.document_timeout_secs = Some(secs);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn vision_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.vision_api_key = Some(key.into());
        self
    }

    pub fn vision_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.vision_endpoint = url.into();
        self
    }

    pub fn soffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.soffice_path = path.into();
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, SlideError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(SlideError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if !c.scale_factor.is_finite() || c.scale_factor <= 1.0 {
            return Err(SlideError::InvalidConfig(format!(
                "Scale factor must be > 1.0, got {}",
                c.scale_factor
            )));
        }
        if !(0.0..=1.0).contains(&c.confidence_threshold) {
            return Err(SlideError::InvalidConfig(format!(
                "Confidence threshold must be within 0.0–1.0, got {}",
                c.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&c.missing_confidence) {
            return Err(SlideError::InvalidConfig(format!(
                "Missing-confidence default must be within 0.0–1.0, got {}",
                c.missing_confidence
            )));
        }
        if c.concurrency == 0 {
            return Err(SlideError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(SlideError::InvalidConfig(
                "API timeout must be at least 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = PipelineConfig::default();
        assert_eq!(c.dpi, 300);
        assert_eq!(c.scale_factor, 1.5);
        assert_eq!(c.scale_percent(), 150);
        assert_eq!(c.confidence_threshold, 0.75);
        assert_eq!(c.missing_confidence, 0.0);
        assert_eq!(c.concurrency, 4);
    }

    #[test]
    fn rejects_non_upscaling_factor() {
        let err = PipelineConfig::builder().scale_factor(1.0).build().unwrap_err();
        assert!(err.to_string().contains("Scale factor"));
        assert!(PipelineConfig::builder().scale_factor(f32::NAN).build().is_err());
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        assert!(PipelineConfig::builder()
            .confidence_threshold(1.2)
            .build()
            .is_err());
    }

    #[test]
    fn clamps_dpi_and_concurrency() {
        let c = PipelineConfig::builder()
            .dpi(1200)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 400);
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = PipelineConfig::builder()
            .vision_api_key("secret-key")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("<redacted>"));
    }
}
