//! PDF rasterisation: write every page of a PDF as a PNG.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which uses thread-local
//! state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto the blocking pool so
//! Tokio worker threads never stall during CPU-heavy rendering.
//!
//! Page files are named `<stem>-<NN>.png` with the index zero-padded to the
//! width of the page count, so lexical order equals document order.

use crate::error::SlideError;
use crate::output::Page;
use async_trait::async_trait;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Converts one PDF into an ordered sequence of page images.
///
/// Failure is fatal for the run: without pages there is nothing to process.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(
        &self,
        pdf_path: &Path,
        out_dir: &Path,
        stem: &str,
        dpi: u32,
    ) -> Result<Vec<Page>, SlideError>;
}

/// [`Rasterizer`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_path: Option<PathBuf>,
    max_pixels: Option<u32>,
}

impl PdfiumRasterizer {
    pub fn new(library_path: Option<PathBuf>, max_pixels: u32) -> Self {
        Self {
            library_path,
            max_pixels: Some(max_pixels),
        }
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(
        &self,
        pdf_path: &Path,
        out_dir: &Path,
        stem: &str,
        dpi: u32,
    ) -> Result<Vec<Page>, SlideError> {
        let path = pdf_path.to_path_buf();
        let out = out_dir.to_path_buf();
        let stem = stem.to_string();
        let lib = self.library_path.clone();
        let max_pixels = self.max_pixels;

        tokio::task::spawn_blocking(move || {
            render_pages_blocking(&path, &out, &stem, dpi, max_pixels, lib.as_deref())
        })
        .await
        .map_err(|e| SlideError::Internal(format!("Render task panicked: {}", e)))?
    }
}

/// File name for page `index` (1-based) of a `total`-page document.
pub fn page_file_name(stem: &str, index: usize, total: usize) -> String {
    let width = total.to_string().len().max(2);
    format!("{stem}-{index:0width$}.png")
}

fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, SlideError> {
    let env_path = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);
    let bindings = match library_path.map(Path::to_path_buf).or(env_path) {
        Some(p) => Pdfium::bind_to_library(&p)
            .map_err(|e| SlideError::PdfiumBindingFailed(format!("{}: {:?}", p.display(), e)))?,
        None => Pdfium::bind_to_system_library()
            .map_err(|e| SlideError::PdfiumBindingFailed(format!("{:?}", e)))?,
    };
    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    pdf_path: &Path,
    out_dir: &Path,
    stem: &str,
    dpi: u32,
    max_pixels: Option<u32>,
    library_path: Option<&Path>,
) -> Result<Vec<Page>, SlideError> {
    let pdfium = bind_pdfium(library_path)?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| SlideError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total = pages.len() as usize;
    info!("PDF loaded: {} pages", total);

    let mut render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);
    if let Some(px) = max_pixels {
        render_config = render_config
            .set_maximum_width(px as i32)
            .set_maximum_height(px as i32);
    }

    let mut written: Vec<Page> = Vec::with_capacity(total);
    for (i, page) in pages.iter().enumerate() {
        let index = i + 1;
        let target = out_dir.join(page_file_name(stem, index, total));

        let rendered = page
            .render_with_config(&render_config)
            .map_err(|e| format!("{:?}", e))
            .and_then(|bitmap| {
                let image = bitmap.as_image();
                debug!(
                    "Rendered page {} → {}x{} px",
                    index,
                    image.width(),
                    image.height()
                );
                image
                    .save_with_format(&target, ImageFormat::Png)
                    .map_err(|e| e.to_string())
            });

        if let Err(detail) = rendered {
            // Nothing downstream will ever see these pages.
            discard_partial(&written, &target);
            return Err(SlideError::RasterisationFailed {
                page: index,
                detail,
            });
        }

        written.push(Page {
            index,
            raw_image_path: target,
        });
    }

    Ok(written)
}

fn discard_partial(written: &[Page], failed_target: &Path) {
    for p in written
        .iter()
        .map(|p| p.raw_image_path.as_path())
        .chain(std::iter::once(failed_target))
    {
        if let Err(e) = std::fs::remove_file(p) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove partial page image {}: {}", p.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_names_sort_lexically() {
        assert_eq!(page_file_name("deck", 3, 9), "deck-03.png");
        assert_eq!(page_file_name("deck", 7, 120), "deck-007.png");

        let mut names: Vec<String> = (1..=120).map(|i| page_file_name("d", i, 120)).collect();
        let expected = names.clone();
        names.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn discard_partial_ignores_missing_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let kept = dir.path().join("deck-01.png");
        std::fs::write(&kept, b"png").unwrap();
        let pages = vec![Page {
            index: 1,
            raw_image_path: kept.clone(),
        }];
        discard_partial(&pages, &dir.path().join("deck-02.png"));
        assert!(!kept.exists());
    }
}
