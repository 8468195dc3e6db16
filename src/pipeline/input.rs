//! Input resolution: validate the source path and work out its format.
//!
//! Presentation sources are accepted here but only become rasterizable
//! after the conversion step in [`super::convert`]. PDFs are checked for the
//! `%PDF` magic bytes so callers get a meaningful error rather than a pdfium
//! crash.

use crate::error::SlideError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Declared format of a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Ppt,
    Pptx,
}

impl SourceFormat {
    /// Infer the format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(SourceFormat::Pdf),
            "ppt" => Some(SourceFormat::Ppt),
            "pptx" => Some(SourceFormat::Pptx),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SourceFormat::Pdf => "pdf",
            SourceFormat::Ppt => "ppt",
            SourceFormat::Pptx => "pptx",
        }
    }

    /// Does this format need the PPT → PDF conversion step?
    pub fn needs_conversion(self) -> bool {
        !matches!(self, SourceFormat::Pdf)
    }
}

/// A validated source document on disk. Never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub format: SourceFormat,
}

impl SourceDocument {
    /// File stem used to name page images (`lecture.pdf` → `lecture`).
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "document".to_string())
    }
}

/// Resolve a local path into a [`SourceDocument`].
///
/// Validates existence, read permission, a supported extension and, for
/// PDFs, the magic bytes.
pub fn resolve_source(path: &Path) -> Result<SourceDocument, SlideError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(SlideError::FileNotFound { path });
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format = SourceFormat::from_extension(&extension).ok_or_else(|| {
        SlideError::UnsupportedFormat {
            path: path.clone(),
            extension: extension.clone(),
        }
    })?;

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            if format == SourceFormat::Pdf {
                let mut magic = [0u8; 4];
                if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                    return Err(SlideError::NotAPdf { path, magic });
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(SlideError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(SlideError::FileNotFound { path });
        }
    }

    debug!("Resolved {:?} source: {}", format, path.display());
    Ok(SourceDocument { path, format })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn format_from_extension() {
        assert_eq!(SourceFormat::from_extension("PDF"), Some(SourceFormat::Pdf));
        assert_eq!(SourceFormat::from_extension("pptx"), Some(SourceFormat::Pptx));
        assert_eq!(SourceFormat::from_extension("ppt"), Some(SourceFormat::Ppt));
        assert_eq!(SourceFormat::from_extension("docx"), None);
        assert!(SourceFormat::Pptx.needs_conversion());
        assert!(!SourceFormat::Pdf.needs_conversion());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = resolve_source(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, SlideError::FileNotFound { .. }));
    }

    #[test]
    fn rejects_fake_pdf() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("slides.pdf");
        std::fs::write(&p, b"PK\x03\x04not a pdf").unwrap();
        let err = resolve_source(&p).unwrap_err();
        assert!(matches!(err, SlideError::NotAPdf { .. }), "{err}");
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("notes.txt");
        std::fs::write(&p, b"hello").unwrap();
        assert!(matches!(
            resolve_source(&p),
            Err(SlideError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn accepts_pdf_and_pptx() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("lecture.pdf");
        std::fs::write(&pdf, b"%PDF-1.7\n").unwrap();
        let doc = resolve_source(&pdf).unwrap();
        assert_eq!(doc.format, SourceFormat::Pdf);
        assert_eq!(doc.stem(), "lecture");

        let pptx = dir.path().join("lecture.pptx");
        std::fs::write(&pptx, b"PK\x03\x04").unwrap();
        assert_eq!(resolve_source(&pptx).unwrap().format, SourceFormat::Pptx);
    }
}
